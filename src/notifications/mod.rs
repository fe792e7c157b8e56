//! Notification dispatcher: the single write path into the notifications table
//!
//! Every producer (moderation engine, matching engine, message sends, the
//! submission acknowledgment) goes through [`dispatch`], so delivery, dedup
//! and read-state rules live in one place. Nothing else inserts notifications.

pub mod types;

use crate::app_config;
use crate::db::get_db_pool;
use crate::events::{self, PipelineEvent};
use crate::orm::reports::ReportKind;
use crate::orm::{notifications, users};
use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::{entity::*, query::*, sea_query::Expr, ActiveValue::Set, ConnectionTrait, DbErr};
use serde::Serialize;

pub use types::NotificationKind;

/// Dispatch failure. A dedup collision is not a failure; see [`Dispatched`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("recipient {0} not found")]
    RecipientNotFound(i32),
    #[error("store failure: {0}")]
    Store(#[from] DbErr),
}

/// Outcome of a dispatch call. A duplicate is a success that returns the
/// previously stored row, so at-least-once producers can retry blindly.
#[derive(Debug)]
pub enum Dispatched {
    Created(notifications::Model),
    Duplicate(notifications::Model),
}

impl Dispatched {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    pub fn into_model(self) -> notifications::Model {
        match self {
            Self::Created(model) | Self::Duplicate(model) => model,
        }
    }
}

/// Structured notification payload. Fields are optional because the shape
/// varies by kind; only the references relevant to the kind are set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Payload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_kind: Option<ReportKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_report_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i32>,
}

impl Payload {
    pub fn for_report(report_id: i32, report_kind: ReportKind) -> Self {
        Self {
            report_id: Some(report_id),
            report_kind: Some(report_kind),
            ..Default::default()
        }
    }

    pub fn for_match(
        own_report_id: i32,
        own_kind: ReportKind,
        match_id: i32,
        matched_report_id: i32,
        similarity: f64,
    ) -> Self {
        Self {
            report_id: Some(own_report_id),
            report_kind: Some(own_kind),
            match_id: Some(match_id),
            matched_report_id: Some(matched_report_id),
            similarity: Some(similarity),
            ..Default::default()
        }
    }

    pub fn for_conversation(conversation_id: i32, report_id: i32) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            report_id: Some(report_id),
            ..Default::default()
        }
    }
}

/// Dedup key for a match notification: one per (recipient, own report,
/// matched report). The kind prefix keeps the key space partitioned.
pub fn match_dedup_key(own_report_id: i32, matched_report_id: i32) -> String {
    format!("ai_match:{}:{}", own_report_id, matched_report_id)
}

/// Create a notification for a user.
///
/// With a dedup key, redispatching the same key to the same recipient is a
/// no-op success returning the stored row.
pub async fn dispatch(
    recipient_id: i32,
    kind: NotificationKind,
    title: String,
    message: String,
    payload: Payload,
    dedup_key: Option<String>,
) -> Result<Dispatched, DispatchError> {
    dispatch_on(
        get_db_pool(),
        recipient_id,
        kind,
        title,
        message,
        payload,
        dedup_key,
    )
    .await
}

/// [`dispatch`] on an explicit connection. A producer whose decision must be
/// atomic with its notification passes its open transaction here, so the
/// notification commits or aborts together with the decision.
pub async fn dispatch_on<C>(
    db: &C,
    recipient_id: i32,
    kind: NotificationKind,
    title: String,
    message: String,
    payload: Payload,
    dedup_key: Option<String>,
) -> Result<Dispatched, DispatchError>
where
    C: ConnectionTrait,
{
    // Recipient must be a real account
    users::Entity::find_by_id(recipient_id)
        .one(db)
        .await?
        .ok_or(DispatchError::RecipientNotFound(recipient_id))?;

    if let Some(ref key) = dedup_key {
        if let Some(existing) = find_by_dedup_key(db, recipient_id, key).await? {
            log::debug!(
                "Suppressed duplicate notification for user {} (dedup key {})",
                recipient_id,
                key
            );
            return Ok(Dispatched::Duplicate(existing));
        }
    }

    let payload_json =
        serde_json::to_value(&payload).map_err(|e| DbErr::Custom(e.to_string()))?;
    let report_kind = payload.report_kind;

    let notification = notifications::ActiveModel {
        recipient_id: Set(recipient_id),
        kind: Set(kind.as_str().to_string()),
        title: Set(title),
        message: Set(message),
        payload: Set(payload_json),
        dedup_key: Set(dedup_key.clone()),
        is_read: Set(false),
        created_at: Set(Utc::now().naive_utc()),
        read_at: Set(None),
        ..Default::default()
    };

    let result = match notification.insert(db).await {
        Ok(row) => row,
        // A concurrent dispatch with the same key won the insert between our
        // pre-check and here; its row is the duplicate to return.
        Err(e) if dedup_key.is_some() && is_unique_violation(&e) => {
            let key = dedup_key.as_deref().unwrap_or_default();
            return match find_by_dedup_key(db, recipient_id, key).await? {
                Some(existing) => Ok(Dispatched::Duplicate(existing)),
                None => Err(e.into()),
            };
        }
        Err(e) => return Err(e.into()),
    };

    events::publish(PipelineEvent::NotificationCreated {
        notification_id: result.id,
        recipient_id,
        kind: kind.as_str().to_string(),
        report_kind,
    });

    Ok(Dispatched::Created(result))
}

async fn find_by_dedup_key<C>(
    db: &C,
    recipient_id: i32,
    key: &str,
) -> Result<Option<notifications::Model>, DbErr>
where
    C: ConnectionTrait,
{
    notifications::Entity::find()
        .filter(notifications::Column::RecipientId.eq(recipient_id))
        .filter(notifications::Column::DedupKey.eq(key.to_string()))
        .one(db)
        .await
}

fn is_unique_violation(err: &DbErr) -> bool {
    match err {
        DbErr::Query(msg) | DbErr::Exec(msg) => {
            msg.contains("duplicate key value violates unique constraint")
        }
        _ => false,
    }
}

/// Count unread notifications for a user
pub async fn count_unread(recipient_id: i32) -> Result<i64, DbErr> {
    let db = get_db_pool();

    let count = notifications::Entity::find()
        .filter(notifications::Column::RecipientId.eq(recipient_id))
        .filter(notifications::Column::IsRead.eq(false))
        .count(db)
        .await?;

    Ok(count as i64)
}

/// Mark a notification as read. Scoped to the recipient; marking someone
/// else's notification silently does nothing.
pub async fn mark_read(notification_id: i32, recipient_id: i32) -> Result<(), DbErr> {
    let db = get_db_pool();

    notifications::Entity::update_many()
        .col_expr(notifications::Column::IsRead, Expr::value(true))
        .col_expr(
            notifications::Column::ReadAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(notifications::Column::Id.eq(notification_id))
        .filter(notifications::Column::RecipientId.eq(recipient_id))
        .exec(db)
        .await?;

    Ok(())
}

/// Mark all notifications as read for a user
pub async fn mark_all_read(recipient_id: i32) -> Result<(), DbErr> {
    let db = get_db_pool();

    notifications::Entity::update_many()
        .col_expr(notifications::Column::IsRead, Expr::value(true))
        .col_expr(
            notifications::Column::ReadAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(notifications::Column::RecipientId.eq(recipient_id))
        .filter(notifications::Column::IsRead.eq(false))
        .exec(db)
        .await?;

    Ok(())
}

/// Delete a notification, recipient-scoped.
pub async fn delete(notification_id: i32, recipient_id: i32) -> Result<(), DbErr> {
    let db = get_db_pool();

    notifications::Entity::delete_many()
        .filter(notifications::Column::Id.eq(notification_id))
        .filter(notifications::Column::RecipientId.eq(recipient_id))
        .exec(db)
        .await?;

    Ok(())
}

/// Fetch recent notifications for a user
pub async fn get_user_notifications(
    recipient_id: i32,
    limit: u64,
    show_read: bool,
) -> Result<Vec<notifications::Model>, DbErr> {
    let db = get_db_pool();

    let mut query = notifications::Entity::find()
        .filter(notifications::Column::RecipientId.eq(recipient_id))
        .order_by_desc(notifications::Column::CreatedAt)
        .limit(limit);

    if !show_read {
        query = query.filter(notifications::Column::IsRead.eq(false));
    }

    query.all(db).await
}

/// Prune moderation-origin notifications older than the retention horizon.
///
/// Maintenance path only; never called from dispatch. Anything newer than the
/// horizon is untouched regardless of read state, and match/message kinds are
/// never pruned.
pub async fn prune_expired(now: NaiveDateTime) -> Result<u64, DbErr> {
    let db = get_db_pool();
    let retention_days = app_config::get_config().notifications.retention_days;
    let horizon = now - Duration::days(retention_days);

    let moderation_kinds: Vec<&'static str> = NotificationKind::ALL
        .iter()
        .filter(|kind| kind.is_moderation_origin())
        .map(|kind| kind.as_str())
        .collect();

    let result = notifications::Entity::delete_many()
        .filter(notifications::Column::Kind.is_in(moderation_kinds))
        .filter(notifications::Column::CreatedAt.lt(horizon))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        log::info!(
            "Pruned {} expired moderation notifications (horizon {} days)",
            result.rows_affected,
            retention_days
        );
    }

    Ok(result.rows_affected)
}
