//! Moderation engine: applies admin decisions to reports
//!
//! Sole writer of report status fields. Every decision's side effects are
//! observable only through the notification dispatcher, which keeps dedup and
//! formatting in one place.

use crate::db::get_db_pool;
use crate::events::{self, PipelineEvent};
use crate::notifications::{self, DispatchError, NotificationKind, Payload};
use crate::orm::matches::{self, MatchStatus};
use crate::orm::reports::{self, ReportStatus};
use crate::orm::users;
use chrono::Utc;
use sea_orm::{entity::*, query::*, sea_query::Expr, ActiveValue::Set, Condition, DbErr};

/// Message attached to deletion notices. Fixed text so authors of removed
/// posts all see the same wording.
const DELETION_MESSAGE: &str =
    "Your report was removed because it did not meet the community guidelines.";

const DEFAULT_REJECTION_REASON: &str = "It did not meet the posting guidelines.";

#[derive(Debug, Clone)]
pub enum ModerationAction {
    Approve,
    Reject { reason: Option<String> },
    Delete,
}

#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("report {0} not found")]
    ReportNotFound(i32),
    /// The message names the current state so the admin can retry correctly.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("user {0} lacks moderation capability")]
    Unauthorized(i32),
    #[error("store failure: {0}")]
    Store(#[from] DbErr),
    #[error("notification dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

fn status_label(status: ReportStatus) -> &'static str {
    match status {
        ReportStatus::Pending => "pending",
        ReportStatus::Approved => "approved",
        ReportStatus::Rejected => "rejected",
        ReportStatus::Resolved => "resolved",
    }
}

/// Apply a moderation decision to a report.
///
/// Approve/Reject require a pending report; Delete is allowed from any
/// non-terminal status and removes the row after cascade-dismissing matches
/// that reference it. Returns the report as of the decision (the pre-delete
/// snapshot for Delete).
pub async fn decide(
    report_id: i32,
    action: ModerationAction,
    actor_id: i32,
) -> Result<reports::Model, ModerationError> {
    let db = get_db_pool();

    let actor = users::Entity::find_by_id(actor_id)
        .one(db)
        .await?
        .ok_or(ModerationError::Unauthorized(actor_id))?;
    if !actor.is_moderator {
        return Err(ModerationError::Unauthorized(actor_id));
    }

    let report = reports::Entity::find_by_id(report_id)
        .one(db)
        .await?
        .ok_or(ModerationError::ReportNotFound(report_id))?;

    match action {
        ModerationAction::Approve => approve(report).await,
        ModerationAction::Reject { reason } => reject(report, reason).await,
        ModerationAction::Delete => delete(report).await,
    }
}

async fn approve(report: reports::Model) -> Result<reports::Model, ModerationError> {
    if report.status != ReportStatus::Pending {
        return Err(ModerationError::InvalidTransition(format!(
            "report {} is already {}",
            report.id,
            status_label(report.status)
        )));
    }

    let db = get_db_pool();
    let report_id = report.id;
    let author_id = report.author_id;
    let kind = report.kind;
    let title = report.title.clone();

    // Status write and notification commit or abort together, so a failed
    // decision leaves the report pending and can simply be retried.
    let txn = db.begin().await?;

    let mut active: reports::ActiveModel = report.into();
    active.status = Set(ReportStatus::Approved);
    active.approved_at = Set(Some(Utc::now().naive_utc()));
    let updated = active.update(&txn).await?;

    notifications::dispatch_on(
        &txn,
        author_id,
        NotificationKind::PostApproved,
        "Your report was approved".to_string(),
        format!("\"{}\" is now visible to the community.", title),
        Payload::for_report(report_id, kind),
        None,
    )
    .await?;

    txn.commit().await?;

    events::publish(PipelineEvent::ReportModerated {
        report_id,
        author_id,
        status: Some(ReportStatus::Approved),
    });

    Ok(updated)
}

async fn reject(
    report: reports::Model,
    reason: Option<String>,
) -> Result<reports::Model, ModerationError> {
    if report.status != ReportStatus::Pending {
        return Err(ModerationError::InvalidTransition(format!(
            "report {} is already {}",
            report.id,
            status_label(report.status)
        )));
    }

    let db = get_db_pool();
    let report_id = report.id;
    let author_id = report.author_id;
    let kind = report.kind;
    let title = report.title.clone();

    let reason = reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());

    let txn = db.begin().await?;

    let mut active: reports::ActiveModel = report.into();
    active.status = Set(ReportStatus::Rejected);
    let updated = active.update(&txn).await?;

    notifications::dispatch_on(
        &txn,
        author_id,
        NotificationKind::PostRejected,
        "Your report was rejected".to_string(),
        format!("\"{}\" was not approved: {}", title, reason),
        Payload::for_report(report_id, kind),
        None,
    )
    .await?;

    txn.commit().await?;

    events::publish(PipelineEvent::ReportModerated {
        report_id,
        author_id,
        status: Some(ReportStatus::Rejected),
    });

    Ok(updated)
}

async fn delete(report: reports::Model) -> Result<reports::Model, ModerationError> {
    if report.status.is_terminal() {
        return Err(ModerationError::InvalidTransition(format!(
            "report {} is already {} and cannot be deleted",
            report.id,
            status_label(report.status)
        )));
    }

    let db = get_db_pool();
    let snapshot = report.clone();

    let txn = db.begin().await?;

    // Dismiss matches before the row disappears so a concurrent scan sees the
    // pair as already handled and never recreates it.
    let dismissed = matches::Entity::update_many()
        .col_expr(
            matches::Column::Status,
            Expr::value(MatchStatus::Dismissed),
        )
        .filter(
            Condition::any()
                .add(matches::Column::LostReportId.eq(report.id))
                .add(matches::Column::FoundReportId.eq(report.id)),
        )
        .filter(matches::Column::Status.eq(MatchStatus::Proposed))
        .exec(&txn)
        .await?;

    let active: reports::ActiveModel = report.into();
    active.delete(&txn).await?;

    notifications::dispatch_on(
        &txn,
        snapshot.author_id,
        NotificationKind::PostDeleted,
        "Your report was removed".to_string(),
        format!("\"{}\": {}", snapshot.title, DELETION_MESSAGE),
        Payload::for_report(snapshot.id, snapshot.kind),
        None,
    )
    .await?;

    txn.commit().await?;

    if dismissed.rows_affected > 0 {
        log::info!(
            "Dismissed {} matches referencing deleted report {}",
            dismissed.rows_affected,
            snapshot.id
        );
    }

    events::publish(PipelineEvent::ReportModerated {
        report_id: snapshot.id,
        author_id: snapshot.author_id,
        status: None,
    });

    Ok(snapshot)
}

/// Owner-initiated resolution of an approved report (item recovered).
/// Terminal; follows the Approved -> Resolved edge of the same state machine.
pub async fn resolve_own(report_id: i32, owner_id: i32) -> Result<reports::Model, ModerationError> {
    let db = get_db_pool();

    let report = reports::Entity::find_by_id(report_id)
        .one(db)
        .await?
        .ok_or(ModerationError::ReportNotFound(report_id))?;

    if report.author_id != owner_id {
        return Err(ModerationError::Unauthorized(owner_id));
    }

    if !report.status.can_transition(ReportStatus::Resolved) {
        return Err(ModerationError::InvalidTransition(format!(
            "report {} is {} and cannot be resolved",
            report.id,
            status_label(report.status)
        )));
    }

    let author_id = report.author_id;
    let mut active: reports::ActiveModel = report.into();
    active.status = Set(ReportStatus::Resolved);
    active.resolved_at = Set(Some(Utc::now().naive_utc()));
    let updated = active.update(db).await?;

    events::publish(PipelineEvent::ReportModerated {
        report_id,
        author_id,
        status: Some(ReportStatus::Resolved),
    });

    Ok(updated)
}
