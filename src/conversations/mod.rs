//! Conversation resolver and per-post messaging
//!
//! [`resolve`] is the only creation path for conversations: a "contact"
//! action and a match-driven UI entry point both land here, and the
//! (unordered pair, report) lookup guarantees at most one channel per report
//! and pair. The matching engine itself never creates conversations.

use crate::db::get_db_pool;
use crate::notifications::{self, NotificationKind, Payload};
use crate::orm::conversations;
use crate::orm::messages;
use crate::orm::reports::ReportKind;
use crate::orm::users;
use chrono::Utc;
use sea_orm::{entity::*, query::*, ActiveValue::Set, Condition, DbErr};

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("conversation {0} not found")]
    NotFound(i32),
    #[error("user {0} not found")]
    UserNotFound(i32),
    #[error("cannot open a conversation with yourself")]
    SelfConversation,
    #[error("user {0} is not a participant of this conversation")]
    NotParticipant(i32),
    #[error("message body is empty")]
    EmptyMessage,
    #[error("store failure: {0}")]
    Store(#[from] DbErr),
}

/// Normalize an unordered participant pair to (low, high).
pub fn normalize_pair(a: i32, b: i32) -> (i32, i32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Return the conversation for (pair, report), creating it on first contact.
/// Calling twice with the same arguments returns the identical row.
pub async fn resolve(
    report_id: i32,
    report_kind: ReportKind,
    initiator_id: i32,
    counterparty_id: i32,
) -> Result<conversations::Model, ConversationError> {
    if initiator_id == counterparty_id {
        return Err(ConversationError::SelfConversation);
    }

    let db = get_db_pool();

    users::Entity::find_by_id(counterparty_id)
        .one(db)
        .await?
        .ok_or(ConversationError::UserNotFound(counterparty_id))?;

    let (low, high) = normalize_pair(initiator_id, counterparty_id);

    let existing = conversations::Entity::find()
        .filter(conversations::Column::ReportId.eq(report_id))
        .filter(conversations::Column::ParticipantLowId.eq(low))
        .filter(conversations::Column::ParticipantHighId.eq(high))
        .one(db)
        .await?;

    if let Some(conversation) = existing {
        return Ok(conversation);
    }

    let conversation = conversations::ActiveModel {
        report_id: Set(report_id),
        report_kind: Set(report_kind),
        participant_low_id: Set(low),
        participant_high_id: Set(high),
        created_at: Set(Utc::now().naive_utc()),
        last_message_at: Set(None),
        ..Default::default()
    };

    Ok(conversation.insert(db).await?)
}

/// Append a message. Sender must be a participant. The conversation row is
/// untouched except the last_message_at listing cache.
pub async fn send_message(
    conversation_id: i32,
    sender_id: i32,
    body: &str,
) -> Result<messages::Model, ConversationError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ConversationError::EmptyMessage);
    }

    let db = get_db_pool();

    let conversation = conversations::Entity::find_by_id(conversation_id)
        .one(db)
        .await?
        .ok_or(ConversationError::NotFound(conversation_id))?;

    if !conversation.is_participant(sender_id) {
        return Err(ConversationError::NotParticipant(sender_id));
    }

    let now = Utc::now().naive_utc();
    let message = messages::ActiveModel {
        conversation_id: Set(conversation_id),
        sender_id: Set(sender_id),
        body: Set(body.to_string()),
        created_at: Set(now),
        ..Default::default()
    };
    let message = message.insert(db).await?;

    let recipient_id = conversation.other_participant(sender_id);
    let report_id = conversation.report_id;

    let mut active: conversations::ActiveModel = conversation.into();
    active.last_message_at = Set(Some(now));
    active.update(db).await?;

    // The message is committed; a notification failure is logged and the
    // recipient still sees it on the next conversation poll.
    if let Err(e) = notifications::dispatch(
        recipient_id,
        NotificationKind::NewMessage,
        "New message".to_string(),
        "You have a new message about a report.".to_string(),
        Payload::for_conversation(conversation_id, report_id),
        None,
    )
    .await
    {
        log::warn!(
            "Failed to dispatch message notification (conversation {}, recipient {}): {}",
            conversation_id,
            recipient_id,
            e
        );
    }

    Ok(message)
}

/// Messages in a conversation, oldest first. Participant-scoped.
pub async fn get_messages(
    conversation_id: i32,
    user_id: i32,
) -> Result<Vec<messages::Model>, ConversationError> {
    let db = get_db_pool();

    let conversation = conversations::Entity::find_by_id(conversation_id)
        .one(db)
        .await?
        .ok_or(ConversationError::NotFound(conversation_id))?;

    if !conversation.is_participant(user_id) {
        return Err(ConversationError::NotParticipant(user_id));
    }

    let messages = messages::Entity::find()
        .filter(messages::Column::ConversationId.eq(conversation_id))
        .order_by_asc(messages::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(messages)
}

/// A user's conversations, most recent activity first.
pub async fn list_for_user(user_id: i32) -> Result<Vec<conversations::Model>, DbErr> {
    let db = get_db_pool();

    conversations::Entity::find()
        .filter(
            Condition::any()
                .add(conversations::Column::ParticipantLowId.eq(user_id))
                .add(conversations::Column::ParticipantHighId.eq(user_id)),
        )
        .order_by_desc(conversations::Column::LastMessageAt)
        .order_by_desc(conversations::Column::CreatedAt)
        .all(db)
        .await
}
