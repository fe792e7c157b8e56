//! Notification kind definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    PostSubmitted, // Acknowledgment that your report entered the moderation queue
    PostApproved,  // A moderator approved your report
    PostRejected,  // A moderator rejected your report
    PostDeleted,   // A moderator removed your report
    AiMatch,       // A report of the opposite kind looks like yours
    NewMessage,    // New message in one of your conversations
}

impl NotificationKind {
    /// Every kind, for callers that select by origin (retention pruning).
    pub const ALL: [Self; 6] = [
        Self::PostSubmitted,
        Self::PostApproved,
        Self::PostRejected,
        Self::PostDeleted,
        Self::AiMatch,
        Self::NewMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostSubmitted => "post_submitted",
            Self::PostApproved => "post_approved",
            Self::PostRejected => "post_rejected",
            Self::PostDeleted => "post_deleted",
            Self::AiMatch => "ai_match",
            Self::NewMessage => "new_message",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "post_submitted" => Some(Self::PostSubmitted),
            "post_approved" => Some(Self::PostApproved),
            "post_rejected" => Some(Self::PostRejected),
            "post_deleted" => Some(Self::PostDeleted),
            "ai_match" => Some(Self::AiMatch),
            "new_message" => Some(Self::NewMessage),
            _ => None,
        }
    }

    /// Kinds that originate from the moderation queue. These are short-lived
    /// status updates and eligible for retention pruning.
    pub fn is_moderation_origin(&self) -> bool {
        matches!(
            self,
            Self::PostSubmitted | Self::PostApproved | Self::PostRejected | Self::PostDeleted
        )
    }
}
