//! SeaORM Entity for reports table (lost/found posts)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub kind: ReportKind,
    pub status: ReportStatus,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub author_id: i32,
    /// JSON array of image URLs; upload handling is external
    pub image_urls: Json,
    pub created_at: DateTime,
    pub approved_at: Option<DateTime>,
    pub resolved_at: Option<DateTime>,
}

/// Lost or found. Matching only ever pairs opposite kinds.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(8))")]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    #[sea_orm(string_value = "lost")]
    Lost,
    #[sea_orm(string_value = "found")]
    Found,
}

impl ReportKind {
    /// The kind a report of this kind can match against.
    pub fn opposite(self) -> Self {
        match self {
            Self::Lost => Self::Found,
            Self::Found => Self::Lost,
        }
    }
}

/// Moderation lifecycle state. Rejected and Resolved are terminal; nothing
/// ever re-enters Pending. Deletion is row removal, not a status.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(12))")]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "resolved")]
    Resolved,
}

impl ReportStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Resolved)
    }

    /// Whether the state machine allows moving from self to next.
    /// Edges: Pending -> Approved | Rejected, Approved -> Resolved.
    pub fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Resolved)
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AuthorId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Author,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_accept_no_transition() {
        for next in [
            ReportStatus::Pending,
            ReportStatus::Approved,
            ReportStatus::Rejected,
            ReportStatus::Resolved,
        ] {
            assert!(!ReportStatus::Rejected.can_transition(next));
            assert!(!ReportStatus::Resolved.can_transition(next));
        }
    }

    #[test]
    fn nothing_reenters_pending() {
        for from in [
            ReportStatus::Pending,
            ReportStatus::Approved,
            ReportStatus::Rejected,
            ReportStatus::Resolved,
        ] {
            assert!(!from.can_transition(ReportStatus::Pending));
        }
    }

    #[test]
    fn allowed_edges() {
        assert!(ReportStatus::Pending.can_transition(ReportStatus::Approved));
        assert!(ReportStatus::Pending.can_transition(ReportStatus::Rejected));
        assert!(ReportStatus::Approved.can_transition(ReportStatus::Resolved));
        assert!(!ReportStatus::Approved.can_transition(ReportStatus::Rejected));
        assert!(!ReportStatus::Rejected.can_transition(ReportStatus::Approved));
    }

    #[test]
    fn opposite_kind_flips() {
        assert_eq!(ReportKind::Lost.opposite(), ReportKind::Found);
        assert_eq!(ReportKind::Found.opposite(), ReportKind::Lost);
    }
}
