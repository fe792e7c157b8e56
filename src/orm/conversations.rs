//! SeaORM Entity for conversations table
//!
//! Exactly two participants per conversation, stored as a normalized pair
//! (participant_low_id < participant_high_id) so the unordered-pair-per-report
//! uniqueness is a plain unique index.

use sea_orm::entity::prelude::*;
use serde::Serialize;

use super::reports::ReportKind;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "conversations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Report this conversation is about; kept even if the report is later
    /// deleted, so the channel survives
    pub report_id: i32,
    pub report_kind: ReportKind,
    pub participant_low_id: i32,
    pub participant_high_id: i32,
    pub created_at: DateTime,
    /// Listing-order cache only; the resolver never reads it
    pub last_message_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::messages::Entity")]
    Messages,
}

impl Related<super::messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl Model {
    pub fn is_participant(&self, user_id: i32) -> bool {
        self.participant_low_id == user_id || self.participant_high_id == user_id
    }

    /// The participant other than `user_id`. Caller must already have checked
    /// membership.
    pub fn other_participant(&self, user_id: i32) -> i32 {
        if self.participant_low_id == user_id {
            self.participant_high_id
        } else {
            self.participant_low_id
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
