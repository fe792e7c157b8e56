//! SeaORM Entity for matches table
//!
//! A match links one lost report to one found report with the raw similarity
//! score from the scan that proposed it. Rows are created only by the
//! matching engine; only `status` changes afterwards (user dismiss, or the
//! cascade when a referenced report is deleted).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "matches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub lost_report_id: i32,
    pub found_report_id: i32,
    /// Raw scorer output in [0, 1]; consumers apply their own display cutoff
    pub confidence: f64,
    pub status: MatchStatus,
    pub matched_at: DateTime,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(12))")]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[sea_orm(string_value = "proposed")]
    Proposed,
    #[sea_orm(string_value = "dismissed")]
    Dismissed,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    // No database-level FK: a dismissed match outlives the report it
    // references so the pair's dedup history survives deletion.
    #[sea_orm(
        belongs_to = "super::reports::Entity",
        from = "Column::LostReportId",
        to = "super::reports::Column::Id"
    )]
    LostReport,
    #[sea_orm(
        belongs_to = "super::reports::Entity",
        from = "Column::FoundReportId",
        to = "super::reports::Column::Id"
    )]
    FoundReport,
}

impl ActiveModelBehavior for ActiveModel {}
