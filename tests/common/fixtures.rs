//! Test fixtures for creating test data
#![allow(dead_code)]

use chrono::{NaiveDateTime, Utc};
use reclaim::orm::reports::{self, ReportKind, ReportStatus};
use reclaim::orm::users;
use sea_orm::{entity::*, ActiveValue::Set, DatabaseConnection, DbErr};

/// Create a test user
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
    is_moderator: bool,
) -> Result<users::Model, DbErr> {
    let user = users::ActiveModel {
        username: Set(username.to_string()),
        email: Set(Some(format!("{}@test.com", username))),
        is_moderator: Set(is_moderator),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };
    user.insert(db).await
}

/// Create a pending report
pub async fn create_pending_report(
    db: &DatabaseConnection,
    author_id: i32,
    kind: ReportKind,
    title: &str,
    description: &str,
) -> Result<reports::Model, DbErr> {
    let report = reports::ActiveModel {
        kind: Set(kind),
        status: Set(ReportStatus::Pending),
        title: Set(title.to_string()),
        description: Set(description.to_string()),
        category: Set("misc".to_string()),
        location: Set("campus".to_string()),
        author_id: Set(author_id),
        image_urls: Set(serde_json::json!([])),
        created_at: Set(Utc::now().naive_utc()),
        approved_at: Set(None),
        resolved_at: Set(None),
        ..Default::default()
    };
    report.insert(db).await
}

/// Create a report that is already approved, with an explicit approval time
/// so matching-window tests can control eligibility.
pub async fn create_approved_report(
    db: &DatabaseConnection,
    author_id: i32,
    kind: ReportKind,
    title: &str,
    description: &str,
    approved_at: NaiveDateTime,
) -> Result<reports::Model, DbErr> {
    let report = reports::ActiveModel {
        kind: Set(kind),
        status: Set(ReportStatus::Approved),
        title: Set(title.to_string()),
        description: Set(description.to_string()),
        category: Set("misc".to_string()),
        location: Set("campus".to_string()),
        author_id: Set(author_id),
        image_urls: Set(serde_json::json!([])),
        created_at: Set(approved_at),
        approved_at: Set(Some(approved_at)),
        resolved_at: Set(None),
        ..Default::default()
    };
    report.insert(db).await
}
