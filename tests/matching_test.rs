/// Integration tests for the matching engine
/// Tests the scan window, pair scoring, idempotence across repeated scans,
/// dedup of the paired notifications, and cooperative cancellation
mod common;
use serial_test::serial;

use chrono::{Duration, Utc};
use common::{database::*, fixtures::*};
use reclaim::matching::{self, ScanCancel};
use reclaim::notifications::NotificationKind;
use reclaim::orm::matches::{self, MatchStatus};
use reclaim::orm::notifications as notification_orm;
use reclaim::orm::reports::ReportKind;
use sea_orm::{entity::*, query::*, ActiveValue::Set, ColumnTrait, PaginatorTrait, QueryFilter};

async fn count_ai_match_notifications(db: &sea_orm::DatabaseConnection) -> u64 {
    notification_orm::Entity::find()
        .filter(notification_orm::Column::Kind.eq(NotificationKind::AiMatch.as_str()))
        .count(db)
        .await
        .expect("count") as u64
}

#[actix_rt::test]
#[serial]
async fn test_wallet_scenario_produces_one_match_and_two_notifications() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let finder = create_test_user(&db, "finder", false).await.expect("finder");
    let loser = create_test_user(&db, "loser", false).await.expect("loser");

    let t0 = Utc::now().naive_utc() - Duration::hours(1);
    let found = create_approved_report(
        &db,
        finder.id,
        ReportKind::Found,
        "black wallet near library",
        "black wallet near library",
        t0,
    )
    .await
    .expect("found");
    let lost = create_approved_report(
        &db,
        loser.id,
        ReportKind::Lost,
        "lost my black wallet library",
        "lost my black wallet library",
        t0 + Duration::minutes(10),
    )
    .await
    .expect("lost");

    let result = matching::run_scan(t0 + Duration::hours(1), &ScanCancel::new())
        .await
        .expect("scan");

    assert_eq!(result.new_matches, 1, "exactly one match");
    assert_eq!(result.notifications_sent, 2, "one notification per author");

    let m = matches::Entity::find()
        .one(&db)
        .await
        .expect("fetch")
        .expect("match row");
    assert_eq!(m.lost_report_id, lost.id);
    assert_eq!(m.found_report_id, found.id);
    assert_eq!(m.status, MatchStatus::Proposed);
    assert!(m.confidence > 0.3, "confidence {} > 0.3", m.confidence);

    // Each author is pointed at the other report
    for (author, own, other) in [(finder.id, found.id, lost.id), (loser.id, lost.id, found.id)] {
        let notices = notification_orm::Entity::find()
            .filter(notification_orm::Column::RecipientId.eq(author))
            .filter(notification_orm::Column::Kind.eq(NotificationKind::AiMatch.as_str()))
            .all(&db)
            .await
            .expect("notices");
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].payload["report_id"], own);
        assert_eq!(notices[0].payload["matched_report_id"], other);
        assert!(notices[0].payload["similarity"].as_f64().expect("similarity") > 0.3);
    }

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_repeated_scans_are_idempotent() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let finder = create_test_user(&db, "finder", false).await.expect("finder");
    let loser = create_test_user(&db, "loser", false).await.expect("loser");

    let t0 = Utc::now().naive_utc() - Duration::hours(2);
    create_approved_report(
        &db,
        finder.id,
        ReportKind::Found,
        "silver bicycle at the station",
        "silver bicycle locked at the station racks",
        t0,
    )
    .await
    .expect("found");
    create_approved_report(
        &db,
        loser.id,
        ReportKind::Lost,
        "silver bicycle stolen",
        "silver bicycle taken from the station racks",
        t0,
    )
    .await
    .expect("lost");

    let first = matching::run_scan(t0 + Duration::hours(1), &ScanCancel::new())
        .await
        .expect("first scan");
    assert_eq!(first.new_matches, 1);
    assert_eq!(first.notifications_sent, 2);

    // Same window, same data: nothing new happens
    let second = matching::run_scan(t0 + Duration::hours(2), &ScanCancel::new())
        .await
        .expect("second scan");
    assert_eq!(second.new_matches, 0);
    assert_eq!(second.notifications_sent, 0);

    assert_eq!(matches::Entity::find().count(&db).await.expect("count"), 1);
    assert_eq!(count_ai_match_notifications(&db).await, 2);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_dissimilar_reports_do_not_match() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let finder = create_test_user(&db, "finder", false).await.expect("finder");
    let loser = create_test_user(&db, "loser", false).await.expect("loser");

    let t0 = Utc::now().naive_utc() - Duration::hours(1);
    create_approved_report(
        &db,
        finder.id,
        ReportKind::Found,
        "orange umbrella",
        "orange umbrella by the park bench",
        t0,
    )
    .await
    .expect("found");
    create_approved_report(
        &db,
        loser.id,
        ReportKind::Lost,
        "black laptop sleeve",
        "neoprene laptop sleeve with charger",
        t0,
    )
    .await
    .expect("lost");

    let result = matching::run_scan(t0 + Duration::hours(1), &ScanCancel::new())
        .await
        .expect("scan");
    assert_eq!(result.new_matches, 0);
    assert_eq!(result.notifications_sent, 0);
    assert_eq!(matches::Entity::find().count(&db).await.expect("count"), 0);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_reports_outside_window_are_excluded() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let finder = create_test_user(&db, "finder", false).await.expect("finder");
    let loser = create_test_user(&db, "loser", false).await.expect("loser");

    let now = Utc::now().naive_utc();
    // Identical text, but the found report aged out of the 30-day window
    create_approved_report(
        &db,
        finder.id,
        ReportKind::Found,
        "green backpack",
        "green hiking backpack",
        now - Duration::days(31),
    )
    .await
    .expect("found");
    create_approved_report(
        &db,
        loser.id,
        ReportKind::Lost,
        "green backpack",
        "green hiking backpack",
        now - Duration::days(1),
    )
    .await
    .expect("lost");

    let result = matching::run_scan(now, &ScanCancel::new()).await.expect("scan");
    assert_eq!(result.new_matches, 0);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_dismissed_pair_is_never_reproposed() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let finder = create_test_user(&db, "finder", false).await.expect("finder");
    let loser = create_test_user(&db, "loser", false).await.expect("loser");

    let t0 = Utc::now().naive_utc() - Duration::hours(1);
    create_approved_report(
        &db,
        finder.id,
        ReportKind::Found,
        "brown leather gloves",
        "pair of brown leather gloves",
        t0,
    )
    .await
    .expect("found");
    create_approved_report(
        &db,
        loser.id,
        ReportKind::Lost,
        "brown leather gloves",
        "lost brown leather gloves",
        t0,
    )
    .await
    .expect("lost");

    let first = matching::run_scan(t0 + Duration::minutes(30), &ScanCancel::new())
        .await
        .expect("scan");
    assert_eq!(first.new_matches, 1);

    let m = matches::Entity::find()
        .one(&db)
        .await
        .expect("fetch")
        .expect("match");
    let dismissed = matching::dismiss(m.id, loser.id).await.expect("dismiss");
    assert_eq!(dismissed.status, MatchStatus::Dismissed);

    // The pair stays settled; no new match, no new notifications
    let again = matching::run_scan(t0 + Duration::hours(1), &ScanCancel::new())
        .await
        .expect("rescan");
    assert_eq!(again.new_matches, 0);
    assert_eq!(again.notifications_sent, 0);
    assert_eq!(matches::Entity::find().count(&db).await.expect("count"), 1);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_only_a_participant_may_dismiss() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let finder = create_test_user(&db, "finder", false).await.expect("finder");
    let loser = create_test_user(&db, "loser", false).await.expect("loser");
    let stranger = create_test_user(&db, "stranger", false).await.expect("stranger");

    let t0 = Utc::now().naive_utc();
    let lost = create_approved_report(&db, loser.id, ReportKind::Lost, "Lost watch", "Gold watch", t0)
        .await
        .expect("lost");
    let found = create_approved_report(&db, finder.id, ReportKind::Found, "Found watch", "Gold watch", t0)
        .await
        .expect("found");

    let m = matches::ActiveModel {
        lost_report_id: Set(lost.id),
        found_report_id: Set(found.id),
        confidence: Set(0.9),
        status: Set(MatchStatus::Proposed),
        matched_at: Set(t0),
        ..Default::default()
    };
    let m = m.insert(&db).await.expect("match");

    assert!(matches!(
        matching::dismiss(m.id, stranger.id).await,
        Err(matching::DismissError::Unauthorized(_))
    ));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_missed_notifications_are_repaired_without_rescoring() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let finder = create_test_user(&db, "finder", false).await.expect("finder");
    let loser = create_test_user(&db, "loser", false).await.expect("loser");

    let t0 = Utc::now().naive_utc() - Duration::hours(1);
    let lost = create_approved_report(
        &db,
        loser.id,
        ReportKind::Lost,
        "red headphones",
        "red wireless headphones",
        t0,
    )
    .await
    .expect("lost");
    let found = create_approved_report(
        &db,
        finder.id,
        ReportKind::Found,
        "red headphones",
        "red wireless headphones case",
        t0,
    )
    .await
    .expect("found");

    // A match persisted by an earlier run whose notifications never landed
    let m = matches::ActiveModel {
        lost_report_id: Set(lost.id),
        found_report_id: Set(found.id),
        confidence: Set(0.7),
        status: Set(MatchStatus::Proposed),
        matched_at: Set(t0),
        ..Default::default()
    };
    m.insert(&db).await.expect("match");
    assert_eq!(count_ai_match_notifications(&db).await, 0);

    let result = matching::run_scan(t0 + Duration::hours(1), &ScanCancel::new())
        .await
        .expect("scan");
    assert_eq!(result.new_matches, 0, "existing pair is not re-scored");
    assert_eq!(result.notifications_sent, 2, "missing notifications repaired");
    assert_eq!(count_ai_match_notifications(&db).await, 2);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_match_listing_annotates_opposing_reports() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let finder = create_test_user(&db, "finder", false).await.expect("finder");
    let loser = create_test_user(&db, "loser", false).await.expect("loser");

    let t0 = Utc::now().naive_utc();
    let lost = create_approved_report(&db, loser.id, ReportKind::Lost, "Lost camera", "Compact camera", t0)
        .await
        .expect("lost");
    let found = create_approved_report(&db, finder.id, ReportKind::Found, "Found camera", "Compact camera", t0)
        .await
        .expect("found");

    let live = matches::ActiveModel {
        lost_report_id: Set(lost.id),
        found_report_id: Set(found.id),
        confidence: Set(0.8),
        status: Set(MatchStatus::Proposed),
        matched_at: Set(t0),
        ..Default::default()
    };
    let live = live.insert(&db).await.expect("live match");

    // A match whose opposing report was deleted after it was proposed
    let orphaned = matches::ActiveModel {
        lost_report_id: Set(lost.id),
        found_report_id: Set(9999),
        confidence: Set(0.5),
        status: Set(MatchStatus::Dismissed),
        matched_at: Set(t0),
        ..Default::default()
    };
    let orphaned = orphaned.insert(&db).await.expect("orphaned match");

    let listed = matching::matches_for_user(loser.id).await.expect("list");
    assert_eq!(listed.len(), 2);
    for (m, other) in &listed {
        if m.id == live.id {
            assert_eq!(other.as_ref().expect("opposing report").id, found.id);
        } else {
            assert_eq!(m.id, orphaned.id);
            assert!(other.is_none(), "deleted opposing report listed as absent");
        }
    }

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_cancelled_scan_stops_before_pairing() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let finder = create_test_user(&db, "finder", false).await.expect("finder");
    let loser = create_test_user(&db, "loser", false).await.expect("loser");

    let t0 = Utc::now().naive_utc();
    create_approved_report(&db, finder.id, ReportKind::Found, "Found ring", "Silver ring", t0)
        .await
        .expect("found");
    create_approved_report(&db, loser.id, ReportKind::Lost, "Lost ring", "Silver ring", t0)
        .await
        .expect("lost");

    let cancel = ScanCancel::new();
    cancel.cancel();

    let result = matching::run_scan(t0, &cancel).await.expect("scan");
    assert_eq!(result.new_matches, 0, "cancelled before any pair was scored");
    assert_eq!(matches::Entity::find().count(&db).await.expect("count"), 0);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}
