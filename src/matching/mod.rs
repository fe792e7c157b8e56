//! Matching engine: periodic similarity sweep between lost and found reports
//!
//! The scan is idempotent over the same data: a (lost, found) pair with an
//! existing match row in any status is never re-scored, and the paired
//! notifications dispatch through dedup keys, so re-running a scan cannot
//! duplicate side effects. Failures are isolated per pair; one bad pair never
//! aborts the sweep.

pub mod scorer;

use crate::app_config;
use crate::db::get_db_pool;
use crate::events::{self, PipelineEvent};
use crate::notifications::{self, NotificationKind, Payload};
use crate::orm::matches::{self, MatchStatus};
use crate::orm::reports::{self, ReportKind, ReportStatus};
use chrono::{Duration, NaiveDateTime};
use sea_orm::{entity::*, query::*, ActiveValue::Set, Condition, DbErr};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use scorer::{KeywordScorer, SimilarityScorer};

/// Cooperative cancellation handle for a running scan. Checked between pairs,
/// never mid-pair, so partial results stay valid.
#[derive(Debug, Default, Clone)]
pub struct ScanCancel(Arc<AtomicBool>);

impl ScanCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Re-arm the handle before starting a new sweep. Clones share state, so
    /// one long-lived handle serves the scheduler and the abort path.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ScanResult {
    pub new_matches: usize,
    pub notifications_sent: usize,
}

/// Run a scan with the default keyword scorer.
pub async fn run_scan(now: NaiveDateTime, cancel: &ScanCancel) -> Result<ScanResult, DbErr> {
    run_scan_with(&KeywordScorer, now, cancel).await
}

/// Run a matching scan over reports approved within the configured window.
///
/// 1. Score every unmatched (lost, found) pair and persist those above the
///    discovery threshold as proposed matches.
/// 2. Dispatch the two per-author notifications for every proposed match in
///    the window. Dedup keys make this the retry path for notifications that
///    failed after their match row was persisted.
pub async fn run_scan_with(
    scorer: &dyn SimilarityScorer,
    now: NaiveDateTime,
    cancel: &ScanCancel,
) -> Result<ScanResult, DbErr> {
    let db = get_db_pool();
    let config = app_config::get_config().matching;
    let window_start = now - Duration::days(config.match_window_days);

    let eligible = reports::Entity::find()
        .filter(reports::Column::Status.eq(ReportStatus::Approved))
        .filter(reports::Column::ApprovedAt.gte(window_start))
        .all(db)
        .await?;

    let (lost, found): (Vec<_>, Vec<_>) = eligible
        .into_iter()
        .partition(|r| r.kind == ReportKind::Lost);

    log::debug!(
        "Matching scan at {}: {} lost / {} found reports in window since {}",
        now,
        lost.len(),
        found.len(),
        window_start
    );

    let mut result = ScanResult::default();
    if lost.is_empty() || found.is_empty() {
        return Ok(result);
    }

    // Pairs with a match row in any status are settled; dismissed pairs must
    // never be re-proposed.
    let lost_ids: Vec<i32> = lost.iter().map(|r| r.id).collect();
    let existing: HashSet<(i32, i32)> = matches::Entity::find()
        .filter(matches::Column::LostReportId.is_in(lost_ids.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|m| (m.lost_report_id, m.found_report_id))
        .collect();

    for l in &lost {
        for f in &found {
            if cancel.is_cancelled() {
                log::info!(
                    "Matching scan cancelled after {} new matches; partial results kept",
                    result.new_matches
                );
                return Ok(result);
            }

            if existing.contains(&(l.id, f.id)) {
                continue;
            }

            let score = scorer.score(
                &format!("{} {}", l.title, l.description),
                &format!("{} {}", f.title, f.description),
            );

            if score <= config.match_threshold {
                continue;
            }

            let row = matches::ActiveModel {
                lost_report_id: Set(l.id),
                found_report_id: Set(f.id),
                confidence: Set(score),
                status: Set(MatchStatus::Proposed),
                matched_at: Set(now),
                ..Default::default()
            };

            // Per-pair isolation: log and move on, the next scan retries.
            match row.insert(db).await {
                Ok(created) => {
                    result.new_matches += 1;
                    events::publish(PipelineEvent::MatchProposed {
                        match_id: created.id,
                        lost_report_id: l.id,
                        found_report_id: f.id,
                        confidence: score,
                    });
                }
                Err(e) => {
                    log::warn!(
                        "Failed to persist match for pair (lost {}, found {}) in window since {}: {}",
                        l.id,
                        f.id,
                        window_start,
                        e
                    );
                }
            }
        }
    }

    // Notification sweep over every proposed match in the window, not just the
    // ones created above. A match whose notifications failed on an earlier run
    // is repaired here without re-scoring; the dispatcher dedups the rest.
    let lost_by_id: HashMap<i32, &reports::Model> = lost.iter().map(|r| (r.id, r)).collect();
    let found_by_id: HashMap<i32, &reports::Model> = found.iter().map(|r| (r.id, r)).collect();

    let proposed = matches::Entity::find()
        .filter(matches::Column::LostReportId.is_in(lost_ids))
        .filter(matches::Column::Status.eq(MatchStatus::Proposed))
        .all(db)
        .await?;

    for m in proposed {
        let (l, f) = match (
            lost_by_id.get(&m.lost_report_id),
            found_by_id.get(&m.found_report_id),
        ) {
            (Some(l), Some(f)) => (*l, *f),
            // One side left the window or was deleted since the match was
            // created; nothing to notify.
            _ => continue,
        };

        result.notifications_sent += notify_pair(&m, l, f).await;
    }

    Ok(result)
}

/// Dispatch the two per-author notifications for one match. Returns how many
/// were actually created (dedup suppresses re-sends). Failures are logged and
/// retried by the next scan.
async fn notify_pair(m: &matches::Model, l: &reports::Model, f: &reports::Model) -> usize {
    let mut sent = 0;

    for (own, other) in [(l, f), (f, l)] {
        let outcome = notifications::dispatch(
            own.author_id,
            NotificationKind::AiMatch,
            "Possible match for your report".to_string(),
            format!(
                "\"{}\" looks similar to \"{}\" ({}% match).",
                own.title,
                other.title,
                (m.confidence * 100.0).round() as i32
            ),
            Payload::for_match(own.id, own.kind, m.id, other.id, m.confidence),
            Some(notifications::match_dedup_key(own.id, other.id)),
        )
        .await;

        match outcome {
            Ok(d) if d.is_created() => sent += 1,
            Ok(_) => {}
            Err(e) => {
                log::warn!(
                    "Failed to dispatch match notification (match {}, recipient {}): {}",
                    m.id,
                    own.author_id,
                    e
                );
            }
        }
    }

    sent
}

/// Dismiss a match on behalf of a participant. Dismissal is terminal and
/// preserves the row so the scan never re-proposes the pair.
pub async fn dismiss(match_id: i32, user_id: i32) -> Result<matches::Model, DismissError> {
    let db = get_db_pool();

    let m = matches::Entity::find_by_id(match_id)
        .one(db)
        .await?
        .ok_or(DismissError::MatchNotFound(match_id))?;

    // Only an author of either side may dismiss.
    let participating = report_author(m.lost_report_id).await? == Some(user_id)
        || report_author(m.found_report_id).await? == Some(user_id);
    if !participating {
        return Err(DismissError::Unauthorized(user_id));
    }

    if m.status == MatchStatus::Dismissed {
        return Ok(m);
    }

    let mut active: matches::ActiveModel = m.into();
    active.status = Set(MatchStatus::Dismissed);
    Ok(active.update(db).await?)
}

async fn report_author(report_id: i32) -> Result<Option<i32>, DbErr> {
    let db = get_db_pool();
    Ok(reports::Entity::find_by_id(report_id)
        .one(db)
        .await?
        .map(|r| r.author_id))
}

#[derive(Debug, thiserror::Error)]
pub enum DismissError {
    #[error("match {0} not found")]
    MatchNotFound(i32),
    #[error("user {0} is not a participant of this match")]
    Unauthorized(i32),
    #[error("store failure: {0}")]
    Store(#[from] DbErr),
}

/// Matches where the caller authored either side, for GET /matches/my.
pub async fn matches_for_user(user_id: i32) -> Result<Vec<(matches::Model, Option<reports::Model>)>, DbErr> {
    let db = get_db_pool();

    let own_report_ids: Vec<i32> = reports::Entity::find()
        .filter(reports::Column::AuthorId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|r| r.id)
        .collect();

    if own_report_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = matches::Entity::find()
        .filter(
            Condition::any()
                .add(matches::Column::LostReportId.is_in(own_report_ids.clone()))
                .add(matches::Column::FoundReportId.is_in(own_report_ids.clone())),
        )
        .order_by_desc(matches::Column::MatchedAt)
        .all(db)
        .await?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    // Annotate each match with the opposing report (None if deleted since),
    // fetched in one batch.
    let opposing_ids: Vec<i32> = rows
        .iter()
        .map(|m| opposing_report_id(m, &own_report_ids))
        .collect();
    let opposing: HashMap<i32, reports::Model> = reports::Entity::find()
        .filter(reports::Column::Id.is_in(opposing_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    let annotated = rows
        .into_iter()
        .map(|m| {
            let other = opposing.get(&opposing_report_id(&m, &own_report_ids)).cloned();
            (m, other)
        })
        .collect();

    Ok(annotated)
}

fn opposing_report_id(m: &matches::Model, own_report_ids: &[i32]) -> i32 {
    if own_report_ids.contains(&m.lost_report_id) {
        m.found_report_id
    } else {
        m.lost_report_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_handle_rearms_for_the_next_sweep() {
        let cancel = ScanCancel::new();
        assert!(!cancel.is_cancelled());
        cancel.cancel();
        assert!(cancel.is_cancelled());
        cancel.reset();
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn cancel_handle_clones_share_state() {
        let cancel = ScanCancel::new();
        let shared = cancel.clone();
        shared.cancel();
        assert!(cancel.is_cancelled());
        cancel.reset();
        assert!(!shared.is_cancelled());
    }
}
