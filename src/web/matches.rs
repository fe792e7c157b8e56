//! Match listing, dismissal and the manual scan trigger

use crate::matching::{self, DismissError, ScanCancel};
use crate::middleware::ClientCtx;
use crate::orm::{matches, reports};
use actix_web::{delete, error, get, post, web, Error, HttpResponse, Responder};
use chrono::Utc;
use serde::Serialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(trigger_scan)
        .service(cancel_scan)
        .service(my_matches)
        .service(dismiss_match);
}

/// POST /matches/scan - Run a matching scan now (operational/debug use)
#[post("/matches/scan")]
async fn trigger_scan(
    client: ClientCtx,
    cancel: web::Data<ScanCancel>,
) -> Result<impl Responder, Error> {
    client.require_moderator()?;

    cancel.reset();
    let result = matching::run_scan(Utc::now().naive_utc(), cancel.get_ref())
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(result))
}

/// POST /matches/scan/cancel - Abort the sweep currently in flight
#[post("/matches/scan/cancel")]
async fn cancel_scan(
    client: ClientCtx,
    cancel: web::Data<ScanCancel>,
) -> Result<impl Responder, Error> {
    client.require_moderator()?;

    cancel.cancel();
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

#[derive(Serialize)]
struct OpposingReportSummary {
    id: i32,
    kind: reports::ReportKind,
    title: String,
    category: String,
    location: String,
}

#[derive(Serialize)]
struct MatchView {
    id: i32,
    confidence: f64,
    status: matches::MatchStatus,
    matched_at: chrono::NaiveDateTime,
    /// None when the opposing report was deleted after the match was made
    opposing_report: Option<OpposingReportSummary>,
}

/// GET /matches/my - Matches where the caller authored either report
#[get("/matches/my")]
async fn my_matches(client: ClientCtx) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;

    let rows = matching::matches_for_user(user_id)
        .await
        .map_err(error::ErrorInternalServerError)?;

    let views: Vec<MatchView> = rows
        .into_iter()
        .map(|(m, other)| MatchView {
            id: m.id,
            confidence: m.confidence,
            status: m.status,
            matched_at: m.matched_at,
            opposing_report: other.map(|r| OpposingReportSummary {
                id: r.id,
                kind: r.kind,
                title: r.title,
                category: r.category,
                location: r.location,
            }),
        })
        .collect();

    Ok(HttpResponse::Ok().json(views))
}

/// DELETE /matches/{id} - Dismiss a match (kept as a row to preserve dedup history)
#[delete("/matches/{id}")]
async fn dismiss_match(client: ClientCtx, match_id: web::Path<i32>) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;

    let dismissed = matching::dismiss(*match_id, user_id)
        .await
        .map_err(|e| match e {
            DismissError::MatchNotFound(_) => error::ErrorNotFound(e.to_string()),
            DismissError::Unauthorized(_) => error::ErrorForbidden(e.to_string()),
            DismissError::Store(_) => {
                log::error!("Match dismissal failed: {}", e);
                error::ErrorInternalServerError("Dismissal failed, please retry")
            }
        })?;

    Ok(HttpResponse::Ok().json(dismissed))
}
