//! Report submission, browsing and moderation endpoints

use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::moderation::{self, ModerationAction, ModerationError};
use crate::notifications::{self, NotificationKind, Payload};
use crate::orm::reports::{self, ReportKind, ReportStatus};
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use chrono::Utc;
use sea_orm::{entity::*, query::*, ActiveValue::Set, Condition};
use serde::Deserialize;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(submit_report)
        .service(list_reports)
        .service(approve_report)
        .service(reject_report)
        .service(delete_report)
        .service(resolve_report)
        .service(view_report);
}

#[derive(Deserialize, Validate)]
struct ReportForm {
    kind: ReportKind,
    #[validate(length(min = 3, max = 255))]
    title: String,
    #[validate(length(min = 3, max = 4000))]
    description: String,
    #[validate(length(min = 1, max = 64))]
    category: String,
    #[validate(length(min = 1, max = 255))]
    location: String,
    #[serde(default)]
    image_urls: Vec<String>,
}

/// POST /reports - Submit a lost or found report (enters the moderation queue)
#[post("/reports")]
async fn submit_report(
    client: ClientCtx,
    form: web::Json<ReportForm>,
) -> Result<HttpResponse, Error> {
    let author_id = client.require_login()?;

    form.validate().map_err(error::ErrorBadRequest)?;

    let db = get_db_pool();
    let form = form.into_inner();

    let report = reports::ActiveModel {
        kind: Set(form.kind),
        status: Set(ReportStatus::Pending),
        title: Set(form.title),
        description: Set(form.description),
        category: Set(form.category),
        location: Set(form.location),
        author_id: Set(author_id),
        image_urls: Set(serde_json::json!(form.image_urls)),
        created_at: Set(Utc::now().naive_utc()),
        approved_at: Set(None),
        resolved_at: Set(None),
        ..Default::default()
    };

    let report = report
        .insert(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    // Synthetic acknowledgment; the only notification a plain UI action creates
    notifications::dispatch(
        author_id,
        NotificationKind::PostSubmitted,
        "Report submitted".to_string(),
        format!("\"{}\" is waiting for moderator review.", report.title),
        Payload::for_report(report.id, report.kind),
        None,
    )
    .await
    .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(report))
}

#[derive(Deserialize)]
struct ReportsQuery {
    kind: Option<ReportKind>,
    /// When true, return the caller's own reports in any status
    mine: Option<bool>,
}

/// GET /reports - Approved reports, or the caller's own with ?mine=true
#[get("/reports")]
async fn list_reports(
    client: ClientCtx,
    query: web::Query<ReportsQuery>,
) -> Result<impl Responder, Error> {
    let db = get_db_pool();

    let mut finder = reports::Entity::find().order_by_desc(reports::Column::CreatedAt);

    if query.mine.unwrap_or(false) {
        let user_id = client.require_login()?;
        finder = finder.filter(reports::Column::AuthorId.eq(user_id));
    } else {
        finder = finder.filter(
            Condition::any()
                .add(reports::Column::Status.eq(ReportStatus::Approved))
                .add(reports::Column::Status.eq(ReportStatus::Resolved)),
        );
    }

    if let Some(kind) = query.kind {
        finder = finder.filter(reports::Column::Kind.eq(kind));
    }

    let reports = finder
        .limit(100)
        .all(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(reports))
}

/// GET /reports/{id} - One report; pending/rejected visible to author and mods only
#[get("/reports/{id}")]
async fn view_report(client: ClientCtx, report_id: web::Path<i32>) -> Result<impl Responder, Error> {
    let db = get_db_pool();

    let report = reports::Entity::find_by_id(*report_id)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Report not found"))?;

    let public = matches!(
        report.status,
        ReportStatus::Approved | ReportStatus::Resolved
    );
    let own = client.get_id() == Some(report.author_id);
    if !public && !own && !client.is_moderator() {
        // Hidden reports are indistinguishable from missing ones
        return Err(error::ErrorNotFound("Report not found"));
    }

    Ok(HttpResponse::Ok().json(report))
}

/// POST /reports/{id}/approve - Approve a pending report (moderators)
#[post("/reports/{id}/approve")]
async fn approve_report(
    client: ClientCtx,
    report_id: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let actor_id = client.require_moderator()?;

    let report = moderation::decide(*report_id, ModerationAction::Approve, actor_id)
        .await
        .map_err(map_moderation_error)?;

    Ok(HttpResponse::Ok().json(report))
}

#[derive(Deserialize, Default)]
struct RejectForm {
    reason: Option<String>,
}

/// POST /reports/{id}/reject - Reject a pending report (moderators)
#[post("/reports/{id}/reject")]
async fn reject_report(
    client: ClientCtx,
    report_id: web::Path<i32>,
    form: Option<web::Json<RejectForm>>,
) -> Result<impl Responder, Error> {
    let actor_id = client.require_moderator()?;
    let reason = form.map(|f| f.into_inner().reason).unwrap_or(None);

    let report = moderation::decide(*report_id, ModerationAction::Reject { reason }, actor_id)
        .await
        .map_err(map_moderation_error)?;

    Ok(HttpResponse::Ok().json(report))
}

/// POST /reports/{id}/delete - Remove a report for guideline violations (moderators)
#[post("/reports/{id}/delete")]
async fn delete_report(
    client: ClientCtx,
    report_id: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let actor_id = client.require_moderator()?;

    let report = moderation::decide(*report_id, ModerationAction::Delete, actor_id)
        .await
        .map_err(map_moderation_error)?;

    Ok(HttpResponse::Ok().json(report))
}

/// POST /reports/{id}/resolve - Author marks their approved report recovered
#[post("/reports/{id}/resolve")]
async fn resolve_report(
    client: ClientCtx,
    report_id: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let owner_id = client.require_login()?;

    let report = moderation::resolve_own(*report_id, owner_id)
        .await
        .map_err(map_moderation_error)?;

    Ok(HttpResponse::Ok().json(report))
}

fn map_moderation_error(e: ModerationError) -> Error {
    match e {
        ModerationError::ReportNotFound(_) => error::ErrorNotFound(e.to_string()),
        ModerationError::InvalidTransition(_) => error::ErrorConflict(e.to_string()),
        ModerationError::Unauthorized(_) => error::ErrorForbidden(e.to_string()),
        ModerationError::Store(_) | ModerationError::Dispatch(_) => {
            log::error!("Moderation decision failed: {}", e);
            error::ErrorInternalServerError("Moderation decision failed, please retry")
        }
    }
}
