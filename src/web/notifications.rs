//! Notification polling and read-state routes
//!
//! The client polls these endpoints on a fixed cadence; every GET is
//! idempotent and the dedup keys upstream guarantee polling at any rate never
//! shows duplicated effects.

use crate::middleware::ClientCtx;
use crate::notifications;
use actix_web::{delete, error, get, post, web, Error, HttpResponse, Responder};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_notifications)
        .service(mark_all_read)
        .service(mark_read)
        .service(delete_notification);
}

#[derive(Deserialize)]
struct NotificationQuery {
    show_read: Option<bool>,
}

/// GET /notifications - Recent notifications for the caller
#[get("/notifications")]
async fn list_notifications(
    client: ClientCtx,
    query: web::Query<NotificationQuery>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let show_read = query.show_read.unwrap_or(false);

    let notifications = notifications::get_user_notifications(user_id, 50, show_read)
        .await
        .map_err(error::ErrorInternalServerError)?;

    let unread_count = notifications::count_unread(user_id)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "notifications": notifications,
        "unread_count": unread_count,
    })))
}

/// POST /notifications/{id}/read - Mark one notification as read
#[post("/notifications/{id}/read")]
async fn mark_read(client: ClientCtx, notification_id: web::Path<i32>) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;

    notifications::mark_read(*notification_id, user_id)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

/// POST /notifications/read-all - Mark all of the caller's notifications read
#[post("/notifications/read-all")]
async fn mark_all_read(client: ClientCtx) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;

    notifications::mark_all_read(user_id)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

/// DELETE /notifications/{id} - Remove one of the caller's notifications
#[delete("/notifications/{id}")]
async fn delete_notification(
    client: ClientCtx,
    notification_id: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;

    notifications::delete(*notification_id, user_id)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
