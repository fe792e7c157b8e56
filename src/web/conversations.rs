//! Conversation resolution and messaging routes

use crate::conversations::{self, ConversationError};
use crate::middleware::ClientCtx;
use crate::orm::reports::ReportKind;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use serde::Deserialize;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(resolve_conversation)
        .service(list_conversations)
        .service(get_messages)
        .service(send_message);
}

#[derive(Deserialize)]
struct ResolveForm {
    report_id: i32,
    report_kind: ReportKind,
    counterparty_id: i32,
}

/// POST /conversations/resolve - Get or create the channel for (report, pair)
#[post("/conversations/resolve")]
async fn resolve_conversation(
    client: ClientCtx,
    form: web::Json<ResolveForm>,
) -> Result<impl Responder, Error> {
    let initiator_id = client.require_login()?;
    let form = form.into_inner();

    let conversation = conversations::resolve(
        form.report_id,
        form.report_kind,
        initiator_id,
        form.counterparty_id,
    )
    .await
    .map_err(map_conversation_error)?;

    Ok(HttpResponse::Ok().json(conversation))
}

/// GET /conversations - The caller's conversations, most recent first
#[get("/conversations")]
async fn list_conversations(client: ClientCtx) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;

    let conversations = conversations::list_for_user(user_id)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(conversations))
}

/// GET /conversations/{id}/messages - Messages, oldest first (participants only)
#[get("/conversations/{id}/messages")]
async fn get_messages(
    client: ClientCtx,
    conversation_id: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;

    let messages = conversations::get_messages(*conversation_id, user_id)
        .await
        .map_err(map_conversation_error)?;

    Ok(HttpResponse::Ok().json(messages))
}

#[derive(Deserialize, Validate)]
struct MessageForm {
    #[validate(length(min = 1, max = 4000))]
    body: String,
}

/// POST /conversations/{id}/messages - Append a message (participants only)
#[post("/conversations/{id}/messages")]
async fn send_message(
    client: ClientCtx,
    conversation_id: web::Path<i32>,
    form: web::Json<MessageForm>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    form.validate().map_err(error::ErrorBadRequest)?;

    let message = conversations::send_message(*conversation_id, user_id, &form.body)
        .await
        .map_err(map_conversation_error)?;

    Ok(HttpResponse::Ok().json(message))
}

fn map_conversation_error(e: ConversationError) -> Error {
    match e {
        ConversationError::NotFound(_) | ConversationError::UserNotFound(_) => {
            error::ErrorNotFound(e.to_string())
        }
        ConversationError::NotParticipant(_) => error::ErrorForbidden(e.to_string()),
        ConversationError::SelfConversation | ConversationError::EmptyMessage => {
            error::ErrorBadRequest(e.to_string())
        }
        ConversationError::Store(_) => {
            log::error!("Conversation operation failed: {}", e);
            error::ErrorInternalServerError("Operation failed, please retry")
        }
    }
}
