//! Per-request client context
//!
//! Session issuance (login) is outside this crate; an upstream service writes
//! the authenticated user id into the cookie session and this extractor turns
//! it into a loaded account. A missing or stale session yields a guest.

use crate::db::get_db_pool;
use crate::orm::users;
use actix_session::SessionExt;
use actix_web::{error, Error, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use sea_orm::EntityTrait;
use std::rc::Rc;

const SESSION_USER_KEY: &str = "user_id";

#[derive(Clone, Debug, Default)]
pub struct ClientCtxInner {
    /// User data. None is a guest.
    pub client: Option<users::Model>,
}

#[derive(Clone, Debug, Default)]
pub struct ClientCtx(Rc<ClientCtxInner>);

impl ClientCtx {
    fn from_inner(inner: ClientCtxInner) -> Self {
        Self(Rc::new(inner))
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<i32> {
        self.0.client.as_ref().map(|u| u.id)
    }

    pub fn get_user(&self) -> Option<&users::Model> {
        self.0.client.as_ref()
    }

    pub fn is_user(&self) -> bool {
        self.0.client.is_some()
    }

    pub fn is_moderator(&self) -> bool {
        self.0.client.as_ref().map(|u| u.is_moderator).unwrap_or(false)
    }

    /// Require user to be logged in. Returns user_id or ErrorUnauthorized.
    pub fn require_login(&self) -> Result<i32, Error> {
        self.get_id()
            .ok_or_else(|| error::ErrorUnauthorized("Login required"))
    }

    /// Require moderation capability. Returns user_id or ErrorForbidden.
    pub fn require_moderator(&self) -> Result<i32, Error> {
        let user_id = self.require_login()?;
        if !self.is_moderator() {
            return Err(error::ErrorForbidden("Moderator access required"));
        }
        Ok(user_id)
    }
}

impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            let session = req.get_session();
            let user_id = match session.get::<i32>(SESSION_USER_KEY) {
                Ok(id) => id,
                Err(e) => {
                    log::debug!("Unreadable session, treating as guest: {}", e);
                    None
                }
            };

            let client = match user_id {
                Some(id) => users::Entity::find_by_id(id)
                    .one(get_db_pool())
                    .await
                    .map_err(error::ErrorInternalServerError)?,
                None => None,
            };

            Ok(ClientCtx::from_inner(ClientCtxInner { client }))
        })
    }
}
