//! Pseudo-identity and admin elevation for a request.
//!
//! A guest is identified by a random id kept in the `mw_uploader` cookie
//! (or sent as `X-Uploader-Id` by clients that keep it themselves). Admin
//! rights come from `Authorization: Basic` on the same request and last for
//! that request only.

use crate::error::ApiError;
use crate::state::AppState;
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::http::header;
use actix_web::HttpRequest;
use base64::Engine;
use mw_core::error::AppError;
use mw_core::models::{UploaderId, Viewer};

pub const COOKIE_NAME: &str = "mw_uploader";
pub const HEADER_NAME: &str = "X-Uploader-Id";

const MAX_ID_LEN: usize = 64;

/// The caller's identity, if it sent a well-formed one.
pub fn existing_identity(req: &HttpRequest) -> Option<UploaderId> {
    let from_header = req
        .headers()
        .get(HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let from_cookie = || req.cookie(COOKIE_NAME).map(|c| c.value().to_string());

    from_header
        .or_else(from_cookie)
        .filter(|id| is_well_formed(id))
        .map(UploaderId::from)
}

/// Returns the caller's identity, minting one when absent. The flag is true
/// for a freshly minted id that still has to be sent back as a cookie.
pub fn identity_or_new(req: &HttpRequest) -> (UploaderId, bool) {
    match existing_identity(req) {
        Some(id) => (id, false),
        None => (UploaderId::generate(), true),
    }
}

pub fn identity_cookie(id: &UploaderId) -> Cookie<'static> {
    Cookie::build(COOKIE_NAME, id.as_str().to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(365))
        .finish()
}

/// Resolves who is asking. Bad admin credentials are an error rather than
/// a silent downgrade, so a mistyped password is noticed.
pub async fn resolve_viewer(req: &HttpRequest, state: &AppState, identity: UploaderId) -> Result<Viewer, ApiError> {
    let Some((username, password)) = basic_credentials(req) else {
        return Ok(Viewer::guest(identity));
    };
    if state.auth.check_credentials(&username, &password).await {
        Ok(Viewer::admin(identity))
    } else {
        Err(AppError::Unauthorized("invalid admin credentials".into()).into())
    }
}

fn basic_credentials(req: &HttpRequest) -> Option<(String, String)> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn is_well_formed(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
