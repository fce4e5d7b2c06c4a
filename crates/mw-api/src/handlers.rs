//! # mw-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core
//! pipeline, feed and moderation services.

use crate::error::ApiError;
use crate::identity::{existing_identity, identity_cookie, identity_or_new, resolve_viewer};
use crate::state::AppState;
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt, TryStreamExt};
use mw_core::error::AppError;
use mw_core::feed::{project, EntryView, FeedState, LiveFeed};
use mw_core::models::{MediaType, MediaUpload, PostRequest, UploaderId, Viewer};
use mw_core::moderation::DeleteRequest;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{debug, info};
use uuid::Uuid;

/// Upper bound on `?limit=`; bigger windows are clamped.
pub const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentityBody<'a> {
    uploader_id: &'a str,
}

#[derive(Serialize)]
struct FeedBody<'a> {
    entries: Vec<EntryView>,
    limit: usize,
    error: Option<&'a str>,
}

pub async fn healthz() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Returns the caller's pseudo-identity, issuing one on first visit.
pub async fn identity(req: HttpRequest) -> HttpResponse {
    let (id, fresh) = identity_or_new(&req);
    let mut response = HttpResponse::Ok();
    if fresh {
        debug!(uploader = %id, "issued pseudo-identity");
        response.cookie(identity_cookie(&id));
    }
    response.json(IdentityBody { uploader_id: id.as_str() })
}

/// Newest visible entries, projected for the caller.
pub async fn list_entries(
    data: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let viewer = viewer_for(&req, &data).await?;
    let limit = window(&data, query.limit);
    let entries = data
        .entries
        .query_entries(limit)
        .await
        .map_err(|e| AppError::Internal(format!("entry query failed: {e}")))?;

    Ok(HttpResponse::Ok().json(FeedBody {
        entries: project(&entries, &viewer, data.clock.now(), data.settings.self_delete_window),
        limit,
        error: None,
    }))
}

/// Server-sent events: one `entries` event per published feed state.
/// The subscription lives exactly as long as the response stream.
pub async fn live_entries(
    data: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let viewer = viewer_for(&req, &data).await?;
    let feed = LiveFeed::subscribe(data.entries.clone(), window(&data, query.limit)).await?;
    info!(admin = viewer.is_admin, "live feed subscribed");

    let events = stream::unfold((feed, data, viewer, true), |(mut feed, data, viewer, first)| async move {
        if !first && feed.changed().await.is_err() {
            return None;
        }
        let event = feed_event(&feed.snapshot(), &data, &viewer);
        Some((Ok::<_, Infallible>(event), (feed, data, viewer, false)))
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(events))
}

/// Accepts a multipart upload (`file`, optional `caption`) and posts it.
pub async fn create_entry(
    data: web::Data<AppState>,
    req: HttpRequest,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let (uploader_id, fresh) = identity_or_new(&req);
    let viewer = resolve_viewer(&req, &data, uploader_id.clone()).await?;

    let mut upload = None;
    let mut caption = None;
    while let Some(field) = payload.try_next().await.map_err(malformed)? {
        let name = field.content_disposition().get_name().map(str::to_owned);
        match name.as_deref() {
            Some("file") if upload.is_none() => upload = Some(read_file(field, &data).await?),
            Some("caption") => caption = Some(read_caption(field, &data).await?),
            _ => drain(field).await?,
        }
    }
    let upload = upload.ok_or_else(|| AppError::ValidationError("Please choose a photo or video.".into()))?;

    let entry = data
        .pipeline
        .post(PostRequest {
            upload,
            caption,
            uploader_id: uploader_id.clone(),
        })
        .await?;

    let view = project(
        std::slice::from_ref(&entry),
        &viewer,
        data.clock.now(),
        data.settings.self_delete_window,
    );
    let mut response = HttpResponse::Created();
    if fresh {
        response.cookie(identity_cookie(&uploader_id));
    }
    Ok(response.json(view.first()))
}

/// Soft-deletes an entry for its uploader (inside the window) or an admin.
pub async fn delete_entry(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    query: web::Query<DeleteQuery>,
) -> Result<HttpResponse, ApiError> {
    let viewer = viewer_for(&req, &data).await?;
    data.moderator
        .delete(DeleteRequest {
            entry_id: path.into_inner(),
            viewer,
            confirmed: query.confirm,
        })
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn viewer_for(req: &HttpRequest, data: &AppState) -> Result<Viewer, ApiError> {
    // Without an identity nothing can be owned; a throwaway id keeps it that way.
    let identity = existing_identity(req).unwrap_or_else(UploaderId::generate);
    resolve_viewer(req, data, identity).await
}

fn window(data: &AppState, requested: Option<usize>) -> usize {
    requested.unwrap_or(data.settings.page_size).clamp(1, MAX_LIMIT)
}

fn feed_event(state: &FeedState, data: &AppState, viewer: &Viewer) -> Bytes {
    let body = FeedBody {
        entries: project(&state.entries, viewer, data.clock.now(), data.settings.self_delete_window),
        limit: state.limit,
        error: state.error.as_deref(),
    };
    // Views are plain data; serialization cannot fail.
    let json = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());
    Bytes::from(format!("event: entries\ndata: {json}\n\n"))
}

/// Buffers the file part, stopping as soon as it passes the size limit.
async fn read_file(mut field: Field, data: &AppState) -> Result<MediaUpload, ApiError> {
    let validator = data.pipeline.validator();
    let file_name = field
        .content_disposition()
        .get_filename()
        .unwrap_or("upload")
        .to_string();
    let mime_type = field
        .content_type()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_default();
    let kind = MediaType::from_mime(&mime_type)
        .ok_or_else(|| AppError::ValidationError("Only photos and videos can be posted.".into()))?;

    let mut buf = BytesMut::new();
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        validator.check_size((buf.len() + chunk.len()) as u64)?;
        buf.extend_from_slice(&chunk);
    }

    Ok(MediaUpload {
        bytes: buf.freeze(),
        file_name,
        mime_type,
        kind,
    })
}

/// Captions have no length rule of their own; the part is only held to the
/// same byte ceiling as a file so one request stays bounded.
async fn read_caption(mut field: Field, data: &AppState) -> Result<String, ApiError> {
    let validator = data.pipeline.validator();
    let mut buf = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        validator.check_size((buf.len() + chunk.len()) as u64)?;
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf).map_err(|_| AppError::ValidationError("That message is not valid text.".into()).into())
}

async fn drain(field: Field) -> Result<(), ApiError> {
    field.map_err(malformed).try_for_each(|_| async { Ok(()) }).await
}

fn malformed(e: actix_multipart::MultipartError) -> ApiError {
    debug!(error = %e, "malformed multipart body");
    AppError::ValidationError("The upload could not be read. Please try again.".into()).into()
}
