//! Local relay API
//!
//! Thin HTTP wrappers around the vendor client so a browser front end can
//! drive a rip without handling the vendor's cookies itself. Asset routes take
//! the signed cookies from a `cloudfront-cookie` request header.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, RipError};
use crate::state::AppState;
use crate::vendor::{self, BookRef, CredentialBundle, MintedSession, Quality};

pub const COOKIE_HEADER: &str = "cloudfront-cookie";

/// Body the relay sends instead of an asset it could not fetch
const UNAVAILABLE: &str = "no";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/:session_id/:book_id", post(login))
        .route("/details/:book_id", get(details))
        .route("/page/:book_id", get(page_count))
        .route("/svg/:book_id/:page", get(svg))
        .route("/background/:book_id/:page", get(background))
        .route("/background/:book_id/:page/:size", get(background_sized))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(flatten)]
    pub session: MintedSession,
    pub cookie_string: String,
}

#[derive(Serialize)]
pub struct BackgroundResponse {
    /// Base64 image bytes
    #[serde(rename = "Background")]
    pub background: String,
    #[serde(rename = "BackgroundFType")]
    pub format: vendor::BackgroundFormat,
}

fn book_ref(headers: &HeaderMap, book_id: String) -> Result<BookRef> {
    let raw = headers
        .get(COOKIE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| RipError::InvalidInput(format!("missing {} header", COOKIE_HEADER)))?;
    Ok(BookRef::new(book_id, CredentialBundle::from_cookie_string(raw)))
}

fn page_number(raw: &str) -> Result<u32> {
    raw.trim()
        .parse()
        .map_err(|_| RipError::InvalidInput("page is not a number".to_string()))
}

/// Exchange a session id for the book's signed cookies
async fn login(
    State(state): State<AppState>,
    Path((session_id, book_id)): Path<(String, String)>,
) -> Result<Json<LoginResponse>> {
    let session = vendor::mint_session(state.client(), &book_id, &session_id).await?;
    let cookie_string = session.cookie_string();
    Ok(Json(LoginResponse {
        session,
        cookie_string,
    }))
}

/// Raw pager metadata
async fn details(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let book = book_ref(&headers, book_id)?;
    Ok(Json(state.client().metadata_document(&book).await?))
}

async fn page_count(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    headers: HeaderMap,
) -> Result<String> {
    let book = book_ref(&headers, book_id)?;
    Ok(state.client().page_count(&book).await?.to_string())
}

async fn svg(
    State(state): State<AppState>,
    Path((book_id, page)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let book = book_ref(&headers, book_id)?;
    let page = page_number(&page)?;

    match state.client().overlay(&book, page).await {
        Ok(Some(svg)) => Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()),
        Ok(None) => Ok(UNAVAILABLE.into_response()),
        Err(e) => {
            tracing::warn!("Relay SVG fetch for {}:{} failed: {}", book.book_id, page, e);
            Ok(UNAVAILABLE.into_response())
        }
    }
}

async fn background(
    state: State<AppState>,
    Path((book_id, page)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    fetch_background(state, book_id, page, None, headers).await
}

async fn background_sized(
    state: State<AppState>,
    Path((book_id, page, size)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    fetch_background(state, book_id, page, Some(size), headers).await
}

async fn fetch_background(
    State(state): State<AppState>,
    book_id: String,
    page: String,
    size: Option<String>,
    headers: HeaderMap,
) -> Result<Response> {
    let book = book_ref(&headers, book_id)?;
    let page = page_number(&page)?;
    let quality = match size {
        Some(size) => size.parse::<Quality>()?,
        None => Quality::default(),
    };

    match state.client().background(&book, page, quality).await {
        Ok(bg) => Ok(Json(BackgroundResponse {
            background: STANDARD.encode(&bg.data),
            format: bg.format,
        })
        .into_response()),
        Err(e) => {
            tracing::warn!("Relay background fetch for {}:{} failed: {}", book.book_id, page, e);
            Ok(UNAVAILABLE.into_response())
        }
    }
}
