//! Test doubles: a scripted page source and an in-process mock vendor

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use serde_json::{json, Map, Value};

use crate::config::VendorConfig;
use crate::error::{Result, RipError};
use crate::vendor::{
    Background, BackgroundFormat, BookRef, CredentialBundle, PageSource, Quality, VendorClient,
};

pub const PAGE_WIDTH: u32 = 48;
pub const PAGE_HEIGHT: u32 = 64;

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([230, 220, 200]));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

/// Half-transparent PNG so the soft-mask path is exercised
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([20, 40, 60, 128]));
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

pub fn svg_bytes() -> Vec<u8> {
    br##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50" viewBox="0 0 100 50"><rect x="10" y="10" width="30" height="20" fill="#000000"/></svg>"##
        .to_vec()
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
    buffer
}

fn background_bytes(format: BackgroundFormat) -> Vec<u8> {
    match format {
        BackgroundFormat::Jpeg => jpeg_bytes(PAGE_WIDTH, PAGE_HEIGHT),
        BackgroundFormat::Png => png_bytes(PAGE_WIDTH, PAGE_HEIGHT),
    }
}

// ---------------------------------------------------------------------------
// Scripted page source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScriptedPage {
    background: Option<BackgroundFormat>,
    undecodable: bool,
    svg: bool,
    overlay_error: bool,
    delay: Duration,
}

impl ScriptedPage {
    pub fn jpeg() -> Self {
        Self {
            background: Some(BackgroundFormat::Jpeg),
            undecodable: false,
            svg: false,
            overlay_error: false,
            delay: Duration::ZERO,
        }
    }

    pub fn png() -> Self {
        Self {
            background: Some(BackgroundFormat::Png),
            ..Self::jpeg()
        }
    }

    pub fn missing() -> Self {
        Self {
            background: None,
            ..Self::jpeg()
        }
    }

    pub fn undecodable() -> Self {
        Self {
            undecodable: true,
            ..Self::jpeg()
        }
    }

    pub fn with_svg(mut self) -> Self {
        self.svg = true;
        self
    }

    pub fn with_overlay_error(mut self) -> Self {
        self.overlay_error = true;
        self
    }

    pub fn delayed_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

/// In-memory [`PageSource`] that records how it was driven
pub struct ScriptedSource {
    pages: HashMap<u32, ScriptedPage>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: Mutex<Vec<u32>>,
}

impl ScriptedSource {
    pub fn new(pages: Vec<(u32, ScriptedPage)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn completion_order(&self) -> Vec<u32> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn overlay(&self, _book: &BookRef, page: u32) -> Result<Option<Vec<u8>>> {
        match self.pages.get(&page) {
            Some(p) if p.overlay_error => Err(RipError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ))),
            Some(p) if p.svg => Ok(Some(svg_bytes())),
            _ => Ok(None),
        }
    }

    async fn background(
        &self,
        _book: &BookRef,
        page: u32,
        _quality: Quality,
    ) -> Result<Background> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let script = self.pages.get(&page).cloned().unwrap_or_else(ScriptedPage::missing);
        tokio::time::sleep(script.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.lock().unwrap().push(page);

        match script.background {
            Some(_) if script.undecodable => Ok(Background {
                data: b"not an image".to_vec(),
                format: BackgroundFormat::Jpeg,
            }),
            Some(format) => Ok(Background {
                data: background_bytes(format),
                format,
            }),
            None => Err(RipError::BackgroundFetch {
                page,
                reason: "HTTP 404 Not Found".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Mock vendor HTTP server
// ---------------------------------------------------------------------------

/// Per-page behavior of the mock vendor
#[derive(Debug, Clone)]
pub struct MockPage {
    background: Option<BackgroundFormat>,
    svg: bool,
}

impl MockPage {
    pub fn jpeg() -> Self {
        Self {
            background: Some(BackgroundFormat::Jpeg),
            svg: false,
        }
    }

    pub fn png() -> Self {
        Self {
            background: Some(BackgroundFormat::Png),
            svg: false,
        }
    }

    pub fn missing() -> Self {
        Self {
            background: None,
            svg: false,
        }
    }

    pub fn with_svg(mut self) -> Self {
        self.svg = true;
        self
    }
}

struct MockState {
    pages: BTreeMap<u32, MockPage>,
    headers: Map<String, Value>,
    pager_at_root: bool,
}

#[derive(Default)]
pub struct MockVendorBuilder {
    pages: BTreeMap<u32, MockPage>,
    headers: Option<Map<String, Value>>,
    pager_at_root: bool,
}

impl MockVendorBuilder {
    /// `count` JPEG pages, each with an overlay
    pub fn pages(mut self, count: u32) -> Self {
        for page in 1..=count {
            self.pages.insert(page, MockPage::jpeg().with_svg());
        }
        self
    }

    pub fn page(mut self, page: u32, behavior: MockPage) -> Self {
        self.pages.insert(page, behavior);
        self
    }

    pub fn headers(mut self, headers: Value) -> Self {
        self.headers = headers.as_object().cloned();
        self
    }

    /// Serve `pager.js` from `assets/` instead of `assets/common/`
    pub fn pager_at_root(mut self) -> Self {
        self.pager_at_root = true;
        self
    }

    pub async fn start(self) -> MockVendor {
        let headers = self.headers.unwrap_or_else(|| {
            let mut map = Map::new();
            map.insert("1".to_string(), json!("1"));
            map.insert("Credits".to_string(), json!(self.pages.len().to_string()));
            map
        });

        let state = Arc::new(MockState {
            pages: self.pages,
            headers,
            pager_at_root: self.pager_at_root,
        });

        let app = Router::new()
            .route("/digitalaccess/:book_id/Online", post(mock_login))
            .route("/digitalcontent/:book_id/assets/common/pager.js", get(mock_common_pager))
            .route("/digitalcontent/:book_id/assets/pager.js", get(mock_root_pager))
            .route(
                "/digitalcontent/:book_id/assets/common/page-vectorlayers/:file",
                get(mock_svg),
            )
            .route(
                "/digitalcontent/:book_id/assets/common/page-html5-substrates/:file",
                get(mock_background),
            )
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockVendor {
            base: format!("http://{}", addr),
        }
    }
}

/// Handle to a running mock vendor
pub struct MockVendor {
    base: String,
}

impl MockVendor {
    pub const BOOK_ID: &'static str = "book-1";
    pub const GOOD_SESSION: &'static str = "good-session";
    pub const NO_COOKIE_SESSION: &'static str = "no-cookie-session";

    pub fn builder() -> MockVendorBuilder {
        MockVendorBuilder::default()
    }

    pub fn credentials() -> CredentialBundle {
        CredentialBundle {
            signature: "sig-123".to_string(),
            policy: "policy-456".to_string(),
            key_pair_id: "APKAEXAMPLE".to_string(),
        }
    }

    pub fn vendor_config(&self) -> VendorConfig {
        VendorConfig {
            base_url: self.base.clone(),
            content_base_url: format!("{}/digitalcontent", self.base),
            request_timeout_secs: 5,
            ..VendorConfig::default()
        }
    }

    pub fn client(&self) -> VendorClient {
        VendorClient::new(&self.vendor_config()).unwrap()
    }

    pub fn book_ref(&self) -> BookRef {
        BookRef::new(Self::BOOK_ID, Self::credentials())
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(CredentialBundle::from_cookie_string)
        .is_some_and(|bundle| bundle == MockVendor::credentials())
}

async fn mock_login(
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if !form.contains_key("UserGuid") || !form.contains_key("Signature") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if cookie == format!("ASP.Net_SessionId={}", MockVendor::NO_COOKIE_SESSION) {
        return StatusCode::OK.into_response();
    }
    if cookie != format!("ASP.Net_SessionId={}", MockVendor::GOOD_SESSION) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let creds = MockVendor::credentials();
    let mut response = StatusCode::OK.into_response();
    let out = response.headers_mut();
    for value in [
        format!("CloudFront-Signature={}; Path=/; HttpOnly", creds.signature),
        format!("CloudFront-Policy={}; Path=/; HttpOnly", creds.policy),
        format!("CloudFront-Key-Pair-Id={}; Path=/; HttpOnly", creds.key_pair_id),
        "Other=ignored; Path=/".to_string(),
    ] {
        out.append(header::SET_COOKIE, value.parse().unwrap());
    }
    response
}

fn pager(state: &MockState) -> Value {
    let structure: Vec<Value> = (1..=state.pages.len()).map(|i| json!({ "id": i })).collect();
    json!({
        "pages": { "structure": structure },
        "headers": Value::Object(state.headers.clone()),
    })
}

async fn mock_common_pager(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if state.pager_at_root {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(pager(&state)).into_response()
}

async fn mock_root_pager(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if !state.pager_at_root {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(pager(&state)).into_response()
}

async fn mock_svg(
    State(state): State<Arc<MockState>>,
    Path((_book_id, file)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let page = file.strip_suffix(".svg").and_then(|n| n.parse::<u32>().ok());
    match page.and_then(|p| state.pages.get(&p)) {
        Some(p) if p.svg => {
            ([(header::CONTENT_TYPE, "image/svg+xml")], svg_bytes()).into_response()
        }
        _ => StatusCode::FORBIDDEN.into_response(),
    }
}

async fn mock_background(
    State(state): State<Arc<MockState>>,
    Path((_book_id, file)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }

    // page0001_4.jpg
    let parsed = file
        .strip_prefix("page")
        .and_then(|rest| rest.split_once('_'))
        .and_then(|(page, rest)| {
            let (quality, ext) = rest.split_once('.')?;
            Some((page.parse::<u32>().ok()?, quality.to_string(), ext.to_string()))
        });

    let Some((page, quality, ext)) = parsed else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if quality != "4" && quality != "2" {
        return StatusCode::NOT_FOUND.into_response();
    }

    match state.pages.get(&page).and_then(|p| p.background) {
        Some(format) if format.extension() == ext => {
            (
                [(header::CONTENT_TYPE, format.content_type())],
                background_bytes(format),
            )
                .into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
