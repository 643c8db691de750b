//! HTTP API。
//!
//! 書き込み系（日付の印・ピン・キャッシュ破棄）と、サイトが読む JSON を提供する。

use std::{collections::HashMap, sync::Arc};

use anyhow::{Context as _, Result};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Form, FromRequest, Multipart, Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Datelike;
use daybook_core::{
    DaylightReport, PinTable, YearGrid, access::secrets_match, annotate, build_year,
    submission::{DayMarkForm, PinFields, WallPinForm, parse_date},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    config::{Config, ServerConfig},
    journal::{
        self, AboutPage, Clock, ContentReader, ContentStore, DayMarkView, EntryView, MAX_YEAR,
        PhotoFile, SanityClient, StoreError, SubmitError, WriteContext,
    },
    version::short_version,
};

/// ハンドラ間で共有する状態。
pub struct AppState {
    pub reader: ContentReader,
    /// 書き込みトークンがなければ `None`
    pub writer: Option<Arc<dyn ContentStore>>,
    pub pins: PinTable,
    pub clock: Clock,
    pub latitude: f64,
    pub first_year: i32,
    pub revalidate_secret: Option<String>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let reader_store = if config.sanity.is_configured() {
            let client = SanityClient::reader(&config.sanity).context("Failed to create read client")?;
            Some(Arc::new(client) as Arc<dyn ContentStore>)
        } else {
            warn!("Sanity project is not configured, read endpoints will return empty data");
            None
        };

        let writer = SanityClient::writer(&config.sanity)
            .context("Failed to create write client")?
            .map(|client| Arc::new(client) as Arc<dyn ContentStore>);
        if writer.is_none() {
            warn!("Write token is not configured, submissions will be rejected");
        }

        let pins = PinTable::new(
            config
                .authors
                .iter()
                .map(|a| (a.pin.clone(), a.email.clone())),
        );

        Ok(Self {
            reader: ContentReader::new(reader_store, config.sanity.cache_ttl),
            writer,
            pins,
            clock: Clock::Zoned(config.site.timezone),
            latitude: config.site.latitude,
            first_year: config.site.first_year,
            revalidate_secret: config.site.revalidate_secret.clone(),
        })
    }

    fn write_context(&self) -> Result<WriteContext<'_>, SubmitError> {
        let store = self.writer.as_deref().ok_or(SubmitError::NotConfigured)?;
        Ok(WriteContext {
            store,
            pins: &self.pins,
            today: self.clock.today(),
        })
    }
}

pub fn router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/mark-day", post(mark_day))
        .route("/api/pin-wall", post(pin_wall))
        .route("/api/revalidate", post(revalidate))
        .route("/api/year/{year}", get(year_grid))
        .route("/api/wall", get(wall))
        .route("/api/entries", get(entries))
        .route("/api/entries/{slug}", get(entry))
        .route("/api/tags", get(tags))
        .route("/api/tags/{tag}", get(tagged_entries))
        .route("/api/about", get(about))
        .route("/api/daylight", get(daylight))
        .layer(DefaultBodyLimit::max(server.max_upload_size))
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// サーバーを起動し、Ctrl-C で停止するまで待つ。
pub async fn serve(state: Arc<AppState>, server: &ServerConfig) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(server.socket_addr())
        .await
        .with_context(|| format!("Failed to bind {}", server.socket_addr()))?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router(state, server))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    info!("Shutting down");
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// `{"error": "..."}` 形式のエラー応答。
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        let status = match &e {
            SubmitError::Validation(_) => StatusCode::BAD_REQUEST,
            SubmitError::Auth => StatusCode::UNAUTHORIZED,
            SubmitError::AuthorNotFound => StatusCode::NOT_FOUND,
            SubmitError::Conflict(_) => StatusCode::CONFLICT,
            SubmitError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            SubmitError::Unknown(source) => {
                error!(error = ?source, "Submission failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        error!(error = %e, "Content store request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong. Try again.")
    }
}

/// multipart/form-data と application/x-www-form-urlencoded の両方を受け付けるフォーム。
#[derive(Debug, Default)]
pub struct SubmittedForm {
    fields: HashMap<String, String>,
    files: HashMap<String, PhotoFile>,
}

impl SubmittedForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self, name: &str) -> Option<PhotoFile> {
        self.files.remove(name)
    }
}

impl<S> FromRequest<S> for SubmittedForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
            return Ok(Self {
                fields,
                files: HashMap::new(),
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if let Some(filename) = field.file_name().map(str::to_string) {
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
                form.files.insert(
                    name,
                    PhotoFile {
                        filename,
                        content_type,
                        data: data.to_vec(),
                    },
                );
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": short_version() }))
}

async fn mark_day(State(state): State<Arc<AppState>>, request: Request) -> Result<Json<Value>, ApiError> {
    // 書き込み設定の確認はフォームの解析より先に行う
    let ctx = state.write_context()?;
    let mut form = SubmittedForm::from_request(request, &()).await?;
    let photo = form.take_file("photo");
    let input = DayMarkForm {
        pin: form.text("pin"),
        date: form.text("date"),
        note: form.text("note"),
    };

    let mark = journal::mark_day(&ctx, &input, photo).await?;
    Ok(Json(json!({ "mark": mark })))
}

async fn pin_wall(State(state): State<Arc<AppState>>, request: Request) -> Result<Json<Value>, ApiError> {
    let ctx = state.write_context()?;
    let mut form = SubmittedForm::from_request(request, &()).await?;
    let photo = form.take_file("photo");
    let input = WallPinForm {
        pin: form.text("pin"),
        pin_type: form.text("pinType"),
        caption: form.text("caption"),
    };
    let fields = PinFields {
        quote: form.text("quote"),
        song_url: form.text("songUrl"),
        video_url: form.text("videoUrl"),
        photo_size: 0,
    };

    let pin = journal::pin_wall(&ctx, &input, fields, photo).await?;
    Ok(Json(json!({ "pin": pin })))
}

async fn revalidate(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    let given = headers
        .get("x-revalidate-secret")
        .and_then(|v| v.to_str().ok());
    let authorized = match (state.revalidate_secret.as_deref(), given) {
        (Some(expected), Some(given)) if !expected.is_empty() => secrets_match(expected, given),
        _ => false,
    };
    if !authorized {
        warn!("Rejected revalidation with an invalid secret");
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid secret"));
    }

    let dropped = state.reader.invalidate_all().await;
    info!(dropped, "Read cache revalidated");
    Ok(Json(json!({
        "revalidated": true,
        "now": chrono::Utc::now().timestamp_millis(),
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct YearPage {
    #[serde(flatten)]
    grid: YearGrid<DayMarkView>,
    has_prev: bool,
    has_next: bool,
}

async fn year_grid(
    State(state): State<Arc<AppState>>,
    Path(year): Path<String>,
) -> Result<Json<YearPage>, ApiError> {
    let year = year
        .parse::<i32>()
        .ok()
        .filter(|y| (state.first_year..=MAX_YEAR).contains(y))
        .ok_or_else(ApiError::not_found)?;
    let layout = build_year(year).map_err(|_| ApiError::not_found())?;

    let today = state.clock.today();
    let marks = state.reader.day_marks_in(year).await?;
    Ok(Json(YearPage {
        grid: annotate(&layout, marks, today),
        has_prev: year > state.first_year,
        has_next: year < today.year(),
    }))
}

async fn wall(State(state): State<Arc<AppState>>) -> Result<Json<Vec<journal::WallPinView>>, ApiError> {
    Ok(Json(state.reader.wall_pins().await?))
}

async fn entries(State(state): State<Arc<AppState>>) -> Result<Json<Vec<EntryView>>, ApiError> {
    Ok(Json(state.reader.entries().await?))
}

async fn entry(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<EntryView>, ApiError> {
    let entry = state.reader.entry_by_slug(&slug).await?;
    entry.map(Json).ok_or_else(ApiError::not_found)
}

async fn tags(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.reader.tags().await?))
}

async fn tagged_entries(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> Result<Json<Vec<EntryView>>, ApiError> {
    Ok(Json(state.reader.entries_tagged(&tag).await?))
}

async fn about(State(state): State<Arc<AppState>>) -> Result<Json<AboutPage>, ApiError> {
    Ok(Json(state.reader.about_page().await?))
}

#[derive(Debug, Deserialize)]
struct DaylightQuery {
    date: Option<String>,
}

async fn daylight(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DaylightQuery>,
) -> Result<Json<DaylightReport>, ApiError> {
    let date = match query.date.as_deref() {
        Some(raw) => parse_date(raw).map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?,
        None => state.clock.today(),
    };
    Ok(Json(DaylightReport::new(date, state.latitude)))
}
