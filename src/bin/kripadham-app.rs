use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use kripadham::app::Services;
use kripadham::catalog::CatalogQuery;
use kripadham::config::AppConfig;
use kripadham::directory::{
    DevoteeQuery, group_by_state, kirtans_to_csv, query_devotees, search_kirtans, sort_kirtans,
};
use kripadham::forms::{
    EventForm, GuruPurnimaForm, InitiationForm, Submission, register_guru_purnima,
    reset_guru_purnima, saved_guru_purnima, submit_event, submit_initiation,
};
use kripadham::media::{BhajanQuery, bhajan_categories, filter_bhajans, group_by_category};
use kripadham::reader::Cursor;
use kripadham::routes::Route;
use kripadham::store::{Cart, DeliveryDetails, add_to_cart, place_order};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// YAML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = ".kripadham")]
    cache_dir: PathBuf,

    /// Static web assets directory (serve if exists).
    #[arg(long, default_value = "web/dist")]
    web_dir: PathBuf,
}

#[derive(Clone)]
struct AppState {
    services: Arc<Services>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    kripadham::logging::init()?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting kripadham-app");

    let config = AppConfig::load(args.config.as_deref()).context("load config")?;
    let services = Services::new(config, &args.cache_dir)?;
    let state = AppState {
        services: Arc::new(services),
    };

    let mut app = Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/books", get(list_books))
        .route("/api/books/:book_id", get(book_index))
        .route("/api/books/:book_id/stage", post(stage_book))
        .route("/api/books/:book_id/switch", post(switch_book))
        .route("/api/books/:book_id/pages/:page_id", get(book_page))
        .route("/api/devotees", get(list_devotees))
        .route("/api/kirtans", get(list_kirtans))
        .route("/api/kirtans.csv", get(kirtans_csv))
        .route("/api/bhajans", get(list_bhajans))
        .route("/api/kathas", get(list_kathas))
        .route("/api/store", get(list_store))
        .route("/api/cart", get(show_cart))
        .route("/api/forms/initiation", post(post_initiation))
        .route(
            "/api/forms/guru-purnima",
            post(post_guru_purnima)
                .get(get_guru_purnima)
                .delete(delete_guru_purnima),
        )
        .route("/api/forms/event", post(post_event))
        .route("/api/checkout", post(post_checkout))
        .route("/api/chat", post(post_chat))
        .route("/api/admin/youtube", post(post_youtube))
        .route("/api/route", get(resolve_route))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let web_index = args.web_dir.join("index.html");
    if web_index.exists() {
        let static_files = ServeDir::new(args.web_dir).not_found_service(ServeFile::new(web_index));
        app = app.fallback_service(static_files);
    } else {
        app = app.fallback(|| async {
            Html(
                r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>Gaur Kripa Dham</title></head>
  <body>
    <h1>Gaur Kripa Dham</h1>
    <p>web assets not found. Build the web app into <code>web/dist</code> or run a dev server.</p>
  </body>
</html>
"#,
            )
        });
    }

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// JSON error body with a status code.
struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl ApiError {
    fn upstream(err: anyhow::Error) -> Self {
        tracing::warn!(?err, "upstream request failed");
        Self {
            status: StatusCode::BAD_GATEWAY,
            body: json!({ "error": format!("{err:#}") }),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        tracing::error!(?err, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "error": format!("{err:#}") }),
        }
    }

    fn not_found(what: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: json!({ "error": format!("{what} not found") }),
        }
    }

    fn invalid(body: serde_json::Value) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Accepted submissions are 200, invalid ones 422, upstream failures 502.
fn submission_response<T: serde::Serialize>(outcome: Submission<T>) -> Response {
    let status = match &outcome {
        Submission::Accepted { .. } => StatusCode::OK,
        Submission::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Submission::Failed { .. } => StatusCode::BAD_GATEWAY,
    };
    (status, Json(outcome)).into_response()
}

async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let catalog = state
        .services
        .catalog
        .load()
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(json!({
        "categories": catalog.categories(),
        "books": catalog.filter(&query),
    })))
}

async fn stage_book(State(state): State<AppState>, Path(book_id): Path<String>) -> Response {
    let ticket = state.services.stager.stage(&book_id);
    let staged = !ticket.state().is_pending();
    (
        StatusCode::ACCEPTED,
        Json(json!({ "book_id": ticket.book_id(), "done": staged })),
    )
        .into_response()
}

async fn book_index(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Json<kripadham::reader::IndexView> {
    Json(state.services.reader.open_index(&book_id).await)
}

async fn switch_book(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Json<kripadham::reader::IndexView> {
    Json(state.services.reader.switch_book(&book_id).await)
}

async fn book_page(
    State(state): State<AppState>,
    Path((book_id, page_id)): Path<(String, String)>,
) -> ApiResult<Json<kripadham::reader::PageView>> {
    let cursor = Cursor::new(book_id, page_id);
    match state.services.reader.open_page(&cursor).await {
        Ok(Some(view)) => Ok(Json(view)),
        Ok(None) => Err(ApiError::not_found("book")),
        Err(err) => Err(ApiError::internal(err)),
    }
}

async fn list_devotees(
    State(state): State<AppState>,
    Query(query): Query<DevoteeQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let records = state
        .services
        .source
        .devotees()
        .await
        .map_err(ApiError::upstream)?;
    let rows = query_devotees(&records, &query);
    Ok(Json(json!({ "total": rows.len(), "devotees": rows })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchQuery {
    search: String,
}

async fn load_kirtans(
    state: &AppState,
) -> ApiResult<Vec<kripadham::formats::KirtanRecord>> {
    let mut records = state
        .services
        .source
        .kirtans()
        .await
        .map_err(ApiError::upstream)?;
    sort_kirtans(&mut records);
    Ok(records)
}

async fn list_kirtans(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let records = load_kirtans(&state).await?;
    let matches = search_kirtans(&records, &query.search);
    Ok(Json(json!({
        "total": matches.len(),
        "groups": group_by_state(&matches),
    })))
}

async fn kirtans_csv(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Response> {
    let records = load_kirtans(&state).await?;
    let matches = search_kirtans(&records, &query.search);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"ekadashi_kirtans.csv\"",
            ),
        ],
        kirtans_to_csv(&matches),
    )
        .into_response())
}

async fn list_bhajans(
    State(state): State<AppState>,
    Query(query): Query<BhajanQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let records = state
        .services
        .source
        .bhajans()
        .await
        .map_err(ApiError::upstream)?;
    let matches = filter_bhajans(&records, &query);
    Ok(Json(json!({
        "categories": bhajan_categories(&records),
        "total": matches.len(),
        "groups": group_by_category(&matches),
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KathaQuery {
    katha: Option<String>,
    search: String,
}

async fn list_kathas(
    State(state): State<AppState>,
    Query(query): Query<KathaQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let library = state
        .services
        .source
        .kathas()
        .await
        .map_err(ApiError::upstream)?;
    let Some(katha_id) = query.katha else {
        return Ok(Json(json!({ "kathas": library.kathas })));
    };
    let selection = library
        .select(&katha_id, &query.search)
        .ok_or_else(|| ApiError::not_found("katha"))?;
    Ok(Json(json!(selection)))
}

async fn list_store(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let books = state
        .services
        .source
        .store_books()
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(json!({ "books": books })))
}

async fn show_cart(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let cart = Cart::load(&state.services.cache)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(json!({ "cart": cart, "totals": cart.totals() })))
}

async fn post_initiation(State(state): State<AppState>, Json(form): Json<InitiationForm>) -> Response {
    submission_response(submit_initiation(state.services.sink.as_ref(), form).await)
}

async fn post_event(State(state): State<AppState>, Json(form): Json<EventForm>) -> Response {
    submission_response(submit_event(state.services.sink.as_ref(), form).await)
}

async fn post_guru_purnima(
    State(state): State<AppState>,
    Json(form): Json<GuruPurnimaForm>,
) -> ApiResult<Response> {
    let outcome = register_guru_purnima(&state.services.cache, form)
        .await
        .map_err(ApiError::internal)?;
    Ok(submission_response(outcome))
}

async fn get_guru_purnima(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let saved = saved_guru_purnima(&state.services.cache)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(match saved {
        Some(registration) => json!({
            "registration": registration,
            "whatsapp_link": registration.whatsapp_link(),
        }),
        None => json!({ "registration": null }),
    }))
}

async fn delete_guru_purnima(State(state): State<AppState>) -> ApiResult<StatusCode> {
    reset_guru_purnima(&state.services.cache)
        .await
        .map_err(ApiError::internal)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    #[serde(default)]
    details: DeliveryDetails,
    #[serde(default)]
    book_id: Option<String>,
    #[serde(default)]
    quantity: Option<u32>,
}

async fn post_checkout(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<Json<kripadham::store::OrderReceipt>> {
    let services = &state.services;
    if let Some(book_id) = &req.book_id {
        let books = services
            .source
            .store_books()
            .await
            .map_err(ApiError::upstream)?;
        let book = books
            .into_iter()
            .find(|b| &b.id == book_id)
            .ok_or_else(|| ApiError::not_found("store book"))?;
        add_to_cart(&services.cache, book, req.quantity.unwrap_or(1))
            .await
            .map_err(ApiError::internal)?;
    }

    let cart = Cart::load(&services.cache)
        .await
        .map_err(ApiError::internal)?;
    if cart.is_empty() {
        return Err(ApiError::invalid(json!({ "error": "cart is empty" })));
    }
    Ok(Json(
        place_order(services.sink.as_ref(), &req.details, &cart).await,
    ))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

async fn post_chat(Json(req): Json<ChatRequest>) -> Json<serde_json::Value> {
    Json(json!({ "reply": kripadham::chatbot::reply(&req.message) }))
}

#[derive(Debug, Deserialize)]
struct YoutubeRequest {
    link: String,
}

async fn post_youtube(Json(req): Json<YoutubeRequest>) -> ApiResult<Json<serde_json::Value>> {
    match kripadham::admin::embed_link(&req.link) {
        Ok(embed) => Ok(Json(json!({ "embed": embed }))),
        Err(err) => Err(ApiError::invalid(
            json!({ "error": err.to_string(), "kind": err }),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct RouteQuery {
    path: String,
}

async fn resolve_route(Query(query): Query<RouteQuery>) -> Json<serde_json::Value> {
    let route = Route::parse(&query.path);
    Json(json!({ "path": route.path(), "route": route }))
}
