#![cfg(feature = "web")]

use axum::{
    Extension, Json, Router,
    extract::{
        FromRequest, FromRequestParts, Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::{CurrentUser, TokenRegistry, require_bearer};
use crate::config::Config;
use crate::error::{CalcError, EngineError, ValidationError};
use crate::history::{
    CalculationKind, HistoryFilter, HistoryPage, HistoryRecord, HistoryStats, HistoryStore,
    Outcome, parse_date_bound,
};
use crate::service::{calculate_substring, calculate_tree};
use crate::substring::SubstringResult;
use crate::tree::TreeResult;
use crate::validator::Limits;

pub struct AppState {
    pub limits: Limits,
    pub history: HistoryStore,
    pub tokens: TokenRegistry,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            limits: config.limits,
            history: HistoryStore::with_capacity(config.max_history_per_user),
            tokens: TokenRegistry::new(config.tokens.clone()),
        }
    }
}

#[derive(Deserialize)]
struct SubstringRequest {
    input: String,
}

#[derive(Deserialize)]
struct TreeRequest {
    nodes: Vec<Value>,
}

#[derive(Deserialize)]
struct BatchSubstringRequest {
    inputs: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchTreeRequest {
    nodes_list: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SaveSubstringRequest {
    input: String,
}

#[derive(Deserialize)]
struct SaveTreeRequest {
    nodes: Vec<Value>,
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    #[serde(rename = "type")]
    kind: Option<CalculationKind>,
    limit: Option<usize>,
    page: Option<usize>,
    start_date: Option<String>,
    end_date: Option<String>,
}

impl HistoryQuery {
    fn into_filter(self) -> Result<HistoryFilter, ApiError> {
        if self.page == Some(0) {
            return Err(ApiError::bad_request("INVALID_VALUE", "page starts at 1"));
        }
        Ok(HistoryFilter {
            kind: self.kind,
            from: date_bound("startDate", self.start_date.as_deref(), false)?,
            to: date_bound("endDate", self.end_date.as_deref(), true)?,
            limit: self.limit,
            page: self.page,
        })
    }
}

fn date_bound(
    name: &str,
    raw: Option<&str>,
    end_of_day: bool,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    raw.map(|raw| {
        parse_date_bound(raw, end_of_day).ok_or_else(|| {
            ApiError::bad_request(
                "INVALID_VALUE",
                format!("{} must be YYYY-MM-DD or RFC 3339, got {:?}", name, raw),
            )
        })
    })
    .transpose()
}

/// JSON body extractor whose rejections use the API error body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
struct ApiJson<T>(T);

/// Query string extractor whose rejections use the API error body.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
struct ApiQuery<T>(T);

/// Response body used by the `/api` routes.
#[derive(Serialize)]
struct Envelope<T> {
    status: &'static str,
    message: String,
    data: T,
}

fn success<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        message: message.into(),
        data,
    })
}

/// A result together with the id it was archived under.
#[derive(Serialize)]
struct Archived<T> {
    id: Uuid,
    #[serde(flatten)]
    result: T,
}

#[derive(Debug)]
enum ApiError {
    Calc(CalcError),
    BatchItem { index: usize, source: CalcError },
    BadRequest { code: &'static str, message: String },
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code,
            message: message.into(),
        }
    }
}

impl From<CalcError> for ApiError {
    fn from(e: CalcError) -> Self {
        ApiError::Calc(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Calc(e.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        let code = match rejection {
            JsonRejection::JsonDataError(_) if message.contains("missing field") => "EMPTY_INPUT",
            JsonRejection::JsonSyntaxError(_) if message.contains("EOF while parsing a value") => {
                "EMPTY_INPUT"
            }
            _ => "INVALID_VALUE",
        };
        ApiError::BadRequest { code, message }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request("INVALID_VALUE", rejection.body_text())
    }
}

fn calc_status(e: &CalcError) -> StatusCode {
    match e {
        CalcError::Validation(_) => StatusCode::BAD_REQUEST,
        CalcError::Engine(EngineError::EmptyTree) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Calc(e) => (calc_status(&e), e.code(), e.to_string()),
            ApiError::BatchItem { index, source } => (
                calc_status(&source),
                source.code(),
                format!("item {}: {}", index, source),
            ),
            ApiError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
            }
        };

        if status.is_client_error() {
            info!("request rejected: {} ({})", message, code);
        } else {
            warn!("request failed: {}", message);
        }

        (
            status,
            Json(json!({
                "status": "error",
                "code": code,
                "message": message,
            })),
        )
            .into_response()
    }
}

/// Build the application router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/calculate-substring", post(substring_bare))
        .route("/calculate-tree", post(tree_bare))
        .route("/api/substring/calculate", post(substring_archived))
        .route("/api/tree/calculate", post(tree_archived))
        .route("/api/substring/batch-calculate", post(substring_batch))
        .route("/api/tree/batch-calculate", post(tree_batch))
        .route("/api/substring/save", post(substring_save))
        .route("/api/tree/save", post(tree_save))
        .route("/api/substring/history", get(substring_history))
        .route("/api/tree/history", get(tree_history))
        .route("/api/substring/history/:id", delete(delete_substring_history))
        .route("/api/tree/history/:id", delete(delete_tree_history))
        .route(
            "/api/calculator/history",
            get(list_history).delete(clear_history),
        )
        .route("/api/calculator/history/:id", delete(delete_history))
        .route("/api/calculator/stats", get(history_stats))
        .route("/api/calculator/export", get(export_history))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(&config));
    if !state.tokens.is_enabled() {
        warn!("CALC_API_TOKENS is empty, bearer authentication is disabled");
    }

    let app = router(state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Listening on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn substring_bare(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<SubstringRequest>,
) -> Result<Json<SubstringResult>, ApiError> {
    Ok(Json(calculate_substring(&payload.input, &state.limits)?))
}

async fn tree_bare(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<TreeRequest>,
) -> Result<Json<TreeResult>, ApiError> {
    Ok(Json(calculate_tree(&payload.nodes, &state.limits)?))
}

async fn substring_archived(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<SubstringRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = calculate_substring(&payload.input, &state.limits)?;
    let record = state.history.record(
        &user,
        Value::String(payload.input),
        Outcome::Substring(result.clone()),
    );

    Ok(success(
        "Substring calculated",
        Archived {
            id: record.id,
            result,
        },
    ))
}

async fn tree_archived(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<TreeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = calculate_tree(&payload.nodes, &state.limits)?;
    let record = state.history.record(
        &user,
        Value::Array(payload.nodes),
        Outcome::Tree(result.clone()),
    );

    Ok(success(
        "Tree calculated",
        Archived {
            id: record.id,
            result,
        },
    ))
}

/// Run `calculate` over every item off the async runtime, stopping at the first failure.
async fn run_batch<I, T, F>(items: Vec<I>, limits: Limits, calculate: F) -> Result<Vec<T>, ApiError>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(&I, &Limits) -> Result<T, CalcError> + Send + 'static,
{
    let count = items.len();
    if count > limits.max_batch_items {
        return Err(ValidationError::TooLong {
            length: count,
            max: limits.max_batch_items,
        }
        .into());
    }

    let outcome = tokio::task::spawn_blocking(move || {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                calculate(item, &limits).map_err(|source| ApiError::BatchItem { index, source })
            })
            .collect::<Result<Vec<T>, ApiError>>()
    })
    .await
    .map_err(|e| ApiError::Internal(format!("batch worker failed: {}", e)))?;

    info!("batch of {} items finished ok={}", count, outcome.is_ok());
    outcome
}

async fn substring_batch(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<BatchSubstringRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let results = run_batch(payload.inputs, state.limits, |input: &String, limits| {
        calculate_substring(input, limits)
    })
    .await?;
    Ok(success("Batch calculated", results))
}

async fn tree_batch(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<BatchTreeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let results = run_batch(payload.nodes_list, state.limits, |nodes: &Vec<Value>, limits| {
        calculate_tree(nodes, limits)
    })
    .await?;
    Ok(success("Batch calculated", results))
}

async fn substring_save(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<SaveSubstringRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // the stored result is recomputed, never taken from the client
    let result = calculate_substring(&payload.input, &state.limits)?;
    let record = state.history.record(
        &user,
        Value::String(payload.input),
        Outcome::Substring(result),
    );
    Ok((StatusCode::CREATED, success("Calculation saved", record)))
}

async fn tree_save(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<SaveTreeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = calculate_tree(&payload.nodes, &state.limits)?;
    let name = payload
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    let record = state.history.record_named(
        &user,
        Value::Array(payload.nodes),
        Outcome::Tree(result),
        name,
    );
    Ok((StatusCode::CREATED, success("Tree saved", record)))
}

fn kind_history(
    state: &AppState,
    user: &str,
    query: HistoryQuery,
    kind: CalculationKind,
) -> Result<Json<Envelope<HistoryPage>>, ApiError> {
    let filter = HistoryFilter {
        kind: Some(kind),
        ..query.into_filter()?
    };
    let page = state.history.list(user, &filter);
    Ok(success(format!("{} calculations", page.total), page))
}

async fn substring_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<Envelope<HistoryPage>>, ApiError> {
    kind_history(&state, &user, query, CalculationKind::Substring)
}

async fn tree_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<Envelope<HistoryPage>>, ApiError> {
    kind_history(&state, &user, query, CalculationKind::Tree)
}

async fn list_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<Envelope<Vec<HistoryRecord>>>, ApiError> {
    let page = state.history.list(&user, &query.into_filter()?);
    Ok(success(
        format!("{} calculations", page.calculations.len()),
        page.calculations,
    ))
}

async fn clear_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<Envelope<Value>> {
    let removed = state.history.clear(&user);
    success("History cleared", json!({ "removed": removed }))
}

fn remove_record(
    state: &AppState,
    user: &str,
    id: Uuid,
    kind: Option<CalculationKind>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    if state.history.delete(user, id, kind) {
        Ok(success("Calculation deleted", json!({ "id": id })))
    } else {
        Err(ApiError::NotFound(format!("no calculation with id {}", id)))
    }
}

async fn delete_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    remove_record(&state, &user, id, None)
}

async fn delete_substring_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    remove_record(&state, &user, id, Some(CalculationKind::Substring))
}

async fn delete_tree_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    remove_record(&state, &user, id, Some(CalculationKind::Tree))
}

async fn history_stats(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<Envelope<HistoryStats>> {
    success("Statistics", state.history.stats(&user))
}

/// Download the whole history, or one kind of it, as a JSON file.
async fn export_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.into_filter()?;
    let filename = match filter.kind {
        Some(CalculationKind::Substring) => "substring-history.json",
        Some(CalculationKind::Tree) => "tree-history.json",
        None => "calculator-history.json",
    };
    let records = state.history.list(&user, &filter).calculations;
    info!("exporting {} records for {}", records.len(), user);

    Ok((
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )],
        Json(records),
    ))
}
