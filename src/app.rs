#![cfg(not(tarpaulin_include))]

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::Args;
use crate::dashboard::DashboardStats;
use crate::downloader;
use crate::error::{LedgerError, StoreError};
use crate::estimator::{EstimateInput, estimate};
use crate::graph::{self, GraphOptions, GraphType};
use crate::ledger::{LedgerService, Reply, Summary};
use crate::loader;
use crate::record::{AssetUpdate, NewAsset, RepairRequest};
use crate::store::{FileStore, Table};

pub struct AppState {
    pub ledger: LedgerService<FileStore>,
}

pub type SharedState = Arc<AppState>;

#[derive(Deserialize)]
struct ExportQuery {
    table: Option<String>,
}

#[derive(Deserialize)]
struct GraphQuery {
    #[serde(rename = "type")]
    graph_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

impl GraphQuery {
    fn options(&self, title: &str, x_label: &str, y_label: &str, default: GraphType) -> GraphOptions {
        let graph_type = match self.graph_type.as_deref() {
            Some("line") => GraphType::Line,
            Some("bar") => GraphType::Bar,
            _ => default,
        };
        GraphOptions {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            width: self.width.unwrap_or(800).clamp(200, 2000),
            height: self.height.unwrap_or(600).clamp(150, 1500),
            graph_type,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

/// Opens the ledger file, imports the seed CSV if one is configured, and serves the
/// JSON API until the process is stopped.
pub async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::open(&args.data_file)?;
    info!("Ledger file: {}", store.path().display());
    let ledger = LedgerService::new(store);

    if let Some(seed) = &args.seed_csv {
        match loader::from_csv(seed) {
            Ok(assets) => match ledger.add_assets(assets) {
                Ok(outcome) => info!("Seed {}: {}", seed.display(), outcome.summary()),
                Err(e) => warn!("Seed {} not imported: {}", seed.display(), e),
            },
            Err(e) => warn!("Could not read seed {}: {}", seed.display(), e),
        }
    }

    let app_state = Arc::new(AppState { ledger });
    let app = router(app_state);

    let listener = TcpListener::bind(args.listen).await?;
    info!("Listening on http://{}", args.listen);
    axum::serve(listener, app).await?;

    Ok(())
}

/// All API routes over the shared ledger.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/assets", get(list_assets).post(add_asset))
        .route(
            "/api/assets/:id",
            get(get_asset).put(update_asset).delete(delete_asset),
        )
        .route("/api/assets/:id/status", get(check_asset_status))
        .route("/api/assets/:id/recalculate", post(recalculate_asset))
        .route(
            "/api/assets/:id/repairs",
            get(list_asset_repairs).delete(delete_asset_repairs),
        )
        .route("/api/assets/:id/graph", get(asset_graph))
        .route(
            "/api/repairs",
            get(list_repairs).post(add_repair).delete(delete_all_repairs),
        )
        .route("/api/repairs/:id", delete(delete_repair))
        .route("/api/dashboard", get(dashboard))
        .route("/api/dashboard/counts", get(asset_counts))
        .route("/api/dashboard/graph", get(dashboard_graph))
        .route("/api/recalculate", post(recalculate_all))
        .route("/api/estimate", post(estimate_repair))
        .route("/api/export/csv", get(export_csv))
        .route("/api/export/xlsx", get(export_xlsx))
        .route("/api/import", post(import_assets))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

// Missing rows and bad input are the caller's problem, store failures are ours
fn log_failure(err: &LedgerError) {
    match err {
        LedgerError::NotFound(_) | LedgerError::Validation(_) => info!("Rejected: {}", err),
        LedgerError::StoreUnavailable(_) => error!("{}", err),
    }
}

// Mutations always answer `{success, message, ...}`
fn mutation_reply<T: Summary + Serialize>(result: Result<T, LedgerError>) -> Response {
    let code = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            log_failure(e);
            status_for(e)
        }
    };
    (code, Json(Reply::from(result))).into_response()
}

// Writes hold the ledger lock and flush the workbook to disk, so keep them off the
// async worker threads
async fn on_ledger<T, F>(state: SharedState, f: F) -> Result<T, LedgerError>
where
    F: FnOnce(&LedgerService<FileStore>) -> Result<T, LedgerError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&state.ledger)).await {
        Ok(result) => result,
        Err(e) => Err(StoreError::Unavailable(format!("ledger task failed: {}", e)).into()),
    }
}

fn read_reply<T: Serialize>(result: Result<T, LedgerError>) -> Response {
    match result {
        Ok(data) => Json(data).into_response(),
        Err(e) => (status_for(&e), Json(Reply::<()>::failure(&e))).into_response(),
    }
}

fn error_response(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(ErrorResponse {
            success: false,
            message: message.into(),
        }),
    )
        .into_response()
}

fn png_response(result: Result<Vec<u8>, Box<dyn std::error::Error>>) -> Response {
    match result {
        Ok(buffer) => ([(header::CONTENT_TYPE, "image/png")], buffer).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to draw graph: {}", e),
        ),
    }
}

async fn list_assets(State(state): State<SharedState>) -> Response {
    read_reply(state.ledger.get_assets())
}

async fn add_asset(State(state): State<SharedState>, Json(payload): Json<NewAsset>) -> Response {
    mutation_reply(on_ledger(state, move |ledger| ledger.add_asset(payload)).await)
}

async fn get_asset(Path(id): Path<String>, State(state): State<SharedState>) -> Response {
    read_reply(state.ledger.get_asset(&id))
}

async fn update_asset(
    Path(id): Path<String>,
    State(state): State<SharedState>,
    Json(payload): Json<AssetUpdate>,
) -> Response {
    mutation_reply(on_ledger(state, move |ledger| ledger.update_asset(&id, payload)).await)
}

async fn delete_asset(Path(id): Path<String>, State(state): State<SharedState>) -> Response {
    mutation_reply(on_ledger(state, move |ledger| ledger.delete_asset(&id)).await)
}

async fn check_asset_status(Path(id): Path<String>, State(state): State<SharedState>) -> Response {
    read_reply(state.ledger.check_asset_status(&id))
}

async fn recalculate_asset(Path(id): Path<String>, State(state): State<SharedState>) -> Response {
    mutation_reply(on_ledger(state, move |ledger| ledger.recalculate_asset_totals(&id)).await)
}

async fn list_asset_repairs(Path(id): Path<String>, State(state): State<SharedState>) -> Response {
    read_reply(state.ledger.get_repairs_for_asset(&id))
}

async fn delete_asset_repairs(
    Path(id): Path<String>,
    State(state): State<SharedState>,
) -> Response {
    mutation_reply(
        on_ledger(state, move |ledger| ledger.delete_all_repairs_for_asset(&id)).await,
    )
}

async fn asset_graph(
    Path(id): Path<String>,
    Query(params): Query<GraphQuery>,
    State(state): State<SharedState>,
) -> Response {
    let asset = match state.ledger.get_asset(&id) {
        Ok(asset) => asset,
        Err(e) => return read_reply::<()>(Err(e)),
    };
    let repairs = match state.ledger.get_repairs_for_asset(&id) {
        Ok(repairs) => repairs,
        Err(e) => return read_reply::<()>(Err(e)),
    };
    let options = params.options(
        &format!("Repair spend: {}", asset.name),
        "Repair #",
        "Running total ($)",
        GraphType::Line,
    );
    png_response(graph::create_repair_history_graph(&asset, &repairs, &options))
}

async fn list_repairs(State(state): State<SharedState>) -> Response {
    read_reply(state.ledger.get_repairs())
}

async fn add_repair(
    State(state): State<SharedState>,
    Json(payload): Json<RepairRequest>,
) -> Response {
    mutation_reply(on_ledger(state, move |ledger| ledger.add_repair(payload)).await)
}

async fn delete_all_repairs(State(state): State<SharedState>) -> Response {
    mutation_reply(on_ledger(state, |ledger| ledger.delete_all_repairs()).await)
}

async fn delete_repair(Path(id): Path<String>, State(state): State<SharedState>) -> Response {
    mutation_reply(on_ledger(state, move |ledger| ledger.delete_repair(&id)).await)
}

// The dashboard never fails: a store error shows as an empty ledger
async fn dashboard(State(state): State<SharedState>) -> Json<DashboardStats> {
    match state.ledger.dashboard_stats() {
        Ok(stats) => Json(stats),
        Err(e) => {
            error!("Dashboard stats unavailable: {}", e);
            Json(DashboardStats::default())
        }
    }
}

async fn asset_counts(State(state): State<SharedState>) -> Response {
    read_reply(state.ledger.asset_counts())
}

async fn dashboard_graph(
    Query(params): Query<GraphQuery>,
    State(state): State<SharedState>,
) -> Response {
    let stats = match state.ledger.dashboard_stats() {
        Ok(stats) => stats,
        Err(e) => return read_reply::<()>(Err(e)),
    };
    let options = params.options(
        "Top problem assets",
        "Asset",
        "Total repairs ($)",
        GraphType::Bar,
    );
    png_response(graph::create_top_problems_graph(&stats, &options))
}

async fn recalculate_all(State(state): State<SharedState>) -> Response {
    mutation_reply(on_ledger(state, |ledger| ledger.recalculate_all_statuses()).await)
}

async fn estimate_repair(Json(payload): Json<EstimateInput>) -> Response {
    Json(estimate(&payload)).into_response()
}

async fn export_csv(
    Query(params): Query<ExportQuery>,
    State(state): State<SharedState>,
) -> Response {
    let table = match params.table.as_deref() {
        None => Table::Assets,
        Some(name) => match Table::from_name(name) {
            Some(table) => table,
            None => {
                return error_response(StatusCode::BAD_REQUEST, format!("Unknown table: {}", name));
            }
        },
    };

    let rows = match state.ledger.table_rows(table) {
        Ok(rows) => rows,
        Err(e) => return read_reply::<()>(Err(e)),
    };

    match downloader::to_csv(table, &rows) {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}.csv\"", table.name().to_lowercase()),
                ),
            ],
            csv,
        )
            .into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to export CSV: {}", e),
        ),
    }
}

async fn export_xlsx(State(state): State<SharedState>) -> Response {
    let mut tables = Vec::new();
    for table in Table::ALL {
        match state.ledger.table_rows(table) {
            Ok(rows) => tables.push((table, rows)),
            Err(e) => return read_reply::<()>(Err(e)),
        }
    }

    match downloader::to_xlsx(&tables) {
        Ok(buffer) => (
            [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                ),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"ledger.xlsx\"",
                ),
            ],
            buffer,
        )
            .into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to export XLSX: {}", e),
        ),
    }
}

async fn import_assets(State(state): State<SharedState>, mut multipart: Multipart) -> Response {
    let mut file_data = Vec::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        let is_file = matches!(field.name(), Some("file") | Some("assets") | None);
        if is_file {
            file_data = field.bytes().await.unwrap_or_default().to_vec();
        }
    }

    if file_data.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No file data received");
    }

    let content = String::from_utf8_lossy(&file_data);
    let parsed = loader::from_csv_str(&content).map_err(|e| e.to_string());
    match parsed {
        Ok(assets) => {
            mutation_reply(on_ledger(state, move |ledger| ledger.add_assets(assets)).await)
        }
        Err(message) => error_response(
            StatusCode::BAD_REQUEST,
            format!("Failed to read CSV: {}", message),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_in(dir: &tempfile::TempDir) -> SharedState {
        let store = FileStore::open(dir.path().join("ledger.bin.gz")).unwrap();
        Arc::new(AppState {
            ledger: LedgerService::new(store),
        })
    }

    #[tokio::test]
    async fn mutations_run_off_the_async_workers() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);

        let added = on_ledger(state.clone(), |ledger| {
            ledger.add_asset(NewAsset {
                id: "A1".to_string(),
                name: "Fryer".to_string(),
                replacement_cost: 1000.0,
                ..Default::default()
            })
        })
        .await;
        assert_eq!(mutation_reply(added).status(), StatusCode::OK);
        assert_eq!(state.ledger.get_asset("A1").unwrap().name, "Fryer");
    }

    #[tokio::test]
    async fn rejected_mutations_map_to_client_errors() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);

        let missing = on_ledger(state.clone(), |ledger| ledger.delete_asset("nope")).await;
        assert_eq!(mutation_reply(missing).status(), StatusCode::NOT_FOUND);

        let invalid = on_ledger(state, |ledger| {
            ledger.add_asset(NewAsset {
                id: " ".to_string(),
                ..Default::default()
            })
        })
        .await;
        assert_eq!(mutation_reply(invalid).status(), StatusCode::BAD_REQUEST);
    }
}
