use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::task;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use maroc_stats_core::{
    ranked, write_export_csv, Dataset, Locale, Pipeline, RankOrder, StatsConfig, StatsContext,
    DEFAULT_CONFIG, SEGMENT_TOTAL,
};

struct AppState {
    context: StatsContext,
}

type SharedState = Arc<AppState>;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let config_path = std::env::var("MAROC_STATS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG));
    let config = StatsConfig::load(&config_path)?;
    // Fetching uses a blocking client.
    let context = task::spawn_blocking(move || StatsContext::load(&config)).await??;
    let app = router(Arc::new(AppState { context }));
    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/regions", get(handle_regions))
        .route("/resolve", get(handle_resolve))
        .route("/value", get(handle_value))
        .route("/split", get(handle_split))
        .route("/series", get(handle_series))
        .route("/stats", get(handle_stats))
        .route("/compare", get(handle_compare))
        .route("/export", get(handle_export))
        .route("/merged", get(handle_merged))
        .route("/ranked", get(handle_ranked))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct SegmentParams {
    dataset: Option<String>,
    segment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResolveParams {
    dataset: Option<String>,
    name: String,
    segment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegionParams {
    dataset: Option<String>,
    region: String,
    year: Option<u16>,
    segment: Option<String>,
    locale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YearParams {
    dataset: Option<String>,
    year: u16,
    segment: Option<String>,
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompareParams {
    dataset: Option<String>,
    a: String,
    b: String,
    segment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RankParams {
    order: Option<String>,
}

async fn handle_regions(
    State(state): State<SharedState>,
    Query(params): Query<SegmentParams>,
) -> Result<Json<Value>, AppError> {
    let data = dataset(&state, params.dataset.as_deref())?;
    let segment = segment_or_total(params.segment);
    Ok(Json(json!(data.available_regions(&segment))))
}

async fn handle_resolve(
    State(state): State<SharedState>,
    Query(params): Query<ResolveParams>,
) -> Result<Json<Value>, AppError> {
    let pipeline = pipeline(params.dataset.as_deref())?;
    let segment = segment_or_total(params.segment);
    let region = resolve(&state, pipeline, &params.name, &segment)?;
    Ok(Json(json!({ "name": params.name, "region": region })))
}

async fn handle_value(
    State(state): State<SharedState>,
    Query(params): Query<RegionParams>,
) -> Result<Json<Value>, AppError> {
    let pipeline = pipeline(params.dataset.as_deref())?;
    let segment = segment_or_total(params.segment);
    let year = params
        .year
        .ok_or_else(|| AppError::bad_request("missing year"))?;
    let locale = locale(params.locale.as_deref())?;
    let region = resolve(&state, pipeline, &params.region, &segment)?;
    let value = state
        .context
        .dataset(pipeline)
        .value_at(&region, year, &segment, locale);
    Ok(Json(json!({
        "region": region,
        "year": year,
        "segment": segment,
        "locale": locale,
        "value": value,
    })))
}

async fn handle_split(
    State(state): State<SharedState>,
    Query(params): Query<RegionParams>,
) -> Result<Json<Value>, AppError> {
    let pipeline = pipeline(params.dataset.as_deref())?;
    let segment = segment_or_total(params.segment);
    let year = params
        .year
        .ok_or_else(|| AppError::bad_request("missing year"))?;
    let region = resolve(&state, pipeline, &params.region, &segment)?;
    let split = state
        .context
        .dataset(pipeline)
        .urban_rural_split(&region, year, &segment);
    Ok(Json(json!({ "region": region, "year": year, "split": split })))
}

async fn handle_series(
    State(state): State<SharedState>,
    Query(params): Query<RegionParams>,
) -> Result<Json<Value>, AppError> {
    let pipeline = pipeline(params.dataset.as_deref())?;
    let segment = segment_or_total(params.segment);
    let locale = locale(params.locale.as_deref())?;
    let region = resolve(&state, pipeline, &params.region, &segment)?;
    let series = state
        .context
        .dataset(pipeline)
        .temporal_series(&region, &segment, locale);
    Ok(Json(json!({ "region": region, "series": series })))
}

async fn handle_stats(
    State(state): State<SharedState>,
    Query(params): Query<YearParams>,
) -> Result<Json<Value>, AppError> {
    let data = dataset(&state, params.dataset.as_deref())?;
    let segment = segment_or_total(params.segment);
    Ok(Json(json!(data.color_scale_stats(params.year, &segment))))
}

async fn handle_compare(
    State(state): State<SharedState>,
    Query(params): Query<CompareParams>,
) -> Result<Json<Value>, AppError> {
    let pipeline = pipeline(params.dataset.as_deref())?;
    let segment = segment_or_total(params.segment);
    let first = resolve(&state, pipeline, &params.a, &segment)?;
    let second = resolve(&state, pipeline, &params.b, &segment)?;
    let comparison = state
        .context
        .dataset(pipeline)
        .comparison_series(&first, &second, &segment);
    Ok(Json(json!(comparison)))
}

async fn handle_export(
    State(state): State<SharedState>,
    Query(params): Query<YearParams>,
) -> Result<Response, AppError> {
    let data = dataset(&state, params.dataset.as_deref())?;
    let segment = segment_or_total(params.segment);
    match params.format.as_deref().unwrap_or("csv") {
        "csv" => {
            let mut body = Vec::new();
            write_export_csv(&data.export_rows(params.year, &segment), &mut body)
                .map_err(AppError::internal)?;
            Ok((
                [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
                body,
            )
                .into_response())
        }
        "json" => Ok(Json(data.export_json(params.year, &segment)).into_response()),
        other => Err(AppError::bad_request(format!("unknown export format {other}"))),
    }
}

async fn handle_merged(State(state): State<SharedState>) -> Json<Value> {
    let merged = state
        .context
        .merged()
        .iter()
        .map(|feature| feature.without_geometry())
        .collect::<Vec<_>>();
    Json(json!(merged))
}

async fn handle_ranked(
    State(state): State<SharedState>,
    Query(params): Query<RankParams>,
) -> Result<Json<Value>, AppError> {
    let order = match params.order.as_deref() {
        Some(raw) => raw.parse::<RankOrder>().map_err(AppError::bad_request)?,
        None => RankOrder::Total,
    };
    let merged = state.context.merged();
    let ranked = ranked(&merged, order)
        .into_iter()
        .map(|feature| feature.without_geometry())
        .collect::<Vec<_>>();
    Ok(Json(json!(ranked)))
}

fn pipeline(raw: Option<&str>) -> Result<Pipeline, AppError> {
    raw.map_or(Ok(Pipeline::default()), |raw| {
        raw.parse().map_err(AppError::bad_request)
    })
}

fn dataset<'a>(state: &'a AppState, raw: Option<&str>) -> Result<&'a Dataset, AppError> {
    Ok(state.context.dataset(pipeline(raw)?))
}

fn locale(raw: Option<&str>) -> Result<Locale, AppError> {
    raw.map_or(Ok(Locale::National), |raw| {
        raw.parse().map_err(AppError::bad_request)
    })
}

fn segment_or_total(segment: Option<String>) -> String {
    segment
        .filter(|segment| !segment.trim().is_empty())
        .unwrap_or_else(|| SEGMENT_TOTAL.to_string())
}

fn resolve(
    state: &AppState,
    pipeline: Pipeline,
    name: &str,
    segment: &str,
) -> Result<String, AppError> {
    state
        .context
        .resolve(pipeline, name, segment)
        .ok_or_else(|| AppError::NotFound(format!("unknown region {name}")))
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn bad_request<E: ToString>(msg: E) -> Self {
        Self::BadRequest(msg.to_string())
    }

    fn internal<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::Internal(err) => {
                error!("internal_error" = %err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maroc_stats_core::{GeoFeature, MatchPolicy, RawRecord, RetireeRecord, Schema};

    fn state() -> SharedState {
        let rows = vec![RawRecord {
            segment: Some(SEGMENT_TOTAL.to_string()),
            region: Some("Oriental".to_string()),
            locale: Some("National".to_string()),
            values: vec![(2015, Some(17.1)), (2016, None)],
        }];
        let context = StatsContext::from_parts(
            vec![
                GeoFeature {
                    name: "L'Oriental".to_string(),
                    geometry: Value::Null,
                },
                GeoFeature {
                    name: "Souss-Massa".to_string(),
                    geometry: Value::Null,
                },
            ],
            vec![
                RetireeRecord {
                    region: "Oriental".to_string(),
                    masculin: 4000.0,
                    feminin: 2000.0,
                    total: 6000.0,
                },
                RetireeRecord {
                    region: "Souss-Massa".to_string(),
                    masculin: 6000.0,
                    feminin: 3000.0,
                    total: 9000.0,
                },
            ],
            Dataset::from_rows(&rows, Schema::unemployment()),
            MatchPolicy::First,
        );
        Arc::new(AppState { context })
    }

    fn region_params(region: &str, year: Option<u16>) -> RegionParams {
        RegionParams {
            dataset: None,
            region: region.to_string(),
            year,
            segment: None,
            locale: None,
        }
    }

    #[tokio::test]
    async fn value_resolves_free_text_and_reports_absence() {
        let Json(body) = handle_value(State(state()), Query(region_params("L'Oriental", Some(2015))))
            .await
            .unwrap();
        assert_eq!(body["region"], "Oriental");
        assert_eq!(body["value"], 17.1);

        let Json(body) = handle_value(State(state()), Query(region_params("Oriental", Some(2016))))
            .await
            .unwrap();
        assert!(body["value"].is_null());
    }

    #[tokio::test]
    async fn unresolved_region_is_not_found() {
        let err = handle_value(State(state()), Query(region_params("Atlantis", Some(2015))))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn retiree_lookup_outside_retiree_rows_is_not_found() {
        let mut params = region_params("Drâa-Tafilalet", Some(2022));
        params.dataset = Some("retirees".to_string());
        let err = handle_value(State(state()), Query(params)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let Json(body) = handle_value(State(state()), Query(region_params("Drâa-Tafilalet", Some(2023))))
            .await
            .unwrap();
        assert_eq!(body["value"], 9.9);
    }

    #[tokio::test]
    async fn missing_year_and_bad_locale_are_bad_requests() {
        let err = handle_value(State(state()), Query(region_params("Oriental", None)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let mut params = region_params("Oriental", Some(2015));
        params.locale = Some("suburban".to_string());
        let err = handle_series(State(state()), Query(params)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ranked_orders_by_total() {
        let Json(body) = handle_ranked(State(state()), Query(RankParams::default()))
            .await
            .unwrap();
        let totals = body
            .as_array()
            .unwrap()
            .iter()
            .map(|feature| feature["total"].as_f64().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(totals, vec![9000.0, 6000.0]);
    }

    #[tokio::test]
    async fn export_rejects_unknown_format() {
        let params = YearParams {
            dataset: None,
            year: 2015,
            segment: None,
            format: Some("xml".to_string()),
        };
        let err = handle_export(State(state()), Query(params)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn regions_lists_data_then_reference() {
        let Json(body) = handle_regions(State(state()), Query(SegmentParams::default()))
            .await
            .unwrap();
        let regions = body.as_array().unwrap();
        assert_eq!(regions[0], "Oriental");
        assert_eq!(regions.len(), 9);
    }
}
