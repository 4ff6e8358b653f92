use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quotefuse_core::domain::record::FinalRecord;
use quotefuse_core::storage::final_records;
use quotefuse_core::time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = quotefuse_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match quotefuse_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let state = AppState { pool };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/query", post(query_record))
        .route("/records/:symbol", get(get_record_today))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    pool: Option<PgPool>,
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    symbol: Option<String>,
    /// Defaults to today's UTC date.
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
        }),
    )
}

async fn query_record(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<FinalRecord>, ApiError> {
    let symbol = normalize_symbol(req.symbol.as_deref())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing \"symbol\""))?;

    let date = match req.date.as_deref() {
        Some(s) => time::parse_day(s)
            .map_err(|_| api_error(StatusCode::BAD_REQUEST, "date must be YYYY-MM-DD"))?,
        None => time::today_utc(),
    };

    lookup(&state, &symbol, date).await.map(Json)
}

async fn get_record_today(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<FinalRecord>, ApiError> {
    let symbol = normalize_symbol(Some(&symbol))
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing \"symbol\""))?;

    lookup(&state, &symbol, time::today_utc()).await.map(Json)
}

async fn lookup(state: &AppState, symbol: &str, date: NaiveDate) -> Result<FinalRecord, ApiError> {
    let Some(pool) = &state.pool else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "database unavailable",
        ));
    };

    let record = final_records::query(pool, symbol, date)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, %symbol, %date, "final record lookup failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        })?;

    record.ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("No data found for symbol \"{symbol}\" on {date}"),
        )
    })
}

/// Lookups are case-insensitive on symbol; the pipeline stages uppercase.
fn normalize_symbol(symbol: Option<&str>) -> Option<String> {
    let s = symbol?.trim();
    if s.is_empty() {
        return None;
    }
    Some(s.to_uppercase())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &quotefuse_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_symbol_for_lookup() {
        assert_eq!(normalize_symbol(Some(" aapl ")).as_deref(), Some("AAPL"));
        assert_eq!(normalize_symbol(Some("")), None);
        assert_eq!(normalize_symbol(Some("   ")), None);
        assert_eq!(normalize_symbol(None), None);
    }
}
