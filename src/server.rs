use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::aggregate;
use crate::config::DashboardConfig;
use crate::error::{AttendanceError, AttendanceResult};
use crate::models::Summaries;
use crate::report;
use crate::roster::{self, RosterCache, RosterSource};

#[derive(Clone)]
pub struct AppState {
    config: Arc<DashboardConfig>,
    source: Arc<RosterSource>,
    client: reqwest::Client,
    cache: Arc<Mutex<RosterCache>>,
}

impl AppState {
    pub fn new(
        config: DashboardConfig,
        source: RosterSource,
        cache: RosterCache,
    ) -> AttendanceResult<Self> {
        Ok(AppState {
            config: Arc::new(config),
            source: Arc::new(source),
            client: roster::http_client()?,
            cache: Arc::new(Mutex::new(cache)),
        })
    }

    async fn summaries(&self) -> AttendanceResult<(Summaries, Option<DateTime<Utc>>)> {
        let mut cache = self.cache.lock().await;
        let table = cache.load(&self.source, &self.client, Utc::now()).await?;
        let summaries = aggregate::compute_summaries(&table, &self.config.aggregation)?;
        Ok((summaries, cache.fetched_at()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/summary", get(summary))
        .route("/form", get(form))
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(state);

    log::info!("attendance dashboard listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<AttendanceError>() {
            Some(AttendanceError::Schema { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Some(AttendanceError::Fetch { .. }) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        log::error!("request failed: {:#}", self.0);
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// GET / - both tables plus the form button
async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let summaries = match state.summaries().await {
        Ok((summaries, _)) => Some(summaries),
        Err(err) if err.is_schema() => {
            log::warn!("{}", err);
            None
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Html(report::render_dashboard(
        &state.config.title,
        &state.config.form_url,
        summaries.as_ref(),
    )))
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub title: String,
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub summaries: Summaries,
}

/// GET /api/summary
async fn summary(State(state): State<AppState>) -> Result<Json<SummaryResponse>, AppError> {
    let (summaries, fetched_at) = state.summaries().await?;
    Ok(Json(SummaryResponse {
        title: state.config.title.clone(),
        fetched_at,
        summaries,
    }))
}

/// GET /form - send the browser to the attendance form
async fn form(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.config.form_url)
}
