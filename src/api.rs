//! HTTP bridge: axum routes over the blocking prediction library.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::baseball_scoring::{self, GameContext};
use crate::batch::{self, BatchRequest};
use crate::config::Config;
use crate::error::PredictError;
use crate::espn::{EspnClient, GameSource};
use crate::extract;
use crate::fantasy;
use crate::football_scoring;
use crate::http_client::http_client;
use crate::injuries::{self, team_impact};
use crate::league::League;
use crate::ml;
use crate::pitchers;
use crate::sport::Sport;
use crate::store;
use crate::weather;

/// Shared state for every handler. The mutex serialises data-mutating requests.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    source: Arc<dyn GameSource + Send + Sync>,
    writes: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config, source: Arc<dyn GameSource + Send + Sync>) -> Self {
        Self {
            config: Arc::new(config),
            source,
            writes: Arc::new(Mutex::new(())),
        }
    }
}

/// `{"detail": ...}` with a status chosen from the error kind.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let status = match err.downcast_ref::<PredictError>() {
            Some(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Some(PredictError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %format!("{err:#}"), "request failed");
        }
        Self {
            status,
            detail: format!("{err:#}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

type ApiResult = std::result::Result<Json<Value>, ApiError>;

/// Runs library work on the blocking pool.
async fn blocking<F>(work: F) -> ApiResult
where
    F: FnOnce() -> Result<Value> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => Ok(Json(result?)),
        Err(err) => Err(ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: format!("worker failed: {err}"),
        }),
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn nfl() -> Sport {
    Sport::Nfl
}

fn yes() -> bool {
    true
}

fn regular() -> String {
    "regular".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SportQuery {
    #[serde(default = "nfl")]
    sport: Sport,
}

#[derive(Debug, Deserialize)]
pub struct MatchupRequest {
    #[serde(default = "nfl")]
    sport: Sport,
    home_team: String,
    away_team: String,
    #[serde(default)]
    neutral_site: bool,
    #[serde(default)]
    use_ml: bool,
    /// Baseball only: names from the sample pitcher table.
    #[serde(default)]
    home_pitcher: Option<String>,
    #[serde(default)]
    away_pitcher: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchBody {
    #[serde(default = "nfl")]
    sport: Sport,
    week: u32,
    #[serde(default = "regular")]
    season_type: String,
    #[serde(default = "yes")]
    use_ml: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/teams", get(teams))
        .route("/api/matchup", post(matchup))
        .route("/api/batch", post(batch_predict))
        .route("/api/refresh/injuries", post(refresh_injuries))
        .route("/api/refresh/data", post(refresh_data))
        .route("/api/data/status", get(data_status))
        .route("/api/fantasy/qb-rankings", get(qb_rankings))
        .route("/api/fantasy/team-offense", get(team_offense))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.api.bind, config.api.port)
        .parse()
        .with_context(|| format!("bad bind address {}:{}", config.api.bind, config.api.port))?;
    let source = Arc::new(EspnClient::new(&config)?);
    let app = router(AppState::new(config, source));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "api listening");
    axum::serve(listener, app).await.context("api server failed")
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": now() }))
}

async fn teams(State(state): State<AppState>, Query(q): Query<SportQuery>) -> ApiResult {
    blocking(move || {
        let paths = state.config.paths(q.sport);
        let names = store::team_names(&store::read_games(&paths.games)?);
        if names.is_empty() {
            return Err(PredictError::NoData(q.sport.label().to_string()).into());
        }
        Ok(json!({ "sport": q.sport, "teams": names }))
    })
    .await
}

async fn matchup(State(state): State<AppState>, Json(req): Json<MatchupRequest>) -> ApiResult {
    blocking(move || run_matchup(&state.config, &req)).await
}

fn run_matchup(config: &Config, req: &MatchupRequest) -> Result<Value> {
    let home = req.home_team.trim();
    let away = req.away_team.trim();
    if home.is_empty() || away.is_empty() {
        return Err(PredictError::InvalidRequest("home_team and away_team are required".to_string()).into());
    }
    if home == away {
        return Err(PredictError::InvalidRequest("a team cannot play itself".to_string()).into());
    }

    let paths = config.paths(req.sport);
    let injuries = injuries::load(&paths)?;
    let prediction = match req.sport {
        Sport::Mlb => {
            let teams = store::load_baseball(&paths.games)?;
            if teams.is_empty() {
                return Err(PredictError::NoData(req.sport.label().to_string()).into());
            }
            let weather = if req.neutral_site {
                None
            } else {
                http_client_or_log().map(|client| weather::summary(client, home))
            };
            let context = GameContext {
                weather,
                home_pitcher: req.home_pitcher.as_deref().and_then(pitchers::sample_pitcher),
                away_pitcher: req.away_pitcher.as_deref().and_then(pitchers::sample_pitcher),
            };
            let result = baseball_scoring::predict(&teams, home, away, req.neutral_site, injuries.as_ref(), &context)?;
            serde_json::to_value(&result)?
        }
        Sport::Nfl | Sport::Cfb => {
            let teams = store::load_football(&paths.games)?;
            if teams.is_empty() {
                return Err(PredictError::NoData(req.sport.label().to_string()).into());
            }
            let league = League::new(req.sport, &teams);
            let model = if req.use_ml && req.sport == Sport::Nfl {
                let model = ml::load(&paths.model)?;
                if model.is_none() {
                    warn!("no trained model; answering with the heuristic scorer");
                }
                model
            } else {
                None
            };
            match model {
                Some(model) => {
                    let result = ml::predict(&league, &model, home, away, req.neutral_site, injuries.as_ref())?;
                    serde_json::to_value(&result)?
                }
                None => {
                    let result =
                        football_scoring::predict(&league, home, away, req.neutral_site, injuries.as_ref())?;
                    serde_json::to_value(&result)?
                }
            }
        }
    };

    let injury_view = |team: &str| match &injuries {
        Some(report) => serde_json::to_value(team_impact(req.sport, report, team)),
        None => Ok(Value::Null),
    };
    Ok(json!({
        "prediction": prediction,
        "injuries": {
            "home_team": injury_view(home)?,
            "away_team": injury_view(away)?,
        },
        "timestamp": now(),
    }))
}

/// Weather is optional context; without a client the game is scored without it.
fn http_client_or_log() -> Option<&'static reqwest::blocking::Client> {
    match http_client() {
        Ok(client) => Some(client),
        Err(err) => {
            warn!(error = %err, "no http client for weather lookup");
            None
        }
    }
}

async fn batch_predict(State(state): State<AppState>, Json(body): Json<BatchBody>) -> ApiResult {
    let writes = state.writes.clone();
    let _guard = writes.lock().await;
    blocking(move || {
        let request = BatchRequest {
            sport: body.sport,
            week: body.week,
            phase: batch::parse_season_type(&body.season_type)?,
            use_ml: body.use_ml,
        };
        let result = batch::run(&state.source, &state.config, &request)?;
        Ok(serde_json::to_value(&result)?)
    })
    .await
}

async fn refresh_injuries(State(state): State<AppState>, Query(q): Query<SportQuery>) -> ApiResult {
    let writes = state.writes.clone();
    let _guard = writes.lock().await;
    blocking(move || {
        let summary = injuries::refresh(&state.source, &state.config.paths(q.sport))?;
        Ok(json!({ "status": "ok", "updated_at": now(), "details": summary }))
    })
    .await
}

async fn refresh_data(State(state): State<AppState>, Query(q): Query<SportQuery>) -> ApiResult {
    let writes = state.writes.clone();
    let _guard = writes.lock().await;
    blocking(move || {
        let summary = extract::run_update(&state.source, &state.config, q.sport)?;
        let paths = state.config.paths(q.sport);
        let file = store::file_status(&paths.games);
        Ok(json!({
            "status": "ok",
            "updated_at": now(),
            "details": {
                "file": paths.games.display().to_string(),
                "size_kb": file.size_kb,
                "modified_at": file.modified_at,
                "new_games": summary.new_games,
                "total_games": summary.total_games,
                "errors": summary.errors,
            },
        }))
    })
    .await
}

async fn data_status(State(state): State<AppState>, Query(q): Query<SportQuery>) -> ApiResult {
    blocking(move || {
        let paths = state.config.paths(q.sport);
        let games = store::read_games(&paths.games)?;
        let latest = store::latest_game(&games);
        let file = store::file_status(&paths.games);
        let injury_file = match q.sport {
            Sport::Cfb => &paths.injuries_manual,
            Sport::Nfl | Sport::Mlb => &paths.injuries_snapshot,
        };
        let injury_status = store::file_status(injury_file);

        let mut body = Map::new();
        body.insert(
            format!("{}_data", q.sport.key()),
            json!({
                "latest_week": latest.and_then(|g| g.week),
                "latest_date": latest.and_then(|g| g.date.clone()),
                "season_type": latest.map(|g| g.phase),
                "games": games.len(),
                "file_exists": file.file_exists,
                "size_kb": file.size_kb,
                "modified_at": file.modified_at,
            }),
        );
        body.insert(
            "injuries".to_string(),
            json!({
                "file_exists": injury_status.file_exists,
                "modified_at": injury_status.modified_at,
            }),
        );
        Ok(Value::Object(body))
    })
    .await
}

fn nfl_teams(config: &Config) -> Result<crate::model::FootballTeams> {
    let teams = store::load_football(&config.paths(Sport::Nfl).games)?;
    if teams.is_empty() {
        return Err(PredictError::NoData(Sport::Nfl.label().to_string()).into());
    }
    Ok(teams)
}

async fn qb_rankings(State(state): State<AppState>) -> ApiResult {
    blocking(move || {
        let qbs = fantasy::qb_rankings(&nfl_teams(&state.config)?);
        Ok(json!({ "qbs": qbs }))
    })
    .await
}

async fn team_offense(State(state): State<AppState>) -> ApiResult {
    blocking(move || {
        let rankings = fantasy::team_offense(&nfl_teams(&state.config)?);
        Ok(serde_json::to_value(&rankings)?)
    })
    .await
}
