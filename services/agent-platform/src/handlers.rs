//! HTTP handlers: strategy catalog and agent lifecycle

use crate::error::ApiError;
use crate::registry::{AgentRecord, AgentStatus, TransitionError};
use crate::state::AppState;
use crate::strategies::registry as strategy_registry;
use crate::strategies::registry::StrategyDefinition;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use types::ids::AgentId;

// ── DTOs ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StrategiesResponse {
    pub strategies: Vec<StrategyDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub strategy_type: String,
    #[serde(default)]
    pub strategy_params: Value,
    #[serde(default)]
    pub strategy_source: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub exchange_url: String,
    pub api_key: String,
    pub strategy_type: String,
    #[serde(default)]
    pub strategy_params: Value,
    #[serde(default)]
    pub strategy_source: Option<Value>,
    #[serde(default = "default_interval")]
    pub interval_seconds: f64,
}

fn default_interval() -> f64 {
    5.0
}

#[derive(Debug, Deserialize)]
pub struct UpdateAgentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub strategy_params: Option<Value>,
    pub strategy_source: Option<Value>,
    pub interval_seconds: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub id: AgentId,
    pub name: String,
    pub description: String,
    pub exchange_url: String,
    pub strategy_type: String,
    pub strategy_params: Value,
    pub strategy_source: Option<String>,
    pub interval_seconds: f64,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub error_count: u32,
    pub total_ticks: u64,
    pub total_orders: u64,
}

impl From<&AgentRecord> for AgentResponse {
    fn from(record: &AgentRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            description: record.description.clone(),
            exchange_url: record.exchange_url.clone(),
            strategy_type: record.strategy_type.clone(),
            strategy_params: record.strategy_params.clone(),
            strategy_source: record.strategy_source.clone(),
            interval_seconds: record.interval_seconds,
            status: record.status,
            created_at: record.created_at,
            started_at: record.started_at,
            stopped_at: record.stopped_at,
            last_error: record.last_error.clone(),
            error_count: record.consecutive_errors,
            total_ticks: record.total_ticks,
            total_orders: record.total_orders,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentResponse>,
}

// ── Strategy catalog ────────────────────────────────────────────────

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn list_strategies() -> Json<StrategiesResponse> {
    Json(StrategiesResponse {
        strategies: strategy_registry::definitions(),
    })
}

pub async fn get_strategy(Path(id): Path<String>) -> Result<Json<StrategyDefinition>, ApiError> {
    strategy_registry::definition(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("strategy '{}' not found", id)))
}

pub async fn validate_strategy(Json(payload): Json<ValidateRequest>) -> Json<ValidateResponse> {
    let source = normalize_source(payload.strategy_source);
    let result = strategy_registry::validate(
        &payload.strategy_type,
        &payload.strategy_params,
        source.as_deref(),
    );
    match result {
        Ok(()) => Json(ValidateResponse {
            valid: true,
            errors: vec![],
        }),
        Err(e) => Json(ValidateResponse {
            valid: false,
            errors: vec![e.to_string()],
        }),
    }
}

// ── Agent CRUD ──────────────────────────────────────────────────────

pub async fn create_agent(
    State(state): State<AppState>,
    Json(payload): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<AgentResponse>), ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::InvalidParameters("name must not be empty".into()));
    }
    if payload.interval_seconds < 0.1 {
        return Err(ApiError::InvalidParameters(
            "interval_seconds must be at least 0.1".into(),
        ));
    }

    let source = normalize_source(payload.strategy_source);
    strategy_registry::validate(
        &payload.strategy_type,
        &payload.strategy_params,
        source.as_deref(),
    )
    .map_err(|e| ApiError::InvalidParameters(e.to_string()))?;

    let record = AgentRecord {
        id: AgentId::new(),
        name: payload.name,
        description: payload.description,
        exchange_url: payload.exchange_url,
        api_key: payload.api_key,
        strategy_type: payload.strategy_type,
        strategy_params: payload.strategy_params,
        strategy_source: source,
        interval_seconds: payload.interval_seconds,
        status: AgentStatus::Created,
        created_at: Utc::now(),
        started_at: None,
        stopped_at: None,
        last_error: None,
        consecutive_errors: 0,
        total_ticks: 0,
        total_orders: 0,
    };

    let response = AgentResponse::from(&record);
    state.registry.insert(record);
    tracing::info!(agent = %response.name, "agent created");
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_agents(State(state): State<AppState>) -> Json<AgentsResponse> {
    let agents = state
        .registry
        .list()
        .iter()
        .map(AgentResponse::from)
        .collect();
    Json(AgentsResponse { agents })
}

pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AgentResponse>, ApiError> {
    let id = parse_agent_id(&id)?;
    state
        .registry
        .get(&id)
        .map(|r| Json(AgentResponse::from(&r)))
        .ok_or_else(|| ApiError::NotFound(format!("agent '{}' not found", id)))
}

pub async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateAgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    let id = parse_agent_id(&id)?;
    let record = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("agent '{}' not found", id)))?;

    if record.status == AgentStatus::Running {
        return Err(ApiError::Conflict(
            "pause or stop the agent before editing it".into(),
        ));
    }
    if let Some(interval) = payload.interval_seconds {
        if interval < 0.1 {
            return Err(ApiError::InvalidParameters(
                "interval_seconds must be at least 0.1".into(),
            ));
        }
    }

    let source = payload.strategy_source.map(|v| normalize_source(Some(v)));
    let new_params = payload.strategy_params.clone().unwrap_or(record.strategy_params.clone());
    let new_source = match &source {
        Some(s) => s.clone(),
        None => record.strategy_source.clone(),
    };
    strategy_registry::validate(&record.strategy_type, &new_params, new_source.as_deref())
        .map_err(|e| ApiError::InvalidParameters(e.to_string()))?;

    let updated = state
        .registry
        .update_with(&id, |r| {
            if let Some(name) = payload.name {
                r.name = name;
            }
            if let Some(description) = payload.description {
                r.description = description;
            }
            if let Some(params) = payload.strategy_params {
                r.strategy_params = params;
            }
            if let Some(s) = source {
                // A new document discards compiled state, so all cooldowns
                // reset on the next start
                r.strategy_source = s;
            }
            if let Some(interval) = payload.interval_seconds {
                r.interval_seconds = interval;
            }
        })
        .ok_or_else(|| ApiError::NotFound(format!("agent '{}' not found", id)))?;

    Ok(Json(AgentResponse::from(&updated)))
}

pub async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_agent_id(&id)?;
    let record = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("agent '{}' not found", id)))?;

    if record.status == AgentStatus::Running {
        return Err(ApiError::Conflict("stop the agent before deleting it".into()));
    }

    state.registry.remove(&id);
    tracing::info!(agent = %record.name, "agent deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Lifecycle ───────────────────────────────────────────────────────

pub async fn start_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AgentResponse>, ApiError> {
    let id = parse_agent_id(&id)?;
    let record = state
        .registry
        .mark_running(&id, Utc::now())
        .map_err(transition_error)?;

    if let Err(e) = state.runner.start(&record) {
        // Roll the status back; the strategy no longer compiles
        let _ = state.registry.mark_stopped(&id, Utc::now());
        return Err(ApiError::InvalidParameters(e.to_string()));
    }

    Ok(Json(AgentResponse::from(&record)))
}

pub async fn stop_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AgentResponse>, ApiError> {
    let id = parse_agent_id(&id)?;
    let record = state
        .registry
        .mark_stopped(&id, Utc::now())
        .map_err(transition_error)?;

    state.runner.stop(&id).await;
    Ok(Json(AgentResponse::from(&record)))
}

pub async fn pause_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AgentResponse>, ApiError> {
    let id = parse_agent_id(&id)?;
    let record = state.registry.mark_paused(&id).map_err(transition_error)?;

    state.runner.signal(&id);
    Ok(Json(AgentResponse::from(&record)))
}

// ── Helpers ─────────────────────────────────────────────────────────

/// The DSL source may arrive as a JSON object or a pre-encoded string
fn normalize_source(source: Option<Value>) -> Option<String> {
    match source {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    }
}

fn parse_agent_id(raw: &str) -> Result<AgentId, ApiError> {
    raw.parse::<uuid::Uuid>()
        .map(AgentId::from_uuid)
        .map_err(|_| ApiError::InvalidParameters(format!("malformed agent id '{}'", raw)))
}

fn transition_error(e: TransitionError) -> ApiError {
    match e {
        TransitionError::NotFound => ApiError::NotFound("agent not found".into()),
        TransitionError::Invalid { .. } => ApiError::Conflict(e.to_string()),
    }
}
