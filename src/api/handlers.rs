//! API handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::api::{validation::MissingFields, ApiError, AppState};
use crate::store::{Filter, Order, Row};
use crate::types::{
    to_row, CreateHabitRequest, EndSessionRequest, HabitEventRequest, MessageResponse,
    NewHabitLog, NewHabitType, RecordId, SessionEnd, SessionStartResponse, HABIT_LOGS_TABLE,
    HABIT_TYPES_TABLE,
};

const MISSING_USER_ID: &str = "Falta el parámetro userId en la URL.";

/// Liveness probe
pub async fn root() -> &'static str {
    "API de seguimiento de hábitos funcionando"
}

/// Health check; does not touch the store
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.backend.to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
}

/// `GET /habits` and `GET /habits/` without a user segment
pub async fn missing_user_id() -> ApiError {
    tracing::debug!("habit list requested without userId");
    ApiError::bad_request(MISSING_USER_ID)
}

/// List the active habit types of a user, oldest first
pub async fn list_habits(
    State(state): State<AppState>,
    user_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<Row>>, ApiError> {
    let Path(user_id) = user_id?;
    if user_id.trim().is_empty() {
        return Err(ApiError::bad_request(MISSING_USER_ID));
    }

    let rows = state
        .store
        .select(
            HABIT_TYPES_TABLE,
            &[Filter::eq("user_id", user_id.as_str()), Filter::eq("is_active", true)],
            Some(&Order::asc("created_at")),
        )
        .await
        .map_err(|e| {
            tracing::error!(%user_id, error = %e, "failed to list habit types");
            ApiError::store("Error al obtener los hábitos", &e)
        })?;

    Ok(Json(rows))
}

/// Create a habit type
pub async fn create_habit(
    State(state): State<AppState>,
    payload: Result<Json<CreateHabitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(payload) = payload?;

    let mut missing = MissingFields::default();
    let user_id = missing.id("userId", payload.user_id);
    let nombre = missing.text("nombre", payload.nombre);
    let tipo_registro = missing.text("tipoRegistro", payload.tipo_registro);
    let (Some(user_id), Some(nombre), Some(tipo_registro)) = (user_id, nombre, tipo_registro)
    else {
        tracing::debug!(missing = ?missing.names(), "rejected habit type");
        return Err(missing.into_error());
    };

    let row = to_row(&NewHabitType {
        user_id: user_id.clone(),
        nombre,
        tipo_registro,
        meta_diaria: payload.meta_diaria,
        is_active: true,
    })
    .map_err(|e| ApiError::store("Error al crear el hábito", &e))?;

    let inserted = state
        .store
        .insert(HABIT_TYPES_TABLE, row)
        .await
        .map_err(|e| {
            tracing::error!(%user_id, error = %e, "failed to create habit type");
            ApiError::store("Error al crear el hábito", &e)
        })?;

    tracing::info!(%user_id, id = ?inserted.get("id"), "habit type created");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Hábito creado correctamente".to_string(),
        }),
    ))
}

/// Record a single habit occurrence
pub async fn log_event(
    State(state): State<AppState>,
    payload: Result<Json<HabitEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(payload) = payload?;
    let log = new_habit_log(payload)?;
    let user_id = log.user_id.clone();

    let row = to_row(&log).map_err(|e| ApiError::store("Error al registrar el evento", &e))?;
    let inserted = state
        .store
        .insert(HABIT_LOGS_TABLE, row)
        .await
        .map_err(|e| {
            tracing::error!(%user_id, error = %e, "failed to log habit event");
            ApiError::store("Error al registrar el evento", &e)
        })?;

    tracing::info!(%user_id, id = ?inserted.get("id"), "habit event logged");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Evento registrado correctamente".to_string(),
        }),
    ))
}

/// Open a timed session and hand back its log id
pub async fn start_session(
    State(state): State<AppState>,
    payload: Result<Json<HabitEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionStartResponse>), ApiError> {
    let Json(payload) = payload?;
    let log = new_habit_log(payload)?;
    let user_id = log.user_id.clone();

    let row = to_row(&log).map_err(|e| ApiError::store("Error al iniciar la sesión", &e))?;
    let inserted = state
        .store
        .insert(HABIT_LOGS_TABLE, row)
        .await
        .map_err(|e| {
            tracing::error!(%user_id, error = %e, "failed to start session");
            ApiError::store("Error al iniciar la sesión", &e)
        })?;

    let log_id = inserted
        .get("id")
        .and_then(RecordId::from_value)
        .ok_or_else(|| {
            tracing::error!(%user_id, "inserted session has no id");
            ApiError::store(
                "Error al iniciar la sesión",
                &crate::Error::store("the store returned no id for the new log"),
            )
        })?;

    tracing::info!(%user_id, %log_id, "session started");

    Ok((StatusCode::CREATED, Json(SessionStartResponse { log_id })))
}

/// Close a timed session
pub async fn end_session(
    State(state): State<AppState>,
    payload: Result<Json<EndSessionRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(payload) = payload?;

    let mut missing = MissingFields::default();
    let log_id = missing.id("logId", payload.log_id);
    let duration = missing.value("durationSeconds", payload.duration_seconds);
    let (Some(log_id), Some(duration)) = (log_id, duration) else {
        tracing::debug!(missing = ?missing.names(), "rejected session end");
        return Err(missing.into_error());
    };

    let patch = to_row(&SessionEnd {
        fecha_fin: Utc::now(),
        duracion_segundos: duration.clone(),
        notas: payload.notas,
    })
    .map_err(|e| ApiError::store("Error al finalizar la sesión", &e))?;

    state
        .store
        .update(HABIT_LOGS_TABLE, &[Filter::eq("id", log_id.to_value())], patch)
        .await
        .map_err(|e| {
            tracing::error!(%log_id, error = %e, "failed to end session");
            ApiError::store("Error al finalizar la sesión", &e)
        })?;

    tracing::info!(%log_id, duration_secs = %duration, "session ended");

    Ok(Json(MessageResponse {
        message: "Sesión finalizada correctamente".to_string(),
    }))
}

fn new_habit_log(payload: HabitEventRequest) -> Result<NewHabitLog, ApiError> {
    let mut missing = MissingFields::default();
    let user_id = missing.id("userId", payload.user_id);
    let habit_type_id = missing.id("habitTypeId", payload.habit_type_id);
    let (Some(user_id), Some(habit_type_id)) = (user_id, habit_type_id) else {
        tracing::debug!(missing = ?missing.names(), "rejected habit log");
        return Err(missing.into_error());
    };

    Ok(NewHabitLog {
        user_id,
        habit_type_id,
        fecha_inicio: Utc::now(),
    })
}
