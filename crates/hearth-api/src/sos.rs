use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use hearth_db::models::SosAlertRow;
use hearth_types::api::{Claims, CreateSosRequest, UpdateSosStatusRequest};
use hearth_types::models::{Role, SosStatus};

use crate::auth::AppState;
use crate::convert;
use crate::error::{blocking, ApiError};

#[derive(Debug, Deserialize)]
pub struct SosQuery {
    pub status: Option<SosStatus>,
}

/// `POST /sos` — raise an alert. Admins triage these by polling the list;
/// alerts are deliberately not pushed over the gateway.
pub async fn create_sos(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateSosRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role == Role::Admin {
        return Err(ApiError::Forbidden(
            "admins triage alerts, they do not raise them".into(),
        ));
    }
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("alert message is required".into()));
    }

    let row = SosAlertRow {
        id: Uuid::new_v4().to_string(),
        user_id: claims.sub.to_string(),
        user_name: claims.name.clone(),
        user_role: claims.role.as_str().into(),
        lat: req.lat,
        lng: req.lng,
        address: req.address,
        message: req.message,
        phone: req.phone,
        status: SosStatus::Active.as_str().into(),
        created_at: String::new(),
    };

    let db = state.db.clone();
    let id = row.id.clone();
    let created = blocking(move || {
        db.insert_sos(&row)?;
        db.get_sos(&id)
    })
    .await?
    .ok_or(ApiError::NotFound("sos alert"))?;

    Ok((StatusCode::CREATED, Json(convert::sos(created))))
}

pub async fn list_sos(
    State(state): State<AppState>,
    Query(query): Query<SosQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden("admin role required".into()));
    }

    let db = state.db.clone();
    let rows = blocking(move || db.list_sos(query.status.map(|s| s.as_str()))).await?;
    let alerts: Vec<_> = rows.into_iter().map(convert::sos).collect();
    Ok(Json(alerts))
}

pub async fn update_sos_status(
    State(state): State<AppState>,
    Path(alert_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateSosStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden("admin role required".into()));
    }

    let db = state.db.clone();
    let id = alert_id.to_string();
    let status = req.status;
    let updated = blocking(move || db.set_sos_status(&id, status.as_str())).await?;
    if !updated {
        return Err(ApiError::NotFound("sos alert"));
    }

    Ok(Json(serde_json::json!({ "status": req.status })))
}
