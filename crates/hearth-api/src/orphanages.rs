use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use hearth_db::models::OrphanageRow;
use hearth_types::api::{Claims, CreateOrphanageRequest, UpdateOrphanageRequest};
use hearth_types::models::Role;

use crate::auth::AppState;
use crate::convert;
use crate::error::{blocking, ApiError};

pub async fn create_orphanage(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateOrphanageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden("admin role required".into()));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("orphanage name is required".into()));
    }

    // One orphanage per admin
    let db = state.db.clone();
    let admin_id = claims.sub.to_string();
    let existing = blocking(move || db.orphanages_by_admin(&admin_id)).await?;
    if !existing.is_empty() {
        return Err(ApiError::Conflict(
            "this admin already manages an orphanage".into(),
        ));
    }

    let row = OrphanageRow {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        address: req.address,
        city: req.city,
        country: req.country,
        description: req.description,
        children_count: req.children_count,
        needs: serde_json::to_string(&req.needs)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("needs encode: {e}")))?,
        photo_url: req.photo_url,
        admin_id: claims.sub.to_string(),
        created_at: String::new(),
    };

    let db = state.db.clone();
    let id = row.id.clone();
    blocking(move || {
        db.create_orphanage(&row)?;
        db.get_orphanage(&id)
    })
    .await?
    .ok_or(ApiError::NotFound("orphanage"))
    .map(|row| (StatusCode::CREATED, Json(convert::orphanage(row))))
}

pub async fn list_orphanages(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let rows = blocking(move || db.list_orphanages()).await?;
    let orphanages: Vec<_> = rows.into_iter().map(convert::orphanage).collect();
    Ok(Json(orphanages))
}

pub async fn get_orphanage(
    State(state): State<AppState>,
    Path(orphanage_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let id = orphanage_id.to_string();
    let row = blocking(move || db.get_orphanage(&id))
        .await?
        .ok_or(ApiError::NotFound("orphanage"))?;
    Ok(Json(convert::orphanage(row)))
}

pub async fn update_orphanage(
    State(state): State<AppState>,
    Path(orphanage_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateOrphanageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let id = orphanage_id.to_string();
    let row = blocking(move || db.get_orphanage(&id))
        .await?
        .ok_or(ApiError::NotFound("orphanage"))?;

    if row.admin_id != claims.sub.to_string() {
        return Err(ApiError::Forbidden(
            "only the owning admin can edit this orphanage".into(),
        ));
    }

    let needs = match &req.needs {
        Some(needs) => Some(
            serde_json::to_string(needs)
                .map_err(|e| ApiError::Internal(anyhow::anyhow!("needs encode: {e}")))?,
        ),
        None => None,
    };

    let db = state.db.clone();
    let id = orphanage_id.to_string();
    let row = blocking(move || {
        db.update_orphanage(
            &id,
            req.name.as_deref(),
            req.address.as_deref(),
            req.city.as_deref(),
            req.country.as_deref(),
            req.description.as_deref(),
            req.children_count,
            needs.as_deref(),
            req.photo_url.as_deref(),
        )?;
        db.get_orphanage(&id)
    })
    .await?
    .ok_or(ApiError::NotFound("orphanage"))?;

    Ok(Json(convert::orphanage(row)))
}
