use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use hearth_types::api::{Claims, UpdateAccountStatusRequest, UpdateProfileRequest};
use hearth_types::models::Role;

use crate::auth::AppState;
use crate::convert;
use crate::error::{blocking, ApiError};

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let id = claims.sub.to_string();
    let row = blocking(move || db.get_user_by_id(&id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(convert::profile(row)))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Only volunteers link themselves to an orphanage through their profile;
    // admins own theirs via the orphanage record.
    if req.orphanage_id.is_some() && claims.role != Role::Volunteer {
        return Err(ApiError::Forbidden(
            "only volunteers can join an orphanage".into(),
        ));
    }

    if let Some(orphanage_id) = req.orphanage_id {
        let db = state.db.clone();
        let oid = orphanage_id.to_string();
        blocking(move || db.get_orphanage(&oid))
            .await?
            .ok_or(ApiError::NotFound("orphanage"))?;
    }

    let db = state.db.clone();
    let id = claims.sub.to_string();
    let row = blocking(move || {
        db.update_profile(
            &id,
            req.display_name.as_deref(),
            req.phone.as_deref(),
            req.photo_url.as_deref(),
            req.orphanage_id.map(|u| u.to_string()).as_deref(),
        )?;
        db.get_user_by_id(&id)
    })
    .await?
    .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(convert::profile(row)))
}

/// Admins dismiss (or reinstate) volunteers. Accounts are status-flagged,
/// never deleted.
pub async fn set_account_status(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateAccountStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden("admin role required".into()));
    }
    if req.status != "active" && req.status != "dismissed" {
        return Err(ApiError::BadRequest("unknown account status".into()));
    }

    let db = state.db.clone();
    let id = user_id.to_string();
    let target = blocking(move || db.get_user_by_id(&id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if target.role != "volunteer" {
        return Err(ApiError::Forbidden(
            "only volunteer accounts can be dismissed".into(),
        ));
    }

    let db = state.db.clone();
    let id = user_id.to_string();
    let status = req.status.clone();
    blocking(move || db.set_account_status(&id, &status)).await?;

    Ok(Json(serde_json::json!({ "status": req.status })))
}
