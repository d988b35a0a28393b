use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use hearth_db::models::WishRow;
use hearth_types::api::{Claims, CreateWishRequest, UpdateWishStatusRequest};
use hearth_types::models::{Role, WishStatus};

use crate::auth::AppState;
use crate::convert;
use crate::error::{blocking, ApiError};

#[derive(Debug, Deserialize)]
pub struct WishQuery {
    pub orphanage_id: Option<Uuid>,
    pub status: Option<WishStatus>,
}

pub async fn create_wish(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateWishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden("admin role required".into()));
    }
    if req.item.trim().is_empty() {
        return Err(ApiError::BadRequest("wish item is required".into()));
    }
    if req.quantity == 0 {
        return Err(ApiError::BadRequest("quantity must be at least 1".into()));
    }

    let db = state.db.clone();
    let cid = req.child_id.to_string();
    let child = blocking(move || db.get_child(&cid))
        .await?
        .ok_or(ApiError::NotFound("child"))?;

    // The wish must belong to a child of this admin's orphanage
    let db = state.db.clone();
    let oid = child.orphanage_id.clone();
    let orphanage = blocking(move || db.get_orphanage(&oid))
        .await?
        .ok_or(ApiError::NotFound("orphanage"))?;
    if orphanage.admin_id != claims.sub.to_string() {
        return Err(ApiError::Forbidden(
            "only the owning admin can create wishes for this child".into(),
        ));
    }

    let row = WishRow {
        id: Uuid::new_v4().to_string(),
        child_id: child.id.clone(),
        child_name: child.name.clone(),
        orphanage_id: child.orphanage_id.clone(),
        item: req.item,
        description: req.description,
        quantity: req.quantity,
        status: WishStatus::Pending.as_str().into(),
        donor_id: None,
        donor_name: None,
        created_at: String::new(),
    };

    let db = state.db.clone();
    let id = row.id.clone();
    let row = blocking(move || {
        db.create_wish(&row)?;
        db.get_wish(&id)
    })
    .await?
    .ok_or(ApiError::NotFound("wish"))?;

    Ok((StatusCode::CREATED, Json(convert::wish(row))))
}

pub async fn list_wishes(
    State(state): State<AppState>,
    Query(query): Query<WishQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let rows = blocking(move || {
        db.list_wishes(
            query.orphanage_id.map(|u| u.to_string()).as_deref(),
            query.status.map(|s| s.as_str()),
        )
    })
    .await?;

    let wishes: Vec<_> = rows.into_iter().map(convert::wish).collect();
    Ok(Json(wishes))
}

/// A donor claims a wish. First claim wins; everyone else gets a conflict.
pub async fn claim_wish(
    State(state): State<AppState>,
    Path(wish_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role != Role::Donor {
        return Err(ApiError::Forbidden("donor role required".into()));
    }

    let db = state.db.clone();
    let id = wish_id.to_string();
    let donor_id = claims.sub.to_string();
    let donor_name = claims.name.clone();
    let (claimed, row) = blocking(move || {
        let claimed = db.claim_wish(&id, &donor_id, &donor_name)?;
        let row = db.get_wish(&id)?;
        Ok((claimed, row))
    })
    .await?;

    let row = row.ok_or(ApiError::NotFound("wish"))?;
    if !claimed {
        return Err(ApiError::Conflict("wish has already been claimed".into()));
    }

    Ok(Json(convert::wish(row)))
}

pub async fn update_wish_status(
    State(state): State<AppState>,
    Path(wish_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateWishStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let id = wish_id.to_string();
    let row = blocking(move || db.get_wish(&id))
        .await?
        .ok_or(ApiError::NotFound("wish"))?;

    let caller = claims.sub.to_string();
    let allowed = match claims.role {
        Role::Admin => {
            let db = state.db.clone();
            let oid = row.orphanage_id.clone();
            let orphanage = blocking(move || db.get_orphanage(&oid))
                .await?
                .ok_or(ApiError::NotFound("orphanage"))?;
            orphanage.admin_id == caller
        }
        // The claiming donor may mark their wish fulfilled
        Role::Donor => {
            row.donor_id.as_deref() == Some(caller.as_str())
                && req.status == WishStatus::Fulfilled
        }
        Role::Volunteer => false,
    };
    if !allowed {
        return Err(ApiError::Forbidden(
            "not allowed to change this wish".into(),
        ));
    }

    let db = state.db.clone();
    let id = wish_id.to_string();
    let status = req.status;
    let row = blocking(move || {
        db.set_wish_status(&id, status.as_str())?;
        db.get_wish(&id)
    })
    .await?
    .ok_or(ApiError::NotFound("wish"))?;

    Ok(Json(convert::wish(row)))
}
