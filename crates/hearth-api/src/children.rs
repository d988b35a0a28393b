use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use hearth_db::models::{ChildAdmission, ChildDocumentRow, ChildRow};
use hearth_types::api::{AddDocumentRequest, Claims, CreateChildRequest};
use hearth_types::models::Role;

use crate::auth::AppState;
use crate::convert;
use crate::error::{blocking, ApiError};

pub async fn create_child(
    State(state): State<AppState>,
    Path(orphanage_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChildRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden("admin role required".into()));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("child name is required".into()));
    }

    let db = state.db.clone();
    let oid = orphanage_id.to_string();
    let orphanage = blocking(move || db.get_orphanage(&oid))
        .await?
        .ok_or(ApiError::NotFound("orphanage"))?;

    if orphanage.admin_id != claims.sub.to_string() {
        return Err(ApiError::Forbidden(
            "only the owning admin can add children".into(),
        ));
    }

    let row = ChildRow {
        id: Uuid::new_v4().to_string(),
        orphanage_id: orphanage_id.to_string(),
        name: req.name,
        dob: req.dob,
        gender: req.gender,
        photo_url: req.photo_url,
        created_at: String::new(),
    };

    let db = state.db.clone();
    let id = row.id.clone();
    let (admission, row) = blocking(move || {
        let admission = db.insert_child(&row)?;
        let row = db.get_child(&id)?;
        Ok((admission, row))
    })
    .await?;

    match admission {
        ChildAdmission::Admitted => {
            let row = row.ok_or(ApiError::NotFound("child"))?;
            Ok((StatusCode::CREATED, Json(convert::child(row, vec![]))))
        }
        ChildAdmission::CapacityReached => Err(ApiError::Conflict(
            "orphanage is at its declared capacity".into(),
        )),
        ChildAdmission::OrphanageNotFound => Err(ApiError::NotFound("orphanage")),
    }
}

pub async fn list_children(
    State(state): State<AppState>,
    Path(orphanage_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let oid = orphanage_id.to_string();
    let (rows, docs) = blocking(move || {
        let rows = db.children_of(&oid)?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let docs = db.documents_for_children(&ids)?;
        Ok((rows, docs))
    })
    .await?;

    // Group documents by child
    let mut by_child: HashMap<String, Vec<ChildDocumentRow>> = HashMap::new();
    for doc in docs {
        by_child.entry(doc.child_id.clone()).or_default().push(doc);
    }

    let children: Vec<_> = rows
        .into_iter()
        .map(|row| {
            let docs = by_child.remove(&row.id).unwrap_or_default();
            convert::child(row, docs)
        })
        .collect();

    Ok(Json(children))
}

pub async fn get_child(
    State(state): State<AppState>,
    Path(child_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let id = child_id.to_string();
    let (row, docs) = blocking(move || {
        let row = db.get_child(&id)?;
        let docs = db.documents_for_children(&[id])?;
        Ok((row, docs))
    })
    .await?;

    let row = row.ok_or(ApiError::NotFound("child"))?;
    Ok(Json(convert::child(row, docs)))
}

pub async fn add_document(
    State(state): State<AppState>,
    Path(child_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden("admin role required".into()));
    }

    let db = state.db.clone();
    let cid = child_id.to_string();
    let child = blocking(move || db.get_child(&cid))
        .await?
        .ok_or(ApiError::NotFound("child"))?;

    let db = state.db.clone();
    let admin_id = claims.sub.to_string();
    let oid = child.orphanage_id.clone();
    let orphanage = blocking(move || db.get_orphanage(&oid))
        .await?
        .ok_or(ApiError::NotFound("orphanage"))?;
    if orphanage.admin_id != admin_id {
        return Err(ApiError::Forbidden(
            "only the owning admin can attach documents".into(),
        ));
    }

    let row = ChildDocumentRow {
        id: Uuid::new_v4().to_string(),
        child_id: child_id.to_string(),
        name: req.name,
        doc_type: req.doc_type,
        url: req.url,
    };

    let db = state.db.clone();
    let doc = blocking(move || {
        db.add_child_document(&row)?;
        Ok(row)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(convert::child_document(doc))))
}
