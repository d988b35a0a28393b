use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use hearth_db::models::PaymentRow;
use hearth_types::api::{Claims, InitiatePaymentRequest, InitiatePaymentResponse};
use hearth_types::models::{PaymentKind, PaymentProvider, PaymentStatus, Role};

use crate::auth::AppState;
use crate::convert;
use crate::error::{blocking, ApiError};
use crate::gateway_client::ChargeRequest;

/// `POST /payments` — a plain donation to an orphanage.
pub async fn initiate_donation(
    state: State<AppState>,
    claims: Extension<Claims>,
    req: Json<InitiatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    initiate(state, claims, req, PaymentKind::Donation).await
}

/// `POST /sponsorships` — a commitment to a specific child.
pub async fn initiate_sponsorship(
    state: State<AppState>,
    claims: Extension<Claims>,
    req: Json<InitiatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    initiate(state, claims, req, PaymentKind::Sponsorship).await
}

/// Shared flow: record the payment as `pending`, then hand off to the
/// gateway. Only the verify step ever flips the stored status, so a failed
/// hand-off leaves a pending row behind for a later retry by the donor.
async fn initiate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<InitiatePaymentRequest>,
    kind: PaymentKind,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role != Role::Donor {
        return Err(ApiError::Forbidden("donor role required".into()));
    }
    if req.amount <= 0 {
        return Err(ApiError::BadRequest("amount must be positive".into()));
    }

    let db = state.db.clone();
    let oid = req.orphanage_id.to_string();
    blocking(move || db.get_orphanage(&oid))
        .await?
        .ok_or(ApiError::NotFound("orphanage"))?;

    match kind {
        PaymentKind::Sponsorship => {
            let child_id = req
                .child_id
                .ok_or_else(|| ApiError::BadRequest("sponsorship requires a child".into()))?;
            let db = state.db.clone();
            let cid = child_id.to_string();
            let child = blocking(move || db.get_child(&cid))
                .await?
                .ok_or(ApiError::NotFound("child"))?;
            if child.orphanage_id != req.orphanage_id.to_string() {
                return Err(ApiError::BadRequest(
                    "child does not belong to that orphanage".into(),
                ));
            }
        }
        PaymentKind::Donation => {
            if req.child_id.is_some() {
                return Err(ApiError::BadRequest(
                    "donations are not tied to a child; use a sponsorship".into(),
                ));
            }
        }
    }

    // The donor's email goes to the gateway as the customer identity
    let db = state.db.clone();
    let donor_id = claims.sub.to_string();
    let donor = blocking(move || db.get_user_by_id(&donor_id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let reference = Uuid::new_v4().to_string();
    let row = PaymentRow {
        id: Uuid::new_v4().to_string(),
        reference: reference.clone(),
        kind: kind.as_str().into(),
        donor_id: claims.sub.to_string(),
        orphanage_id: req.orphanage_id.to_string(),
        child_id: req.child_id.map(|u| u.to_string()),
        amount: req.amount,
        currency: req.currency.clone(),
        purpose: req.purpose.clone(),
        frequency: req.frequency.clone(),
        provider: req.provider.as_str().into(),
        status: PaymentStatus::Pending.as_str().into(),
        created_at: String::new(),
    };

    let db = state.db.clone();
    blocking(move || db.insert_payment(&row)).await?;

    let payment_url = state
        .payments
        .initiate(
            req.provider,
            &ChargeRequest {
                email: &donor.email,
                amount: req.amount,
                currency: &req.currency,
                reference: &reference,
                description: req.purpose.as_deref(),
            },
        )
        .await
        .map_err(|e| ApiError::Gateway(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(InitiatePaymentResponse {
            reference,
            payment_url,
        }),
    ))
}

/// `GET /payments/verify/{reference}` — confirm final status with the
/// gateway and persist the flip.
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let r = reference.clone();
    let row = blocking(move || db.payment_by_reference(&r))
        .await?
        .ok_or(ApiError::NotFound("payment"))?;

    if row.donor_id != claims.sub.to_string() && claims.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "only the donor or an admin can verify this payment".into(),
        ));
    }

    // Already settled: report as-is without another gateway round trip
    if row.status != PaymentStatus::Pending.as_str() {
        return Ok(Json(convert::payment_response(row)));
    }

    let provider = PaymentProvider::parse(&row.provider)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("corrupt provider '{}'", row.provider)))?;
    let verdict = state
        .payments
        .verify(provider, &reference)
        .await
        .map_err(|e| ApiError::Gateway(e.to_string()))?;

    let db = state.db.clone();
    let r = reference.clone();
    let row = blocking(move || {
        if verdict != PaymentStatus::Pending {
            db.set_payment_status(&r, verdict.as_str())?;
        }
        db.payment_by_reference(&r)
    })
    .await?
    .ok_or(ApiError::NotFound("payment"))?;

    Ok(Json(convert::payment_response(row)))
}

/// `GET /payments` — donors see their own history, admins the payments
/// received by their orphanage.
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let caller = claims.sub.to_string();
    let rows = match claims.role {
        Role::Donor => blocking(move || db.payments_by_donor(&caller)).await?,
        Role::Admin => {
            blocking(move || {
                let orphanage_ids: Vec<String> = db
                    .orphanages_by_admin(&caller)?
                    .into_iter()
                    .map(|o| o.id)
                    .collect();
                db.payments_for_orphanages(&orphanage_ids)
            })
            .await?
        }
        Role::Volunteer => {
            return Err(ApiError::Forbidden(
                "volunteers have no payment history".into(),
            ))
        }
    };

    let payments: Vec<_> = rows.into_iter().map(convert::payment_response).collect();
    Ok(Json(payments))
}
