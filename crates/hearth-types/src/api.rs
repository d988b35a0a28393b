use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    LastMessage, PaymentKind, PaymentProvider, PaymentStatus, Role, SosStatus, WishStatus,
};

// -- JWT Claims --

/// JWT claims shared across hearth-api (REST middleware) and hearth-gateway
/// (WebSocket authentication). Canonical definition lives here in
/// hearth-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub display_name: String,
    pub role: Role,
    pub token: String,
}

// -- Profiles --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    /// Volunteers link themselves to an orphanage here.
    pub orphanage_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAccountStatusRequest {
    pub status: String,
}

// -- Orphanages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrphanageRequest {
    pub name: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub description: Option<String>,
    pub children_count: u32,
    #[serde(default)]
    pub needs: Vec<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrphanageRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub children_count: Option<u32>,
    pub needs: Option<Vec<String>>,
    pub photo_url: Option<String>,
}

// -- Children --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChildRequest {
    pub name: String,
    pub dob: String,
    pub gender: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddDocumentRequest {
    pub name: String,
    pub doc_type: String,
    /// Object-storage URL; the upload itself happens out of band.
    pub url: String,
}

// -- Wishes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateWishRequest {
    pub child_id: Uuid,
    pub item: String,
    pub description: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateWishStatusRequest {
    pub status: WishStatus,
}

// -- Payments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitiatePaymentRequest {
    pub orphanage_id: Uuid,
    /// Sponsorships name a child; plain donations do not.
    pub child_id: Option<Uuid>,
    /// Minor currency units (kobo, cents).
    pub amount: i64,
    pub currency: String,
    pub purpose: Option<String>,
    pub frequency: Option<String>,
    pub provider: PaymentProvider,
}

#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    pub reference: String,
    /// Redirect URL from the gateway where the donor completes payment.
    pub payment_url: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub reference: String,
    pub kind: PaymentKind,
    pub donor_id: Uuid,
    pub orphanage_id: Uuid,
    pub child_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
    pub provider: PaymentProvider,
    pub status: PaymentStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// -- Contacts / chat --

/// A counterpart user the caller is allowed to message, decorated for the
/// contact-list pane.
#[derive(Debug, Clone, Serialize)]
pub struct ContactResponse {
    pub user_id: Uuid,
    pub display_name: String,
    pub role: Role,
    pub photo_url: Option<String>,
    /// Set when the contact was discovered through an orphanage relationship.
    pub orphanage_name: Option<String>,
    pub online: bool,
    pub last_seen: Option<chrono::DateTime<chrono::Utc>>,
    pub conversation_id: Uuid,
    pub last_message: Option<LastMessage>,
    pub unread_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub body: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub read_by: Vec<Uuid>,
}

// -- SOS --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSosRequest {
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
    pub message: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSosStatusRequest {
    pub status: SosStatus,
}
