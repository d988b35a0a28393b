use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Donor,
    Volunteer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Donor => "donor",
            Role::Volunteer => "volunteer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "donor" => Some(Role::Donor),
            "volunteer" => Some(Role::Volunteer),
            _ => None,
        }
    }
}

/// Accounts are never hard-deleted; a dismissed volunteer keeps their
/// history but loses access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Dismissed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Dismissed => "dismissed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    /// Orphanage a volunteer is linked to. Admins own orphanages via
    /// `Orphanage::admin_id` instead.
    pub orphanage_id: Option<Uuid>,
    pub status: AccountStatus,
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orphanage {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub description: Option<String>,
    /// Declared capacity — child creation is rejected past this count.
    pub children_count: u32,
    pub needs: Vec<String>,
    pub photo_url: Option<String>,
    pub admin_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Child {
    pub id: Uuid,
    pub orphanage_id: Uuid,
    pub name: String,
    pub dob: String,
    pub gender: String,
    pub photo_url: Option<String>,
    pub documents: Vec<ChildDocument>,
    pub created_at: DateTime<Utc>,
}

/// Documents live in external object storage; only the URL is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildDocument {
    pub id: Uuid,
    pub name: String,
    pub doc_type: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WishStatus {
    Pending,
    InProgress,
    Fulfilled,
}

impl WishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WishStatus::Pending => "pending",
            WishStatus::InProgress => "in-progress",
            WishStatus::Fulfilled => "fulfilled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(WishStatus::Pending),
            "in-progress" => Some(WishStatus::InProgress),
            "fulfilled" => Some(WishStatus::Fulfilled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wish {
    pub id: Uuid,
    pub child_id: Uuid,
    /// Denormalized so wish listings never need a child lookup.
    pub child_name: String,
    pub orphanage_id: Uuid,
    pub item: String,
    pub description: Option<String>,
    pub quantity: u32,
    pub status: WishStatus,
    pub donor_id: Option<Uuid>,
    pub donor_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Donation,
    Sponsorship,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Donation => "donation",
            PaymentKind::Sponsorship => "sponsorship",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Successful => "successful",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "successful" => Some(PaymentStatus::Successful),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Paystack,
    Flutterwave,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Paystack => "paystack",
            PaymentProvider::Flutterwave => "flutterwave",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paystack" => Some(PaymentProvider::Paystack),
            "flutterwave" => Some(PaymentProvider::Flutterwave),
            _ => None,
        }
    }
}

/// A donation or sponsorship record. Created `pending` before the gateway
/// hand-off; only the verify step flips the status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub reference: String,
    pub kind: PaymentKind,
    pub donor_id: Uuid,
    pub orphanage_id: Uuid,
    pub child_id: Option<Uuid>,
    /// Minor currency units (kobo, cents).
    pub amount: i64,
    pub currency: String,
    pub purpose: Option<String>,
    pub frequency: Option<String>,
    pub provider: PaymentProvider,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Last-message summary kept on a conversation, shown in the contact list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessage {
    pub text: String,
    pub sender_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SosStatus {
    Active,
    InProgress,
    Resolved,
    FalseAlarm,
}

impl SosStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SosStatus::Active => "active",
            SosStatus::InProgress => "in-progress",
            SosStatus::Resolved => "resolved",
            SosStatus::FalseAlarm => "false-alarm",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SosStatus::Active),
            "in-progress" => Some(SosStatus::InProgress),
            "resolved" => Some(SosStatus::Resolved),
            "false-alarm" => Some(SosStatus::FalseAlarm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SosAlert {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_role: Role,
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
    pub message: String,
    pub phone: Option<String>,
    pub status: SosStatus,
    pub created_at: DateTime<Utc>,
}
