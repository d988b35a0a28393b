//! Row-to-API conversions. Corrupt stored values are logged and defaulted
//! rather than failing a whole listing.

use tracing::warn;
use uuid::Uuid;

use hearth_db::models::{
    ChildDocumentRow, ChildRow, ConversationRow, MessageRow, OrphanageRow, PaymentRow,
    SosAlertRow, UserRow, WishRow,
};
use hearth_types::api::{MessageResponse, PaymentResponse};
use hearth_types::models::{
    AccountStatus, Child, ChildDocument, LastMessage, Orphanage, Payment, PaymentKind,
    PaymentProvider, PaymentStatus, Role, SosAlert, SosStatus, UserProfile, Wish, WishStatus,
};

pub(crate) fn parse_uuid(s: &str, what: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, s, e);
        Uuid::default()
    })
}

pub(crate) fn parse_opt_uuid(s: Option<&str>, what: &str) -> Option<Uuid> {
    s.map(|s| parse_uuid(s, what))
}

pub(crate) fn parse_ts(s: &str) -> chrono::DateTime<chrono::Utc> {
    s.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            // SQLite default timestamps are "YYYY-MM-DD HH:MM:SS" without a
            // timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", s, e);
            chrono::DateTime::default()
        })
}

pub(crate) fn parse_opt_ts(s: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
    s.map(parse_ts)
}

pub(crate) fn parse_role(s: &str) -> Role {
    Role::parse(s).unwrap_or_else(|| {
        warn!("Corrupt role '{}'", s);
        Role::Donor
    })
}

pub(crate) fn profile(row: UserRow) -> UserProfile {
    let status = match row.status.as_str() {
        "dismissed" => AccountStatus::Dismissed,
        _ => AccountStatus::Active,
    };
    UserProfile {
        id: parse_uuid(&row.id, "user id"),
        email: row.email,
        display_name: row.display_name,
        role: parse_role(&row.role),
        phone: row.phone,
        photo_url: row.photo_url,
        orphanage_id: parse_opt_uuid(row.orphanage_id.as_deref(), "orphanage_id"),
        status,
        online: row.online,
        last_seen: parse_opt_ts(row.last_seen.as_deref()),
        created_at: parse_ts(&row.created_at),
    }
}

pub(crate) fn orphanage(row: OrphanageRow) -> Orphanage {
    let needs: Vec<String> = serde_json::from_str(&row.needs).unwrap_or_else(|e| {
        warn!("Corrupt needs list on orphanage '{}': {}", row.id, e);
        vec![]
    });
    Orphanage {
        id: parse_uuid(&row.id, "orphanage id"),
        name: row.name,
        address: row.address,
        city: row.city,
        country: row.country,
        description: row.description,
        children_count: row.children_count,
        needs,
        photo_url: row.photo_url,
        admin_id: parse_uuid(&row.admin_id, "admin id"),
        created_at: parse_ts(&row.created_at),
    }
}

pub(crate) fn child(row: ChildRow, documents: Vec<ChildDocumentRow>) -> Child {
    Child {
        id: parse_uuid(&row.id, "child id"),
        orphanage_id: parse_uuid(&row.orphanage_id, "orphanage id"),
        name: row.name,
        dob: row.dob,
        gender: row.gender,
        photo_url: row.photo_url,
        documents: documents.into_iter().map(child_document).collect(),
        created_at: parse_ts(&row.created_at),
    }
}

pub(crate) fn child_document(row: ChildDocumentRow) -> ChildDocument {
    ChildDocument {
        id: parse_uuid(&row.id, "document id"),
        name: row.name,
        doc_type: row.doc_type,
        url: row.url,
    }
}

pub(crate) fn wish(row: WishRow) -> Wish {
    Wish {
        id: parse_uuid(&row.id, "wish id"),
        child_id: parse_uuid(&row.child_id, "child id"),
        child_name: row.child_name,
        orphanage_id: parse_uuid(&row.orphanage_id, "orphanage id"),
        item: row.item,
        description: row.description,
        quantity: row.quantity,
        status: WishStatus::parse(&row.status).unwrap_or_else(|| {
            warn!("Corrupt wish status '{}' on '{}'", row.status, row.id);
            WishStatus::Pending
        }),
        donor_id: parse_opt_uuid(row.donor_id.as_deref(), "donor id"),
        donor_name: row.donor_name,
        created_at: parse_ts(&row.created_at),
    }
}

pub(crate) fn payment(row: PaymentRow) -> Payment {
    Payment {
        id: parse_uuid(&row.id, "payment id"),
        reference: row.reference,
        kind: match row.kind.as_str() {
            "sponsorship" => PaymentKind::Sponsorship,
            _ => PaymentKind::Donation,
        },
        donor_id: parse_uuid(&row.donor_id, "donor id"),
        orphanage_id: parse_uuid(&row.orphanage_id, "orphanage id"),
        child_id: parse_opt_uuid(row.child_id.as_deref(), "child id"),
        amount: row.amount,
        currency: row.currency,
        purpose: row.purpose,
        frequency: row.frequency,
        provider: PaymentProvider::parse(&row.provider).unwrap_or_else(|| {
            warn!("Corrupt provider '{}' on payment '{}'", row.provider, row.id);
            PaymentProvider::Paystack
        }),
        status: PaymentStatus::parse(&row.status).unwrap_or_else(|| {
            warn!("Corrupt status '{}' on payment '{}'", row.status, row.id);
            PaymentStatus::Pending
        }),
        created_at: parse_ts(&row.created_at),
    }
}

pub(crate) fn payment_response(row: PaymentRow) -> PaymentResponse {
    let p = payment(row);
    PaymentResponse {
        id: p.id,
        reference: p.reference,
        kind: p.kind,
        donor_id: p.donor_id,
        orphanage_id: p.orphanage_id,
        child_id: p.child_id,
        amount: p.amount,
        currency: p.currency,
        provider: p.provider,
        status: p.status,
        created_at: p.created_at,
    }
}

pub(crate) fn last_message(row: &ConversationRow) -> Option<LastMessage> {
    match (&row.last_message_text, &row.last_message_sender_id, &row.last_message_at) {
        (Some(text), Some(sender), Some(at)) => Some(LastMessage {
            text: text.clone(),
            sender_id: parse_uuid(sender, "sender id"),
            timestamp: parse_ts(at),
        }),
        _ => None,
    }
}

pub(crate) fn message_response(row: MessageRow, read_by: Vec<Uuid>) -> MessageResponse {
    MessageResponse {
        id: parse_uuid(&row.id, "message id"),
        conversation_id: parse_uuid(&row.conversation_id, "conversation id"),
        sender_id: parse_uuid(&row.sender_id, "sender id"),
        receiver_id: parse_uuid(&row.receiver_id, "receiver id"),
        body: row.body,
        created_at: parse_ts(&row.created_at),
        read_by,
    }
}

pub(crate) fn sos(row: SosAlertRow) -> SosAlert {
    SosAlert {
        id: parse_uuid(&row.id, "sos id"),
        user_id: parse_uuid(&row.user_id, "user id"),
        user_name: row.user_name,
        user_role: parse_role(&row.user_role),
        lat: row.lat,
        lng: row.lng,
        address: row.address,
        message: row.message,
        phone: row.phone,
        status: SosStatus::parse(&row.status).unwrap_or_else(|| {
            warn!("Corrupt sos status '{}' on '{}'", row.status, row.id);
            SosStatus::Active
        }),
        created_at: parse_ts(&row.created_at),
    }
}
