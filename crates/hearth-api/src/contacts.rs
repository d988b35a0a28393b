//! Contact resolution: who the signed-in user is allowed to message, and
//! the conversation record for each pair.
//!
//! Visibility rules by role:
//! - donors see the admins of every orphanage they have given to, plus the
//!   other donors of those orphanages;
//! - admins see all other admins, plus the donors and volunteers tied to
//!   their own orphanage;
//! - volunteers see the admins of the orphanage they joined.
//!
//! Each resolved pair is backed by exactly one conversation row, found or
//! created through the canonical sorted-pair key.

use std::collections::{HashMap, HashSet};

use axum::{extract::State, response::IntoResponse, Extension, Json};

use hearth_db::models::{ContactRow, ConversationRow, UserRow};
use hearth_db::Database;
use hearth_types::api::{Claims, ContactResponse};
use hearth_types::models::Role;

use crate::auth::AppState;
use crate::convert;
use crate::error::{blocking, ApiError};

/// A contact plus its conversation and unread decoration.
pub struct ResolvedContact {
    pub contact: ContactRow,
    pub conversation: ConversationRow,
    pub unread_count: u32,
}

/// Discover the caller's contacts and attach a conversation to each.
///
/// Runs entirely on blocking DB queries; callers wrap it in spawn_blocking.
pub fn resolve_contacts(db: &Database, user: &UserRow) -> anyhow::Result<Vec<ResolvedContact>> {
    let role = Role::parse(&user.role)
        .ok_or_else(|| anyhow::anyhow!("unknown role '{}' for user {}", user.role, user.id))?;

    let discovered: Vec<ContactRow> = match role {
        Role::Donor => {
            let orphanage_ids = db.donor_orphanage_ids(&user.id)?;
            let mut out = db.admins_of_orphanages(&orphanage_ids)?;
            out.extend(db.fellow_donors_of_orphanages(&orphanage_ids, &user.id)?);
            out
        }
        Role::Admin => {
            let orphanage_ids: Vec<String> = db
                .orphanages_by_admin(&user.id)?
                .into_iter()
                .map(|o| o.id)
                .collect();
            let mut out = db.other_admins(&user.id)?;
            out.extend(db.donors_of_orphanages(&orphanage_ids)?);
            out.extend(db.volunteers_of_orphanages(&orphanage_ids)?);
            out
        }
        Role::Volunteer => {
            let orphanage_ids: Vec<String> =
                user.orphanage_id.clone().into_iter().collect();
            db.admins_of_orphanages(&orphanage_ids)?
        }
    };

    // Deduplicate by user id — a counterpart reachable through several
    // relationships still appears exactly once. First discovery wins, so an
    // admin surfaced with their orphanage name keeps it.
    let mut seen: HashSet<String> = HashSet::new();
    let mut contacts: Vec<ContactRow> = Vec::new();
    for contact in discovered {
        if contact.id == user.id {
            continue;
        }
        if seen.insert(contact.id.clone()) {
            contacts.push(contact);
        }
    }

    let unread: HashMap<String, u32> = db.unread_counts_for(&user.id)?.into_iter().collect();

    let mut resolved = Vec::with_capacity(contacts.len());
    for contact in contacts {
        let conversation = db.find_or_create_conversation(&user.id, &contact.id)?;
        let unread_count = unread.get(&conversation.id).copied().unwrap_or(0);
        resolved.push(ResolvedContact {
            contact,
            conversation,
            unread_count,
        });
    }

    Ok(resolved)
}

/// `GET /contacts` — the contact-list pane for every role.
pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let caller = claims.sub.to_string();
    let resolved = blocking(move || {
        let user = db
            .get_user_by_id(&caller)?
            .ok_or_else(|| anyhow::anyhow!("no profile for user {caller}"))?;
        resolve_contacts(&db, &user)
    })
    .await?;

    let contacts: Vec<ContactResponse> = resolved
        .into_iter()
        .map(|r| ContactResponse {
            user_id: convert::parse_uuid(&r.contact.id, "user id"),
            display_name: r.contact.display_name,
            role: convert::parse_role(&r.contact.role),
            photo_url: r.contact.photo_url,
            orphanage_name: r.contact.orphanage_name,
            online: r.contact.online,
            last_seen: convert::parse_opt_ts(r.contact.last_seen.as_deref()),
            conversation_id: convert::parse_uuid(&r.conversation.id, "conversation id"),
            last_message: convert::last_message(&r.conversation),
            unread_count: r.unread_count,
        })
        .collect();

    Ok(Json(contacts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_db::models::{OrphanageRow, PaymentRow};

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_user(db: &Database, id: &str, role: &str) {
        db.create_user(
            id,
            &format!("{id}@example.org"),
            "hash",
            &format!("user-{id}"),
            role,
            None,
        )
        .unwrap();
    }

    fn add_orphanage(db: &Database, id: &str, admin_id: &str) {
        db.create_orphanage(&OrphanageRow {
            id: id.into(),
            name: format!("home-{id}"),
            address: "2 River Ln".into(),
            city: "Accra".into(),
            country: "GH".into(),
            description: None,
            children_count: 10,
            needs: "[]".into(),
            photo_url: None,
            admin_id: admin_id.into(),
            created_at: String::new(),
        })
        .unwrap();
    }

    fn add_payment(db: &Database, id: &str, donor: &str, orphanage: &str, kind: &str) {
        db.insert_payment(&PaymentRow {
            id: id.into(),
            reference: format!("ref-{id}"),
            kind: kind.into(),
            donor_id: donor.into(),
            orphanage_id: orphanage.into(),
            child_id: None,
            amount: 10_000,
            currency: "NGN".into(),
            purpose: None,
            frequency: None,
            provider: "paystack".into(),
            status: "successful".into(),
            created_at: String::new(),
        })
        .unwrap();
    }

    fn user(db: &Database, id: &str) -> UserRow {
        db.get_user_by_id(id).unwrap().unwrap()
    }

    fn contact_ids(resolved: &[ResolvedContact]) -> Vec<&str> {
        let mut ids: Vec<&str> = resolved.iter().map(|r| r.contact.id.as_str()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn donor_sees_admin_once_despite_many_relationships() {
        let db = db();
        add_user(&db, "admin1", "admin");
        add_user(&db, "d1", "donor");
        add_orphanage(&db, "o1", "admin1");
        // Donation and sponsorship to the same orphanage
        add_payment(&db, "p1", "d1", "o1", "donation");
        add_payment(&db, "p2", "d1", "o1", "sponsorship");

        let resolved = resolve_contacts(&db, &user(&db, "d1")).unwrap();
        assert_eq!(contact_ids(&resolved), ["admin1"]);
        assert_eq!(
            resolved[0].contact.orphanage_name.as_deref(),
            Some("home-o1")
        );
        assert_eq!(resolved[0].contact.role, "admin");
    }

    #[test]
    fn donor_sees_fellow_donors_but_not_self() {
        let db = db();
        add_user(&db, "admin1", "admin");
        add_user(&db, "d1", "donor");
        add_user(&db, "d2", "donor");
        add_user(&db, "d3", "donor");
        add_orphanage(&db, "o1", "admin1");
        add_orphanage_payment_set(&db);

        let resolved = resolve_contacts(&db, &user(&db, "d1")).unwrap();
        assert_eq!(contact_ids(&resolved), ["admin1", "d2"]);
    }

    fn add_orphanage_payment_set(db: &Database) {
        // d1 and d2 give to o1; d3 gives nowhere
        add_payment(db, "p1", "d1", "o1", "donation");
        add_payment(db, "p2", "d2", "o1", "donation");
    }

    #[test]
    fn admin_sees_other_admins_donors_and_volunteers() {
        let db = db();
        add_user(&db, "admin1", "admin");
        add_user(&db, "admin2", "admin");
        add_user(&db, "d1", "donor");
        add_user(&db, "v1", "volunteer");
        add_orphanage(&db, "o1", "admin1");
        add_payment(&db, "p1", "d1", "o1", "donation");
        db.update_profile("v1", None, None, None, Some("o1")).unwrap();

        let resolved = resolve_contacts(&db, &user(&db, "admin1")).unwrap();
        assert_eq!(contact_ids(&resolved), ["admin2", "d1", "v1"]);
    }

    #[test]
    fn volunteer_sees_admin_of_joined_orphanage() {
        let db = db();
        add_user(&db, "admin1", "admin");
        add_user(&db, "v1", "volunteer");
        add_orphanage(&db, "o1", "admin1");
        db.update_profile("v1", None, None, None, Some("o1")).unwrap();

        let resolved = resolve_contacts(&db, &user(&db, "v1")).unwrap();
        assert_eq!(contact_ids(&resolved), ["admin1"]);
    }

    #[test]
    fn unlinked_volunteer_has_no_contacts() {
        let db = db();
        add_user(&db, "v1", "volunteer");
        let resolved = resolve_contacts(&db, &user(&db, "v1")).unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn repeated_resolution_reuses_the_same_conversation() {
        let db = db();
        add_user(&db, "admin1", "admin");
        add_user(&db, "d1", "donor");
        add_orphanage(&db, "o1", "admin1");
        add_payment(&db, "p1", "d1", "o1", "donation");

        let first = resolve_contacts(&db, &user(&db, "d1")).unwrap();
        let second = resolve_contacts(&db, &user(&db, "d1")).unwrap();
        assert_eq!(first[0].conversation.id, second[0].conversation.id);

        // The admin resolving from their side lands on the same room
        let from_admin = resolve_contacts(&db, &user(&db, "admin1")).unwrap();
        let donor_entry = from_admin
            .iter()
            .find(|r| r.contact.id == "d1")
            .expect("donor missing from admin contacts");
        assert_eq!(donor_entry.conversation.id, first[0].conversation.id);
    }
}
