//! End-to-end flow at the store/resolver layer: a donor pays an orphanage,
//! discovers its admin as a contact, and the first message round-trips with
//! correct unread/read accounting.

use hearth_api::contacts::resolve_contacts;
use hearth_db::models::{MessageRow, OrphanageRow, PaymentRow, UserRow};
use hearth_db::{now_ts, Database};

fn setup() -> Database {
    Database::open_in_memory().unwrap()
}

fn add_user(db: &Database, id: &str, role: &str, name: &str) {
    db.create_user(id, &format!("{id}@example.org"), "hash", name, role, None)
        .unwrap();
}

fn user(db: &Database, id: &str) -> UserRow {
    db.get_user_by_id(id).unwrap().unwrap()
}

#[test]
fn donor_payment_unlocks_admin_chat() {
    let db = setup();

    add_user(&db, "donor-1", "donor", "Dara");
    add_user(&db, "admin-1", "admin", "Amaka");
    db.create_orphanage(&OrphanageRow {
        id: "orph-1".into(),
        name: "Sunrise Home".into(),
        address: "5 Palm St".into(),
        city: "Ibadan".into(),
        country: "NG".into(),
        description: None,
        children_count: 12,
        needs: "[\"beds\"]".into(),
        photo_url: None,
        admin_id: "admin-1".into(),
        created_at: String::new(),
    })
    .unwrap();

    // Donor pays; the verify step settles it
    db.insert_payment(&PaymentRow {
        id: "pay-1".into(),
        reference: "ref-1".into(),
        kind: "donation".into(),
        donor_id: "donor-1".into(),
        orphanage_id: "orph-1".into(),
        child_id: None,
        amount: 250_000,
        currency: "NGN".into(),
        purpose: Some("school fees".into()),
        frequency: None,
        provider: "paystack".into(),
        status: "pending".into(),
        created_at: String::new(),
    })
    .unwrap();
    assert!(db.set_payment_status("ref-1", "successful").unwrap());

    // The donor opens chat: the admin appears, decorated with the orphanage
    let resolved = resolve_contacts(&db, &user(&db, "donor-1")).unwrap();
    assert_eq!(resolved.len(), 1);
    let admin_contact = &resolved[0];
    assert_eq!(admin_contact.contact.id, "admin-1");
    assert_eq!(admin_contact.contact.role, "admin");
    assert_eq!(
        admin_contact.contact.orphanage_name.as_deref(),
        Some("Sunrise Home")
    );
    assert_eq!(admin_contact.unread_count, 0);

    let conversation_id = admin_contact.conversation.id.clone();

    // Donor sends "Hello"
    db.insert_message(&MessageRow {
        id: "msg-1".into(),
        conversation_id: conversation_id.clone(),
        sender_id: "donor-1".into(),
        receiver_id: "admin-1".into(),
        body: "Hello".into(),
        created_at: now_ts(),
    })
    .unwrap();

    // The admin's side sees exactly one new message, unread until opened
    let from_admin = resolve_contacts(&db, &user(&db, "admin-1")).unwrap();
    let donor_entry = from_admin
        .iter()
        .find(|r| r.contact.id == "donor-1")
        .expect("donor missing from admin contacts");
    assert_eq!(donor_entry.conversation.id, conversation_id);
    assert_eq!(donor_entry.unread_count, 1);
    assert_eq!(
        donor_entry.conversation.last_message_text.as_deref(),
        Some("Hello")
    );
    assert_eq!(
        donor_entry.conversation.last_message_sender_id.as_deref(),
        Some("donor-1")
    );

    let history = db.messages_in(&conversation_id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].body, "Hello");
    assert_eq!(history[0].sender_id, "donor-1");

    // Admin opens the conversation: the message flips to read exactly once
    let newly_read = db
        .mark_conversation_read(&conversation_id, "admin-1", &now_ts())
        .unwrap();
    assert_eq!(newly_read, vec!["msg-1".to_string()]);
    assert!(db.unread_counts_for("admin-1").unwrap().is_empty());

    let reads = db.reads_for_messages(&["msg-1".to_string()]).unwrap();
    assert_eq!(reads, vec![("msg-1".to_string(), "admin-1".to_string())]);

    // Resolution stays idempotent after traffic
    let again = resolve_contacts(&db, &user(&db, "donor-1")).unwrap();
    assert_eq!(again[0].conversation.id, conversation_id);
}
