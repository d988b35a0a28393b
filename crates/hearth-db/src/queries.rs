use crate::models::{
    ChildAdmission, ChildDocumentRow, ChildRow, ContactRow, ConversationRow, MessageRow,
    OrphanageRow, PaymentRow, SosAlertRow, UserRow, WishRow,
};
use crate::Database;
use anyhow::{anyhow, bail, Result};
use rusqlite::Connection;
use uuid::Uuid;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        display_name: &str,
        role: &str,
        phone: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, display_name, role, phone)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, email, password_hash, display_name, role, phone],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{USER_COLUMNS} WHERE email = ?1"))?
                .query_row([email], user_from_row)
                .optional()
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{USER_COLUMNS} WHERE id = ?1"))?
                .query_row([id], user_from_row)
                .optional()
        })
    }

    /// Partial profile update; absent fields keep their current value.
    pub fn update_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        phone: Option<&str>,
        photo_url: Option<&str>,
        orphanage_id: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET
                     display_name = COALESCE(?2, display_name),
                     phone        = COALESCE(?3, phone),
                     photo_url    = COALESCE(?4, photo_url),
                     orphanage_id = COALESCE(?5, orphanage_id)
                 WHERE id = ?1",
                rusqlite::params![id, display_name, phone, photo_url, orphanage_id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_account_status(&self, id: &str, status: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET status = ?2 WHERE id = ?1",
                rusqlite::params![id, status],
            )?;
            Ok(n > 0)
        })
    }

    /// Presence write. Callers treat failures as advisory (log, never fail
    /// the request).
    pub fn set_presence(&self, id: &str, online: bool, last_seen: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET online = ?2, last_seen = ?3 WHERE id = ?1",
                rusqlite::params![id, online as i64, last_seen],
            )?;
            Ok(())
        })
    }

    // -- Orphanages --

    pub fn create_orphanage(&self, row: &OrphanageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO orphanages
                     (id, name, address, city, country, description, children_count, needs, photo_url, admin_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    row.id,
                    row.name,
                    row.address,
                    row.city,
                    row.country,
                    row.description,
                    row.children_count,
                    row.needs,
                    row.photo_url,
                    row.admin_id,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_orphanage(&self, id: &str) -> Result<Option<OrphanageRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{ORPHANAGE_COLUMNS} WHERE id = ?1"))?
                .query_row([id], orphanage_from_row)
                .optional()
        })
    }

    pub fn list_orphanages(&self) -> Result<Vec<OrphanageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{ORPHANAGE_COLUMNS} ORDER BY name"))?;
            let rows = stmt
                .query_map([], orphanage_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn orphanages_by_admin(&self, admin_id: &str) -> Result<Vec<OrphanageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{ORPHANAGE_COLUMNS} WHERE admin_id = ?1"))?;
            let rows = stmt
                .query_map([admin_id], orphanage_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_orphanage(
        &self,
        id: &str,
        name: Option<&str>,
        address: Option<&str>,
        city: Option<&str>,
        country: Option<&str>,
        description: Option<&str>,
        children_count: Option<u32>,
        needs: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE orphanages SET
                     name           = COALESCE(?2, name),
                     address        = COALESCE(?3, address),
                     city           = COALESCE(?4, city),
                     country        = COALESCE(?5, country),
                     description    = COALESCE(?6, description),
                     children_count = COALESCE(?7, children_count),
                     needs          = COALESCE(?8, needs),
                     photo_url      = COALESCE(?9, photo_url)
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    name,
                    address,
                    city,
                    country,
                    description,
                    children_count,
                    needs,
                    photo_url
                ],
            )?;
            Ok(n > 0)
        })
    }

    // -- Children --

    /// Capacity-checked insert: the count check and the write happen in one
    /// transaction so a racing insert cannot overshoot the declared capacity.
    pub fn insert_child(&self, row: &ChildRow) -> Result<ChildAdmission> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let capacity: Option<u32> = tx
                .query_row(
                    "SELECT children_count FROM orphanages WHERE id = ?1",
                    [&row.orphanage_id],
                    |r| r.get(0),
                )
                .optional()?;

            let Some(capacity) = capacity else {
                return Ok(ChildAdmission::OrphanageNotFound);
            };

            let current: u32 = tx.query_row(
                "SELECT COUNT(*) FROM children WHERE orphanage_id = ?1",
                [&row.orphanage_id],
                |r| r.get(0),
            )?;

            if current >= capacity {
                // No write happens past this point.
                return Ok(ChildAdmission::CapacityReached);
            }

            tx.execute(
                "INSERT INTO children (id, orphanage_id, name, dob, gender, photo_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    row.id,
                    row.orphanage_id,
                    row.name,
                    row.dob,
                    row.gender,
                    row.photo_url
                ],
            )?;

            tx.commit()?;
            Ok(ChildAdmission::Admitted)
        })
    }

    pub fn get_child(&self, id: &str) -> Result<Option<ChildRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{CHILD_COLUMNS} WHERE id = ?1"))?
                .query_row([id], child_from_row)
                .optional()
        })
    }

    pub fn children_of(&self, orphanage_id: &str) -> Result<Vec<ChildRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{CHILD_COLUMNS} WHERE orphanage_id = ?1 ORDER BY name"
            ))?;
            let rows = stmt
                .query_map([orphanage_id], child_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn add_child_document(&self, row: &ChildDocumentRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO child_documents (id, child_id, name, doc_type, url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![row.id, row.child_id, row.name, row.doc_type, row.url],
            )?;
            Ok(())
        })
    }

    /// Batch-fetch documents for a set of child IDs.
    pub fn documents_for_children(&self, child_ids: &[String]) -> Result<Vec<ChildDocumentRow>> {
        if child_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, child_id, name, doc_type, url FROM child_documents
                 WHERE child_id IN ({})",
                in_placeholders(child_ids.len())
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = child_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(ChildDocumentRow {
                        id: row.get(0)?,
                        child_id: row.get(1)?,
                        name: row.get(2)?,
                        doc_type: row.get(3)?,
                        url: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Wishes --

    pub fn create_wish(&self, row: &WishRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO wishes
                     (id, child_id, child_name, orphanage_id, item, description, quantity, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    row.id,
                    row.child_id,
                    row.child_name,
                    row.orphanage_id,
                    row.item,
                    row.description,
                    row.quantity,
                    row.status,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_wish(&self, id: &str) -> Result<Option<WishRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{WISH_COLUMNS} WHERE id = ?1"))?
                .query_row([id], wish_from_row)
                .optional()
        })
    }

    pub fn list_wishes(
        &self,
        orphanage_id: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<WishRow>> {
        self.with_conn(|conn| {
            let mut sql = format!("{WISH_COLUMNS} WHERE 1=1");
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![];
            if let Some(oid) = &orphanage_id {
                sql.push_str(" AND orphanage_id = ?");
                params.push(oid);
            }
            if let Some(st) = &status {
                sql.push_str(" AND status = ?");
                params.push(st);
            }
            sql.push_str(" ORDER BY created_at DESC");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), wish_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Claim a wish for a donor. The guard `donor_id IS NULL` means exactly
    /// one donor can ever win the claim; returns false if already taken.
    pub fn claim_wish(&self, id: &str, donor_id: &str, donor_name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE wishes SET donor_id = ?2, donor_name = ?3, status = 'in-progress'
                 WHERE id = ?1 AND donor_id IS NULL",
                rusqlite::params![id, donor_id, donor_name],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_wish_status(&self, id: &str, status: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE wishes SET status = ?2 WHERE id = ?1",
                rusqlite::params![id, status],
            )?;
            Ok(n > 0)
        })
    }

    // -- Payments --

    pub fn insert_payment(&self, row: &PaymentRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO payments
                     (id, reference, kind, donor_id, orphanage_id, child_id, amount,
                      currency, purpose, frequency, provider, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    row.id,
                    row.reference,
                    row.kind,
                    row.donor_id,
                    row.orphanage_id,
                    row.child_id,
                    row.amount,
                    row.currency,
                    row.purpose,
                    row.frequency,
                    row.provider,
                    row.status,
                ],
            )?;
            Ok(())
        })
    }

    pub fn payment_by_reference(&self, reference: &str) -> Result<Option<PaymentRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{PAYMENT_COLUMNS} WHERE reference = ?1"))?
                .query_row([reference], payment_from_row)
                .optional()
        })
    }

    pub fn set_payment_status(&self, reference: &str, status: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE payments SET status = ?2 WHERE reference = ?1",
                rusqlite::params![reference, status],
            )?;
            Ok(n > 0)
        })
    }

    pub fn payments_by_donor(&self, donor_id: &str) -> Result<Vec<PaymentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{PAYMENT_COLUMNS} WHERE donor_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([donor_id], payment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn payments_for_orphanages(&self, orphanage_ids: &[String]) -> Result<Vec<PaymentRow>> {
        if orphanage_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let sql = format!(
                "{PAYMENT_COLUMNS} WHERE orphanage_id IN ({}) ORDER BY created_at DESC",
                in_placeholders(orphanage_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = orphanage_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();
            let rows = stmt
                .query_map(params.as_slice(), payment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Distinct orphanages this donor has given to, across donations and
    /// sponsorships. This is the donor's relationship set for contact
    /// resolution — no status filter, a pending payment already counts.
    pub fn donor_orphanage_ids(&self, donor_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT DISTINCT orphanage_id FROM payments WHERE donor_id = ?1")?;
            let rows = stmt
                .query_map([donor_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Contact discovery --

    /// Admins owning any of the given orphanages, with the orphanage name.
    pub fn admins_of_orphanages(&self, orphanage_ids: &[String]) -> Result<Vec<ContactRow>> {
        if orphanage_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT u.id, u.display_name, u.role, u.photo_url, u.online, u.last_seen, o.name
                 FROM orphanages o
                 JOIN users u ON u.id = o.admin_id
                 WHERE o.id IN ({}) AND u.status = 'active'",
                in_placeholders(orphanage_ids.len())
            );
            query_contacts(conn, &sql, orphanage_ids)
        })
    }

    /// Other donors who have given to any of the given orphanages.
    pub fn fellow_donors_of_orphanages(
        &self,
        orphanage_ids: &[String],
        exclude_user: &str,
    ) -> Result<Vec<ContactRow>> {
        if orphanage_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT DISTINCT u.id, u.display_name, u.role, u.photo_url, u.online, u.last_seen, NULL
                 FROM payments p
                 JOIN users u ON u.id = p.donor_id
                 WHERE p.orphanage_id IN ({}) AND u.id != ? AND u.status = 'active'",
                in_placeholders(orphanage_ids.len())
            );
            let mut params: Vec<&dyn rusqlite::types::ToSql> = orphanage_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();
            params.push(&exclude_user);

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), contact_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All other active admins, with their own orphanage's name when they
    /// have one.
    pub fn other_admins(&self, exclude_user: &str) -> Result<Vec<ContactRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.display_name, u.role, u.photo_url, u.online, u.last_seen,
                        MIN(o.name)
                 FROM users u
                 LEFT JOIN orphanages o ON o.admin_id = u.id
                 WHERE u.role = 'admin' AND u.id != ?1 AND u.status = 'active'
                 GROUP BY u.id",
            )?;
            let rows = stmt
                .query_map([exclude_user], contact_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Donors tied to the given orphanages through payment records, with the
    /// shared orphanage's name attached.
    pub fn donors_of_orphanages(&self, orphanage_ids: &[String]) -> Result<Vec<ContactRow>> {
        if orphanage_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT u.id, u.display_name, u.role, u.photo_url, u.online, u.last_seen,
                        MIN(o.name)
                 FROM payments p
                 JOIN users u ON u.id = p.donor_id
                 JOIN orphanages o ON o.id = p.orphanage_id
                 WHERE p.orphanage_id IN ({}) AND u.status = 'active'
                 GROUP BY u.id",
                in_placeholders(orphanage_ids.len())
            );
            query_contacts(conn, &sql, orphanage_ids)
        })
    }

    /// Volunteers linked to the given orphanages via their profile.
    pub fn volunteers_of_orphanages(&self, orphanage_ids: &[String]) -> Result<Vec<ContactRow>> {
        if orphanage_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT u.id, u.display_name, u.role, u.photo_url, u.online, u.last_seen, o.name
                 FROM users u
                 JOIN orphanages o ON o.id = u.orphanage_id
                 WHERE u.role = 'volunteer' AND u.orphanage_id IN ({}) AND u.status = 'active'",
                in_placeholders(orphanage_ids.len())
            );
            query_contacts(conn, &sql, orphanage_ids)
        })
    }

    // -- Conversations --

    /// Find or create the conversation for an unordered user pair. The pair
    /// is canonicalized by sorting, and the UNIQUE constraint on
    /// (participant_lo, participant_hi) guarantees both sides converge on
    /// one row no matter who initiates first.
    pub fn find_or_create_conversation(&self, a: &str, b: &str) -> Result<ConversationRow> {
        if a == b {
            bail!("conversation requires two distinct participants");
        }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let id = Uuid::new_v4().to_string();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO conversations (id, participant_lo, participant_hi)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![id, lo, hi],
            )?;

            conn.prepare(&format!(
                "{CONVERSATION_COLUMNS} WHERE participant_lo = ?1 AND participant_hi = ?2"
            ))?
            .query_row([lo, hi], conversation_from_row)
            .optional()?
            .ok_or_else(|| anyhow!("conversation vanished after find-or-create"))
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{CONVERSATION_COLUMNS} WHERE id = ?1"))?
                .query_row([id], conversation_from_row)
                .optional()
        })
    }

    // -- Messages --

    /// Append a message and refresh the parent conversation's last-message
    /// summary in one transaction, so a crash can never leave the summary
    /// behind the message log.
    pub fn insert_message(&self, row: &MessageRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    row.id,
                    row.conversation_id,
                    row.sender_id,
                    row.receiver_id,
                    row.body,
                    row.created_at,
                ],
            )?;

            tx.execute(
                "UPDATE conversations
                 SET last_message_text = ?2, last_message_sender_id = ?3, last_message_at = ?4
                 WHERE id = ?1",
                rusqlite::params![row.conversation_id, row.body, row.sender_id, row.created_at],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    /// Full ordered history for one conversation. `(created_at, id)` gives a
    /// stable total order even for equal timestamps.
    pub fn messages_in(&self, conversation_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_COLUMNS} WHERE conversation_id = ?1 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt
                .query_map([conversation_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch read receipts for a set of message IDs as
    /// (message_id, user_id) pairs.
    pub fn reads_for_messages(&self, message_ids: &[String]) -> Result<Vec<(String, String)>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT message_id, user_id FROM message_reads WHERE message_id IN ({})",
                in_placeholders(message_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();
            let rows = stmt
                .query_map(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Mark every message addressed to `reader_id` in this conversation as
    /// read. Runs on every history fetch, so it must be idempotent:
    /// INSERT OR IGNORE appends each receipt at most once. Returns the ids
    /// that were newly marked.
    pub fn mark_conversation_read(
        &self,
        conversation_id: &str,
        reader_id: &str,
        read_at: &str,
    ) -> Result<Vec<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let unread: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT m.id FROM messages m
                     WHERE m.conversation_id = ?1 AND m.receiver_id = ?2
                       AND NOT EXISTS (
                           SELECT 1 FROM message_reads r
                           WHERE r.message_id = m.id AND r.user_id = ?2
                       )
                     ORDER BY m.created_at ASC, m.id ASC",
                )?;
                stmt.query_map([conversation_id, reader_id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };

            for message_id in &unread {
                tx.execute(
                    "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at)
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![message_id, reader_id, read_at],
                )?;
            }

            tx.commit()?;
            Ok(unread)
        })
    }

    /// Unread message counts per conversation for the contact-list pane.
    pub fn unread_counts_for(&self, user_id: &str) -> Result<Vec<(String, u32)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.conversation_id, COUNT(*) FROM messages m
                 WHERE m.receiver_id = ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM message_reads r
                       WHERE r.message_id = m.id AND r.user_id = ?1
                   )
                 GROUP BY m.conversation_id",
            )?;
            let rows = stmt
                .query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- SOS alerts --

    pub fn insert_sos(&self, row: &SosAlertRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sos_alerts
                     (id, user_id, user_name, user_role, lat, lng, address, message, phone, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    row.id,
                    row.user_id,
                    row.user_name,
                    row.user_role,
                    row.lat,
                    row.lng,
                    row.address,
                    row.message,
                    row.phone,
                    row.status,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_sos(&self, id: &str) -> Result<Option<SosAlertRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{SOS_COLUMNS} WHERE id = ?1"))?
                .query_row([id], sos_from_row)
                .optional()
        })
    }

    pub fn list_sos(&self, status: Option<&str>) -> Result<Vec<SosAlertRow>> {
        self.with_conn(|conn| {
            let rows = match status {
                Some(st) => {
                    let mut stmt = conn.prepare(&format!(
                        "{SOS_COLUMNS} WHERE status = ?1 ORDER BY created_at DESC"
                    ))?;
                    let rows = stmt
                        .query_map([st], sos_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt =
                        conn.prepare(&format!("{SOS_COLUMNS} ORDER BY created_at DESC"))?;
                    let rows = stmt
                        .query_map([], sos_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(rows)
        })
    }

    pub fn set_sos_status(&self, id: &str, status: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE sos_alerts SET status = ?2 WHERE id = ?1",
                rusqlite::params![id, status],
            )?;
            Ok(n > 0)
        })
    }
}

// -- Column lists and row mappers --

const USER_COLUMNS: &str = "SELECT id, email, password, display_name, role, phone, photo_url,
                            orphanage_id, status, online, last_seen, created_at FROM users";

fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        display_name: row.get(3)?,
        role: row.get(4)?,
        phone: row.get(5)?,
        photo_url: row.get(6)?,
        orphanage_id: row.get(7)?,
        status: row.get(8)?,
        online: row.get::<_, i64>(9)? != 0,
        last_seen: row.get(10)?,
        created_at: row.get(11)?,
    })
}

const ORPHANAGE_COLUMNS: &str = "SELECT id, name, address, city, country, description,
                                 children_count, needs, photo_url, admin_id, created_at
                                 FROM orphanages";

fn orphanage_from_row(row: &rusqlite::Row) -> rusqlite::Result<OrphanageRow> {
    Ok(OrphanageRow {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        city: row.get(3)?,
        country: row.get(4)?,
        description: row.get(5)?,
        children_count: row.get(6)?,
        needs: row.get(7)?,
        photo_url: row.get(8)?,
        admin_id: row.get(9)?,
        created_at: row.get(10)?,
    })
}

const CHILD_COLUMNS: &str =
    "SELECT id, orphanage_id, name, dob, gender, photo_url, created_at FROM children";

fn child_from_row(row: &rusqlite::Row) -> rusqlite::Result<ChildRow> {
    Ok(ChildRow {
        id: row.get(0)?,
        orphanage_id: row.get(1)?,
        name: row.get(2)?,
        dob: row.get(3)?,
        gender: row.get(4)?,
        photo_url: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const WISH_COLUMNS: &str = "SELECT id, child_id, child_name, orphanage_id, item, description,
                            quantity, status, donor_id, donor_name, created_at FROM wishes";

fn wish_from_row(row: &rusqlite::Row) -> rusqlite::Result<WishRow> {
    Ok(WishRow {
        id: row.get(0)?,
        child_id: row.get(1)?,
        child_name: row.get(2)?,
        orphanage_id: row.get(3)?,
        item: row.get(4)?,
        description: row.get(5)?,
        quantity: row.get(6)?,
        status: row.get(7)?,
        donor_id: row.get(8)?,
        donor_name: row.get(9)?,
        created_at: row.get(10)?,
    })
}

const PAYMENT_COLUMNS: &str = "SELECT id, reference, kind, donor_id, orphanage_id, child_id,
                               amount, currency, purpose, frequency, provider, status, created_at
                               FROM payments";

fn payment_from_row(row: &rusqlite::Row) -> rusqlite::Result<PaymentRow> {
    Ok(PaymentRow {
        id: row.get(0)?,
        reference: row.get(1)?,
        kind: row.get(2)?,
        donor_id: row.get(3)?,
        orphanage_id: row.get(4)?,
        child_id: row.get(5)?,
        amount: row.get(6)?,
        currency: row.get(7)?,
        purpose: row.get(8)?,
        frequency: row.get(9)?,
        provider: row.get(10)?,
        status: row.get(11)?,
        created_at: row.get(12)?,
    })
}

const CONVERSATION_COLUMNS: &str = "SELECT id, participant_lo, participant_hi, last_message_text,
                                    last_message_sender_id, last_message_at, created_at
                                    FROM conversations";

fn conversation_from_row(row: &rusqlite::Row) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        participant_lo: row.get(1)?,
        participant_hi: row.get(2)?,
        last_message_text: row.get(3)?,
        last_message_sender_id: row.get(4)?,
        last_message_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const MESSAGE_COLUMNS: &str =
    "SELECT id, conversation_id, sender_id, receiver_id, body, created_at FROM messages";

fn message_from_row(row: &rusqlite::Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        body: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const SOS_COLUMNS: &str = "SELECT id, user_id, user_name, user_role, lat, lng, address, message,
                           phone, status, created_at FROM sos_alerts";

fn sos_from_row(row: &rusqlite::Row) -> rusqlite::Result<SosAlertRow> {
    Ok(SosAlertRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        user_role: row.get(3)?,
        lat: row.get(4)?,
        lng: row.get(5)?,
        address: row.get(6)?,
        message: row.get(7)?,
        phone: row.get(8)?,
        status: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn contact_from_row(row: &rusqlite::Row) -> rusqlite::Result<ContactRow> {
    Ok(ContactRow {
        id: row.get(0)?,
        display_name: row.get(1)?,
        role: row.get(2)?,
        photo_url: row.get(3)?,
        online: row.get::<_, i64>(4)? != 0,
        last_seen: row.get(5)?,
        orphanage_name: row.get(6)?,
    })
}

fn query_contacts(conn: &Connection, sql: &str, ids: &[String]) -> Result<Vec<ContactRow>> {
    let mut stmt = conn.prepare(sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> = ids
        .iter()
        .map(|id| id as &dyn rusqlite::types::ToSql)
        .collect();
    let rows = stmt
        .query_map(params.as_slice(), contact_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn in_placeholders(count: usize) -> String {
    let placeholders: Vec<&str> = std::iter::repeat("?").take(count).collect();
    placeholders.join(", ")
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChildAdmission;

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

    fn add_orphanage(db: &Database, id: &str, admin_id: &str, capacity: u32) {
        db.create_orphanage(&OrphanageRow {
            id: id.into(),
            name: format!("home-{id}"),
            address: "1 Hill Rd".into(),
            city: "Lagos".into(),
            country: "NG".into(),
            description: None,
            children_count: capacity,
            needs: "[]".into(),
            photo_url: None,
            admin_id: admin_id.into(),
            created_at: String::new(),
        })
        .unwrap();
    }

    fn add_payment(db: &Database, id: &str, donor: &str, orphanage: &str, status: &str) {
        db.insert_payment(&PaymentRow {
            id: id.into(),
            reference: format!("ref-{id}"),
            kind: "donation".into(),
            donor_id: donor.into(),
            orphanage_id: orphanage.into(),
            child_id: None,
            amount: 5000,
            currency: "NGN".into(),
            purpose: None,
            frequency: None,
            provider: "paystack".into(),
            status: status.into(),
            created_at: String::new(),
        })
        .unwrap();
    }

    fn add_message(db: &Database, id: &str, conv: &str, from: &str, to: &str, ts: &str) {
        db.insert_message(&MessageRow {
            id: id.into(),
            conversation_id: conv.into(),
            sender_id: from.into(),
            receiver_id: to.into(),
            body: format!("msg-{id}"),
            created_at: ts.into(),
        })
        .unwrap();
    }

    #[test]
    fn conversation_find_or_create_converges_from_both_sides() {
        let db = db();
        add_user(&db, "a", "donor");
        add_user(&db, "b", "admin");

        let first = db.find_or_create_conversation("a", "b").unwrap();
        let second = db.find_or_create_conversation("b", "a").unwrap();
        let third = db.find_or_create_conversation("a", "b").unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.id, third.id);
        assert!(first.participant_lo < first.participant_hi);
    }

    #[test]
    fn conversation_rejects_self_pair() {
        let db = db();
        add_user(&db, "a", "donor");
        assert!(db.find_or_create_conversation("a", "a").is_err());
    }

    #[test]
    fn messages_ordered_by_timestamp_regardless_of_insert_order() {
        let db = db();
        add_user(&db, "a", "donor");
        add_user(&db, "b", "admin");
        let conv = db.find_or_create_conversation("a", "b").unwrap();

        // Insert out of chronological order
        add_message(&db, "m2", &conv.id, "a", "b", "2026-01-01T00:00:02.000000Z");
        add_message(&db, "m1", &conv.id, "a", "b", "2026-01-01T00:00:01.000000Z");
        add_message(&db, "m3", &conv.id, "b", "a", "2026-01-01T00:00:03.000000Z");

        let history = db.messages_in(&conv.id).unwrap();
        let ids: Vec<&str> = history.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
    }

    #[test]
    fn message_insert_updates_summary_atomically() {
        let db = db();
        add_user(&db, "a", "donor");
        add_user(&db, "b", "admin");
        let conv = db.find_or_create_conversation("a", "b").unwrap();

        add_message(&db, "m1", &conv.id, "a", "b", "2026-01-01T00:00:01.000000Z");

        let refreshed = db.get_conversation(&conv.id).unwrap().unwrap();
        assert_eq!(refreshed.last_message_text.as_deref(), Some("msg-m1"));
        assert_eq!(refreshed.last_message_sender_id.as_deref(), Some("a"));
        assert_eq!(
            refreshed.last_message_at.as_deref(),
            Some("2026-01-01T00:00:01.000000Z")
        );
    }

    #[test]
    fn read_receipts_are_idempotent() {
        let db = db();
        add_user(&db, "a", "donor");
        add_user(&db, "b", "admin");
        let conv = db.find_or_create_conversation("a", "b").unwrap();
        add_message(&db, "m1", &conv.id, "a", "b", "2026-01-01T00:00:01.000000Z");

        let first = db
            .mark_conversation_read(&conv.id, "b", "2026-01-01T00:00:05.000000Z")
            .unwrap();
        assert_eq!(first, vec!["m1".to_string()]);

        // Second pass marks nothing new and duplicates nothing
        let second = db
            .mark_conversation_read(&conv.id, "b", "2026-01-01T00:00:06.000000Z")
            .unwrap();
        assert!(second.is_empty());

        let reads = db.reads_for_messages(&["m1".to_string()]).unwrap();
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0], ("m1".to_string(), "b".to_string()));
    }

    #[test]
    fn sender_messages_do_not_count_as_unread_for_sender() {
        let db = db();
        add_user(&db, "a", "donor");
        add_user(&db, "b", "admin");
        let conv = db.find_or_create_conversation("a", "b").unwrap();
        add_message(&db, "m1", &conv.id, "a", "b", "2026-01-01T00:00:01.000000Z");
        add_message(&db, "m2", &conv.id, "b", "a", "2026-01-01T00:00:02.000000Z");

        let a_unread = db.unread_counts_for("a").unwrap();
        assert_eq!(a_unread, vec![(conv.id.clone(), 1)]);

        let b_unread = db.unread_counts_for("b").unwrap();
        assert_eq!(b_unread, vec![(conv.id.clone(), 1)]);

        db.mark_conversation_read(&conv.id, "a", "2026-01-01T00:00:03.000000Z")
            .unwrap();
        assert!(db.unread_counts_for("a").unwrap().is_empty());
    }

    #[test]
    fn capacity_boundary_rejects_child_past_declared_count() {
        let db = db();
        add_user(&db, "admin1", "admin");
        add_orphanage(&db, "o1", "admin1", 2);

        let child = |id: &str| ChildRow {
            id: id.into(),
            orphanage_id: "o1".into(),
            name: format!("child-{id}"),
            dob: "2019-04-01".into(),
            gender: "f".into(),
            photo_url: None,
            created_at: String::new(),
        };

        assert_eq!(db.insert_child(&child("c1")).unwrap(), ChildAdmission::Admitted);
        assert_eq!(db.insert_child(&child("c2")).unwrap(), ChildAdmission::Admitted);
        assert_eq!(
            db.insert_child(&child("c3")).unwrap(),
            ChildAdmission::CapacityReached
        );

        // The rejected insert wrote nothing
        assert_eq!(db.children_of("o1").unwrap().len(), 2);
    }

    #[test]
    fn child_insert_into_unknown_orphanage_reports_missing() {
        let db = db();
        let row = ChildRow {
            id: "c1".into(),
            orphanage_id: "nope".into(),
            name: "x".into(),
            dob: "2019-04-01".into(),
            gender: "m".into(),
            photo_url: None,
            created_at: String::new(),
        };
        assert_eq!(
            db.insert_child(&row).unwrap(),
            ChildAdmission::OrphanageNotFound
        );
    }

    #[test]
    fn wish_claim_is_exclusive() {
        let db = db();
        add_user(&db, "admin1", "admin");
        add_user(&db, "d1", "donor");
        add_user(&db, "d2", "donor");
        add_orphanage(&db, "o1", "admin1", 5);
        db.insert_child(&ChildRow {
            id: "c1".into(),
            orphanage_id: "o1".into(),
            name: "Ada".into(),
            dob: "2018-01-01".into(),
            gender: "f".into(),
            photo_url: None,
            created_at: String::new(),
        })
        .unwrap();
        db.create_wish(&WishRow {
            id: "w1".into(),
            child_id: "c1".into(),
            child_name: "Ada".into(),
            orphanage_id: "o1".into(),
            item: "school bag".into(),
            description: None,
            quantity: 1,
            status: "pending".into(),
            donor_id: None,
            donor_name: None,
            created_at: String::new(),
        })
        .unwrap();

        assert!(db.claim_wish("w1", "d1", "user-d1").unwrap());
        assert!(!db.claim_wish("w1", "d2", "user-d2").unwrap());

        let wish = db.get_wish("w1").unwrap().unwrap();
        assert_eq!(wish.donor_id.as_deref(), Some("d1"));
        assert_eq!(wish.status, "in-progress");
    }

    #[test]
    fn donor_orphanage_ids_deduplicate_across_payments() {
        let db = db();
        add_user(&db, "admin1", "admin");
        add_user(&db, "d1", "donor");
        add_orphanage(&db, "o1", "admin1", 5);
        add_payment(&db, "p1", "d1", "o1", "successful");
        add_payment(&db, "p2", "d1", "o1", "pending");

        let ids = db.donor_orphanage_ids("d1").unwrap();
        assert_eq!(ids, vec!["o1".to_string()]);
    }

    #[test]
    fn presence_write_round_trips() {
        let db = db();
        add_user(&db, "a", "volunteer");
        db.set_presence("a", true, "2026-01-01T10:00:00.000000Z")
            .unwrap();

        let user = db.get_user_by_id("a").unwrap().unwrap();
        assert!(user.online);
        assert_eq!(
            user.last_seen.as_deref(),
            Some("2026-01-01T10:00:00.000000Z")
        );
    }

    #[test]
    fn dismissed_volunteers_leave_contact_discovery() {
        let db = db();
        add_user(&db, "admin1", "admin");
        add_user(&db, "v1", "volunteer");
        add_orphanage(&db, "o1", "admin1", 5);
        db.update_profile("v1", None, None, None, Some("o1")).unwrap();

        let before = db
            .volunteers_of_orphanages(&["o1".to_string()])
            .unwrap();
        assert_eq!(before.len(), 1);

        db.set_account_status("v1", "dismissed").unwrap();
        let after = db.volunteers_of_orphanages(&["o1".to_string()]).unwrap();
        assert!(after.is_empty());
    }
}
