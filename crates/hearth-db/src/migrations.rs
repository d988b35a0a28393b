use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            email         TEXT NOT NULL UNIQUE,
            password      TEXT NOT NULL,
            display_name  TEXT NOT NULL,
            role          TEXT NOT NULL CHECK (role IN ('admin', 'donor', 'volunteer')),
            phone         TEXT,
            photo_url     TEXT,
            orphanage_id  TEXT REFERENCES orphanages(id),
            status        TEXT NOT NULL DEFAULT 'active',
            online        INTEGER NOT NULL DEFAULT 0,
            last_seen     TEXT,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_users_role
            ON users(role);

        CREATE TABLE IF NOT EXISTS orphanages (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            address         TEXT NOT NULL,
            city            TEXT NOT NULL,
            country         TEXT NOT NULL,
            description     TEXT,
            children_count  INTEGER NOT NULL,
            needs           TEXT NOT NULL DEFAULT '[]',
            photo_url       TEXT,
            admin_id        TEXT NOT NULL REFERENCES users(id),
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_orphanages_admin
            ON orphanages(admin_id);

        CREATE TABLE IF NOT EXISTS children (
            id            TEXT PRIMARY KEY,
            orphanage_id  TEXT NOT NULL REFERENCES orphanages(id),
            name          TEXT NOT NULL,
            dob           TEXT NOT NULL,
            gender        TEXT NOT NULL,
            photo_url     TEXT,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_children_orphanage
            ON children(orphanage_id);

        CREATE TABLE IF NOT EXISTS child_documents (
            id        TEXT PRIMARY KEY,
            child_id  TEXT NOT NULL REFERENCES children(id),
            name      TEXT NOT NULL,
            doc_type  TEXT NOT NULL,
            url       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_child
            ON child_documents(child_id);

        CREATE TABLE IF NOT EXISTS wishes (
            id            TEXT PRIMARY KEY,
            child_id      TEXT NOT NULL REFERENCES children(id),
            child_name    TEXT NOT NULL,
            orphanage_id  TEXT NOT NULL REFERENCES orphanages(id),
            item          TEXT NOT NULL,
            description   TEXT,
            quantity      INTEGER NOT NULL DEFAULT 1,
            status        TEXT NOT NULL DEFAULT 'pending'
                          CHECK (status IN ('pending', 'in-progress', 'fulfilled')),
            donor_id      TEXT REFERENCES users(id),
            donor_name    TEXT,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_wishes_orphanage
            ON wishes(orphanage_id, status);

        CREATE TABLE IF NOT EXISTS payments (
            id            TEXT PRIMARY KEY,
            reference     TEXT NOT NULL UNIQUE,
            kind          TEXT NOT NULL CHECK (kind IN ('donation', 'sponsorship')),
            donor_id      TEXT NOT NULL REFERENCES users(id),
            orphanage_id  TEXT NOT NULL REFERENCES orphanages(id),
            child_id      TEXT REFERENCES children(id),
            amount        INTEGER NOT NULL,
            currency      TEXT NOT NULL,
            purpose       TEXT,
            frequency     TEXT,
            provider      TEXT NOT NULL,
            status        TEXT NOT NULL DEFAULT 'pending'
                          CHECK (status IN ('pending', 'successful', 'failed')),
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_payments_donor
            ON payments(donor_id);
        CREATE INDEX IF NOT EXISTS idx_payments_orphanage
            ON payments(orphanage_id);

        -- Two-party conversations. The pair is stored sorted so one unordered
        -- pair maps to exactly one row; the UNIQUE constraint makes concurrent
        -- find-or-create converge instead of duplicating.
        CREATE TABLE IF NOT EXISTS conversations (
            id                      TEXT PRIMARY KEY,
            participant_lo          TEXT NOT NULL REFERENCES users(id),
            participant_hi          TEXT NOT NULL REFERENCES users(id),
            last_message_text       TEXT,
            last_message_sender_id  TEXT,
            last_message_at         TEXT,
            created_at              TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK (participant_lo < participant_hi),
            UNIQUE (participant_lo, participant_hi)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id               TEXT PRIMARY KEY,
            conversation_id  TEXT NOT NULL REFERENCES conversations(id),
            sender_id        TEXT NOT NULL REFERENCES users(id),
            receiver_id      TEXT NOT NULL REFERENCES users(id),
            body             TEXT NOT NULL,
            created_at       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_receiver
            ON messages(receiver_id);

        -- readBy as a join table; INSERT OR IGNORE keeps receipts idempotent.
        CREATE TABLE IF NOT EXISTS message_reads (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            read_at     TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (message_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS sos_alerts (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            user_name   TEXT NOT NULL,
            user_role   TEXT NOT NULL,
            lat         REAL NOT NULL,
            lng         REAL NOT NULL,
            address     TEXT,
            message     TEXT NOT NULL,
            phone       TEXT,
            status      TEXT NOT NULL DEFAULT 'active'
                        CHECK (status IN ('active', 'in-progress', 'resolved', 'false-alarm')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_sos_status
            ON sos_alerts(status);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
