use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE profiles (
                id                  TEXT PRIMARY KEY,
                national_id_hash    TEXT NOT NULL UNIQUE,
                sus_card_hash       TEXT NOT NULL,
                full_name           TEXT NOT NULL,
                push_token          TEXT,
                created_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE pharmacies (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                address     TEXT,
                latitude    REAL,
                longitude   REAL
            );

            CREATE INDEX idx_pharmacies_location
                ON pharmacies(latitude, longitude);

            CREATE TABLE medications (
                id          TEXT PRIMARY KEY,
                pharmacy_id TEXT NOT NULL REFERENCES pharmacies(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                dosage      TEXT,
                description TEXT
            );

            CREATE INDEX idx_medications_pharmacy
                ON medications(pharmacy_id, name);

            CREATE TABLE queues (
                id                      TEXT PRIMARY KEY,
                pharmacy_id             TEXT NOT NULL UNIQUE REFERENCES pharmacies(id),
                current_number          INTEGER NOT NULL DEFAULT 0,
                estimated_wait_minutes  INTEGER NOT NULL
            );

            CREATE TABLE check_ins (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES profiles(id),
                pharmacy_id     TEXT NOT NULL REFERENCES pharmacies(id),
                queue_number    INTEGER NOT NULL,
                status          TEXT NOT NULL DEFAULT 'waiting'
                                CHECK (status IN ('waiting', 'served', 'cancelled')),
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(pharmacy_id, queue_number)
            );

            CREATE INDEX idx_check_ins_waiting
                ON check_ins(pharmacy_id, status, queue_number);

            CREATE INDEX idx_check_ins_user
                ON check_ins(user_id, pharmacy_id, status);

            CREATE TABLE check_in_items (
                check_in_id     TEXT NOT NULL REFERENCES check_ins(id) ON DELETE CASCADE,
                medication_id   TEXT NOT NULL REFERENCES medications(id),
                quantity        INTEGER NOT NULL CHECK (quantity > 0),
                PRIMARY KEY (check_in_id, medication_id)
            );

            CREATE TABLE pickups (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES profiles(id),
                medication  TEXT NOT NULL,
                quantity    INTEGER NOT NULL,
                pickup_date TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_pickups_user
                ON pickups(user_id, pickup_date);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
