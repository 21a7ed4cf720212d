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
        info!("Running migration v1 (users, listings, messages)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                is_active   INTEGER NOT NULL DEFAULT 0,
                invited_by  TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE listings (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                title       TEXT NOT NULL,
                home_type   TEXT NOT NULL CHECK (home_type IN ('Room only', 'Entire home')),
                bedrooms    INTEGER NOT NULL CHECK (bedrooms >= 1),
                location    TEXT NOT NULL,
                street_name TEXT NOT NULL DEFAULT '',
                cost        REAL NOT NULL CHECK (cost >= 0),
                start_date  TEXT NOT NULL,
                end_date    TEXT NOT NULL,
                photo_link  TEXT,
                is_active   INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_listings_active_start
                ON listings(is_active, start_date);

            CREATE TABLE messages (
                id                  TEXT PRIMARY KEY,
                sender_id           TEXT NOT NULL REFERENCES users(id),
                receiver_id         TEXT NOT NULL REFERENCES users(id),
                content             TEXT NOT NULL,
                message_type        TEXT NOT NULL,
                status              TEXT NOT NULL,
                listing_id          TEXT REFERENCES listings(id),
                parent_message_id   TEXT REFERENCES messages(id),
                is_active           INTEGER NOT NULL DEFAULT 1,
                version             INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE INDEX idx_messages_inbox
                ON messages(receiver_id, is_active, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn schema_rejects_unknown_home_type() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute(
            "INSERT INTO users (id, name, email, password, created_at) VALUES ('u1', 'A', 'a@x.nl', 'h', '2025-01-01')",
            [],
        )
        .unwrap();

        let res = conn.execute(
            "INSERT INTO listings (id, user_id, title, home_type, bedrooms, location, cost, start_date, end_date, created_at)
             VALUES ('l1', 'u1', 't', 'Castle', 1, 'Noord', 10, '2025-01-01', '2025-01-02', '2025-01-01')",
            [],
        );
        assert!(res.is_err());
    }
}
