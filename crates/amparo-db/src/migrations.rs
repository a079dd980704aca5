use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cities (
            slug        TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            lat         REAL NOT NULL,
            lng         REAL NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS city_requests (
            id            TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            requested_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            email         TEXT NOT NULL UNIQUE,
            password      TEXT NOT NULL,
            name          TEXT NOT NULL,
            role          TEXT NOT NULL,
            city          TEXT NOT NULL,
            phone_number  TEXT,
            created_at    TEXT NOT NULL
        );

        -- Markers are partitioned per city: ids are only unique within one
        -- partition and a marker never moves between partitions.
        CREATE TABLE IF NOT EXISTS markers (
            city           TEXT NOT NULL REFERENCES cities(slug),
            id             TEXT NOT NULL,
            lat            REAL NOT NULL,
            lng            REAL NOT NULL,
            contact        TEXT NOT NULL,
            document       TEXT,
            description    TEXT NOT NULL,
            needs          TEXT NOT NULL,
            housing        TEXT NOT NULL,
            status         TEXT NOT NULL,
            idx            INTEGER NOT NULL,
            is_city_hall   INTEGER NOT NULL DEFAULT 0,
            adults         INTEGER NOT NULL DEFAULT 0,
            kids           INTEGER NOT NULL DEFAULT 0,
            elderly        INTEGER NOT NULL DEFAULT 0,
            pcd            INTEGER NOT NULL DEFAULT 0,
            image_urls     TEXT NOT NULL DEFAULT '[]',
            created_at     TEXT NOT NULL,
            updated_at     TEXT,
            updated_by     TEXT,
            update_reason  TEXT,
            PRIMARY KEY (city, id)
        );

        CREATE INDEX IF NOT EXISTS idx_markers_city_status
            ON markers(city, status, idx, created_at);

        CREATE TABLE IF NOT EXISTS comments (
            id              TEXT PRIMARY KEY,
            city            TEXT NOT NULL,
            marker_id       TEXT NOT NULL,
            user_id         TEXT NOT NULL,
            user_name       TEXT NOT NULL,
            text            TEXT NOT NULL,
            other           TEXT,
            selected_needs  TEXT NOT NULL DEFAULT '[]',
            kind            TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_marker
            ON comments(city, marker_id, created_at);

        -- Append-only activity trail. Writes here must never fail the
        -- operation they describe.
        CREATE TABLE IF NOT EXISTS user_reads (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            marker_id   TEXT NOT NULL,
            kind        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_updates (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            marker_id   TEXT NOT NULL,
            kind        TEXT NOT NULL,
            payload     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
