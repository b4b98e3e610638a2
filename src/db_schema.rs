use rusqlite::{Connection, Result as SqlResult};

// Schema definitions

pub const PHOTOS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    photo_uid TEXT NOT NULL UNIQUE CHECK(length(photo_uid) = 16),
    photo_path TEXT NOT NULL DEFAULT '',
    photo_private BOOLEAN NOT NULL DEFAULT FALSE,
    photo_pending BOOLEAN NOT NULL DEFAULT FALSE,
    approved_at DATETIME,
    file_count INTEGER NOT NULL DEFAULT 0,

    -- Soft delete: NULL means active, a timestamp means archived
    deleted_at DATETIME,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
"#;

pub const FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_uid TEXT NOT NULL UNIQUE CHECK(length(file_uid) = 16),
    photo_uid TEXT NOT NULL,
    file_root TEXT NOT NULL DEFAULT '/',
    file_name TEXT NOT NULL,
    file_hash TEXT,
    file_type TEXT NOT NULL DEFAULT '',
    file_width INTEGER NOT NULL DEFAULT 0,
    file_missing BOOLEAN NOT NULL DEFAULT FALSE,
    file_primary BOOLEAN NOT NULL DEFAULT FALSE,
    file_error TEXT NOT NULL DEFAULT '',
    mod_time INTEGER NOT NULL DEFAULT 0,

    deleted_at DATETIME,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,

    UNIQUE (file_root, file_name)
)
"#;

pub const ALBUMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    album_uid TEXT NOT NULL UNIQUE CHECK(length(album_uid) = 16),
    album_title TEXT NOT NULL DEFAULT '',
    photo_count INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
"#;

pub const PHOTOS_ALBUMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS photos_albums (
    photo_uid TEXT NOT NULL,
    album_uid TEXT NOT NULL,
    hidden BOOLEAN NOT NULL DEFAULT FALSE,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (photo_uid, album_uid)
)
"#;

pub const LABELS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS labels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label_uid TEXT NOT NULL UNIQUE CHECK(length(label_uid) = 16),
    label_name TEXT NOT NULL DEFAULT '',
    photo_count INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
"#;

pub const PHOTOS_LABELS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS photos_labels (
    photo_uid TEXT NOT NULL,
    label_uid TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (photo_uid, label_uid)
)
"#;

// Ledger of files recognized as byte-identical to an already indexed file.
// Rows are never deleted automatically; the indexer only consults them to
// skip re-scanning.
pub const DUPLICATES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS duplicates (
    file_root TEXT NOT NULL DEFAULT '/',
    file_name TEXT NOT NULL,
    file_hash TEXT NOT NULL DEFAULT '',
    mod_time INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (file_root, file_name)
)
"#;

pub const USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    user_uid TEXT NOT NULL UNIQUE CHECK(length(user_uid) = 16),
    user_name TEXT NOT NULL DEFAULT '',
    full_name TEXT NOT NULL DEFAULT '',
    role_admin BOOLEAN NOT NULL DEFAULT FALSE,
    role_guest BOOLEAN NOT NULL DEFAULT FALSE,
    user_disabled BOOLEAN NOT NULL DEFAULT FALSE,
    login_attempts INTEGER NOT NULL DEFAULT 0,
    login_at DATETIME,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
"#;

pub const PASSWORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS passwords (
    user_uid TEXT PRIMARY KEY NOT NULL,
    password_hash TEXT NOT NULL,
    password_salt TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
"#;

pub const SCHEMA_SQL: &[&str] = &[
    PHOTOS_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_photos_deleted_at ON photos(deleted_at);",
    FILES_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_files_photo_uid ON files(photo_uid);",
    "CREATE INDEX IF NOT EXISTS idx_files_file_hash ON files(file_hash);",
    ALBUMS_TABLE,
    PHOTOS_ALBUMS_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_photos_albums_album_uid ON photos_albums(album_uid);",
    LABELS_TABLE,
    PHOTOS_LABELS_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_photos_labels_label_uid ON photos_labels(label_uid);",
    DUPLICATES_TABLE,
    USERS_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_users_user_name ON users(user_name);",
    PASSWORDS_TABLE,
];

pub fn initialize_schema(conn: &Connection) -> SqlResult<()> {
    for sql in SCHEMA_SQL {
        conn.execute(sql, [])?;
    }
    Ok(())
}
