use chrono::{DateTime, Utc};
use rusqlite::{params, Result as SqlResult, Row};

use crate::db::{parse_datetime, DbPool};
use crate::db_types::{generate_uid, is_uid};

/// A named collection of photos.
#[derive(Debug, Clone)]
pub struct Album {
    pub id: i64,
    pub album_uid: String,
    pub album_title: String,
    pub photo_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Album {
    pub fn new(album_title: &str) -> Self {
        let now = Utc::now();
        Album {
            id: 0,
            album_uid: String::new(),
            album_title: album_title.to_string(),
            photo_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(Album {
            id: row.get(0)?,
            album_uid: row.get(1)?,
            album_title: row.get(2)?,
            photo_count: row.get(3)?,
            created_at: parse_datetime(4, &row.get::<_, String>(4)?)?,
            updated_at: parse_datetime(5, &row.get::<_, String>(5)?)?,
        })
    }

    const COLUMNS: &'static str =
        "id, album_uid, album_title, photo_count, created_at, updated_at";

    pub fn create(&mut self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        if !is_uid(&self.album_uid, 'a') {
            self.album_uid = generate_uid('a');
        }

        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO albums (album_uid, album_title, photo_count, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.album_uid,
                self.album_title,
                self.photo_count,
                self.created_at.to_rfc3339(),
                self.updated_at.to_rfc3339(),
            ],
        )?;
        self.id = conn.last_insert_rowid();

        Ok(())
    }

    pub fn find_by_uid(
        pool: &DbPool,
        uid: &str,
    ) -> Result<Option<Album>, Box<dyn std::error::Error>> {
        let conn = pool.get()?;
        let sql = format!("SELECT {} FROM albums WHERE album_uid = ?", Self::COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row([uid], Album::from_row) {
            Ok(album) => Ok(Some(album)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }
}

/// Join row between a photo and an album. Archiving a photo hides its join
/// rows instead of deleting them, so a later restore brings the membership
/// back.
#[derive(Debug, Clone)]
pub struct PhotoAlbum {
    pub photo_uid: String,
    pub album_uid: String,
    pub hidden: bool,
}

impl PhotoAlbum {
    pub fn new(photo_uid: &str, album_uid: &str) -> Self {
        PhotoAlbum {
            photo_uid: photo_uid.to_string(),
            album_uid: album_uid.to_string(),
            hidden: false,
        }
    }

    pub fn create(&self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO photos_albums (photo_uid, album_uid, hidden) VALUES (?1, ?2, ?3)",
            params![self.photo_uid, self.album_uid, self.hidden],
        )?;
        Ok(())
    }

    pub fn find_by_album(
        pool: &DbPool,
        album_uid: &str,
    ) -> Result<Vec<PhotoAlbum>, Box<dyn std::error::Error>> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT photo_uid, album_uid, hidden FROM photos_albums WHERE album_uid = ?",
        )?;
        let rows = stmt.query_map([album_uid], |row| {
            Ok(PhotoAlbum {
                photo_uid: row.get(0)?,
                album_uid: row.get(1)?,
                hidden: row.get(2)?,
            })
        })?;

        let mut memberships = Vec::new();
        for row in rows {
            memberships.push(row?);
        }
        Ok(memberships)
    }
}

/// A classification attached to photos.
#[derive(Debug, Clone)]
pub struct Label {
    pub id: i64,
    pub label_uid: String,
    pub label_name: String,
    pub photo_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Label {
    pub fn new(label_name: &str) -> Self {
        let now = Utc::now();
        Label {
            id: 0,
            label_uid: String::new(),
            label_name: label_name.to_string(),
            photo_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(Label {
            id: row.get(0)?,
            label_uid: row.get(1)?,
            label_name: row.get(2)?,
            photo_count: row.get(3)?,
            created_at: parse_datetime(4, &row.get::<_, String>(4)?)?,
            updated_at: parse_datetime(5, &row.get::<_, String>(5)?)?,
        })
    }

    pub(crate) const COLUMNS: &'static str =
        "id, label_uid, label_name, photo_count, created_at, updated_at";

    pub fn create(&mut self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        if !is_uid(&self.label_uid, 'l') {
            self.label_uid = generate_uid('l');
        }

        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO labels (label_uid, label_name, photo_count, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.label_uid,
                self.label_name,
                self.photo_count,
                self.created_at.to_rfc3339(),
                self.updated_at.to_rfc3339(),
            ],
        )?;
        self.id = conn.last_insert_rowid();

        Ok(())
    }

    /// Removes the label and all of its photo joins.
    pub fn delete(&self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        let conn = pool.get()?;
        conn.execute(
            "DELETE FROM photos_labels WHERE label_uid = ?",
            [&self.label_uid],
        )?;
        conn.execute("DELETE FROM labels WHERE label_uid = ?", [&self.label_uid])?;
        Ok(())
    }
}
