use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Result as SqlResult, Row};

pub use crate::db_pool::{create_db_pool, create_in_memory_pool, DbPool};
pub use crate::db_types::{generate_uid, is_uid, Scope, Selection};

/// Lifecycle state of a photo, mapped to the nullable `deleted_at` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoStatus {
    Active,
    Archived(DateTime<Utc>),
}

impl PhotoStatus {
    pub fn is_archived(&self) -> bool {
        matches!(self, PhotoStatus::Archived(_))
    }

    fn deleted_at(&self) -> Option<String> {
        match self {
            PhotoStatus::Active => None,
            PhotoStatus::Archived(at) => Some(at.to_rfc3339()),
        }
    }
}

/// A logical media item. Physical representations live in `files`.
#[derive(Debug, Clone)]
pub struct Photo {
    pub id: i64,
    pub photo_uid: String,
    pub photo_path: String,
    pub photo_private: bool,
    pub photo_pending: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub file_count: i64,
    pub status: PhotoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Photo {
    pub fn new(photo_path: &str) -> Self {
        let now = Utc::now();
        Photo {
            id: 0,
            photo_uid: String::new(),
            photo_path: photo_path.to_string(),
            photo_private: false,
            photo_pending: true,
            approved_at: None,
            file_count: 0,
            status: PhotoStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(Photo {
            id: row.get(0)?,
            photo_uid: row.get(1)?,
            photo_path: row.get(2)?,
            photo_private: row.get(3)?,
            photo_pending: row.get(4)?,
            approved_at: parse_opt_datetime(row.get::<_, Option<String>>(5)?),
            file_count: row.get(6)?,
            status: match parse_opt_datetime(row.get::<_, Option<String>>(7)?) {
                Some(at) => PhotoStatus::Archived(at),
                None => PhotoStatus::Active,
            },
            created_at: parse_datetime(8, &row.get::<_, String>(8)?)?,
            updated_at: parse_datetime(9, &row.get::<_, String>(9)?)?,
        })
    }

    const COLUMNS: &'static str = "id, photo_uid, photo_path, photo_private, photo_pending, \
         approved_at, file_count, deleted_at, created_at, updated_at";

    /// Inserts a new row, assigning a UID exactly once. A UID already present
    /// on the entity is kept; subsequent saves never regenerate it.
    pub fn create(&mut self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        if !is_uid(&self.photo_uid, 'p') {
            self.photo_uid = generate_uid('p');
        }

        let conn = pool.get()?;
        conn.execute(
            r#"
            INSERT INTO photos (
                photo_uid, photo_path, photo_private, photo_pending,
                approved_at, file_count, deleted_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                self.photo_uid,
                self.photo_path,
                self.photo_private,
                self.photo_pending,
                self.approved_at.map(|dt| dt.to_rfc3339()),
                self.file_count,
                self.status.deleted_at(),
                self.created_at.to_rfc3339(),
                self.updated_at.to_rfc3339(),
            ],
        )?;
        self.id = conn.last_insert_rowid();

        Ok(())
    }

    /// Writes the current state back to the existing row, keyed by UID.
    pub fn save(&mut self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        self.updated_at = Utc::now();

        let conn = pool.get()?;
        conn.execute(
            r#"
            UPDATE photos SET
                photo_path = ?, photo_private = ?, photo_pending = ?,
                approved_at = ?, file_count = ?, deleted_at = ?, updated_at = ?
            WHERE photo_uid = ?
            "#,
            params![
                self.photo_path,
                self.photo_private,
                self.photo_pending,
                self.approved_at.map(|dt| dt.to_rfc3339()),
                self.file_count,
                self.status.deleted_at(),
                self.updated_at.to_rfc3339(),
                self.photo_uid,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_uid(
        pool: &DbPool,
        uid: &str,
        scope: Scope,
    ) -> Result<Option<Photo>, Box<dyn std::error::Error>> {
        let conn = pool.get()?;
        let sql = if scope.includes_archived() {
            format!("SELECT {} FROM photos WHERE photo_uid = ?", Self::COLUMNS)
        } else {
            format!(
                "SELECT {} FROM photos WHERE photo_uid = ? AND deleted_at IS NULL",
                Self::COLUMNS
            )
        };
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row([uid], Photo::from_row) {
            Ok(photo) => Ok(Some(photo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// Marks the photo as archived. The row is retained.
    pub fn archive(&mut self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        self.status = PhotoStatus::Archived(Utc::now());
        self.save(pool)
    }

    /// Clears the soft-delete timestamp.
    pub fn restore(&mut self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        self.status = PhotoStatus::Active;
        self.save(pool)
    }

    /// Clears the pending-approval state.
    pub fn approve(&mut self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        self.photo_pending = false;
        self.approved_at = Some(Utc::now());
        self.save(pool)
    }
}

/// Resolves a selection's photo UIDs to rows. Unknown UIDs are skipped, so an
/// empty result means nothing in the selection exists within the scope.
pub fn photo_selection(
    pool: &DbPool,
    uids: &[String],
    scope: Scope,
) -> Result<Vec<Photo>, Box<dyn std::error::Error>> {
    if uids.is_empty() {
        return Ok(Vec::new());
    }

    let conn = pool.get()?;
    let mut sql = format!(
        "SELECT {} FROM photos WHERE photo_uid IN ({})",
        Photo::COLUMNS,
        placeholders(uids.len())
    );
    if !scope.includes_archived() {
        sql.push_str(" AND deleted_at IS NULL");
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::ToSql> = uids.iter().map(|u| u as &dyn rusqlite::ToSql).collect();
    let photo_iter = stmt.query_map(params.as_slice(), Photo::from_row)?;

    let mut photos = Vec::new();
    for photo in photo_iter {
        photos.push(photo?);
    }
    Ok(photos)
}

/// Recomputes aggregate counts in one pass: album and label member counts
/// (visible, active members only) and per-photo file counts. Called once per
/// batch operation, after all row mutations.
pub fn update_photo_counts(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute(
        r#"
        UPDATE albums SET photo_count = (
            SELECT COUNT(*) FROM photos_albums pa
            JOIN photos p ON p.photo_uid = pa.photo_uid
            WHERE pa.album_uid = albums.album_uid
              AND pa.hidden = 0
              AND p.deleted_at IS NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        UPDATE labels SET photo_count = (
            SELECT COUNT(*) FROM photos_labels pl
            JOIN photos p ON p.photo_uid = pl.photo_uid
            WHERE pl.label_uid = labels.label_uid
              AND p.deleted_at IS NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        UPDATE photos SET file_count = (
            SELECT COUNT(*) FROM files f
            WHERE f.photo_uid = photos.photo_uid
              AND f.file_missing = 0
              AND f.deleted_at IS NULL
        )
        "#,
        [],
    )?;

    Ok(())
}

/// Joined "?,?,?" list for IN clauses. Values are always bound, never
/// interpolated.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

pub(crate) fn parse_datetime(col: usize, s: &str) -> SqlResult<DateTime<Utc>> {
    if s.contains('T') {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| invalid_column(col))
    } else {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .map(|dt| dt.and_utc())
            .map_err(|_| invalid_column(col))
    }
}

pub(crate) fn parse_opt_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| parse_datetime(0, &s).ok())
}

fn invalid_column(col: usize) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(col, "datetime".to_string(), rusqlite::types::Type::Text)
}
