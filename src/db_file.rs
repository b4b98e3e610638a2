use chrono::{DateTime, Utc};
use rusqlite::{params, Result as SqlResult, Row};

use crate::db::{parse_datetime, parse_opt_datetime, DbPool};
use crate::db_types::{generate_uid, is_uid};

/// One physical representation of a photo (original, converted, sidecar).
#[derive(Debug, Clone)]
pub struct File {
    pub id: i64,
    pub file_uid: String,
    pub photo_uid: String,
    pub file_root: String,
    pub file_name: String,
    pub file_hash: Option<String>,
    pub file_type: String,
    pub file_width: i64,
    pub file_missing: bool,
    pub file_primary: bool,
    pub file_error: String,
    pub mod_time: i64,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl File {
    pub fn new(photo_uid: &str, file_root: &str, file_name: &str) -> Self {
        let now = Utc::now();
        File {
            id: 0,
            file_uid: String::new(),
            photo_uid: photo_uid.to_string(),
            file_root: file_root.to_string(),
            file_name: file_name.to_string(),
            file_hash: None,
            file_type: String::new(),
            file_width: 0,
            file_missing: false,
            file_primary: false,
            file_error: String::new(),
            mod_time: 0,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(File {
            id: row.get(0)?,
            file_uid: row.get(1)?,
            photo_uid: row.get(2)?,
            file_root: row.get(3)?,
            file_name: row.get(4)?,
            file_hash: row.get(5)?,
            file_type: row.get(6)?,
            file_width: row.get(7)?,
            file_missing: row.get(8)?,
            file_primary: row.get(9)?,
            file_error: row.get(10)?,
            mod_time: row.get(11)?,
            deleted_at: parse_opt_datetime(row.get::<_, Option<String>>(12)?),
            created_at: parse_datetime(13, &row.get::<_, String>(13)?)?,
            updated_at: parse_datetime(14, &row.get::<_, String>(14)?)?,
        })
    }

    pub(crate) const COLUMNS: &'static str =
        "id, file_uid, photo_uid, file_root, file_name, file_hash, file_type, \
         file_width, file_missing, file_primary, file_error, mod_time, \
         deleted_at, created_at, updated_at";

    /// Joined storage location, e.g. "originals/2023/img_0001.jpg".
    pub fn path(&self) -> String {
        join_path(&self.file_root, &self.file_name)
    }

    /// Inserts a new row, assigning a UID exactly once.
    pub fn create(&mut self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        if !is_uid(&self.file_uid, 'f') {
            self.file_uid = generate_uid('f');
        }

        let conn = pool.get()?;
        conn.execute(
            r#"
            INSERT INTO files (
                file_uid, photo_uid, file_root, file_name, file_hash, file_type,
                file_width, file_missing, file_primary, file_error, mod_time,
                deleted_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                self.file_uid,
                self.photo_uid,
                self.file_root,
                self.file_name,
                self.file_hash,
                self.file_type,
                self.file_width,
                self.file_missing,
                self.file_primary,
                self.file_error,
                self.mod_time,
                self.deleted_at.map(|dt| dt.to_rfc3339()),
                self.created_at.to_rfc3339(),
                self.updated_at.to_rfc3339(),
            ],
        )?;
        self.id = conn.last_insert_rowid();

        Ok(())
    }

    pub fn save(&mut self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        self.updated_at = Utc::now();

        let conn = pool.get()?;
        conn.execute(
            r#"
            UPDATE files SET
                photo_uid = ?, file_root = ?, file_name = ?, file_hash = ?,
                file_type = ?, file_width = ?, file_missing = ?, file_primary = ?,
                file_error = ?, mod_time = ?, deleted_at = ?, updated_at = ?
            WHERE file_uid = ?
            "#,
            params![
                self.photo_uid,
                self.file_root,
                self.file_name,
                self.file_hash,
                self.file_type,
                self.file_width,
                self.file_missing,
                self.file_primary,
                self.file_error,
                self.mod_time,
                self.deleted_at.map(|dt| dt.to_rfc3339()),
                self.updated_at.to_rfc3339(),
                self.file_uid,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_uid(
        pool: &DbPool,
        uid: &str,
    ) -> Result<Option<File>, Box<dyn std::error::Error>> {
        Self::find_one(pool, "file_uid = ?", &[&uid])
    }

    /// Hash is a non-unique secondary index; the first match wins.
    pub fn find_by_hash(
        pool: &DbPool,
        hash: &str,
    ) -> Result<Option<File>, Box<dyn std::error::Error>> {
        Self::find_one(pool, "file_hash = ?", &[&hash])
    }

    pub fn find_by_name_and_root(
        pool: &DbPool,
        name: &str,
        root: &str,
    ) -> Result<Option<File>, Box<dyn std::error::Error>> {
        Self::find_one(pool, "file_name = ? AND file_root = ?", &[&name, &root])
    }

    fn find_one(
        pool: &DbPool,
        predicate: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Option<File>, Box<dyn std::error::Error>> {
        let conn = pool.get()?;
        let sql = format!(
            "SELECT {} FROM files WHERE {} ORDER BY id LIMIT 1",
            Self::COLUMNS,
            predicate
        );
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row(params, File::from_row) {
            Ok(file) => Ok(Some(file)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }
}

/// Joins root and name the way the duplicate ledger and index snapshots key
/// their entries.
pub fn join_path(root: &str, name: &str) -> String {
    let root = root.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if root.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", root, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_in_memory_pool;

    #[test]
    fn test_create_assigns_uid_once() {
        let pool = create_in_memory_pool().unwrap();

        let mut file = File::new("p123456789abcdef", "originals", "2023/img_0001.jpg");
        file.file_hash = Some("abc123".to_string());
        file.create(&pool).unwrap();

        let uid = file.file_uid.clone();
        assert!(is_uid(&uid, 'f'));

        file.file_width = 4000;
        file.save(&pool).unwrap();
        assert_eq!(file.file_uid, uid);

        let found = File::find_by_uid(&pool, &uid).unwrap().unwrap();
        assert_eq!(found.file_width, 4000);
    }

    #[test]
    fn test_lookups_return_none_when_absent() {
        let pool = create_in_memory_pool().unwrap();

        assert!(File::find_by_uid(&pool, "f000000000000000")
            .unwrap()
            .is_none());
        assert!(File::find_by_hash(&pool, "nope").unwrap().is_none());
        assert!(File::find_by_name_and_root(&pool, "x.jpg", "originals")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_find_by_hash_tolerates_duplicates() {
        let pool = create_in_memory_pool().unwrap();

        let mut a = File::new("p123456789abcdef", "originals", "a.jpg");
        a.file_hash = Some("samehash".to_string());
        a.create(&pool).unwrap();

        let mut b = File::new("p123456789abcdef", "originals", "b.jpg");
        b.file_hash = Some("samehash".to_string());
        b.create(&pool).unwrap();

        let found = File::find_by_hash(&pool, "samehash").unwrap().unwrap();
        assert_eq!(found.file_uid, a.file_uid);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("originals", "2023/a.jpg"), "originals/2023/a.jpg");
        assert_eq!(join_path("originals/", "/a.jpg"), "originals/a.jpg");
        assert_eq!(join_path("", "a.jpg"), "a.jpg");
    }
}
