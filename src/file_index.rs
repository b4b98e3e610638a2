use log::error;
use std::collections::{HashMap, HashSet};

use crate::db::{placeholders, DbPool};
use crate::db_file::{join_path, File};

/// Point-in-time path snapshot: joined root/name to last-seen unix mod time.
pub type FileMap = HashMap<String, i64>;

/// Returns a snapshot of already indexed paths with their mod times, for the
/// ingestion pipeline to decide whether a file on disk is new, unchanged, or
/// a duplicate. Duplicate-ledger entries are loaded first; a currently
/// indexed file at the same path supersedes its stale ledger entry.
///
/// The snapshot is a best-effort copy. Nothing is locked beyond the queries
/// that build it, so a concurrent writer can make it stale immediately.
pub fn indexed_files(pool: &DbPool) -> Result<FileMap, Box<dyn std::error::Error>> {
    let mut result = FileMap::new();
    let conn = pool.get()?;

    // Known duplicates.
    let mut stmt = conn.prepare("SELECT file_root, file_name, mod_time FROM duplicates")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;
    for row in rows {
        let (root, name, mod_time) = row?;
        result.insert(join_path(&root, &name), mod_time);
    }

    // Indexed files overwrite ledger entries at the same key.
    let mut stmt = conn.prepare(
        "SELECT file_root, file_name, mod_time FROM files \
         WHERE file_missing = 0 AND deleted_at IS NULL",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;
    for row in rows {
        let (root, name, mod_time) = row?;
        result.insert(join_path(&root, &name), mod_time);
    }

    Ok(result)
}

/// Returns the set of all known content hashes among non-missing, non-deleted
/// files. Hash equality is treated as identity; classification is advisory
/// and never blocks ingestion by itself.
pub fn file_hashes(pool: &DbPool) -> Result<HashSet<String>, Box<dyn std::error::Error>> {
    let mut result = HashSet::new();
    let conn = pool.get()?;

    let mut stmt = conn.prepare(
        "SELECT file_hash FROM files \
         WHERE file_hash IS NOT NULL AND file_missing = 0 AND deleted_at IS NULL",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    for hash in rows {
        result.insert(hash?);
    }

    Ok(result)
}

/// Files in a given originals folder, skipping missing files and archived
/// photos.
pub fn files_by_path(
    pool: &DbPool,
    limit: i64,
    offset: i64,
    root_name: &str,
    path_name: &str,
) -> Result<Vec<File>, Box<dyn std::error::Error>> {
    let path_name = path_name.strip_prefix('/').unwrap_or(path_name);

    let conn = pool.get()?;
    let sql = format!(
        "SELECT {} FROM files \
         JOIN photos ON photos.photo_uid = files.photo_uid AND photos.deleted_at IS NULL \
         WHERE files.file_missing = 0 AND files.file_root = ? AND photos.photo_path = ? \
         ORDER BY files.file_name LIMIT ? OFFSET ?",
        qualified_columns()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params![root_name, path_name, limit, offset],
        File::from_row,
    )?;

    collect(rows)
}

/// Paged file listing sorted by row id, optionally including missing files.
pub fn files(
    pool: &DbPool,
    limit: i64,
    offset: i64,
    path_name: &str,
    include_missing: bool,
) -> Result<Vec<File>, Box<dyn std::error::Error>> {
    let path_name = path_name.strip_prefix('/').unwrap_or(path_name);

    let mut sql = format!("SELECT {} FROM files WHERE 1=1", File::COLUMNS);
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if !include_missing {
        sql.push_str(" AND file_missing = 0");
    }

    if !path_name.is_empty() {
        sql.push_str(" AND file_name LIKE ?");
        params.push(Box::new(format!("{}/%", path_name)));
    }

    sql.push_str(" ORDER BY id LIMIT ? OFFSET ?");
    params.push(Box::new(limit));
    params.push(Box::new(offset));

    let conn = pool.get()?;
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), File::from_row)?;

    collect(rows)
}

/// Files matched by a UID set: either the primary file of a selected photo or
/// a directly selected file.
pub fn files_by_uid(
    pool: &DbPool,
    uids: &[String],
    limit: i64,
    offset: i64,
) -> Result<Vec<File>, Box<dyn std::error::Error>> {
    if uids.is_empty() {
        return Ok(Vec::new());
    }

    let marks = placeholders(uids.len());
    let sql = format!(
        "SELECT {} FROM files \
         WHERE (photo_uid IN ({}) AND file_primary = 1) OR file_uid IN ({}) \
         ORDER BY id LIMIT ? OFFSET ?",
        File::COLUMNS,
        marks,
        marks
    );

    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    for uid in uids.iter().chain(uids.iter()) {
        params.push(Box::new(uid.clone()));
    }
    params.push(Box::new(limit));
    params.push(Box::new(offset));

    let conn = pool.get()?;
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), File::from_row)?;

    collect(rows)
}

/// The primary file of a photo, if one has been resolved.
pub fn file_by_photo_uid(
    pool: &DbPool,
    photo_uid: &str,
) -> Result<Option<File>, Box<dyn std::error::Error>> {
    let conn = pool.get()?;
    let sql = format!(
        "SELECT {} FROM files WHERE photo_uid = ? AND file_primary = 1 LIMIT 1",
        File::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;

    match stmt.query_row([photo_uid], File::from_row) {
        Ok(file) => Ok(Some(file)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Box::new(e)),
    }
}

/// Re-points an indexed file to a new location, clearing the missing and
/// deleted markers.
pub fn rename_file(
    pool: &DbPool,
    src_root: &str,
    src_name: &str,
    dest_root: &str,
    dest_name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if src_root.is_empty() || src_name.is_empty() || dest_root.is_empty() || dest_name.is_empty() {
        return Err(format!(
            "can't rename {}/{} to {}/{}",
            src_root, src_name, dest_root, dest_name
        )
        .into());
    }

    let conn = pool.get()?;
    conn.execute(
        "UPDATE files SET file_root = ?, file_name = ?, file_missing = 0, deleted_at = NULL \
         WHERE file_root = ? AND file_name = ?",
        rusqlite::params![dest_root, dest_name, src_root, src_name],
    )?;
    Ok(())
}

/// Updates the file error column. Failures are logged, not propagated.
pub fn set_file_error(pool: &DbPool, file_uid: &str, error_string: &str) {
    let result = pool.get().map_err(Box::<dyn std::error::Error>::from).and_then(|conn| {
        conn.execute(
            "UPDATE files SET file_error = ? WHERE file_uid = ?",
            rusqlite::params![error_string, file_uid],
        )
        .map_err(Into::into)
    });

    if let Err(e) = result {
        error!("files: {}", e);
    }
}

fn qualified_columns() -> String {
    File::COLUMNS
        .split(", ")
        .map(|c| format!("files.{}", c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn collect<F>(rows: rusqlite::MappedRows<'_, F>) -> Result<Vec<File>, Box<dyn std::error::Error>>
where
    F: FnMut(&rusqlite::Row) -> rusqlite::Result<File>,
{
    let mut files = Vec::new();
    for file in rows {
        files.push(file?);
    }
    Ok(files)
}
