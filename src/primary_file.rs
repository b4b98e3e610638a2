use log::debug;
use rusqlite::params;
use thiserror::Error;

use crate::db::DbPool;

#[derive(Debug, Error)]
pub enum PrimaryFileError {
    #[error("photo uid is missing")]
    MissingPhotoUid,
    #[error("no eligible file for {0}")]
    NoEligibleFile(String),
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
    #[error(transparent)]
    Pool(#[from] r2d2::Error),
}

/// Ensures exactly one file of the photo is marked primary.
///
/// An explicitly supplied candidate wins; otherwise the widest non-missing
/// JPEG is chosen. The clear-others write is issued before the set-chosen
/// write, so a reader can transiently observe zero or two primaries but the
/// steady state always converges to one. Concurrent invocations for the same
/// photo must be serialized by the caller.
pub fn set_photo_primary(
    pool: &DbPool,
    photo_uid: &str,
    file_uid: Option<&str>,
) -> Result<(), PrimaryFileError> {
    if photo_uid.is_empty() {
        return Err(PrimaryFileError::MissingPhotoUid);
    }

    let conn = pool.get()?;

    let chosen = match file_uid {
        Some(uid) if !uid.is_empty() => uid.to_string(),
        _ => {
            let mut stmt = conn.prepare(
                "SELECT file_uid FROM files \
                 WHERE photo_uid = ? AND file_missing = 0 AND file_type = 'jpg' \
                 ORDER BY file_width DESC, id LIMIT 1",
            )?;
            match stmt.query_row([photo_uid], |row| row.get::<_, String>(0)) {
                Ok(uid) => uid,
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    return Err(PrimaryFileError::NoEligibleFile(photo_uid.to_string()))
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    debug!("files: setting {} as primary for {}", chosen, photo_uid);

    // Ordered: clear the rest first so the steady state never keeps two
    // primaries.
    conn.execute(
        "UPDATE files SET file_primary = 0 WHERE photo_uid = ? AND file_uid <> ?",
        params![photo_uid, chosen],
    )?;
    conn.execute(
        "UPDATE files SET file_primary = 1 WHERE photo_uid = ? AND file_uid = ?",
        params![photo_uid, chosen],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_in_memory_pool, Photo};
    use crate::db_file::File;

    fn add_file(
        pool: &DbPool,
        photo_uid: &str,
        name: &str,
        file_type: &str,
        width: i64,
        missing: bool,
    ) -> File {
        let mut file = File::new(photo_uid, "originals", name);
        file.file_type = file_type.to_string();
        file.file_width = width;
        file.file_missing = missing;
        file.create(pool).unwrap();
        file
    }

    fn primary_uids(pool: &DbPool, photo_uid: &str) -> Vec<String> {
        let conn = pool.get().unwrap();
        let mut stmt = conn
            .prepare("SELECT file_uid FROM files WHERE photo_uid = ? AND file_primary = 1")
            .unwrap();
        let rows = stmt
            .query_map([photo_uid], |row| row.get::<_, String>(0))
            .unwrap();
        rows.map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_widest_jpeg_wins() {
        let pool = create_in_memory_pool().unwrap();
        let mut photo = Photo::new("");
        photo.create(&pool).unwrap();
        let uid = photo.photo_uid.clone();

        add_file(&pool, &uid, "small.jpg", "jpg", 800, false);
        let widest = add_file(&pool, &uid, "big.jpg", "jpg", 4000, false);
        add_file(&pool, &uid, "raw.dng", "raw", 6000, false);
        add_file(&pool, &uid, "gone.jpg", "jpg", 8000, true);

        set_photo_primary(&pool, &uid, None).unwrap();
        assert_eq!(primary_uids(&pool, &uid), vec![widest.file_uid]);
    }

    #[test]
    fn test_explicit_candidate_wins() {
        let pool = create_in_memory_pool().unwrap();
        let mut photo = Photo::new("");
        photo.create(&pool).unwrap();
        let uid = photo.photo_uid.clone();

        add_file(&pool, &uid, "big.jpg", "jpg", 4000, false);
        let chosen = add_file(&pool, &uid, "small.jpg", "jpg", 800, false);

        set_photo_primary(&pool, &uid, Some(&chosen.file_uid)).unwrap();
        assert_eq!(primary_uids(&pool, &uid), vec![chosen.file_uid]);
    }

    #[test]
    fn test_resolving_twice_keeps_one_primary() {
        let pool = create_in_memory_pool().unwrap();
        let mut photo = Photo::new("");
        photo.create(&pool).unwrap();
        let uid = photo.photo_uid.clone();

        let a = add_file(&pool, &uid, "a.jpg", "jpg", 1000, false);
        let b = add_file(&pool, &uid, "b.jpg", "jpg", 2000, false);

        set_photo_primary(&pool, &uid, Some(&a.file_uid)).unwrap();
        set_photo_primary(&pool, &uid, Some(&b.file_uid)).unwrap();
        assert_eq!(primary_uids(&pool, &uid), vec![b.file_uid]);

        set_photo_primary(&pool, &uid, None).unwrap();
        assert_eq!(primary_uids(&pool, &uid).len(), 1);
    }

    #[test]
    fn test_no_eligible_file_makes_no_changes() {
        let pool = create_in_memory_pool().unwrap();
        let mut photo = Photo::new("");
        photo.create(&pool).unwrap();
        let uid = photo.photo_uid.clone();

        add_file(&pool, &uid, "raw.dng", "raw", 6000, false);
        add_file(&pool, &uid, "gone.jpg", "jpg", 8000, true);

        let err = set_photo_primary(&pool, &uid, None).unwrap_err();
        assert!(matches!(err, PrimaryFileError::NoEligibleFile(_)));
        assert!(primary_uids(&pool, &uid).is_empty());
    }

    #[test]
    fn test_missing_photo_uid_rejected() {
        let pool = create_in_memory_pool().unwrap();
        let err = set_photo_primary(&pool, "", None).unwrap_err();
        assert!(matches!(err, PrimaryFileError::MissingPhotoUid));
    }
}
