use log::info;
use std::path::PathBuf;

use crate::db::{DbPool, Photo};
use crate::db_file::File;

/// Removes a photo's backing files from disk. A trait seam so the batch
/// mutator can be tested with injected failures.
pub trait FileRemover: Send + Sync {
    fn remove(
        &self,
        photo: &Photo,
        files: &[File],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Production remover: unlinks each file below the originals directory.
/// Files already gone from disk are not an error.
pub struct DiskRemover {
    originals_path: PathBuf,
}

impl DiskRemover {
    pub fn new(originals_path: impl Into<PathBuf>) -> Self {
        DiskRemover {
            originals_path: originals_path.into(),
        }
    }
}

impl FileRemover for DiskRemover {
    fn remove(
        &self,
        _photo: &Photo,
        files: &[File],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for file in files {
            let path = self.originals_path.join(file.path());
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(format!("{}: {}", path.display(), e).into()),
            }
        }
        Ok(())
    }
}

/// Permanently removes one photo: backing files via the remover, then every
/// row that references it. Rows are only touched after disk removal
/// succeeded, so a failed removal retains the photo untouched.
pub fn delete_photo(
    pool: &DbPool,
    remover: &dyn FileRemover,
    photo: &Photo,
) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;
    let sql = format!(
        "SELECT {} FROM files WHERE photo_uid = ?",
        File::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([&photo.photo_uid], File::from_row)?;

    let mut files = Vec::new();
    for file in rows {
        files.push(file?);
    }
    drop(stmt);

    remover
        .remove(photo, &files)
        .map_err(|e| e as Box<dyn std::error::Error>)?;

    conn.execute("DELETE FROM files WHERE photo_uid = ?", [&photo.photo_uid])?;
    conn.execute(
        "DELETE FROM photos_albums WHERE photo_uid = ?",
        [&photo.photo_uid],
    )?;
    conn.execute(
        "DELETE FROM photos_labels WHERE photo_uid = ?",
        [&photo.photo_uid],
    )?;
    conn.execute("DELETE FROM photos WHERE photo_uid = ?", [&photo.photo_uid])?;

    info!("photos: permanently removed {}", photo.photo_uid);

    Ok(())
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Remover that fails for a configured set of photo UIDs and records
    /// every removal it performed.
    pub struct FakeRemover {
        pub fail_for: HashSet<String>,
        pub removed: Mutex<Vec<String>>,
    }

    impl FakeRemover {
        pub fn new() -> Self {
            FakeRemover {
                fail_for: HashSet::new(),
                removed: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_for(uids: &[&str]) -> Self {
            FakeRemover {
                fail_for: uids.iter().map(|s| s.to_string()).collect(),
                removed: Mutex::new(Vec::new()),
            }
        }
    }

    impl FileRemover for FakeRemover {
        fn remove(
            &self,
            photo: &Photo,
            _files: &[File],
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if self.fail_for.contains(&photo.photo_uid) {
                return Err(format!("removal failed for {}", photo.photo_uid).into());
            }
            self.removed.lock().unwrap().push(photo.photo_uid.clone());
            Ok(())
        }
    }
}
