use chrono::Utc;
use log::{error, info};
use thiserror::Error;

use crate::config::Config;
use crate::db::{photo_selection, placeholders, update_photo_counts, DbPool, Scope, Selection};
use crate::db_album::Label;
use crate::events::{ChangeAction, ChangeNotifier};
use crate::photo_delete::{delete_photo, FileRemover};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no items selected")]
    NoItemsSelected,
    #[error("no matching entities found")]
    NotFound,
    #[error("changes could not be saved: {0}")]
    SaveFailed(String),
    #[error("feature disabled")]
    FeatureDisabled,
}

/// Result of a successful batch call: the identifiers reported to the
/// notifier.
#[derive(Debug)]
pub struct BatchOutcome {
    pub affected: Vec<String>,
}

/// Soft-deletes the selected photos and hides their album memberships.
pub fn archive_photos(
    pool: &DbPool,
    selection: &Selection,
    notifier: &dyn ChangeNotifier,
) -> Result<BatchOutcome, BatchError> {
    if selection.photos.is_empty() {
        return Err(BatchError::NoItemsSelected);
    }

    info!("photos: archiving {}", selection.summary());

    let conn = pool.get().map_err(save_failed)?;
    let sql = format!(
        "UPDATE photos SET deleted_at = ?, updated_at = ? \
         WHERE photo_uid IN ({}) AND deleted_at IS NULL",
        placeholders(selection.photos.len())
    );
    let now = Utc::now().to_rfc3339();
    let mut params: Vec<&dyn rusqlite::ToSql> = vec![&now, &now];
    params.extend(selection.photos.iter().map(|u| u as &dyn rusqlite::ToSql));
    conn.execute(&sql, params.as_slice()).map_err(save_failed)?;

    // Memberships come back on restore, so only hide them.
    let sql = format!(
        "UPDATE photos_albums SET hidden = 1 WHERE photo_uid IN ({})",
        placeholders(selection.photos.len())
    );
    let params: Vec<&dyn rusqlite::ToSql> = selection
        .photos
        .iter()
        .map(|u| u as &dyn rusqlite::ToSql)
        .collect();
    if let Err(e) = conn.execute(&sql, params.as_slice()) {
        error!("archive: {}", e);
    }
    drop(conn);

    log_on_error("photos", update_photo_counts(pool));

    notifier.notify("photos", ChangeAction::Archived, &selection.photos);

    Ok(BatchOutcome {
        affected: selection.photos.clone(),
    })
}

/// Clears the soft-delete timestamp on the selected photos. Runs unscoped by
/// definition: archived rows are exactly the target.
pub fn restore_photos(
    pool: &DbPool,
    selection: &Selection,
    notifier: &dyn ChangeNotifier,
) -> Result<BatchOutcome, BatchError> {
    if selection.photos.is_empty() {
        return Err(BatchError::NoItemsSelected);
    }

    info!("photos: restoring {}", selection.summary());

    let conn = pool.get().map_err(save_failed)?;
    let sql = format!(
        "UPDATE photos SET deleted_at = NULL, updated_at = ? WHERE photo_uid IN ({})",
        placeholders(selection.photos.len())
    );
    let now = Utc::now().to_rfc3339();
    let mut params: Vec<&dyn rusqlite::ToSql> = vec![&now];
    params.extend(selection.photos.iter().map(|u| u as &dyn rusqlite::ToSql));
    conn.execute(&sql, params.as_slice()).map_err(save_failed)?;

    let sql = format!(
        "UPDATE photos_albums SET hidden = 0 WHERE photo_uid IN ({})",
        placeholders(selection.photos.len())
    );
    let params: Vec<&dyn rusqlite::ToSql> = selection
        .photos
        .iter()
        .map(|u| u as &dyn rusqlite::ToSql)
        .collect();
    if let Err(e) = conn.execute(&sql, params.as_slice()) {
        error!("restore: {}", e);
    }
    drop(conn);

    log_on_error("photos", update_photo_counts(pool));

    notifier.notify("photos", ChangeAction::Restored, &selection.photos);

    Ok(BatchOutcome {
        affected: selection.photos.clone(),
    })
}

/// Clears the pending-approval state per photo. Partial failure is tolerated:
/// failed items are logged and skipped, and only the approved subset is
/// reported.
pub fn approve_photos(
    pool: &DbPool,
    selection: &Selection,
    notifier: &dyn ChangeNotifier,
) -> Result<BatchOutcome, BatchError> {
    if selection.photos.is_empty() {
        return Err(BatchError::NoItemsSelected);
    }

    info!("photos: approving {}", selection.summary());

    let photos = photo_selection(pool, &selection.photos, Scope::Active)
        .map_err(|_| BatchError::NotFound)?;
    if photos.is_empty() {
        return Err(BatchError::NotFound);
    }

    let mut approved = Vec::new();
    for mut photo in photos {
        match photo.approve(pool) {
            Ok(()) => approved.push(photo.photo_uid),
            Err(e) => error!("approve: {}", e),
        }
    }

    notifier.notify("photos", ChangeAction::Updated, &approved);

    Ok(BatchOutcome { affected: approved })
}

/// Hard-deletes the selected albums and their join rows. Photos are not
/// touched.
pub fn delete_albums(
    pool: &DbPool,
    selection: &Selection,
    notifier: &dyn ChangeNotifier,
) -> Result<BatchOutcome, BatchError> {
    if selection.albums.is_empty() {
        return Err(BatchError::NoItemsSelected);
    }

    info!("albums: deleting {}", selection.summary());

    let conn = pool.get().map_err(save_failed)?;
    let marks = placeholders(selection.albums.len());
    let params: Vec<&dyn rusqlite::ToSql> = selection
        .albums
        .iter()
        .map(|u| u as &dyn rusqlite::ToSql)
        .collect();
    conn.execute(
        &format!("DELETE FROM albums WHERE album_uid IN ({})", marks),
        params.as_slice(),
    )
    .map_err(save_failed)?;
    conn.execute(
        &format!("DELETE FROM photos_albums WHERE album_uid IN ({})", marks),
        params.as_slice(),
    )
    .map_err(save_failed)?;

    notifier.notify("albums", ChangeAction::Deleted, &selection.albums);

    Ok(BatchOutcome {
        affected: selection.albums.clone(),
    })
}

/// Inverts the private flag on the selected photos. A true toggle, not a
/// set-to-value.
pub fn batch_photos_private(
    pool: &DbPool,
    selection: &Selection,
    notifier: &dyn ChangeNotifier,
) -> Result<BatchOutcome, BatchError> {
    if selection.photos.is_empty() {
        return Err(BatchError::NoItemsSelected);
    }

    info!("photos: updating private flag for {}", selection.summary());

    let conn = pool.get().map_err(save_failed)?;
    let sql = format!(
        "UPDATE photos SET photo_private = CASE WHEN photo_private > 0 THEN 0 ELSE 1 END, \
         updated_at = ? WHERE photo_uid IN ({}) AND deleted_at IS NULL",
        placeholders(selection.photos.len())
    );
    let now = Utc::now().to_rfc3339();
    let mut params: Vec<&dyn rusqlite::ToSql> = vec![&now];
    params.extend(selection.photos.iter().map(|u| u as &dyn rusqlite::ToSql));
    conn.execute(&sql, params.as_slice()).map_err(save_failed)?;
    drop(conn);

    log_on_error("photos", update_photo_counts(pool));

    match photo_selection(pool, &selection.photos, Scope::Active) {
        Ok(photos) => {
            let affected: Vec<String> = photos.into_iter().map(|p| p.photo_uid).collect();
            notifier.notify("photos", ChangeAction::Updated, &affected);
            Ok(BatchOutcome { affected })
        }
        Err(e) => {
            error!("private: {}", e);
            Ok(BatchOutcome {
                affected: selection.photos.clone(),
            })
        }
    }
}

/// Deletes the selected labels and their photo joins, one label at a time.
/// Per-label failures are logged and skipped.
pub fn delete_labels(
    pool: &DbPool,
    selection: &Selection,
    notifier: &dyn ChangeNotifier,
) -> Result<BatchOutcome, BatchError> {
    if selection.labels.is_empty() {
        return Err(BatchError::NoItemsSelected);
    }

    info!("labels: deleting {}", selection.summary());

    let labels = find_labels(pool, &selection.labels).map_err(|e| save_failed(e.to_string()))?;
    if labels.is_empty() {
        return Err(BatchError::NotFound);
    }

    for label in &labels {
        log_on_error("labels", label.delete(pool));
    }

    notifier.notify("labels", ChangeAction::Deleted, &selection.labels);

    Ok(BatchOutcome {
        affected: selection.labels.clone(),
    })
}

/// Permanently removes the selected photos and their on-disk content. Only
/// allowed when the delete feature is enabled and the store is writable.
/// Per-photo removal failures are logged and skipped; counts are recomputed
/// and the notifier informed only if at least one photo was removed, and only
/// with the removed subset.
pub fn delete_photos(
    pool: &DbPool,
    config: &Config,
    selection: &Selection,
    remover: &dyn FileRemover,
    notifier: &dyn ChangeNotifier,
) -> Result<BatchOutcome, BatchError> {
    if !config.delete_allowed() {
        return Err(BatchError::FeatureDisabled);
    }

    if selection.photos.is_empty() {
        return Err(BatchError::NoItemsSelected);
    }

    info!("photos: deleting {}", selection.summary());

    let photos = photo_selection(pool, &selection.photos, Scope::Active)
        .map_err(|_| BatchError::NotFound)?;
    if photos.is_empty() {
        return Err(BatchError::NotFound);
    }

    let mut deleted = Vec::new();
    for photo in &photos {
        match delete_photo(pool, remover, photo) {
            Ok(()) => deleted.push(photo.photo_uid.clone()),
            Err(e) => error!("delete: {}", e),
        }
    }

    if !deleted.is_empty() {
        log_on_error("photos", update_photo_counts(pool));
        notifier.notify("photos", ChangeAction::Deleted, &deleted);
    }

    Ok(BatchOutcome { affected: deleted })
}

fn find_labels(pool: &DbPool, uids: &[String]) -> Result<Vec<Label>, Box<dyn std::error::Error>> {
    let conn = pool.get()?;
    let sql = format!(
        "SELECT {} FROM labels WHERE label_uid IN ({}) ORDER BY id",
        Label::COLUMNS,
        placeholders(uids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::ToSql> = uids.iter().map(|u| u as &dyn rusqlite::ToSql).collect();
    let rows = stmt.query_map(params.as_slice(), Label::from_row)?;

    let mut labels = Vec::new();
    for label in rows {
        labels.push(label?);
    }
    Ok(labels)
}

fn save_failed(e: impl std::fmt::Display) -> BatchError {
    error!("batch: {}", e);
    BatchError::SaveFailed(e.to_string())
}

fn log_on_error(context: &str, result: Result<(), Box<dyn std::error::Error>>) {
    if let Err(e) = result {
        error!("{}: {}", context, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_in_memory_pool, Photo, PhotoStatus};
    use crate::db_album::{Album, PhotoAlbum};
    use crate::db_file::File;
    use crate::events::testing::RecordingNotifier;
    use crate::photo_delete::testing::FakeRemover;

    fn seed_photos(pool: &DbPool, n: usize) -> Vec<String> {
        (0..n)
            .map(|i| {
                let mut photo = Photo::new(&format!("2023/{:02}", i));
                photo.create(pool).unwrap();
                let mut file = File::new(&photo.photo_uid, "originals", &format!("img_{}.jpg", i));
                file.file_type = "jpg".to_string();
                file.create(pool).unwrap();
                photo.photo_uid
            })
            .collect()
    }

    fn photo_selection_of(uids: &[String]) -> Selection {
        Selection {
            photos: uids.to_vec(),
            ..Default::default()
        }
    }

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    #[test]
    fn test_empty_selection_rejected_without_writes() {
        let pool = create_in_memory_pool().unwrap();
        seed_photos(&pool, 1);
        let notifier = RecordingNotifier::new();
        let config = Config::for_tests();
        let remover = FakeRemover::new();
        let empty = Selection::default();

        assert!(matches!(
            archive_photos(&pool, &empty, &notifier),
            Err(BatchError::NoItemsSelected)
        ));
        assert!(matches!(
            restore_photos(&pool, &empty, &notifier),
            Err(BatchError::NoItemsSelected)
        ));
        assert!(matches!(
            approve_photos(&pool, &empty, &notifier),
            Err(BatchError::NoItemsSelected)
        ));
        assert!(matches!(
            delete_albums(&pool, &empty, &notifier),
            Err(BatchError::NoItemsSelected)
        ));
        assert!(matches!(
            batch_photos_private(&pool, &empty, &notifier),
            Err(BatchError::NoItemsSelected)
        ));
        assert!(matches!(
            delete_labels(&pool, &empty, &notifier),
            Err(BatchError::NoItemsSelected)
        ));
        assert!(matches!(
            delete_photos(&pool, &config, &empty, &remover, &notifier),
            Err(BatchError::NoItemsSelected)
        ));

        assert!(notifier.take().is_empty());
        assert!(remover.removed.lock().unwrap().is_empty());

        // Nothing was touched.
        let conn = pool.get().unwrap();
        let archived: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM photos WHERE deleted_at IS NOT NULL",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(archived, 0);
    }

    #[test]
    fn test_archive_then_restore_roundtrip() {
        let pool = create_in_memory_pool().unwrap();
        let uids = seed_photos(&pool, 3);
        let notifier = RecordingNotifier::new();
        let selection = photo_selection_of(&uids);

        archive_photos(&pool, &selection, &notifier).unwrap();
        for uid in &uids {
            let photo = Photo::find_by_uid(&pool, uid, Scope::All).unwrap().unwrap();
            assert!(photo.status.is_archived());
        }

        restore_photos(&pool, &selection, &notifier).unwrap();
        for uid in &uids {
            let photo = Photo::find_by_uid(&pool, uid, Scope::Active)
                .unwrap()
                .unwrap();
            assert_eq!(photo.status, PhotoStatus::Active);
        }

        let events = notifier.take();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].1, ChangeAction::Archived);
        assert_eq!(events[1].1, ChangeAction::Restored);
        assert_eq!(sorted(events[0].2.clone()), sorted(uids.clone()));
        assert_eq!(sorted(events[1].2.clone()), sorted(uids));
    }

    #[test]
    fn test_archive_hides_album_memberships() {
        let pool = create_in_memory_pool().unwrap();
        let uids = seed_photos(&pool, 1);
        let notifier = RecordingNotifier::new();

        let mut album = Album::new("Trip");
        album.create(&pool).unwrap();
        PhotoAlbum::new(&uids[0], &album.album_uid)
            .create(&pool)
            .unwrap();

        archive_photos(&pool, &photo_selection_of(&uids), &notifier).unwrap();

        let memberships = PhotoAlbum::find_by_album(&pool, &album.album_uid).unwrap();
        assert_eq!(memberships.len(), 1);
        assert!(memberships[0].hidden);

        // Album itself is untouched, but counts no longer include the
        // archived member.
        let album = Album::find_by_uid(&pool, &album.album_uid).unwrap().unwrap();
        assert_eq!(album.photo_count, 0);

        restore_photos(&pool, &photo_selection_of(&uids), &notifier).unwrap();
        let memberships = PhotoAlbum::find_by_album(&pool, &album.album_uid).unwrap();
        assert!(!memberships[0].hidden);
        let album = Album::find_by_uid(&pool, &album.album_uid).unwrap().unwrap();
        assert_eq!(album.photo_count, 1);
    }

    #[test]
    fn test_approve_notifies_only_approved_subset() {
        let pool = create_in_memory_pool().unwrap();
        let uids = seed_photos(&pool, 2);
        let notifier = RecordingNotifier::new();

        // One selected UID does not exist; the other two are approved.
        let mut selection = photo_selection_of(&uids);
        selection.photos.push("p000000000000000".to_string());

        let outcome = approve_photos(&pool, &selection, &notifier).unwrap();
        assert_eq!(sorted(outcome.affected), sorted(uids.clone()));

        for uid in &uids {
            let photo = Photo::find_by_uid(&pool, uid, Scope::Active)
                .unwrap()
                .unwrap();
            assert!(!photo.photo_pending);
        }

        let events = notifier.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, ChangeAction::Updated);
        assert_eq!(sorted(events[0].2.clone()), sorted(uids));
    }

    #[test]
    fn test_approve_unknown_selection_is_not_found() {
        let pool = create_in_memory_pool().unwrap();
        let notifier = RecordingNotifier::new();
        let selection = photo_selection_of(&["p000000000000000".to_string()]);

        assert!(matches!(
            approve_photos(&pool, &selection, &notifier),
            Err(BatchError::NotFound)
        ));
        assert!(notifier.take().is_empty());
    }

    #[test]
    fn test_toggle_privacy_twice_restores_original() {
        let pool = create_in_memory_pool().unwrap();
        let uids = seed_photos(&pool, 2);
        let notifier = RecordingNotifier::new();

        // Start with mixed flags.
        let mut first = Photo::find_by_uid(&pool, &uids[0], Scope::Active)
            .unwrap()
            .unwrap();
        first.photo_private = true;
        first.save(&pool).unwrap();

        let selection = photo_selection_of(&uids);
        batch_photos_private(&pool, &selection, &notifier).unwrap();

        let toggled: Vec<bool> = uids
            .iter()
            .map(|uid| {
                Photo::find_by_uid(&pool, uid, Scope::Active)
                    .unwrap()
                    .unwrap()
                    .photo_private
            })
            .collect();
        assert_eq!(toggled, vec![false, true]);

        batch_photos_private(&pool, &selection, &notifier).unwrap();

        let restored: Vec<bool> = uids
            .iter()
            .map(|uid| {
                Photo::find_by_uid(&pool, uid, Scope::Active)
                    .unwrap()
                    .unwrap()
                    .photo_private
            })
            .collect();
        assert_eq!(restored, vec![true, false]);

        let events = notifier.take();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.1 == ChangeAction::Updated));
    }

    #[test]
    fn test_delete_albums_cascades_joins_only_for_selection() {
        let pool = create_in_memory_pool().unwrap();
        let uids = seed_photos(&pool, 1);
        let notifier = RecordingNotifier::new();

        let mut doomed = Album::new("Doomed");
        doomed.create(&pool).unwrap();
        let mut kept = Album::new("Kept");
        kept.create(&pool).unwrap();

        PhotoAlbum::new(&uids[0], &doomed.album_uid)
            .create(&pool)
            .unwrap();
        PhotoAlbum::new(&uids[0], &kept.album_uid)
            .create(&pool)
            .unwrap();

        let selection = Selection {
            albums: vec![doomed.album_uid.clone()],
            ..Default::default()
        };
        delete_albums(&pool, &selection, &notifier).unwrap();

        assert!(Album::find_by_uid(&pool, &doomed.album_uid).unwrap().is_none());
        assert!(PhotoAlbum::find_by_album(&pool, &doomed.album_uid)
            .unwrap()
            .is_empty());

        // The same photo's membership in another album is untouched.
        let kept_joins = PhotoAlbum::find_by_album(&pool, &kept.album_uid).unwrap();
        assert_eq!(kept_joins.len(), 1);
        assert_eq!(kept_joins[0].photo_uid, uids[0]);

        let events = notifier.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "albums");
        assert_eq!(events[0].1, ChangeAction::Deleted);
    }

    #[test]
    fn test_delete_labels_removes_labels_and_joins() {
        let pool = create_in_memory_pool().unwrap();
        let uids = seed_photos(&pool, 1);
        let notifier = RecordingNotifier::new();

        let mut label = Label::new("beach");
        label.create(&pool).unwrap();
        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO photos_labels (photo_uid, label_uid) VALUES (?1, ?2)",
                rusqlite::params![uids[0], label.label_uid],
            )
            .unwrap();

        let selection = Selection {
            labels: vec![label.label_uid.clone()],
            ..Default::default()
        };
        delete_labels(&pool, &selection, &notifier).unwrap();

        let conn = pool.get().unwrap();
        let labels: i64 = conn
            .query_row("SELECT COUNT(*) FROM labels", [], |r| r.get(0))
            .unwrap();
        let joins: i64 = conn
            .query_row("SELECT COUNT(*) FROM photos_labels", [], |r| r.get(0))
            .unwrap();
        assert_eq!(labels, 0);
        assert_eq!(joins, 0);

        let events = notifier.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "labels");
    }

    #[test]
    fn test_permanent_delete_partial_failure() {
        let pool = create_in_memory_pool().unwrap();
        let uids = seed_photos(&pool, 3);
        let notifier = RecordingNotifier::new();
        let config = Config::for_tests();
        let remover = FakeRemover::failing_for(&[uids[1].as_str()]);

        let outcome =
            delete_photos(&pool, &config, &photo_selection_of(&uids), &remover, &notifier).unwrap();

        let mut expected = vec![uids[0].clone(), uids[2].clone()];
        expected.sort();
        assert_eq!(sorted(outcome.affected), expected);

        // The failed photo is retained, the others are gone.
        assert!(Photo::find_by_uid(&pool, &uids[1], Scope::All)
            .unwrap()
            .is_some());
        assert!(Photo::find_by_uid(&pool, &uids[0], Scope::All)
            .unwrap()
            .is_none());
        assert!(Photo::find_by_uid(&pool, &uids[2], Scope::All)
            .unwrap()
            .is_none());

        // Exactly one deleted event, listing only the removed subset.
        let events = notifier.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, ChangeAction::Deleted);
        assert_eq!(sorted(events[0].2.clone()), expected);
    }

    #[test]
    fn test_permanent_delete_respects_feature_gate() {
        let pool = create_in_memory_pool().unwrap();
        let uids = seed_photos(&pool, 1);
        let notifier = RecordingNotifier::new();
        let remover = FakeRemover::new();

        let mut config = Config::for_tests();
        config.features.delete = false;
        assert!(matches!(
            delete_photos(&pool, &config, &photo_selection_of(&uids), &remover, &notifier),
            Err(BatchError::FeatureDisabled)
        ));

        let mut config = Config::for_tests();
        config.read_only = true;
        assert!(matches!(
            delete_photos(&pool, &config, &photo_selection_of(&uids), &remover, &notifier),
            Err(BatchError::FeatureDisabled)
        ));

        assert!(Photo::find_by_uid(&pool, &uids[0], Scope::Active)
            .unwrap()
            .is_some());
        assert!(notifier.take().is_empty());
    }

    #[test]
    fn test_permanent_delete_all_failures_notifies_nothing() {
        let pool = create_in_memory_pool().unwrap();
        let uids = seed_photos(&pool, 2);
        let notifier = RecordingNotifier::new();
        let config = Config::for_tests();
        let remover = FakeRemover::failing_for(&[uids[0].as_str(), uids[1].as_str()]);

        let outcome =
            delete_photos(&pool, &config, &photo_selection_of(&uids), &remover, &notifier).unwrap();
        assert!(outcome.affected.is_empty());
        assert!(notifier.take().is_empty());
    }
}
