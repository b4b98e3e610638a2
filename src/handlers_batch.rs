use serde_json::json;
use std::sync::Arc;
use warp::{reject, Filter, Rejection, Reply};

use crate::acl::{self, Action, Resource, Role};
use crate::batch::{self, BatchError, BatchOutcome};
use crate::config::Config;
use crate::db::{DbPool, Selection};
use crate::events::ChangeNotifier;
use crate::photo_delete::FileRemover;
use crate::warp_helpers::{
    with_config, with_db, with_notifier, with_remover, FeatureDisabledError, NotFoundError,
    SaveFailedError, UnauthorizedError, ValidationError,
};

/// Checks the caller's token and role grant. With no token configured the
/// server runs in single-user mode and the caller acts as the seeded admin.
fn authorize(
    config: &Config,
    auth_header: Option<&str>,
    resource: Resource,
    action: Action,
) -> Result<(), Rejection> {
    let token = auth_header
        .and_then(|h| h.strip_prefix("Bearer "))
        .unwrap_or("");

    let role = if config.api_token.is_empty() || token == config.api_token {
        Role::Admin
    } else {
        return Err(reject::custom(UnauthorizedError));
    };

    if !acl::allowed(role, resource, action) {
        return Err(reject::custom(UnauthorizedError));
    }

    Ok(())
}

/// Filter that rejects unauthorized callers before the request body is read,
/// so a deny never reaches selection parsing or the store.
fn require_authorization(
    config: Config,
    resource: Resource,
    action: Action,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and_then(move |header: Option<String>| {
            let verdict = authorize(&config, header.as_deref(), resource, action);
            async move { verdict }
        })
        .untuple_one()
}

fn reply_ok(message: &str, outcome: &BatchOutcome) -> impl Reply {
    warp::reply::json(&json!({
        "code": 200,
        "message": message,
        "count": outcome.affected.len(),
    }))
}

fn reject_batch(err: BatchError) -> Rejection {
    match err {
        BatchError::NoItemsSelected => reject::custom(ValidationError {
            message: "No items selected".to_string(),
        }),
        BatchError::NotFound => reject::custom(NotFoundError),
        BatchError::SaveFailed(_) => reject::custom(SaveFailedError),
        BatchError::FeatureDisabled => reject::custom(FeatureDisabledError),
    }
}

pub async fn archive_photos(
    selection: Selection,
    db_pool: DbPool,
    notifier: Arc<dyn ChangeNotifier>,
) -> Result<impl Reply, Rejection> {
    match batch::archive_photos(&db_pool, &selection, notifier.as_ref()) {
        Ok(outcome) => Ok(reply_ok("Selection archived", &outcome)),
        Err(e) => Err(reject_batch(e)),
    }
}

pub async fn restore_photos(
    selection: Selection,
    db_pool: DbPool,
    notifier: Arc<dyn ChangeNotifier>,
) -> Result<impl Reply, Rejection> {
    match batch::restore_photos(&db_pool, &selection, notifier.as_ref()) {
        Ok(outcome) => Ok(reply_ok("Selection restored", &outcome)),
        Err(e) => Err(reject_batch(e)),
    }
}

pub async fn approve_photos(
    selection: Selection,
    db_pool: DbPool,
    notifier: Arc<dyn ChangeNotifier>,
) -> Result<impl Reply, Rejection> {
    match batch::approve_photos(&db_pool, &selection, notifier.as_ref()) {
        Ok(outcome) => Ok(reply_ok("Selection approved", &outcome)),
        Err(e) => Err(reject_batch(e)),
    }
}

pub async fn delete_albums(
    selection: Selection,
    db_pool: DbPool,
    notifier: Arc<dyn ChangeNotifier>,
) -> Result<impl Reply, Rejection> {
    match batch::delete_albums(&db_pool, &selection, notifier.as_ref()) {
        Ok(outcome) => Ok(reply_ok("Albums deleted", &outcome)),
        Err(e) => Err(reject_batch(e)),
    }
}

pub async fn photos_private(
    selection: Selection,
    db_pool: DbPool,
    notifier: Arc<dyn ChangeNotifier>,
) -> Result<impl Reply, Rejection> {
    match batch::batch_photos_private(&db_pool, &selection, notifier.as_ref()) {
        Ok(outcome) => Ok(reply_ok("Selection protected", &outcome)),
        Err(e) => Err(reject_batch(e)),
    }
}

pub async fn delete_labels(
    selection: Selection,
    db_pool: DbPool,
    notifier: Arc<dyn ChangeNotifier>,
) -> Result<impl Reply, Rejection> {
    match batch::delete_labels(&db_pool, &selection, notifier.as_ref()) {
        Ok(outcome) => Ok(reply_ok("Labels deleted", &outcome)),
        Err(e) => Err(reject_batch(e)),
    }
}

pub async fn delete_photos(
    selection: Selection,
    db_pool: DbPool,
    notifier: Arc<dyn ChangeNotifier>,
    config: Config,
    remover: Arc<dyn FileRemover>,
) -> Result<impl Reply, Rejection> {
    match batch::delete_photos(
        &db_pool,
        &config,
        &selection,
        remover.as_ref(),
        notifier.as_ref(),
    ) {
        Ok(outcome) => Ok(reply_ok("Permanently deleted", &outcome)),
        Err(e) => Err(reject_batch(e)),
    }
}

/// All `/api/batch/*` routes. The authorization filter runs before the body
/// is deserialized in every route.
pub fn batch_routes(
    db_pool: DbPool,
    config: Config,
    notifier: Arc<dyn ChangeNotifier>,
    remover: Arc<dyn FileRemover>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let common = warp::body::content_length_limit(64 * 1024)
        .and(warp::body::json::<Selection>())
        .and(with_db(db_pool))
        .and(with_notifier(notifier));

    let api_photos_archive = warp::path("api")
        .and(warp::path("batch"))
        .and(warp::path("photos"))
        .and(warp::path("archive"))
        .and(warp::path::end())
        .and(warp::post())
        .and(require_authorization(
            config.clone(),
            Resource::Photos,
            Action::Delete,
        ))
        .and(common.clone())
        .and_then(archive_photos);

    let api_photos_restore = warp::path("api")
        .and(warp::path("batch"))
        .and(warp::path("photos"))
        .and(warp::path("restore"))
        .and(warp::path::end())
        .and(warp::post())
        .and(require_authorization(
            config.clone(),
            Resource::Photos,
            Action::Delete,
        ))
        .and(common.clone())
        .and_then(restore_photos);

    let api_photos_approve = warp::path("api")
        .and(warp::path("batch"))
        .and(warp::path("photos"))
        .and(warp::path("approve"))
        .and(warp::path::end())
        .and(warp::post())
        .and(require_authorization(
            config.clone(),
            Resource::Photos,
            Action::Update,
        ))
        .and(common.clone())
        .and_then(approve_photos);

    let api_photos_private = warp::path("api")
        .and(warp::path("batch"))
        .and(warp::path("photos"))
        .and(warp::path("private"))
        .and(warp::path::end())
        .and(warp::post())
        .and(require_authorization(
            config.clone(),
            Resource::Photos,
            Action::Private,
        ))
        .and(common.clone())
        .and_then(photos_private);

    let api_albums_delete = warp::path("api")
        .and(warp::path("batch"))
        .and(warp::path("albums"))
        .and(warp::path("delete"))
        .and(warp::path::end())
        .and(warp::post())
        .and(require_authorization(
            config.clone(),
            Resource::Albums,
            Action::Delete,
        ))
        .and(common.clone())
        .and_then(delete_albums);

    let api_labels_delete = warp::path("api")
        .and(warp::path("batch"))
        .and(warp::path("labels"))
        .and(warp::path("delete"))
        .and(warp::path::end())
        .and(warp::post())
        .and(require_authorization(
            config.clone(),
            Resource::Labels,
            Action::Delete,
        ))
        .and(common.clone())
        .and_then(delete_labels);

    let api_photos_delete = warp::path("api")
        .and(warp::path("batch"))
        .and(warp::path("photos"))
        .and(warp::path("delete"))
        .and(warp::path::end())
        .and(warp::post())
        .and(require_authorization(
            config.clone(),
            Resource::Photos,
            Action::Delete,
        ))
        .and(common)
        .and(with_config(config))
        .and(with_remover(remover))
        .and_then(delete_photos);

    api_photos_archive
        .or(api_photos_restore)
        .or(api_photos_approve)
        .or(api_photos_private)
        .or(api_albums_delete)
        .or(api_labels_delete)
        .or(api_photos_delete)
}
