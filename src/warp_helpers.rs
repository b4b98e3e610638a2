use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

use warp::{reject, Filter, Rejection, Reply};

use crate::config::Config;
use crate::db::DbPool;
use crate::events::ChangeNotifier;
use crate::photo_delete::FileRemover;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub timestamp: String,
}

#[derive(Debug)]
pub struct UnauthorizedError;
impl reject::Reject for UnauthorizedError {}

#[derive(Debug)]
pub struct NotFoundError;
impl reject::Reject for NotFoundError {}

#[derive(Debug)]
pub struct ValidationError {
    pub message: String,
}
impl reject::Reject for ValidationError {}

#[derive(Debug)]
pub struct SaveFailedError;
impl reject::Reject for SaveFailedError {}

#[derive(Debug)]
pub struct FeatureDisabledError;
impl reject::Reject for FeatureDisabledError {}

#[derive(Debug)]
pub struct DatabaseError {
    pub message: String,
}
impl reject::Reject for DatabaseError {}

pub fn with_db(db_pool: DbPool) -> impl Filter<Extract = (DbPool,), Error = Infallible> + Clone {
    warp::any().map(move || db_pool.clone())
}

pub fn with_config(
    config: Config,
) -> impl Filter<Extract = (Config,), Error = Infallible> + Clone {
    warp::any().map(move || config.clone())
}

pub fn with_notifier(
    notifier: Arc<dyn ChangeNotifier>,
) -> impl Filter<Extract = (Arc<dyn ChangeNotifier>,), Error = Infallible> + Clone {
    warp::any().map(move || notifier.clone())
}

pub fn with_remover(
    remover: Arc<dyn FileRemover>,
) -> impl Filter<Extract = (Arc<dyn FileRemover>,), Error = Infallible> + Clone {
    warp::any().map(move || remover.clone())
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;
    let timestamp = chrono::Utc::now().to_rfc3339();

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if err.find::<UnauthorizedError>().is_some() {
        code = warp::http::StatusCode::UNAUTHORIZED;
        message = "Unauthorized".to_string();
    } else if err.find::<NotFoundError>().is_some() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "No matching entities found".to_string();
    } else if let Some(validation_error) = err.find::<ValidationError>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = validation_error.message.clone();
    } else if err.find::<SaveFailedError>().is_some() {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Changes could not be saved".to_string();
    } else if err.find::<FeatureDisabledError>().is_some() {
        code = warp::http::StatusCode::FORBIDDEN;
        message = "Feature disabled".to_string();
    } else if let Some(database_error) = err.find::<DatabaseError>() {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = database_error.message.clone();
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = "Invalid request body".to_string();
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = warp::http::StatusCode::PAYLOAD_TOO_LARGE;
        message = "Payload too large".to_string();
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        code = warp::http::StatusCode::UNSUPPORTED_MEDIA_TYPE;
        message = "Unsupported media type".to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = warp::http::StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed".to_string();
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error".to_string();
    }

    let error_response = ErrorResponse {
        error: message,
        code: code.as_u16(),
        timestamp,
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&error_response),
        code,
    ))
}

pub fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
}
