use serde::Deserialize;
use serde_json::json;
use warp::{reject, Filter, Rejection, Reply};

use crate::config::Config;
use crate::db::DbPool;
use crate::db_user::{ThrottleDelay, User};
use crate::warp_helpers::{with_config, with_db, DatabaseError, UnauthorizedError};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/session: exchanges credentials for the configured API token.
/// The escalating throttle can sleep for up to a minute, so the check runs
/// off the async workers.
pub async fn create_session(
    req: LoginRequest,
    db_pool: DbPool,
    config: Config,
) -> Result<impl Reply, Rejection> {
    let user = match User::find_by_name(&db_pool, &req.username) {
        Ok(Some(user)) => user,
        Ok(None) => return Err(reject::custom(UnauthorizedError)),
        Err(e) => {
            log::error!("session: {}", e);
            return Err(reject::custom(DatabaseError {
                message: "Database error".to_string(),
            }));
        }
    };

    let pool = db_pool.clone();
    let password = req.password.clone();
    let valid = tokio::task::spawn_blocking(move || {
        let mut user = user;
        user.verify_password(&pool, &ThrottleDelay, &password)
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| {
        log::error!("session: {}", e);
        reject::custom(DatabaseError {
            message: "Internal error".to_string(),
        })
    })?
    .map_err(|e| {
        log::error!("session: {}", e);
        reject::custom(DatabaseError {
            message: "Database error".to_string(),
        })
    })?;

    if !valid {
        return Err(reject::custom(UnauthorizedError));
    }

    Ok(warp::reply::json(&json!({
        "status": "ok",
        "token": config.api_token,
    })))
}

pub fn session_routes(
    db_pool: DbPool,
    config: Config,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("api")
        .and(warp::path("session"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json::<LoginRequest>())
        .and(with_db(db_pool))
        .and(with_config(config))
        .and_then(create_session)
}
