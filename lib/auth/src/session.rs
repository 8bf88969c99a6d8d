use http::HeaderMap;

use threadboard_utils::errors::AppError;

use crate::user::User;

/// Headers set by the authentication gateway in front of the server.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Returns the authenticated user or `AppError::Unauthorized` if the request is anonymous.
pub fn check_user(user: Option<&User>) -> Result<&User, AppError> {
    user.ok_or(AppError::Unauthorized)
}

/// Reads the acting user from the trusted identity headers.
///
/// Returns `Ok(None)` for anonymous requests, i.e. when the user id header is missing. The identity is not
/// verified here, the gateway is responsible for stripping these headers from incoming client requests.
pub fn get_user_from_headers(headers: &HeaderMap) -> Result<Option<User>, AppError> {
    let Some(user_id) = headers.get(USER_ID_HEADER) else {
        return Ok(None)
    };
    let user_id = user_id
        .to_str()
        .ok()
        .and_then(|user_id| user_id.parse::<i64>().ok())
        .ok_or_else(|| AppError::validation(format!("Invalid {USER_ID_HEADER} header.")))?;
    let username = match headers.get(USER_NAME_HEADER) {
        Some(username) => username
            .to_str()
            .map_err(|_| AppError::validation(format!("Invalid {USER_NAME_HEADER} header.")))?,
        None => return Err(AppError::validation(format!("Missing {USER_NAME_HEADER} header."))),
    };
    log::trace!("Request from user {user_id}.");
    User::new(user_id, username).map(Some)
}

#[cfg(feature = "ssr")]
pub mod ssr {
    use anyhow::Context;
    use sqlx::{postgres::PgPoolOptions, PgPool};

    pub const DB_URL_ENV: &str = "DATABASE_URL";

    pub async fn create_db_pool(db_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await
            .with_context(|| "Failed to connect to DB")
    }
}
