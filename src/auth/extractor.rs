use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::auth::jwt;
use crate::error::AppError;
use crate::state::SharedState;

/// Name of the cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "token";

/// The caller identified by a valid session token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.or_else(|| {
            CookieJar::from_headers(&parts.headers)
                .get(TOKEN_COOKIE)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty())
        });

        let Some(token) = token else {
            return Err(AppError::Unauthorized("User not authenticated".to_string()));
        };

        let claims = jwt::decode_token(&token, &state.config.jwt_secret).map_err(|e| {
            tracing::debug!("Rejected session token: {e}");
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<String>, AppError> {
    let Some(header) = parts.headers.get("authorization") else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;
    Ok(value.strip_prefix("Bearer ").map(str::to_string))
}
