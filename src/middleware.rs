//! Middlewares for routes.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::error::{Result, ServerError};

const BEARER: &str = "bearer";

/// Token of an `Authorization: Bearer <token>` header.
///
/// The scheme is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case(BEARER) && !token.is_empty()).then_some(token)
}

/// Resolve the access token into the current [`crate::user::User`].
pub async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(bearer_token)
        .ok_or(ServerError::Unauthorized)?;

    let user = state.auth.validate_access_token(token).await?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
