//! Login, token refresh and sessions.

use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router, middleware};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::auth::Tokens;
use crate::error::Result;
use crate::router::{Envelope, Path, Valid, ValidForm};
use crate::session::Session;
use crate::user::User;
use crate::{AppState, middleware::auth};

/// OAuth2 password form.
#[derive(Debug, Validate, Deserialize)]
pub struct LoginForm {
    #[validate(email(message = "Email must be a valid address."))]
    username: String,
    #[validate(length(min = 1, message = "Password must not be empty."))]
    password: String,
}

#[derive(Debug, Validate, Deserialize)]
pub struct GoogleForm {
    #[validate(length(min = 1, message = "Credential must not be empty."))]
    credential: String,
}

#[derive(Debug, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshBody {
    #[validate(length(min = 1, message = "Refresh token must not be empty."))]
    refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
}

/// Login requires the `User-Agent` header to label the session.
fn user_agent(headers: &HeaderMap) -> Result<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(str::to_owned)
        .ok_or_else(|| {
            let mut errors = ValidationErrors::new();
            errors.add(
                "user-agent",
                ValidationError::new("required")
                    .with_message("User-Agent header is required.".into()),
            );
            errors.into()
        })
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidForm(form): ValidForm<LoginForm>,
) -> Result<Json<Envelope<Tokens>>> {
    let user_agent = user_agent(&headers)?;
    let tokens = state
        .auth
        .login(&form.username, &form.password, &user_agent)
        .await?;

    Ok(Envelope::new("Successfully login", tokens))
}

async fn login_google(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidForm(form): ValidForm<GoogleForm>,
) -> Result<Json<Envelope<Tokens>>> {
    let user_agent = user_agent(&headers)?;
    let tokens = state
        .auth
        .login_federated(&form.credential, &user_agent)
        .await?;

    Ok(Envelope::new("Successfully login", tokens))
}

async fn refresh(
    State(state): State<AppState>,
    Valid(body): Valid<RefreshBody>,
) -> Result<Json<Envelope<AccessToken>>> {
    let access_token = state.auth.refresh(&body.refresh_token).await?;

    Ok(Envelope::new(
        "Access token successfully renewed",
        AccessToken { access_token },
    ))
}

async fn sessions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Envelope<Vec<Session>>>> {
    let sessions = state.auth.sessions(user.id).await?;
    Ok(Envelope::new("Successfully get sessions", sessions))
}

async fn revoke(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<()>>> {
    state.auth.revoke_session(&user, id).await?;
    Ok(Envelope::new("Successfully revoke session", ()))
}

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        // `POST /authentications/login` goes to `login`.
        .route("/login", post(login))
        .route("/login/google", post(login_google))
        .route("/refresh", post(refresh));

    let protected = Router::new()
        .route("/sessions", get(sessions))
        .route("/sessions/{id}", delete(revoke))
        .route_layer(middleware::from_fn_with_state(state, auth));

    public.merge(protected)
}
