//! Users-related HTTP API.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router, middleware};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthService, Registration};
use crate::error::Result;
use crate::router::{Envelope, Path, Valid};
use crate::user::{PasswordChange, Role, User, UserPatch, UserService};
use crate::{AppState, middleware::auth};

#[derive(Debug, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
    #[validate(email(message = "Email must be a valid address."))]
    pub email: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Full name must be between 1 and 255 characters."
    ))]
    pub full_name: String,
    #[validate(length(
        min = 6,
        message = "Password must contain at least 6 characters."
    ))]
    pub password: String,
    #[validate(length(min = 1, max = 20))]
    pub phone: Option<String>,
}

#[derive(Debug, Default, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    #[validate(email(message = "Email must be a valid address."))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub phone: Option<String>,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Full name must be between 1 and 255 characters."
    ))]
    pub full_name: Option<String>,
    pub current_password: Option<String>,
    #[validate(length(
        min = 6,
        message = "Password must contain at least 6 characters."
    ))]
    pub new_password: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    Valid(body): Valid<CreateBody>,
) -> Result<(StatusCode, Json<Envelope<User>>)> {
    let user = state
        .auth
        .register(Registration {
            email: body.email,
            password: body.password,
            full_name: body.full_name,
            phone: body.phone,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Envelope::new("Registration successful", user),
    ))
}

async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Envelope<Vec<User>>>> {
    AuthService::require_role(&user, Role::Admin)?;

    let users = state.users.list().await?;
    Ok(Envelope::new("Successfully get all users", users))
}

async fn get_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<User>>> {
    UserService::authorize(&user, id)?;

    let user = state.users.get(id).await?;
    Ok(Envelope::new("Successfully get user", user))
}

async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Valid(body): Valid<UpdateBody>,
) -> Result<Json<Envelope<User>>> {
    UserService::authorize(&user, id)?;

    let password =
        PasswordChange::from_parts(body.current_password, body.new_password)?;
    let patch = UserPatch {
        email: body.email,
        phone: body.phone,
        full_name: body.full_name,
    };

    let user = state.users.update(id, patch, password).await?;
    Ok(Envelope::new("Successfully update user", user))
}

async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<User>>> {
    UserService::authorize(&user, id)?;

    let user = state.users.delete(id).await?;
    Ok(Envelope::new("Successfully delete user", user))
}

pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        // `GET /users` goes to `list`. Admin only.
        .route("/", get(list))
        .route("/{id}", get(get_user).patch(update).delete(delete))
        .route_layer(middleware::from_fn_with_state(state, auth));

    Router::new()
        // `POST /users` goes to `create`.
        .route("/", axum::routing::post(create))
        .merge(protected)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::testing::{ADMIN_EMAIL, ADMIN_PASSWORD, body_json, login, register, state};
    use crate::*;

    #[tokio::test]
    async fn test_register() {
        let (state, _) = state().await;
        let app = app(state);

        let body = CreateBody {
            email: "alice@example.com".into(),
            full_name: "Alice".into(),
            password: "secret1".into(),
            phone: None,
        };
        let response = make_request(
            app.clone(),
            Method::POST,
            "/users",
            None,
            json!(body).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["message"], "Registration successful");
        assert_eq!(json["data"]["email"], "alice@example.com");
        assert_eq!(json["data"]["role"], "REGULAR");
        assert!(json["data"].get("password").is_none());

        // same email again.
        let response =
            make_request(app, Method::POST, "/users", None, json!(body).to_string()).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["message"], "Email is already exists");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (state, _) = state().await;
        let response = make_request(
            app(state),
            Method::POST,
            "/users",
            None,
            json!({ "email": "not-an-email", "fullName": "", "password": "123" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["errors"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_is_admin_only() {
        let (state, _) = state().await;
        let app = app(state);
        register(app.clone(), "alice@example.com", "secret1").await;
        let alice = login(app.clone(), "alice@example.com", "secret1").await;
        let admin = login(app.clone(), ADMIN_EMAIL, ADMIN_PASSWORD).await;

        let response =
            make_request(app.clone(), Method::GET, "/users", Some(&alice), String::default()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await["message"],
            "Only admin is allowed to access this."
        );

        let response =
            make_request(app.clone(), Method::GET, "/users", Some(&admin), String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 2);

        let response = make_request(app, Method::GET, "/users", None, String::default()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (state, _) = state().await;
        let app = app(state);
        let alice_id = register(app.clone(), "alice@example.com", "secret1").await;
        let bob_id = register(app.clone(), "bob@example.com", "secret1").await;
        let alice = login(app.clone(), "alice@example.com", "secret1").await;

        // alice can't touch bob.
        let response = make_request(
            app.clone(),
            Method::GET,
            &format!("/users/{bob_id}"),
            Some(&alice),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await["message"],
            "The user id in token and path is not matching"
        );

        let response = make_request(
            app.clone(),
            Method::DELETE,
            "/users/42",
            Some(&alice),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_json(response).await["message"].is_string());

        let response = make_request(
            app.clone(),
            Method::PATCH,
            &format!("/users/{alice_id}"),
            Some(&alice),
            json!({ "fullName": "Alice Liddell", "currentPassword": "wrong", "newPassword": "secret2" })
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["message"], "Current password is incorrect");

        let response = make_request(
            app.clone(),
            Method::PATCH,
            &format!("/users/{alice_id}"),
            Some(&alice),
            json!({ "fullName": "Alice Liddell", "currentPassword": "secret1", "newPassword": "secret2" })
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["fullName"], "Alice Liddell");
        let alice = login(app.clone(), "alice@example.com", "secret2").await;

        let response = make_request(
            app.clone(),
            Method::DELETE,
            &format!("/users/{alice_id}"),
            Some(&alice),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // the token outlives its user.
        let response = make_request(
            app,
            Method::GET,
            &format!("/users/{alice_id}"),
            Some(&alice),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
