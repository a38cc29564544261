//! Diary HTTP API.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router, middleware};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::auth::AuthService;
use crate::diary::{
    DiaryEntry, DiaryPatch, DiaryPipeline, DiaryWithArticles, Emotion,
    NewEntry, PipelineOptions,
};
use crate::error::{Result, ServerError};
use crate::router::{Envelope, Path, Query, Valid};
use crate::user::{Role, User};
use crate::{AppState, middleware::auth};

#[derive(Debug, Validate, Serialize, Deserialize)]
pub struct CreateBody {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be between 1 and 255 characters."
    ))]
    pub title: String,
    #[validate(length(min = 1, message = "Content must not be empty."))]
    pub content: String,
}

#[derive(Debug, Default, Validate, Serialize, Deserialize)]
pub struct UpdateBody {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be between 1 and 255 characters."
    ))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Content must not be empty."))]
    pub content: Option<String>,
}

/// `?translate=&emotion=`.
#[derive(Debug, Default, Deserialize)]
pub struct PipelineQuery {
    translate: Option<bool>,
    emotion: Option<String>,
}

impl PipelineQuery {
    /// Forcing the emotion is reserved to admins.
    fn into_options(self, user: &User) -> Result<PipelineOptions> {
        let forced_emotion = match self.emotion {
            Some(raw) => {
                AuthService::require_role(user, Role::Admin)?;
                Some(raw.parse::<Emotion>().map_err(|_| invalid_emotion(&raw))?)
            },
            None => None,
        };

        Ok(PipelineOptions {
            translate: self.translate.unwrap_or(true),
            forced_emotion,
        })
    }
}

fn invalid_emotion(raw: &str) -> ServerError {
    let mut errors = ValidationErrors::new();
    errors.add(
        "emotion",
        ValidationError::new("emotion")
            .with_message(format!("`{raw}` is not a known emotion.").into()),
    );
    errors.into()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Summary {
    pub emotion: Option<Emotion>,
}

async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PipelineQuery>,
    Valid(body): Valid<CreateBody>,
) -> Result<(StatusCode, Json<Envelope<DiaryWithArticles>>)> {
    let options = query.into_options(&user)?;
    let entry = state
        .diaries
        .create_entry(
            user.id,
            NewEntry {
                title: body.title,
                content: body.content,
            },
            options,
        )
        .await?;
    let entry = state.diaries.with_articles(entry).await?;

    Ok((
        StatusCode::CREATED,
        Envelope::new("Create diary successful", entry),
    ))
}

async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Envelope<Vec<DiaryEntry>>>> {
    AuthService::require_role(&user, Role::Admin)?;

    let entries = state.diaries.list().await?;
    Ok(Envelope::new("Successfully get all diaries", entries))
}

async fn summary(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Envelope<Summary>>> {
    let emotion = state.diaries.summary(user.id).await?;
    Ok(Envelope::new("Successfully get emotion summary", Summary { emotion }))
}

async fn get_diary(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<DiaryEntry>>> {
    let entry = state.diaries.get(id).await?;
    DiaryPipeline::authorize(&user, &entry)?;

    Ok(Envelope::new("Successfully get diary", entry))
}

async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Query(query): Query<PipelineQuery>,
    Valid(body): Valid<UpdateBody>,
) -> Result<Json<Envelope<DiaryWithArticles>>> {
    let entry = state.diaries.get(id).await?;
    DiaryPipeline::authorize(&user, &entry)?;

    let options = query.into_options(&user)?;
    let patch = DiaryPatch {
        title: body.title,
        content: body.content,
    };
    let entry = state.diaries.update_entry(entry, patch, options).await?;
    let entry = state.diaries.with_articles(entry).await?;

    Ok(Envelope::new("Successfully update diary", entry))
}

async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<DiaryEntry>>> {
    let entry = state.diaries.get(id).await?;
    DiaryPipeline::authorize(&user, &entry)?;

    state.diaries.delete(id).await?;
    Ok(Envelope::new("Successfully delete diary", entry))
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/summary", get(summary))
        .route("/{id}", get(get_diary).patch(update).delete(delete))
        .route_layer(middleware::from_fn_with_state(state, auth))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::testing::{ADMIN_EMAIL, ADMIN_PASSWORD, body_json, login, register, state};
    use crate::*;

    async fn create(app: axum::Router, token: &str, query: &str, content: &str) -> serde_json::Value {
        let response = make_request(
            app,
            Method::POST,
            &format!("/diaries{query}"),
            Some(token),
            json!({ "title": "Today", "content": content }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    #[tokio::test]
    async fn test_diary_end_to_end() {
        let (state, _) = state().await;
        let app = app(state);
        register(app.clone(), "alice@example.com", "secret1").await;
        let alice = login(app.clone(), "alice@example.com", "secret1").await;

        let body = create(app.clone(), &alice, "?translate=true", "Aku sangat senang").await;
        assert_eq!(body["message"], "Create diary successful");
        let data = &body["data"];
        assert_eq!(data["emotion"], "joy");
        assert_eq!(data["content"], "Aku sangat senang");
        assert_eq!(data["translatedContent"], "I am very happy");
        let articles = data["articles"].as_array().unwrap();
        assert!(!articles.is_empty());
        assert!(articles.iter().all(|a| a["emotion"] == "joy"));

        let id = data["id"].as_str().unwrap();
        let response = make_request(
            app.clone(),
            Method::GET,
            &format!("/diaries/{id}"),
            Some(&alice),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["id"], id);

        let response = make_request(
            app,
            Method::GET,
            "/diaries/summary",
            Some(&alice),
            String::default(),
        )
        .await;
        assert_eq!(body_json(response).await["data"]["emotion"], "joy");
    }

    #[tokio::test]
    async fn test_without_translation() {
        let (state, _) = state().await;
        let app = app(state);
        register(app.clone(), "alice@example.com", "secret1").await;
        let alice = login(app.clone(), "alice@example.com", "secret1").await;

        let body = create(app, &alice, "?translate=false", "Aku sangat senang").await;
        assert_eq!(body["data"]["translatedContent"], "Aku sangat senang");
    }

    #[tokio::test]
    async fn test_forced_emotion_is_admin_only() {
        let (state, _) = state().await;
        let app = app(state);
        register(app.clone(), "alice@example.com", "secret1").await;
        let alice = login(app.clone(), "alice@example.com", "secret1").await;
        let admin = login(app.clone(), ADMIN_EMAIL, ADMIN_PASSWORD).await;

        let response = make_request(
            app.clone(),
            Method::POST,
            "/diaries?emotion=fear",
            Some(&alice),
            json!({ "title": "Today", "content": "Aku sangat senang" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = create(app.clone(), &admin, "?emotion=fear", "Aku sangat senang").await;
        assert_eq!(body["data"]["emotion"], "fear");

        let response = make_request(
            app,
            Method::POST,
            "/diaries?emotion=bored",
            Some(&admin),
            json!({ "title": "Today", "content": "Aku sangat senang" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_malformed_query_and_path() {
        let (state, _) = state().await;
        let app = app(state);
        register(app.clone(), "alice@example.com", "secret1").await;
        let alice = login(app.clone(), "alice@example.com", "secret1").await;

        let response = make_request(
            app.clone(),
            Method::POST,
            "/diaries?translate=maybe",
            Some(&alice),
            json!({ "title": "Today", "content": "Aku sangat senang" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .starts_with("Failed to deserialize query string")
        );

        let response = make_request(
            app,
            Method::GET,
            "/diaries/not-a-uuid",
            Some(&alice),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("not-a-uuid"));
    }

    #[tokio::test]
    async fn test_owner_only() {
        let (state, _) = state().await;
        let app = app(state);
        register(app.clone(), "alice@example.com", "secret1").await;
        register(app.clone(), "bob@example.com", "secret1").await;
        let alice = login(app.clone(), "alice@example.com", "secret1").await;
        let bob = login(app.clone(), "bob@example.com", "secret1").await;
        let admin = login(app.clone(), ADMIN_EMAIL, ADMIN_PASSWORD).await;

        let body = create(app.clone(), &alice, "", "Aku sangat senang").await;
        let path = format!("/diaries/{}", body["data"]["id"].as_str().unwrap());

        let response = make_request(
            app.clone(),
            Method::PATCH,
            &path,
            Some(&bob),
            json!({ "title": "Mine now" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await["message"],
            "You are not allowed do this action because you are not the owner of this diary"
        );

        let response = make_request(
            app.clone(),
            Method::PATCH,
            &path,
            Some(&alice),
            json!({ "content": "I am sad" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["emotion"], "sadness");
        assert_eq!(body["data"]["title"], "Today");

        let response =
            make_request(app.clone(), Method::GET, "/diaries", Some(&alice), String::default()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response =
            make_request(app.clone(), Method::DELETE, &path, Some(&admin), String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = make_request(app, Method::GET, &path, Some(&alice), String::default()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
