//! Shared fixtures for HTTP tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Response, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::Algorithm;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::article::{Article, ArticleLanguage};
use crate::config::{Configuration, SeedAccount};
use crate::crypto::PasswordManager;
use crate::database::{MemoryDatabase, Stores};
use crate::diary::Emotion;
use crate::ml::testing::{KeywordClassifier, StubTranslator};
use crate::token::TokenCodec;
use crate::{AppState, make_form_request, make_request, seed};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "adminadmin";

fn article(emotion: Emotion, position: i32) -> Article {
    Article {
        id: format!("{emotion}-{position}"),
        emotion,
        language: ArticleLanguage::En,
        position,
        title: format!("Living with {emotion}"),
        link: format!("https://example.com/{emotion}/{position}"),
        displayed_link: "example.com".into(),
        snippet: Some("A short read.".into()),
        date: None,
    }
}

/// In-memory state with a seeded admin and a small article catalog.
pub async fn state() -> (AppState, Arc<MemoryDatabase>) {
    let db = Arc::new(MemoryDatabase::default());
    db.add_articles([
        article(Emotion::Joy, 1),
        article(Emotion::Joy, 2),
        article(Emotion::Joy, 3),
        article(Emotion::Anger, 1),
        article(Emotion::Sadness, 1),
    ])
    .await;

    let mut config = Configuration::default();
    config.seed = vec![SeedAccount {
        email: ADMIN_EMAIL.into(),
        password: ADMIN_PASSWORD.into(),
        full_name: "Admin".into(),
        phone: None,
        admin: true,
    }];

    let state = AppState::new(
        Arc::new(config),
        Stores::memory(db.clone()),
        Arc::new(StubTranslator::new([("Aku sangat senang", "I am very happy")])),
        Arc::new(KeywordClassifier::default()),
        None,
        PasswordManager::fast(),
        TokenCodec::new(Algorithm::HS256, "access", "refresh", 3600).unwrap(),
    );
    seed(&state).await.unwrap();

    (state, db)
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

pub async fn login_form(
    app: Router,
    email: &str,
    password: &str,
    user_agent: Option<&str>,
) -> Response<Body> {
    make_form_request(
        app,
        "/authentications/login",
        &format!("username={email}&password={password}"),
        user_agent,
    )
    .await
}

/// Access token of a fresh login.
pub async fn login(app: Router, email: &str, password: &str) -> String {
    let response = login_form(app, email, password, Some("tests")).await;
    assert_eq!(response.status(), StatusCode::OK);

    body_json(response).await["data"]["accessToken"]
        .as_str()
        .unwrap()
        .to_owned()
}

/// Id of the new user.
pub async fn register(app: Router, email: &str, password: &str) -> Uuid {
    let response = make_request(
        app,
        Method::POST,
        "/users",
        None,
        json!({ "email": email, "fullName": "Tester", "password": password }).to_string(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap()
}
