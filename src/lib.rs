//! emodiary is a diary API that reads the emotion of every entry.
#![forbid(unsafe_code)]

mod article;
mod auth;
mod clock;
mod crypto;
mod database;
mod diary;
pub mod error;
mod middleware;
mod ml;
mod retry;
mod router;
mod session;
pub mod telemetry;
#[cfg(test)]
mod testing;
mod token;
mod user;

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::middleware as AxumMiddleware;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::article::ArticleStore;
use crate::auth::{AuthService, GoogleIdentityVerifier, IdentityVerifier};
use crate::clock::{Clock, SystemClock};
use crate::crypto::PasswordManager;
use crate::database::{MemoryDatabase, Stores};
use crate::diary::DiaryPipeline;
use crate::ml::{Classifier, GoogleTranslator, TensorflowClassifier, Translator};
use crate::retry::RetryPolicy;
use crate::token::TokenCodec;
use crate::user::UserService;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// POST an URL-encoded form.
#[cfg(test)]
pub async fn make_form_request(
    app: Router,
    path: &str,
    body: &str,
    user_agent: Option<&str>,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(user_agent) = user_agent {
        request = request.header(header::USER_AGENT, user_agent);
    }

    app.oneshot(request.body(axum::body::Body::from(body.to_owned())).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub auth: AuthService,
    pub users: UserService,
    pub diaries: DiaryPipeline,
    pub articles: Arc<dyn ArticleStore>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire services on top of stores and upstream clients.
    pub fn new(
        config: Arc<config::Configuration>,
        stores: Stores,
        translator: Arc<dyn Translator>,
        classifier: Arc<dyn Classifier>,
        identity: Option<Arc<dyn IdentityVerifier>>,
        pwd: PasswordManager,
        tokens: TokenCodec,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let pwd = Arc::new(pwd);
        let retry = RetryPolicy::from_config(&config.retry);
        let target_language = config
            .translator
            .as_ref()
            .map(|t| t.target_language.clone())
            .unwrap_or_else(|| "en".into());

        let auth = AuthService::new(
            Arc::clone(&stores.users),
            Arc::clone(&stores.sessions),
            Arc::new(tokens),
            Arc::clone(&pwd),
            Arc::clone(&clock),
            identity,
            retry.clone(),
        );
        let users =
            UserService::new(Arc::clone(&stores.users), pwd, Arc::clone(&clock));
        let diaries = DiaryPipeline::new(
            stores.diaries,
            Arc::clone(&stores.articles),
            translator,
            classifier,
            retry,
            clock,
            target_language,
        );

        Self {
            config,
            auth,
            users,
            diaries,
            articles: stores.articles,
            metrics: None,
        }
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        // `GET /` goes to `status`.
        .route("/", get(router::status::handler))
        .route("/metrics", get(telemetry::render))
        .nest("/authentications", router::authentications::router(state.clone()))
        .nest("/users", router::users::router(state.clone()))
        .nest("/diaries", router::diaries::router(state.clone()))
        .nest("/articles", router::articles::router(state.clone()))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Create configured accounts that do not exist yet.
pub async fn seed(state: &AppState) -> error::Result<()> {
    for account in &state.config.seed {
        state.auth.seed_account(account).await?;
    }
    Ok(())
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>>
{
    // read configuration file. let it in memory.
    let path = std::env::var("CONFIG_PATH").unwrap_or_default();
    let config = config::Configuration::default().path(path.into()).read()?;

    let stores = match config.postgres {
        Some(ref postgres) => Stores::postgres(postgres).await?,
        None => {
            tracing::warn!(
                "missing `postgres` entry on `config.yaml` file, data will not be persisted"
            );
            Stores::memory(Arc::new(MemoryDatabase::default()))
        },
    };

    let pwd = PasswordManager::new(config.argon2.clone())?;
    let tokens = TokenCodec::from_config(&config.token)?;

    let client = reqwest::Client::builder().timeout(UPSTREAM_TIMEOUT).build()?;

    let Some(translator) = &config.translator else {
        return Err("missing `translator` entry on `config.yaml` file".into());
    };
    let translator: Arc<dyn Translator> =
        Arc::new(GoogleTranslator::new(translator, client.clone()));

    let Some(classifier) = &config.classifier else {
        return Err("missing `classifier` entry on `config.yaml` file".into());
    };
    let classifier: Arc<dyn Classifier> =
        Arc::new(TensorflowClassifier::new(classifier, client.clone())?);

    let identity = match &config.google {
        Some(google) => {
            Some(Arc::new(GoogleIdentityVerifier::new(google, client))
                as Arc<dyn IdentityVerifier>)
        },
        None => {
            tracing::info!("`google` entry not set, google sign-in disabled");
            None
        },
    };

    let state = AppState::new(
        Arc::clone(&config),
        stores,
        translator,
        classifier,
        identity,
        pwd,
        tokens,
    );
    seed(&state).await?;

    Ok(state)
}
