//! Reading recommendations.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router, middleware};
use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::article::{Article, ArticleQuery};
use crate::diary::Emotion;
use crate::error::{Result, ServerError};
use crate::router::{Envelope, Query};
use crate::{AppState, middleware::auth};

/// `?page=&size=&emotions=anger,sadness`.
#[derive(Debug, Default, Validate, Deserialize)]
pub struct ListQuery {
    #[validate(range(min = 1, message = "Page starts at 1."))]
    page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "Size must be between 1 and 100."))]
    size: Option<u32>,
    emotions: Option<String>,
}

impl TryFrom<ListQuery> for ArticleQuery {
    type Error = ServerError;

    fn try_from(query: ListQuery) -> Result<Self> {
        query.validate()?;

        let emotions = query
            .emotions
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                raw.parse::<Emotion>().map_err(|details| {
                    let mut errors = ValidationErrors::new();
                    errors.add(
                        "emotions",
                        ValidationError::new("emotions").with_message(details.into()),
                    );
                    ServerError::from(errors)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ArticleQuery {
            page: query.page,
            size: query.size,
            emotions,
        })
    }
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Envelope<Vec<Article>>>> {
    let query = ArticleQuery::try_from(query)?;
    let articles = state.articles.list_articles(&query).await?;

    Ok(Envelope::new("Successfully get articles from database", articles))
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route_layer(middleware::from_fn_with_state(state, auth))
}
