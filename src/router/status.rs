//! Health check.

use axum::Json;

use crate::router::Envelope;

/// `GET /`.
pub async fn handler() -> Json<Envelope<()>> {
    Envelope::new("Server is ok", ())
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::testing::{body_json, state};
    use crate::*;

    #[tokio::test]
    async fn test_health() {
        let (state, _) = state().await;
        let response =
            make_request(app(state), Method::GET, "/", None, String::default()).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Server is ok");
        assert!(body["data"].is_null());
    }
}
