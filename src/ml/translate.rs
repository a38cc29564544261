//! Google Cloud Translation (v2) client.

use std::borrow::Cow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::{Result, ServerError};
use crate::ml::{Translation, Translator, upstream_error};

const SERVICE: &str = "translator";

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    translations: Vec<TranslatedText>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslatedText {
    translated_text: String,
    detected_source_language: Option<String>,
}

/// Decode HTML entities such as `&#39;` or `&quot;`.
///
/// Text that is not valid markup is returned as is.
pub fn unescape_html(text: &str) -> String {
    quick_xml::escape::unescape(text)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| text.to_owned())
}

pub struct GoogleTranslator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GoogleTranslator {
    /// Create a new [`GoogleTranslator`].
    pub fn new(config: &config::Translator, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<Translation> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&TranslateRequest {
                q: text,
                target,
                format: "text",
            })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| upstream_error(SERVICE, err))?
            .json::<TranslateResponse>()
            .await
            .map_err(|err| upstream_error(SERVICE, err))?;

        let translation = response
            .data
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| {
                ServerError::internal(
                    "translator returned no translation",
                    "empty `translations` array",
                )
            })?;

        Ok(Translation {
            text: unescape_html(&translation.translated_text),
            source_language: translation.detected_source_language,
        })
    }
}
