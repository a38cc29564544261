//! TensorFlow Serving REST client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::diary::Emotion;
use crate::error::{Result, ServerError};
use crate::ml::{Classifier, Padding, Prediction, Tokenizer, upstream_error};

const SERVICE: &str = "classifier";

/// Output order of the trained emotion model.
pub const DEFAULT_LABELS: [Emotion; 6] = [
    Emotion::Sadness,
    Emotion::Joy,
    Emotion::Love,
    Emotion::Anger,
    Emotion::Fear,
    Emotion::Surprise,
];

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: &'a [Vec<u32>],
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f32>>,
}

/// Emotion model served by TensorFlow Serving.
pub struct TensorflowClassifier {
    client: reqwest::Client,
    url: String,
    tokenizer: Arc<Tokenizer>,
    labels: Vec<Emotion>,
}

impl TensorflowClassifier {
    /// Create a new [`TensorflowClassifier`], loading the tokenizer.
    pub fn new(config: &config::Classifier, client: reqwest::Client) -> Result<Self> {
        let padding = match config.padding.as_deref() {
            Some(padding) => padding
                .parse::<Padding>()
                .map_err(|err| ServerError::internal("invalid classifier padding", err))?,
            None => Padding::default(),
        };
        let tokenizer =
            Tokenizer::load(&config.tokenizer_path, config.max_length, padding)?;

        let labels = match &config.labels {
            Some(labels) => labels
                .iter()
                .map(|label| label.parse::<Emotion>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|err| ServerError::internal("invalid classifier labels", err))?,
            None => DEFAULT_LABELS.to_vec(),
        };

        Ok(Self::with_tokenizer(
            client,
            format!("{}/v1/models/{}:predict", config.endpoint, config.model),
            Arc::new(tokenizer),
            labels,
        ))
    }

    pub fn with_tokenizer(
        client: reqwest::Client,
        url: String,
        tokenizer: Arc<Tokenizer>,
        labels: Vec<Emotion>,
    ) -> Self {
        Self {
            client,
            url,
            tokenizer,
            labels,
        }
    }

    fn to_predictions(&self, response: PredictResponse) -> Result<Vec<Prediction>> {
        response
            .predictions
            .into_iter()
            .map(|scores| {
                if scores.len() == self.labels.len() {
                    Ok(Prediction { scores })
                } else {
                    Err(ServerError::internal(
                        "unexpected model output",
                        format!(
                            "{} scores for {} labels",
                            scores.len(),
                            self.labels.len()
                        ),
                    ))
                }
            })
            .collect()
    }
}

#[async_trait]
impl Classifier for TensorflowClassifier {
    fn labels(&self) -> &[Emotion] {
        &self.labels
    }

    async fn predict(&self, clauses: &[String]) -> Result<Vec<Prediction>> {
        let instances: Vec<Vec<u32>> = clauses
            .iter()
            .map(|clause| self.tokenizer.encode(clause))
            .collect();

        let response = self
            .client
            .post(&self.url)
            .json(&PredictRequest {
                instances: &instances,
            })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| upstream_error(SERVICE, err))?
            .json::<PredictResponse>()
            .await
            .map_err(|err| upstream_error(SERVICE, err))?;

        let predictions = self.to_predictions(response)?;
        if predictions.len() != clauses.len() {
            return Err(ServerError::internal(
                "unexpected model output",
                format!("{} predictions for {} clauses", predictions.len(), clauses.len()),
            ));
        }
        Ok(predictions)
    }
}
