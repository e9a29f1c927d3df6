//! HTTP client for the out-of-process sentiment service.
//!
//! The service wraps the pretrained model: it tokenizes the text, runs the
//! forward pass, applies softmax and returns the argmax class together with
//! the distribution as percentages.  A single POST per annotation, no
//! retries; the write path treats failures as a missed enrichment.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Annotation, Emotion, EmotionScore, SentimentError};

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    emotion: u8,
    probs: Vec<EmotionScore>,
}

/// Client for a remote annotation endpoint.
#[derive(Debug, Clone)]
pub struct RemoteAnnotator {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteAnnotator {
    /// `endpoint` is the full URL of the annotation route,
    /// e.g. `http://127.0.0.1:8500/annotate`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub async fn annotate(&self, text: &str) -> Result<Annotation, SentimentError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&AnnotateRequest { text })
            .send()
            .await?
            .error_for_status()?;

        let body: AnnotateResponse = response.json().await?;

        let emotion = Emotion::try_from(body.emotion)?;
        if body.probs.len() != Emotion::all().len() {
            return Err(SentimentError::BadResponse(format!(
                "expected {} probability entries, got {}",
                Emotion::all().len(),
                body.probs.len()
            )));
        }

        debug!(emotion = ?emotion, "text annotated");

        Ok(Annotation {
            emotion,
            probs: body.probs,
        })
    }
}
