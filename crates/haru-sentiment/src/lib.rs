//! # haru-sentiment
//!
//! Client for the sentiment-classification service that annotates diary
//! entries.  The model itself (a pretrained 5-class sentiment transformer)
//! runs out of process; this crate only defines the annotation types and the
//! HTTP call that produces them.

pub mod remote;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use remote::RemoteAnnotator;

/// Discrete emotion class produced by the classifier.
///
/// The wire representation is the class index (0..=4), matching the model's
/// output head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Emotion {
    VeryNegative = 0,
    Negative = 1,
    Neutral = 2,
    Positive = 3,
    VeryPositive = 4,
}

impl Emotion {
    /// Human-readable label, in class-index order.
    pub fn label(self) -> &'static str {
        match self {
            Emotion::VeryNegative => "very negative",
            Emotion::Negative => "negative",
            Emotion::Neutral => "neutral",
            Emotion::Positive => "positive",
            Emotion::VeryPositive => "very positive",
        }
    }

    /// All classes in index order.
    pub fn all() -> [Emotion; 5] {
        [
            Emotion::VeryNegative,
            Emotion::Negative,
            Emotion::Neutral,
            Emotion::Positive,
            Emotion::VeryPositive,
        ]
    }
}

impl From<Emotion> for u8 {
    fn from(e: Emotion) -> u8 {
        e as u8
    }
}

impl TryFrom<u8> for Emotion {
    type Error = SentimentError;

    fn try_from(v: u8) -> Result<Self, SentimentError> {
        match v {
            0 => Ok(Emotion::VeryNegative),
            1 => Ok(Emotion::Negative),
            2 => Ok(Emotion::Neutral),
            3 => Ok(Emotion::Positive),
            4 => Ok(Emotion::VeryPositive),
            other => Err(SentimentError::UnknownClass(other)),
        }
    }
}

/// One entry of the probability vector: class label plus percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub name: String,
    /// Probability as a percentage, rounded to two decimals by the service.
    pub pv: f64,
}

/// The full annotation attached to a diary entry: the argmax class and the
/// softmax distribution over all five classes, as percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub emotion: Emotion,
    pub probs: Vec<EmotionScore>,
}

/// Errors from the annotation client.
#[derive(Debug, Error)]
pub enum SentimentError {
    #[error("sentiment service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unknown emotion class index: {0}")]
    UnknownClass(u8),

    #[error("malformed annotation response: {0}")]
    BadResponse(String),
}

/// The annotator handed to the diary write path.
///
/// `Remote` talks to the real classification service; `Fixed` returns a
/// canned annotation and exists for tests and offline development.
#[derive(Debug, Clone)]
pub enum Annotator {
    Remote(RemoteAnnotator),
    Fixed(Annotation),
}

impl Annotator {
    pub async fn annotate(&self, text: &str) -> Result<Annotation, SentimentError> {
        match self {
            Annotator::Remote(remote) => remote.annotate(text).await,
            Annotator::Fixed(annotation) => Ok(annotation.clone()),
        }
    }

    /// A neutral annotation with a uniform distribution, handy as a test
    /// fixture.
    pub fn fixed_neutral() -> Self {
        let probs = Emotion::all()
            .iter()
            .map(|e| EmotionScore {
                name: e.label().to_string(),
                pv: 20.0,
            })
            .collect();
        Annotator::Fixed(Annotation {
            emotion: Emotion::Neutral,
            probs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotion_index_round_trip() {
        for e in Emotion::all() {
            let idx = u8::from(e);
            assert_eq!(Emotion::try_from(idx).unwrap(), e);
        }
        assert!(Emotion::try_from(5).is_err());
    }

    #[test]
    fn emotion_serializes_as_index() {
        let json = serde_json::to_string(&Emotion::Positive).unwrap();
        assert_eq!(json, "3");

        let back: Emotion = serde_json::from_str("0").unwrap();
        assert_eq!(back, Emotion::VeryNegative);
    }

    #[test]
    fn annotation_json_shape() {
        let json = r#"{
            "emotion": 4,
            "probs": [
                {"name": "very negative", "pv": 1.2},
                {"name": "negative", "pv": 2.3},
                {"name": "neutral", "pv": 5.0},
                {"name": "positive", "pv": 11.5},
                {"name": "very positive", "pv": 80.0}
            ]
        }"#;
        let annotation: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(annotation.emotion, Emotion::VeryPositive);
        assert_eq!(annotation.probs.len(), 5);

        let total: f64 = annotation.probs.iter().map(|p| p.pv).sum();
        assert!((total - 100.0).abs() < 0.5);
    }

    #[tokio::test]
    async fn fixed_annotator_returns_canned_result() {
        let annotator = Annotator::fixed_neutral();
        let annotation = annotator.annotate("a perfectly fine day").await.unwrap();
        assert_eq!(annotation.emotion, Emotion::Neutral);

        let total: f64 = annotation.probs.iter().map(|p| p.pv).sum();
        assert!((total - 100.0).abs() < f64::EPSILON);
    }
}
