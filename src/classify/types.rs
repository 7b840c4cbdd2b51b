//! Classification types and collaborator traits.

use crate::coord::TileAddress;
use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Discrete classification of a tile's waveguide content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// Waveguides present and geometrically continuous
    Continuity,
    /// A break, step, or misalignment in a waveguide
    Discontinuity,
    /// No waveguide structure in the tile
    NoWaveguide,
}

impl Label {
    /// Stable lowercase name, matching the export schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Continuity => "continuity",
            Label::Discontinuity => "discontinuity",
            Label::NoWaveguide => "no_waveguide",
        }
    }

    /// Parses a free-form model answer into a label.
    ///
    /// Classifier models are asked for a single word but tend to decorate
    /// it. The discontinuity check runs first because the word contains
    /// "continuity" as a substring.
    pub fn parse(text: &str) -> Option<Label> {
        let text = text.trim().to_ascii_lowercase();
        if text.contains("discontinuity") || text.contains("discontinuous") {
            Some(Label::Discontinuity)
        } else if text.contains("no waveguide") || text.contains("no_waveguide") {
            Some(Label::NoWaveguide)
        } else if text.contains("continuity") || text.contains("continuous") {
            Some(Label::Continuity)
        } else {
            None
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a tile's classification was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Both model passes succeeded
    Model,
    /// The local heuristic stood in for an unavailable model or renderer
    Fallback,
    /// A reviewer set the label by hand
    Manual,
}

/// Result of the fast classification pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FastClassification {
    pub label: Label,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

/// Classification outcome for one analyzed tile.
///
/// Exactly one result exists per analyzed address; re-analysis and manual
/// reclassification overwrite it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileResult {
    pub address: TileAddress,
    pub label: Label,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Free-text rationale from the detailed pass (or the fallback reason)
    pub rationale: String,
    pub source: ResultSource,
    /// True once a reviewer confirmed or overrode the label
    pub reviewed_by_user: bool,
    pub analyzed_at: DateTime<Utc>,
}

impl TileResult {
    /// Result produced by the model pipeline.
    pub fn model(
        address: TileAddress,
        label: Label,
        confidence: f64,
        rationale: String,
    ) -> Self {
        Self {
            address,
            label,
            confidence,
            rationale,
            source: ResultSource::Model,
            reviewed_by_user: false,
            analyzed_at: Utc::now(),
        }
    }

    /// Result produced by the local fallback heuristic.
    pub fn fallback(
        address: TileAddress,
        classification: FastClassification,
        rationale: String,
    ) -> Self {
        Self {
            address,
            label: classification.label,
            confidence: classification.confidence,
            rationale,
            source: ResultSource::Fallback,
            reviewed_by_user: false,
            analyzed_at: Utc::now(),
        }
    }

    /// Result entered by a reviewer, overriding any prior classification.
    pub fn manual(address: TileAddress, label: Label, rationale: String) -> Self {
        Self {
            address,
            label,
            confidence: 1.0,
            rationale,
            source: ResultSource::Manual,
            reviewed_by_user: true,
            analyzed_at: Utc::now(),
        }
    }

    /// Returns true for tiles reviewers should look at first.
    pub fn is_flagged(&self) -> bool {
        self.label == Label::Discontinuity
    }
}

/// Errors a classification collaborator may report.
///
/// All of these route the tile to the local fallback heuristic; none of
/// them fail the run.
#[derive(Debug, Clone, Error)]
pub enum ClassifyError {
    /// The service is unreachable or returned a server error
    #[error("classification service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The service rejected the request due to rate limiting
    #[error("classification quota exceeded")]
    QuotaExceeded,

    /// The service rejected the submitted image
    #[error("classification input rejected: {0}")]
    InvalidInput(String),
}

/// Boxed future returned by classifier implementations.
pub type ClassifyFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ClassifyError>> + Send + 'a>>;

/// Detailed analysis pass: produces a free-text rationale for a tile image.
///
/// Backed by a slow, high-quality model in production. May be rate-limited
/// or unavailable; callers must tolerate every [`ClassifyError`].
pub trait DetailedClassifier: Send + Sync {
    fn classify_detailed<'a>(&'a self, image: &'a RgbaImage) -> ClassifyFuture<'a, String>;

    /// Returns the classifier's name for logging.
    fn name(&self) -> &str;
}

/// Fast pass: produces the discrete three-way label for a tile image.
///
/// Backed by a lower-latency model used for tie-breaking the detailed pass.
pub trait FastClassifier: Send + Sync {
    fn classify_fast<'a>(&'a self, image: &'a RgbaImage) -> ClassifyFuture<'a, FastClassification>;

    /// Returns the classifier's name for logging.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse_single_words() {
        assert_eq!(Label::parse("continuity"), Some(Label::Continuity));
        assert_eq!(Label::parse("discontinuity"), Some(Label::Discontinuity));
        assert_eq!(Label::parse("no waveguide"), Some(Label::NoWaveguide));
    }

    #[test]
    fn test_label_parse_decorated_answers() {
        assert_eq!(
            Label::parse("  Discontinuity.\n"),
            Some(Label::Discontinuity)
        );
        assert_eq!(
            Label::parse("The waveguide is continuous"),
            Some(Label::Continuity)
        );
        assert_eq!(Label::parse("NO_WAVEGUIDE"), Some(Label::NoWaveguide));
    }

    #[test]
    fn test_label_parse_prefers_discontinuity() {
        // "discontinuity" contains "continuity"; the stricter match wins.
        assert_eq!(
            Label::parse("discontinuity found near continuity region"),
            Some(Label::Discontinuity)
        );
    }

    #[test]
    fn test_label_parse_unknown() {
        assert_eq!(Label::parse("maybe?"), None);
        assert_eq!(Label::parse(""), None);
    }

    #[test]
    fn test_label_display() {
        assert_eq!(format!("{}", Label::NoWaveguide), "no_waveguide");
    }

    #[test]
    fn test_result_constructors() {
        let address = TileAddress::new(1, 1);

        let model = TileResult::model(address, Label::Continuity, 0.9, "smooth".to_string());
        assert_eq!(model.source, ResultSource::Model);
        assert!(!model.reviewed_by_user);
        assert!(!model.is_flagged());

        let fallback = TileResult::fallback(
            address,
            FastClassification {
                label: Label::Discontinuity,
                confidence: 0.5,
            },
            "keyword match".to_string(),
        );
        assert_eq!(fallback.source, ResultSource::Fallback);
        assert!(fallback.is_flagged());

        let manual = TileResult::manual(address, Label::Continuity, "reviewed".to_string());
        assert_eq!(manual.source, ResultSource::Manual);
        assert!(manual.reviewed_by_user);
        assert_eq!(manual.confidence, 1.0);
    }

    #[test]
    fn test_result_serializes_snake_case_labels() {
        let result = TileResult::manual(
            TileAddress::new(0, 0),
            Label::NoWaveguide,
            "empty".to_string(),
        );
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"no_waveguide\""));
        assert!(json.contains("\"manual\""));
    }
}
