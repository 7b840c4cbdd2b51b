//! Local fallback classifier.
//!
//! A deterministic heuristic used when the classification service is
//! unavailable or a render failed. It never inspects the image with a model;
//! results are low-confidence and marked `Fallback` so reviewers know to
//! scrutinize them.

use super::types::{FastClassification, Label};
use image::RgbaImage;

/// Keywords in a rationale that indicate a defect.
const DEFECT_KEYWORDS: &[&str] = &[
    "discontinuity",
    "discontinuous",
    "step offset",
    "misalignment",
    "break",
    "gap",
    "not continuous",
    "problem",
    "defect",
];

/// Phrases in a rationale that indicate the tile holds no waveguides.
const EMPTY_KEYWORDS: &[&str] = &["no waveguide", "no waveguides", "nothing to analyze"];

/// Fraction of drawn pixels below which a tile counts as empty.
pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 0.01;

/// Confidence attached to heuristic classifications.
const FALLBACK_CONFIDENCE: f64 = 0.25;

/// Deterministic, model-free classifier.
#[derive(Debug, Clone)]
pub struct FallbackClassifier {
    coverage_threshold: f64,
}

impl FallbackClassifier {
    /// Creates a classifier with the default geometry-coverage threshold.
    pub fn new() -> Self {
        Self {
            coverage_threshold: DEFAULT_COVERAGE_THRESHOLD,
        }
    }

    /// Creates a classifier with a custom coverage threshold in [0, 1].
    pub fn with_coverage_threshold(coverage_threshold: f64) -> Self {
        Self {
            coverage_threshold,
        }
    }

    /// Classifies from an existing detailed-pass rationale.
    ///
    /// Used when the detailed model answered but the fast model did not:
    /// the rationale is scanned for defect keywords instead of discarding
    /// the completed analysis.
    pub fn classify_rationale(&self, rationale: &str) -> FastClassification {
        let text = rationale.to_ascii_lowercase();

        if EMPTY_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            return FastClassification {
                label: Label::NoWaveguide,
                confidence: FALLBACK_CONFIDENCE,
            };
        }

        let label = if DEFECT_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            Label::Discontinuity
        } else {
            Label::Continuity
        };
        FastClassification {
            label,
            confidence: FALLBACK_CONFIDENCE,
        }
    }

    /// Classifies from pixel coverage when no rationale exists.
    ///
    /// Counts pixels that differ from the blank background (white or fully
    /// transparent). Tiles with drawn geometry above the threshold are
    /// assumed continuous; tiles without geometry hold no waveguides. The
    /// heuristic cannot detect discontinuities, which is exactly why its
    /// results carry low confidence.
    pub fn classify_coverage(&self, image: &RgbaImage) -> FastClassification {
        let total = (image.width() as u64 * image.height() as u64).max(1);
        let drawn = image
            .pixels()
            .filter(|p| {
                let [r, g, b, a] = p.0;
                a != 0 && !(r == 255 && g == 255 && b == 255)
            })
            .count() as u64;

        let coverage = drawn as f64 / total as f64;
        let label = if coverage >= self.coverage_threshold {
            Label::Continuity
        } else {
            Label::NoWaveguide
        };

        FastClassification {
            label,
            confidence: FALLBACK_CONFIDENCE,
        }
    }
}

impl Default for FallbackClassifier {
    fn default() -> Self {
        Self::new()
    }
}
