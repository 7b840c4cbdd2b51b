//! Per-tile processing: cache-or-render, classify, fall back.
//!
//! Every requested address ends with exactly one [`TileResult`], whatever
//! fails along the way. Failures degrade the path (placeholder image,
//! fallback heuristic) and are recorded as error messages; they never drop
//! the tile.

use crate::cache::{TileCache, TileKey};
use crate::classify::{
    DetailedClassifier, FallbackClassifier, FastClassifier, TileResult,
};
use crate::coord::{self, GridConfig, TileAddress, WorldRect};
use crate::messages::{MessageClient, TileErrorKind};
use crate::render::{placeholder_image, RenderedTile, RendererChain};
use image::RgbaImage;
use std::sync::Arc;
use tracing::debug;

/// Everything a worker needs to process tiles.
///
/// Cheap to share: workers hold it behind an `Arc` for the lifetime of the
/// run. The cache and the message channel are the only members touching
/// shared mutable state.
pub(crate) struct WorkerContext {
    pub grid: GridConfig,
    pub layout_bounds: WorldRect,
    pub cache: Arc<TileCache>,
    pub renderers: Arc<RendererChain>,
    pub detailed: Arc<dyn DetailedClassifier>,
    pub fast: Arc<dyn FastClassifier>,
    pub fallback: FallbackClassifier,
    pub client: MessageClient,
}

/// Analyzes a single tile, returning its result.
///
/// The tile's image comes from the cache when possible, otherwise from the
/// renderer chain (cached on success). A render failure substitutes a
/// placeholder and forces the fallback path, since classification requires
/// *an* image even if imperfect.
pub(crate) async fn process_tile(ctx: &WorkerContext, address: TileAddress) -> TileResult {
    let resolution = ctx.grid.resolution_px;

    let world_rect = match coord::address_to_world_rect(address, &ctx.grid, &ctx.layout_bounds) {
        Ok(rect) => rect,
        Err(err) => {
            // The grid was validated before the run started, so this only
            // fires if an address outside the grid slipped into the queue.
            ctx.client
                .error(address, TileErrorKind::Internal, err.to_string());
            let image = placeholder_image(resolution);
            let heuristic = ctx.fallback.classify_coverage(&image);
            return TileResult::fallback(address, heuristic, format!("geometry error: {err}"));
        }
    };

    let key = TileKey::new(address, resolution);
    let (image, render_failure): (Arc<RgbaImage>, Option<String>) = match ctx.cache.get(&key) {
        Some(image) => (image, None),
        None => match ctx.renderers.render(world_rect, resolution).await {
            RenderedTile::Rendered { image, renderer } => {
                debug!(address = %address, renderer, "tile rendered");
                (ctx.cache.put(key, image), None)
            }
            RenderedTile::Placeholder { image, detail } => {
                // Placeholders are never cached: a later retry should get
                // another chance at a real render.
                ctx.client
                    .error(address, TileErrorKind::Render, detail.clone());
                (Arc::new(image), Some(detail))
            }
        },
    };

    if let Some(detail) = render_failure {
        let heuristic = ctx.fallback.classify_coverage(&image);
        return TileResult::fallback(
            address,
            heuristic,
            format!("render failed ({detail}); placeholder classified by local heuristic"),
        );
    }

    match ctx.detailed.classify_detailed(&image).await {
        Ok(rationale) => match ctx.fast.classify_fast(&image).await {
            Ok(classification) => TileResult::model(
                address,
                classification.label,
                classification.confidence,
                rationale,
            ),
            Err(err) => {
                // The detailed pass finished; scan its rationale instead of
                // discarding the completed analysis.
                ctx.client
                    .error(address, TileErrorKind::Classification, err.to_string());
                let heuristic = ctx.fallback.classify_rationale(&rationale);
                TileResult::fallback(address, heuristic, rationale)
            }
        },
        Err(err) => {
            ctx.client
                .error(address, TileErrorKind::Classification, err.to_string());
            let heuristic = ctx.fallback.classify_coverage(&image);
            TileResult::fallback(
                address,
                heuristic,
                format!("classification unavailable ({err}); local heuristic applied"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{
        ClassifyError, ClassifyFuture, FastClassification, Label, ResultSource,
    };
    use crate::messages::AnalysisMessage;
    use crate::render::{RenderError, RenderFuture, TileRenderer};
    use image::Rgba;
    use tokio::sync::mpsc;

    struct StripeRenderer;

    impl TileRenderer for StripeRenderer {
        fn render_tile(&self, _world_rect: WorldRect, resolution_px: u32) -> RenderFuture<'_> {
            Box::pin(async move {
                let mut image =
                    RgbaImage::from_pixel(resolution_px, resolution_px, Rgba([255, 255, 255, 255]));
                for y in 0..resolution_px {
                    image.put_pixel(resolution_px / 2, y, Rgba([0, 128, 128, 255]));
                }
                Ok(image)
            })
        }

        fn name(&self) -> &str {
            "stripe"
        }
    }

    struct DeadRenderer;

    impl TileRenderer for DeadRenderer {
        fn render_tile(&self, _world_rect: WorldRect, _resolution_px: u32) -> RenderFuture<'_> {
            Box::pin(async { Err(RenderError::Unavailable("offline".to_string())) })
        }

        fn name(&self) -> &str {
            "dead"
        }
    }

    struct ScriptedDetailed {
        outcome: Result<String, ClassifyError>,
    }

    impl DetailedClassifier for ScriptedDetailed {
        fn classify_detailed<'a>(&'a self, _image: &'a RgbaImage) -> ClassifyFuture<'a, String> {
            let outcome = self.outcome.clone();
            Box::pin(async move { outcome })
        }

        fn name(&self) -> &str {
            "scripted-detailed"
        }
    }

    struct ScriptedFast {
        outcome: Result<FastClassification, ClassifyError>,
    }

    impl FastClassifier for ScriptedFast {
        fn classify_fast<'a>(
            &'a self,
            _image: &'a RgbaImage,
        ) -> ClassifyFuture<'a, FastClassification> {
            let outcome = self.outcome.clone();
            Box::pin(async move { outcome })
        }

        fn name(&self) -> &str {
            "scripted-fast"
        }
    }

    fn context(
        renderers: Vec<Arc<dyn TileRenderer>>,
        detailed: Result<String, ClassifyError>,
        fast: Result<FastClassification, ClassifyError>,
    ) -> (WorkerContext, mpsc::UnboundedReceiver<AnalysisMessage>) {
        let (client, rx) = MessageClient::channel();
        let ctx = WorkerContext {
            grid: GridConfig::new(2, 2, 0.0, 16),
            layout_bounds: WorldRect::from_corners(0.0, 0.0, 100.0, 100.0),
            cache: Arc::new(TileCache::new(8)),
            renderers: Arc::new(RendererChain::new(renderers)),
            detailed: Arc::new(ScriptedDetailed { outcome: detailed }),
            fast: Arc::new(ScriptedFast { outcome: fast }),
            fallback: FallbackClassifier::new(),
            client,
        };
        (ctx, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<AnalysisMessage>) -> Vec<AnalysisMessage> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message);
        }
        out
    }

    #[tokio::test]
    async fn test_happy_path_yields_model_result() {
        let (ctx, mut rx) = context(
            vec![Arc::new(StripeRenderer)],
            Ok("waveguide is smooth".to_string()),
            Ok(FastClassification {
                label: Label::Continuity,
                confidence: 0.93,
            }),
        );

        let result = process_tile(&ctx, TileAddress::new(0, 0)).await;

        assert_eq!(result.source, ResultSource::Model);
        assert_eq!(result.label, Label::Continuity);
        assert_eq!(result.rationale, "waveguide is smooth");
        assert!((result.confidence - 0.93).abs() < 1e-12);
        assert!(drain(&mut rx).is_empty(), "no error messages expected");
    }

    #[tokio::test]
    async fn test_rendered_tile_is_cached() {
        let (ctx, _rx) = context(
            vec![Arc::new(StripeRenderer)],
            Ok("ok".to_string()),
            Ok(FastClassification {
                label: Label::Continuity,
                confidence: 0.9,
            }),
        );
        let address = TileAddress::new(0, 1);

        process_tile(&ctx, address).await;
        assert!(ctx.cache.contains(&TileKey::new(address, 16)));

        // Second pass hits the cache.
        process_tile(&ctx, address).await;
        assert_eq!(ctx.cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_render_failure_takes_fallback_path() {
        let (ctx, mut rx) = context(
            vec![Arc::new(DeadRenderer)],
            Ok("should never be used".to_string()),
            Ok(FastClassification {
                label: Label::Continuity,
                confidence: 0.9,
            }),
        );
        let address = TileAddress::new(1, 0);

        let result = process_tile(&ctx, address).await;

        assert_eq!(result.source, ResultSource::Fallback);
        assert!(result.rationale.contains("render failed"));
        // Placeholder is solid magenta, well above the coverage threshold.
        assert_eq!(result.label, Label::Continuity);
        assert!(!ctx.cache.contains(&TileKey::new(address, 16)));

        let messages = drain(&mut rx);
        assert!(matches!(
            messages[0],
            AnalysisMessage::Error {
                kind: TileErrorKind::Render,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_detailed_failure_uses_coverage_heuristic() {
        let (ctx, mut rx) = context(
            vec![Arc::new(StripeRenderer)],
            Err(ClassifyError::ServiceUnavailable("503".to_string())),
            Ok(FastClassification {
                label: Label::Continuity,
                confidence: 0.9,
            }),
        );

        let result = process_tile(&ctx, TileAddress::new(0, 0)).await;

        assert_eq!(result.source, ResultSource::Fallback);
        assert!(result.rationale.contains("classification unavailable"));
        let messages = drain(&mut rx);
        assert!(matches!(
            messages[0],
            AnalysisMessage::Error {
                kind: TileErrorKind::Classification,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fast_failure_scans_rationale() {
        let (ctx, mut rx) = context(
            vec![Arc::new(StripeRenderer)],
            Ok("clear step offset across the seam".to_string()),
            Err(ClassifyError::QuotaExceeded),
        );

        let result = process_tile(&ctx, TileAddress::new(0, 0)).await;

        assert_eq!(result.source, ResultSource::Fallback);
        // The rationale mentioned a defect; the keyword scan flags it.
        assert_eq!(result.label, Label::Discontinuity);
        assert_eq!(result.rationale, "clear step offset across the seam");
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_address_outside_grid_still_yields_result() {
        let (ctx, mut rx) = context(
            vec![Arc::new(StripeRenderer)],
            Ok("unused".to_string()),
            Ok(FastClassification {
                label: Label::Continuity,
                confidence: 0.9,
            }),
        );

        let result = process_tile(&ctx, TileAddress::new(9, 9)).await;

        assert_eq!(result.source, ResultSource::Fallback);
        assert!(result.rationale.contains("geometry error"));
        let messages = drain(&mut rx);
        assert!(matches!(
            messages[0],
            AnalysisMessage::Error {
                kind: TileErrorKind::Internal,
                ..
            }
        ));
    }
}
