//! Export requests and the pipeline that turns them into encoded images.

use std::sync::Arc;
use std::time::Duration;

use stage_common::config::AppConfig;
use stage_common::timing::ExportClock;
use stage_design_model::{BackgroundConfig, BackgroundFill, CardDesign, ExportOptions, TextOverlay};

use crate::assets::{load_bounded, ImageSource};
use crate::background::{BackgroundRasterizer, BackgroundSnapshot};
use crate::cancel::CancelToken;
use crate::compositor::Compositor;
use crate::encode::{encode_surface, to_data_url};
use crate::error::ExportError;
use crate::scene::SceneGraph;
use crate::style::Stylesheet;
use crate::surface::DEFAULT_MAX_SURFACE_PIXELS;
use crate::targets::TargetRegistry;
use crate::text::FontBook;
use crate::vector::VectorLayerRasterizer;
use crate::watermark::{WatermarkPolicy, Watermarker};

/// Progress callback for export rendering.
pub type ProgressCallback = Arc<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Background,
    Scene,
    Compositing,
    Watermarking,
    Encoding,
    Complete,
    Failed,
}

/// One export invocation: which target, how to encode it, and the design
/// state captured when the export was requested.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub target_id: String,
    pub options: ExportOptions,
    /// The attached scene graph; required.
    pub scene: Option<Arc<dyn SceneGraph>>,
    pub background: BackgroundConfig,
    /// Card corner radius in logical pixels.
    pub border_radius: f64,
    pub overlays: Vec<TextOverlay>,
}

impl ExportRequest {
    pub fn new(target_id: impl Into<String>, options: ExportOptions) -> Self {
        Self {
            target_id: target_id.into(),
            options,
            scene: None,
            background: BackgroundConfig::default(),
            border_radius: 0.0,
            overlays: Vec::new(),
        }
    }

    /// Snapshot the design fields the pipeline reads.
    pub fn from_design(target_id: impl Into<String>, design: &CardDesign, options: ExportOptions) -> Self {
        Self {
            background: design.background.clone(),
            border_radius: design.border_radius,
            overlays: design.overlays.clone(),
            ..Self::new(target_id, options)
        }
    }

    pub fn with_scene(mut self, scene: Arc<dyn SceneGraph>) -> Self {
        self.scene = Some(scene);
        self
    }

    pub fn with_background(mut self, background: BackgroundConfig) -> Self {
        self.background = background;
        self
    }

    pub fn with_border_radius(mut self, radius: f64) -> Self {
        self.border_radius = radius;
        self
    }

    pub fn with_overlays(mut self, overlays: Vec<TextOverlay>) -> Self {
        self.overlays = overlays;
        self
    }
}

/// A finished export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResult {
    /// `data:<mime>;base64,...` of `blob`.
    pub data_url: String,
    pub blob: Vec<u8>,
    pub mime_type: String,
    /// Device pixels.
    pub width: u32,
    pub height: u32,
}

/// Limits and host styling shared by every export of one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub image_load_timeout: Duration,
    pub max_surface_pixels: u64,
    pub stylesheets: Vec<Stylesheet>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            image_load_timeout: Duration::from_secs(5),
            max_surface_pixels: DEFAULT_MAX_SURFACE_PIXELS,
            stylesheets: Vec::new(),
        }
    }
}

/// Card export pipeline.
///
/// Stages run strictly in order: background pass, scene pass, composite,
/// watermark, encode. Each heavy stage runs on the blocking pool and is
/// raced against the caller's [`CancelToken`].
#[derive(Clone)]
pub struct ExportPipeline {
    fonts: Arc<FontBook>,
    images: Arc<dyn ImageSource>,
    targets: Arc<TargetRegistry>,
    settings: PipelineSettings,
    watermark: Arc<Watermarker>,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("fonts", &self.fonts)
            .field("images", &self.images)
            .field("targets", &self.targets.len())
            .field("settings", &self.settings)
            .field("watermark", self.watermark.policy())
            .finish()
    }
}

impl ExportPipeline {
    pub fn new(fonts: Arc<FontBook>, images: Arc<dyn ImageSource>, targets: Arc<TargetRegistry>) -> Self {
        let watermark = Arc::new(Watermarker::standard(&fonts));
        Self {
            fonts,
            images,
            targets,
            settings: PipelineSettings::default(),
            watermark,
            progress: None,
        }
    }

    /// Build a pipeline from application config: fonts, load timeout and
    /// surface limit.
    pub fn from_config(config: &AppConfig, images: Arc<dyn ImageSource>, targets: Arc<TargetRegistry>) -> Self {
        let fonts = Arc::new(FontBook::from_config(&config.fonts));
        Self::new(fonts, images, targets).with_settings(PipelineSettings {
            image_load_timeout: config.render.image_load_timeout(),
            max_surface_pixels: config.render.max_surface_pixels,
            stylesheets: Vec::new(),
        })
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_stylesheets(mut self, sheets: Vec<Stylesheet>) -> Self {
        self.settings.stylesheets = sheets;
        self
    }

    /// Replace the mark. Policies that would leave exports unmarked are
    /// rejected.
    pub fn with_watermark_policy(mut self, policy: WatermarkPolicy) -> Result<Self, ExportError> {
        self.watermark = Arc::new(Watermarker::new(policy, &self.fonts)?);
        Ok(self)
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn targets(&self) -> &Arc<TargetRegistry> {
        &self.targets
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn watermarker(&self) -> &Watermarker {
        &self.watermark
    }

    /// Export one target. On failure nothing partial is returned.
    pub async fn export_element(
        &self,
        request: ExportRequest,
        cancel: &CancelToken,
    ) -> Result<ExportResult, ExportError> {
        let mut clock = ExportClock::start();
        tracing::info!(
            target_id = %request.target_id,
            format = ?request.options.format,
            width = request.options.export_width,
            height = request.options.export_height,
            scale = request.options.scale,
            started_at = clock.epoch_wall(),
            "Starting export"
        );
        self.report(0.0, ExportStage::Preparing);

        let result = self.run(request, cancel, &mut clock).await;
        match &result {
            Ok(done) => {
                self.report(1.0, ExportStage::Complete);
                tracing::info!(
                    width = done.width,
                    height = done.height,
                    bytes = done.blob.len(),
                    elapsed_ms = clock.elapsed_ms() as u64,
                    "Export complete"
                );
            }
            Err(err) => {
                self.report(1.0, ExportStage::Failed);
                tracing::warn!(error = %err, elapsed_ms = clock.elapsed_ms() as u64, "Export failed");
            }
        }
        result
    }

    async fn run(
        &self,
        request: ExportRequest,
        cancel: &CancelToken,
        clock: &mut ExportClock,
    ) -> Result<ExportResult, ExportError> {
        let ExportRequest {
            target_id,
            options,
            scene,
            background,
            border_radius,
            overlays,
        } = request;

        options.validate()?;
        let lock = self
            .targets
            .lock_for(&target_id)
            .ok_or_else(|| ExportError::MissingTargetElement {
                target: target_id.clone(),
            })?;
        // Checked before any image load or scaffolding.
        let scene = scene.ok_or(ExportError::MissingRenderStage)?;

        let _guard = cancel.run(lock.lock_owned()).await?;
        let image = match background.resolve() {
            BackgroundFill::Image(reference) => {
                load_bounded(
                    self.images.clone(),
                    reference,
                    self.settings.image_load_timeout,
                    cancel,
                )
                .await?
            }
            _ => None,
        };
        tracing::debug!(lap_ms = clock.lap_ms() as u64, "Prepared export");

        self.report(0.1, ExportStage::Background);
        let rasterizer = BackgroundRasterizer::new(self.fonts.clone())
            .with_stylesheets(self.settings.stylesheets.clone())
            .with_max_surface_pixels(self.settings.max_surface_pixels);
        let snapshot = BackgroundSnapshot {
            options,
            background,
            border_radius,
            overlays,
            image,
        };
        let base = run_blocking(cancel, move || rasterizer.rasterize(&snapshot)).await?;
        tracing::debug!(stage = "background", lap_ms = clock.lap_ms() as u64, "Stage finished");

        self.report(0.4, ExportStage::Scene);
        let vector = VectorLayerRasterizer::new().with_max_surface_pixels(self.settings.max_surface_pixels);
        let layers = run_blocking(cancel, move || vector.rasterize(Some(scene.as_ref()), &options)).await?;
        tracing::debug!(stage = "scene", lap_ms = clock.lap_ms() as u64, "Stage finished");

        self.report(0.7, ExportStage::Compositing);
        let composed = run_blocking(cancel, move || Ok(Compositor::composite(base, &layers))).await?;
        tracing::debug!(stage = "composite", lap_ms = clock.lap_ms() as u64, "Stage finished");

        self.report(0.8, ExportStage::Watermarking);
        let watermark = self.watermark.clone();
        let marked = run_blocking(cancel, move || {
            let mut surface = composed;
            watermark.apply(&mut surface)?;
            Ok(surface)
        })
        .await?;

        self.report(0.9, ExportStage::Encoding);
        let (width, height) = marked.dimensions();
        let blob = run_blocking(cancel, move || encode_surface(&marked, &options)).await?;
        tracing::debug!(stage = "encode", lap_ms = clock.lap_ms() as u64, "Stage finished");

        let mime_type = options.format.mime_type().to_string();
        Ok(ExportResult {
            data_url: to_data_url(&mime_type, &blob),
            blob,
            mime_type,
            width,
            height,
        })
    }

    fn report(&self, progress: f64, stage: ExportStage) {
        if let Some(cb) = &self.progress {
            cb(ExportProgress { progress, stage });
        }
    }
}

/// Run a raster stage on the blocking pool, racing it against `cancel`.
async fn run_blocking<T, F>(cancel: &CancelToken, work: F) -> Result<T, ExportError>
where
    F: FnOnce() -> Result<T, ExportError> + Send + 'static,
    T: Send + 'static,
{
    cancel.check()?;
    match cancel.run(tokio::task::spawn_blocking(work)).await? {
        Ok(result) => result,
        Err(join_err) => Err(ExportError::Internal {
            message: format!("raster task failed: {join_err}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryImageSource;
    use crate::scene::Stage;
    use stage_design_model::ExportFormat;
    use std::sync::Mutex;

    fn pipeline(targets: &[&str]) -> ExportPipeline {
        let registry = Arc::new(TargetRegistry::new());
        for id in targets {
            registry.register(*id);
        }
        ExportPipeline::new(
            Arc::new(FontBook::default()),
            Arc::new(MemoryImageSource::new()),
            registry,
        )
    }

    fn request(target: &str, w: u32, h: u32) -> ExportRequest {
        let mut stage = Stage::new(w as f64, h as f64);
        stage.add_layer("background");
        ExportRequest::new(target, ExportOptions::new(ExportFormat::Png, w, h, 1.0))
            .with_background(BackgroundConfig::solid("#ffffff"))
            .with_scene(Arc::new(stage))
    }

    #[tokio::test]
    async fn test_progress_reports_every_stage_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let pipeline = pipeline(&["card"]).with_progress(Arc::new(move |p: ExportProgress| {
            sink.lock().unwrap().push(p.stage);
        }));

        pipeline
            .export_element(request("card", 64, 48), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ExportStage::Preparing,
                ExportStage::Background,
                ExportStage::Scene,
                ExportStage::Compositing,
                ExportStage::Watermarking,
                ExportStage::Encoding,
                ExportStage::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_target_fails() {
        let err = pipeline(&["card"])
            .export_element(request("other", 10, 10), &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExportError::MissingTargetElement {
                target: "other".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_lookup() {
        let mut req = request("missing", 10, 10);
        req.options.scale = -1.0;
        let err = pipeline(&[]).export_element(req, &CancelToken::new()).await.unwrap_err();
        assert!(matches!(err, ExportError::InvalidOptions { .. }));
    }

    #[tokio::test]
    async fn test_failure_reports_failed_stage() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let pipeline = pipeline(&["card"]).with_progress(Arc::new(move |p: ExportProgress| {
            sink.lock().unwrap().push(p.stage);
        }));
        let mut req = request("card", 10, 10);
        req.scene = None;
        assert!(pipeline.export_element(req, &CancelToken::new()).await.is_err());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ExportStage::Preparing, ExportStage::Failed]
        );
    }

    #[tokio::test]
    async fn test_oversized_export_is_canvas_failure() {
        let pipeline = pipeline(&["card"]).with_settings(PipelineSettings {
            max_surface_pixels: 1_000,
            ..PipelineSettings::default()
        });
        let err = pipeline
            .export_element(request("card", 100, 100), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::CanvasContextUnavailable { .. }));
    }

    #[test]
    fn test_unmarked_policy_is_rejected() {
        let err = pipeline(&["card"])
            .with_watermark_policy(WatermarkPolicy {
                text: String::new(),
                ..WatermarkPolicy::default()
            })
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidWatermark { .. }));
    }

    #[tokio::test]
    async fn test_custom_policy_marks_export() {
        let pipeline = pipeline(&["card"])
            .with_watermark_policy(WatermarkPolicy {
                text: "demo".to_string(),
                text_color: "#000000".into(),
                ..WatermarkPolicy::default()
            })
            .unwrap();
        let result = pipeline
            .export_element(request("card", 200, 100), &CancelToken::new())
            .await
            .unwrap();
        let decoded = image::load_from_memory(&result.blob).unwrap().to_rgba8();
        let region = pipeline.watermarker().region(200, 100);
        let marked = decoded
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0 != [255, 255, 255, 255])
            .inspect(|(x, y, _)| assert!(region.contains(*x, *y)))
            .count();
        assert!(marked > 0);
    }

    #[test]
    fn test_request_from_design_copies_snapshot_fields() {
        let design = CardDesign {
            border_radius: 24.0,
            overlays: vec![TextOverlay::new("Hi", 50.0, 50.0, 32.0, "#000".into())],
            ..CardDesign::default()
        };
        let options = ExportOptions::new(ExportFormat::Jpg, 1200, 630, 1.0);
        let req = ExportRequest::from_design("card", &design, options);
        assert_eq!(req.border_radius, 24.0);
        assert_eq!(req.overlays.len(), 1);
        assert_eq!(req.background, design.background);
        assert!(req.scene.is_none());
    }
}
