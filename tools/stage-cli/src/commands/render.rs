//! Render a design file to an image.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stage_common::config::AppConfig;
use stage_common::error::StageError;
use stage_common::timing::file_stamp;
use stage_design_model::{aspect_ratio_preset, CardDesign, ExportFormat, ExportOptions, ImageRef, SceneDescription};
use stage_render_engine::{
    CancelToken, ExportPipeline, ExportProgress, ExportRequest, FsImageSource, ImageSource,
    Stage, TargetRegistry,
};

const TARGET: &str = "card";

pub struct RenderArgs {
    pub design: PathBuf,
    pub output: Option<PathBuf>,
    pub format: Option<String>,
    pub quality: Option<f64>,
    pub scale: Option<f64>,
    pub size: Option<(u32, u32)>,
    pub aspect: Option<String>,
    pub image: Option<PathBuf>,
    pub data_url: bool,
}

pub async fn run(config: &AppConfig, args: RenderArgs) -> anyhow::Result<()> {
    if !args.design.exists() {
        return Err(StageError::FileNotFound { path: args.design }.into());
    }
    let design = CardDesign::load(&args.design).map_err(|e| StageError::design(e.to_string()))?;

    let (width, height) = match (args.size, &args.aspect) {
        (Some(size), _) => size,
        (None, Some(id)) => {
            let preset = aspect_ratio_preset(id).ok_or_else(|| {
                anyhow::anyhow!("Unknown aspect preset: {id}. Run `stage presets` for the list")
            })?;
            (preset.width, preset.height)
        }
        (None, None) => {
            let preset = design.preset()?;
            (preset.width, preset.height)
        }
    };

    let format: ExportFormat = args
        .format
        .as_deref()
        .unwrap_or(&config.render.format)
        .parse()?;
    let options = ExportOptions {
        quality: args.quality.unwrap_or(config.render.quality),
        ..ExportOptions::new(format, width, height, args.scale.unwrap_or(config.render.scale))
    };
    options.validate()?;

    let output = args.output.unwrap_or_else(|| default_output(&args.design, format));
    println!("Rendering design: {}", args.design.display());
    println!("  Output: {}", output.display());
    println!("  Format: {}", format.extension());
    let (device_w, device_h) = options.device_size();
    println!("  Resolution: {width}x{height} @{} ({device_w}x{device_h})", options.scale);

    let root = args
        .design
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let images: Arc<dyn ImageSource> = Arc::new(FsImageSource::with_root(root));
    let targets = Arc::new(TargetRegistry::new());
    targets.register(TARGET);

    let cancel = CancelToken::new();
    let description = match (&design.scene, &args.image) {
        (Some(scene), _) => scene.clone(),
        (None, Some(image)) => SceneDescription::with_centered_image(
            width as f64,
            height as f64,
            // Relative to the working directory, not the design file.
            ImageRef::new(std::env::current_dir()?.join(image).display().to_string()),
            0.08,
            12.0,
        ),
        (None, None) => SceneDescription::empty(width as f64, height as f64),
    };
    let stage = Stage::from_description(
        &description,
        images.clone(),
        config.render.image_load_timeout(),
        &cancel,
    )
    .await?;

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling export");
            interrupt.cancel();
        }
    });

    let pipeline = ExportPipeline::from_config(config, images, targets).with_progress(Arc::new(
        |p: ExportProgress| {
            let mut out = std::io::stdout().lock();
            let _ = write!(out, "\r  Progress: {:>3.0}% ({:?})        ", p.progress * 100.0, p.stage);
            let _ = out.flush();
        },
    ));
    let request = ExportRequest::from_design(TARGET, &design, options).with_scene(Arc::new(stage));

    let result = match pipeline.export_element(request, &cancel).await {
        Ok(result) => result,
        Err(e) => {
            println!();
            return Err(anyhow::anyhow!("Export failed: {e}"));
        }
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, &result.blob)?;
    println!(
        "\nExport complete: {} ({} bytes, {}x{})",
        output.display(),
        result.blob.len(),
        result.width,
        result.height
    );
    if args.data_url {
        println!("{}", result.data_url);
    }
    Ok(())
}

fn default_output(design: &Path, format: ExportFormat) -> PathBuf {
    let stem = design
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("card");
    PathBuf::from(format!("{stem}-{}.{}", file_stamp(), format.extension()))
}
