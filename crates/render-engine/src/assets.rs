//! Image sources for background and scene images.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, RgbaImage};
use stage_design_model::ImageRef;

use crate::cancel::CancelToken;
use crate::encode::decode_data_url;
use crate::error::ExportError;

/// Resolves image references to decoded pixels. Loads are blocking and run
/// on the blocking pool.
pub trait ImageSource: Send + Sync + Debug {
    fn load(&self, reference: &ImageRef) -> Result<DynamicImage, ExportError>;
}

/// Loads `data:` URIs, `file://` URLs and filesystem paths. Relative paths
/// resolve against `root` when set.
#[derive(Debug, Clone, Default)]
pub struct FsImageSource {
    root: Option<PathBuf>,
}

impl FsImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

impl ImageSource for FsImageSource {
    fn load(&self, reference: &ImageRef) -> Result<DynamicImage, ExportError> {
        let raw = reference.as_str();
        if reference.is_data_uri() {
            let data = decode_data_url(raw)
                .map_err(|e| ExportError::image_load(describe_reference(reference), e))?;
            return image::load_from_memory(&data.bytes)
                .map_err(|e| ExportError::image_load(describe_reference(reference), e));
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Err(ExportError::image_load(
                raw,
                "remote images must be fetched by the host before export",
            ));
        }

        let path = PathBuf::from(raw.strip_prefix("file://").unwrap_or(raw));
        let path = match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        };
        image::open(&path).map_err(|e| ExportError::image_load(path.display().to_string(), e))
    }
}

/// Pre-decoded images keyed by reference string.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    images: HashMap<String, Arc<DynamicImage>>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, image: impl Into<DynamicImage>) {
        self.images.insert(reference.into(), Arc::new(image.into()));
    }

    pub fn with(mut self, reference: impl Into<String>, image: impl Into<DynamicImage>) -> Self {
        self.insert(reference, image);
        self
    }
}

impl ImageSource for MemoryImageSource {
    fn load(&self, reference: &ImageRef) -> Result<DynamicImage, ExportError> {
        self.images
            .get(reference.as_str())
            .map(|image| image.as_ref().clone())
            .ok_or_else(|| ExportError::image_load(reference.as_str(), "not registered"))
    }
}

/// Short form of a reference for logs; data URIs are summarized.
pub fn describe_reference(reference: &ImageRef) -> String {
    let raw = reference.as_str();
    if reference.is_data_uri() {
        let header = raw.split(',').next().unwrap_or("data:");
        format!("{header},… ({} bytes)", raw.len())
    } else {
        raw.to_string()
    }
}

/// Load one image with a deadline. Failures and timeouts are logged and
/// yield `None`; only cancellation is an error.
pub async fn load_bounded(
    source: Arc<dyn ImageSource>,
    reference: ImageRef,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<Option<Arc<RgbaImage>>, ExportError> {
    let label = describe_reference(&reference);
    let task = tokio::task::spawn_blocking(move || {
        source.load(&reference).map(|image| image.to_rgba8())
    });

    let err = match cancel.run(tokio::time::timeout(timeout, task)).await? {
        Ok(Ok(Ok(image))) => {
            tracing::debug!(
                reference = %label,
                width = image.width(),
                height = image.height(),
                "Loaded image"
            );
            return Ok(Some(Arc::new(image)));
        }
        Ok(Ok(Err(e))) => e,
        Ok(Err(join_err)) => ExportError::image_load(label, join_err),
        Err(_) => ExportError::image_load(
            label,
            format!("timed out after {} ms", timeout.as_millis()),
        ),
    };
    tracing::warn!(error = %err, "Continuing export without image");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::to_data_url;
    use image::Rgba;

    #[derive(Debug)]
    struct SlowSource;

    impl ImageSource for SlowSource {
        fn load(&self, _reference: &ImageRef) -> Result<DynamicImage, ExportError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(DynamicImage::new_rgba8(1, 1))
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(2, 3, Rgba([1, 2, 3, 255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_fs_source_decodes_data_uri() {
        let uri = to_data_url("image/png", &png_bytes());
        let image = FsImageSource::new().load(&ImageRef::new(uri)).unwrap();
        assert_eq!((image.width(), image.height()), (2, 3));
    }

    #[test]
    fn test_fs_source_reads_relative_paths_from_root() {
        let dir = std::env::temp_dir().join("stage_test_assets");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("bg.png"), png_bytes()).unwrap();

        let source = FsImageSource::with_root(&dir);
        assert!(source.load(&ImageRef::new("bg.png")).is_ok());
        let url = format!("file://{}", dir.join("bg.png").display());
        assert!(FsImageSource::new().load(&ImageRef::new(url)).is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_remote_and_missing_images_fail() {
        let source = FsImageSource::new();
        assert!(matches!(
            source.load(&ImageRef::new("https://cdn.example.com/bg.jpg")),
            Err(ExportError::ImageLoadFailure { .. })
        ));
        assert!(source.load(&ImageRef::new("/no/such/image.png")).is_err());
    }

    #[test]
    fn test_data_uri_is_summarized() {
        let reference = ImageRef::new(to_data_url("image/png", &[0u8; 64]));
        let label = describe_reference(&reference);
        assert!(label.starts_with("data:image/png;base64,"));
        assert!(label.len() < 60);
    }

    #[tokio::test]
    async fn test_failed_load_is_recovered() {
        let source: Arc<dyn ImageSource> = Arc::new(MemoryImageSource::new());
        let loaded = load_bounded(
            source,
            ImageRef::new("missing.png"),
            Duration::from_secs(1),
            &CancelToken::new(),
        )
        .await
        .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_slow_load_times_out() {
        let source: Arc<dyn ImageSource> = Arc::new(SlowSource);
        let loaded = load_bounded(
            source,
            ImageRef::new("slow.png"),
            Duration::from_millis(20),
            &CancelToken::new(),
        )
        .await
        .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_load_is_an_error() {
        let source: Arc<dyn ImageSource> = Arc::new(SlowSource);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = load_bounded(source, ImageRef::new("slow.png"), Duration::from_secs(5), &cancel).await;
        assert_eq!(result, Err(ExportError::Cancelled));
    }
}
