//! Stage Render Engine
//!
//! Export pipeline that turns a card design plus its scene graph into a
//! single encoded image with the watermark on top.
//!
//! # Pipeline Architecture
//!
//! ```text
//! background config ──┐
//! border radius ──────┼── StyleNormalizer ── BackgroundRasterizer
//! text overlays ──────┘                             │
//!                                                   ├── Compositor
//! scene graph ────────── VectorLayerRasterizer ─────┘      │
//!   (minus layers[0])                                      ├── Watermarker
//!                                                          │
//!                                                          ▼
//!                                                   Encode (PNG/JPEG)
//!                                                          │
//!                                                          ▼
//!                                                data URL + blob
//! ```
//!
//! Exports of one target are serialized through [`TargetRegistry`]; every
//! suspension point is raced against a [`CancelToken`].

pub mod assets;
pub mod background;
pub mod cancel;
pub mod compositor;
pub mod encode;
pub mod error;
pub mod export;
pub mod normalize;
pub mod scene;
pub mod style;
pub mod surface;
pub mod targets;
pub mod text;
pub mod vector;
pub mod watermark;

pub use assets::{FsImageSource, ImageSource, MemoryImageSource};
pub use background::{BackgroundRasterizer, BackgroundSnapshot};
pub use cancel::CancelToken;
pub use compositor::Compositor;
pub use encode::{decode_data_url, DataUrl};
pub use error::ExportError;
pub use export::*;
pub use normalize::StyleNormalizer;
pub use scene::{LayerId, SceneGraph, SceneRasterRequest, Stage, StageLayer, StageNode};
pub use surface::RasterSurface;
pub use targets::TargetRegistry;
pub use text::FontBook;
pub use vector::VectorLayerRasterizer;
pub use watermark::{Corner, MarkRegion, WatermarkPolicy, Watermarker};
