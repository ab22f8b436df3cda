//! Stage Design Model
//!
//! Defines the data contracts shared by the editor snapshot and the export
//! pipeline:
//! - **Colors:** tagged color values, resolved once at authoring time
//! - **Backgrounds:** solid, gradient, or image fills plus the named palette
//! - **Overlays:** positioned, styled text drawn above the background
//! - **Export:** output format, quality, scale, and logical dimensions
//! - **Scene:** serializable description of the user's image layers
//!
//! Overlay positions are percentages of the card size so a design renders
//! identically at every output resolution.

pub mod aspect;
pub mod background;
pub mod color;
pub mod design;
pub mod export;
pub mod overlay;
pub mod palette;
pub mod scene;

pub use aspect::*;
pub use background::*;
pub use color::*;
pub use design::*;
pub use export::*;
pub use overlay::*;
pub use scene::*;
