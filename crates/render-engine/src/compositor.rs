//! Combines the background and scene passes.

use image::imageops;

use crate::surface::RasterSurface;

#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor;

impl Compositor {
    /// Draw `vector` over `background` with source-over alpha.
    ///
    /// # Panics
    ///
    /// Both passes are sized from the same options; differing sizes are a bug.
    pub fn composite(mut background: RasterSurface, vector: &RasterSurface) -> RasterSurface {
        assert_eq!(
            background.dimensions(),
            vector.dimensions(),
            "background and scene surfaces must match"
        );
        imageops::overlay(background.image_mut(), vector.image(), 0, 0);
        background
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_transparent_vector_keeps_background() {
        let bg = RasterSurface::from_image(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])));
        let fg = RasterSurface::from_image(RgbaImage::new(4, 4));
        let out = Compositor::composite(bg, &fg);
        assert!(out.image().pixels().all(|p| p.0 == [1, 2, 3, 255]));
    }

    #[test]
    fn test_opaque_vector_covers_background() {
        let bg = RasterSurface::from_image(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])));
        let mut top = RgbaImage::new(4, 4);
        top.put_pixel(1, 1, Rgba([200, 0, 0, 255]));
        let out = Compositor::composite(bg, &RasterSurface::from_image(top));
        assert_eq!(out.pixel(1, 1), [200, 0, 0, 255]);
        assert_eq!(out.pixel(0, 0), [1, 2, 3, 255]);
    }

    #[test]
    #[should_panic(expected = "must match")]
    fn test_size_mismatch_panics() {
        let bg = RasterSurface::from_image(RgbaImage::new(4, 4));
        let fg = RasterSurface::from_image(RgbaImage::new(5, 4));
        let _ = Compositor::composite(bg, &fg);
    }
}
