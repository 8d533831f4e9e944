use kurbo::{Point, Rect, Vec2};

use crate::foundation::core::PixelSize;
use crate::model::layer::MediaLayer;

/// A layer's axis-aligned destination rectangle on the output surface, in pixels.
///
/// Origin is the top-left corner; y grows downward. The rectangle may extend past the
/// surface edges; the overflow is cropped at composite time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerFrame {
    /// Top-left corner in output pixels.
    pub origin: Point,
    /// Extent in output pixels, both components > 0.
    pub size: Vec2,
}

impl LayerFrame {
    /// The frame as a kurbo rectangle.
    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(self.origin, (self.size.x, self.size.y))
    }
}

/// Compute a layer's pixel-space destination frame on a canvas of `canvas` pixels.
///
/// `layer.position` is the normalized center and `layer.size` the normalized extent,
/// both relative to the canvas. Position is unclamped so frames may lie partly or
/// wholly outside the surface.
pub fn pixel_frame(layer: &MediaLayer, canvas: PixelSize) -> LayerFrame {
    let cw = f64::from(canvas.width);
    let ch = f64::from(canvas.height);
    let size = Vec2::new(layer.size.x * cw, layer.size.y * ch);
    let origin = Point::new(
        layer.position.x * cw - size.x / 2.0,
        layer.position.y * ch - size.y / 2.0,
    );
    LayerFrame { origin, size }
}

/// How source pixels map into a destination frame whose aspect ratio differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitMode {
    /// Scale to fit entirely inside the frame, letterboxing the remainder.
    Fit,
    /// Scale to cover the frame entirely, center-cropping the overflow.
    Fill,
}

/// A resolved source-to-frame mapping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitTransform {
    /// Uniform scale factor applied to the source.
    pub scale: f64,
    /// Destination rectangle in frame-local pixels (top-left origin within the frame).
    pub dest: Rect,
    /// Source rectangle actually sampled, in source pixels.
    pub crop: Rect,
}

/// Resolve how a `source`-sized image maps into `frame`.
///
/// Fit centers the scaled source inside the frame and leaves the rest transparent.
/// Fill scales to cover and crops the source symmetrically around its center.
pub fn fit_transform(source: PixelSize, frame: &LayerFrame, mode: FitMode) -> FitTransform {
    let sw = f64::from(source.width);
    let sh = f64::from(source.height);
    let fw = frame.size.x;
    let fh = frame.size.y;
    let sx = fw / sw;
    let sy = fh / sh;
    match mode {
        FitMode::Fit => {
            let scale = sx.min(sy);
            let dw = sw * scale;
            let dh = sh * scale;
            FitTransform {
                scale,
                dest: Rect::new(
                    (fw - dw) / 2.0,
                    (fh - dh) / 2.0,
                    (fw - dw) / 2.0 + dw,
                    (fh - dh) / 2.0 + dh,
                ),
                crop: Rect::new(0.0, 0.0, sw, sh),
            }
        }
        FitMode::Fill => {
            let scale = sx.max(sy);
            // Source extent that exactly covers the frame after scaling.
            let cw = fw / scale;
            let chh = fh / scale;
            let cx = (sw - cw) / 2.0;
            let cy = (sh - chh) / 2.0;
            FitTransform {
                scale,
                dest: Rect::new(0.0, 0.0, fw, fh),
                crop: Rect::new(cx, cy, cx + cw, cy + chh),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::layer::{LayerId, LayerTiming};
    use crate::model::media::MediaId;

    fn layer_at(position: Point, size: Vec2) -> MediaLayer {
        MediaLayer {
            id: LayerId(1),
            media: MediaId(1),
            position,
            size,
            z_index: 0,
            opacity: 1.0,
            timing: LayerTiming::image(2.0),
        }
    }

    #[test]
    fn centered_layer_frame_on_portrait_canvas() {
        let canvas = PixelSize::new(1080, 1920).unwrap();
        let layer = layer_at(Point::new(0.5, 0.5), Vec2::new(0.4, 0.4));
        let frame = pixel_frame(&layer, canvas);
        assert_eq!(frame.size, Vec2::new(432.0, 768.0));
        assert_eq!(frame.origin, Point::new(324.0, 576.0));
    }

    #[test]
    fn pixel_frame_is_linear_in_canvas_size() {
        let layer = layer_at(Point::new(0.3, 0.7), Vec2::new(0.25, 0.5));
        let base = pixel_frame(&layer, PixelSize::new(640, 360).unwrap());
        let doubled = pixel_frame(&layer, PixelSize::new(1280, 720).unwrap());
        assert_eq!(
            doubled.origin,
            Point::new(base.origin.x * 2.0, base.origin.y * 2.0)
        );
        assert_eq!(doubled.size, base.size * 2.0);
    }

    #[test]
    fn offscreen_positions_are_not_clamped() {
        let canvas = PixelSize::new(1000, 1000).unwrap();
        let layer = layer_at(Point::new(-0.1, 1.2), Vec2::new(0.2, 0.2));
        let frame = pixel_frame(&layer, canvas);
        assert_eq!(frame.origin, Point::new(-200.0, 1100.0));
    }

    #[test]
    fn fit_letterboxes_wide_source_in_tall_frame() {
        let frame = LayerFrame {
            origin: Point::ZERO,
            size: Vec2::new(100.0, 200.0),
        };
        let t = fit_transform(PixelSize::new(200, 100).unwrap(), &frame, FitMode::Fit);
        assert_eq!(t.scale, 0.5);
        assert_eq!(t.dest, Rect::new(0.0, 75.0, 100.0, 125.0));
        assert_eq!(t.crop, Rect::new(0.0, 0.0, 200.0, 100.0));
    }

    #[test]
    fn fill_center_crops_wide_source_in_tall_frame() {
        let frame = LayerFrame {
            origin: Point::ZERO,
            size: Vec2::new(100.0, 200.0),
        };
        let t = fit_transform(PixelSize::new(200, 100).unwrap(), &frame, FitMode::Fill);
        assert_eq!(t.scale, 2.0);
        assert_eq!(t.dest, Rect::new(0.0, 0.0, 100.0, 200.0));
        assert_eq!(t.crop, Rect::new(75.0, 0.0, 125.0, 100.0));
    }

    #[test]
    fn matching_aspect_uses_full_source_in_both_modes() {
        let frame = LayerFrame {
            origin: Point::ZERO,
            size: Vec2::new(128.0, 72.0),
        };
        let src = PixelSize::new(1280, 720).unwrap();
        for mode in [FitMode::Fit, FitMode::Fill] {
            let t = fit_transform(src, &frame, mode);
            assert_eq!(t.dest, Rect::new(0.0, 0.0, 128.0, 72.0));
            assert_eq!(t.crop, Rect::new(0.0, 0.0, 1280.0, 720.0));
        }
    }
}
