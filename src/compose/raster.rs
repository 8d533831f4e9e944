//! Scaled, cropped drawing of a source frame onto an output surface.

use rayon::prelude::*;

use crate::compose::blend::over;
use crate::foundation::core::PixelSize;
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::frame::PixelFrame;
use crate::transform::{FitTransform, LayerFrame};

/// Draw `src` into `dst` through a layer frame and its resolved fit transform.
///
/// Destination pixels outside the surface are clipped; frame pixels outside the fit
/// destination (the letterbox area in fit mode) are left untouched. Sampling is
/// bilinear over premultiplied pixels, clamped at the crop boundary.
pub fn draw_layer(
    dst: &mut [u8],
    dst_size: PixelSize,
    src: &PixelFrame,
    frame: &LayerFrame,
    fit: &FitTransform,
    opacity: f32,
) -> MontageResult<()> {
    if dst.len() != dst_size.area() * 4 {
        return Err(MontageError::render(
            "draw_layer destination buffer does not match its dimensions",
        ));
    }
    if opacity <= 0.0 {
        return Ok(());
    }

    // Surface-space bounds of the drawable area: frame rect offset by the fit dest,
    // clipped to the surface.
    let x0 = (frame.origin.x + fit.dest.x0).floor().max(0.0) as i64;
    let y0 = (frame.origin.y + fit.dest.y0).floor().max(0.0) as i64;
    let x1 = (frame.origin.x + fit.dest.x1)
        .ceil()
        .min(f64::from(dst_size.width)) as i64;
    let y1 = (frame.origin.y + fit.dest.y1)
        .ceil()
        .min(f64::from(dst_size.height)) as i64;
    if x0 >= x1 || y0 >= y1 {
        return Ok(());
    }

    let dest_w = fit.dest.width();
    let dest_h = fit.dest.height();
    if dest_w <= 0.0 || dest_h <= 0.0 {
        return Ok(());
    }
    let sx = fit.crop.width() / dest_w;
    let sy = fit.crop.height() / dest_h;

    // Rows are independent, so draw them in parallel; the result is deterministic.
    let row_bytes = dst_size.width as usize * 4;
    dst.par_chunks_mut(row_bytes)
        .enumerate()
        .filter(|(y, _)| (*y as i64) >= y0 && (*y as i64) < y1)
        .for_each(|(y, row)| {
            let ly = (y as f64 + 0.5) - frame.origin.y;
            if ly < fit.dest.y0 || ly >= fit.dest.y1 {
                return;
            }
            let v = fit.crop.y0 + (ly - fit.dest.y0) * sy;
            for x in x0..x1 {
                // Frame-local position of this pixel's center.
                let lx = (x as f64 + 0.5) - frame.origin.x;
                if lx < fit.dest.x0 || lx >= fit.dest.x1 {
                    continue;
                }
                let u = fit.crop.x0 + (lx - fit.dest.x0) * sx;
                let px = sample_bilinear(src, &fit.crop, u, v);
                if px[3] == 0 {
                    continue;
                }
                let idx = x as usize * 4;
                let d = [row[idx], row[idx + 1], row[idx + 2], row[idx + 3]];
                let out = over(d, px, opacity);
                row[idx..idx + 4].copy_from_slice(&out);
            }
        });
    Ok(())
}

/// Bilinear sample at source position `(u, v)`, clamped to `crop`.
fn sample_bilinear(src: &PixelFrame, crop: &kurbo::Rect, u: f64, v: f64) -> [u8; 4] {
    let u = u.clamp(crop.x0, crop.x1 - f64::EPSILON) - 0.5;
    let v = v.clamp(crop.y0, crop.y1 - f64::EPSILON) - 0.5;

    let uf = u.floor();
    let vf = v.floor();
    let fx = u - uf;
    let fy = v - vf;

    let max_x = src.size().width.saturating_sub(1);
    let max_y = src.size().height.saturating_sub(1);
    let x0 = (uf.max(0.0) as u32).min(max_x);
    let y0 = (vf.max(0.0) as u32).min(max_y);
    let x1 = (x0 + 1).min(max_x);
    let y1 = (y0 + 1).min(max_y);

    let p00 = src.pixel(x0, y0);
    let p10 = src.pixel(x1, y0);
    let p01 = src.pixel(x0, y1);
    let p11 = src.pixel(x1, y1);

    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = f64::from(p00[i]) * (1.0 - fx) + f64::from(p10[i]) * fx;
        let bot = f64::from(p01[i]) * (1.0 - fx) + f64::from(p11[i]) * fx;
        out[i] = (top * (1.0 - fy) + bot * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{FitMode, fit_transform};
    use kurbo::{Point, Vec2};

    fn transparent_surface(size: PixelSize) -> Vec<u8> {
        vec![0u8; size.area() * 4]
    }

    #[test]
    fn fill_covers_entire_frame() {
        let dst_size = PixelSize::new(8, 8).unwrap();
        let mut dst = transparent_surface(dst_size);
        let src = PixelFrame::solid(PixelSize::new(4, 2).unwrap(), [255, 0, 0, 255]);
        let frame = LayerFrame {
            origin: Point::new(2.0, 2.0),
            size: Vec2::new(4.0, 4.0),
        };
        let fit = fit_transform(src.size(), &frame, FitMode::Fill);
        draw_layer(&mut dst, dst_size, &src, &frame, &fit, 1.0).unwrap();

        for y in 0..8u32 {
            for x in 0..8u32 {
                let idx = (y as usize * 8 + x as usize) * 4;
                let inside = (2..6).contains(&x) && (2..6).contains(&y);
                assert_eq!(dst[idx + 3] == 255, inside, "({x},{y})");
            }
        }
    }

    #[test]
    fn fit_letterboxes_inside_frame() {
        let dst_size = PixelSize::new(8, 8).unwrap();
        let mut dst = transparent_surface(dst_size);
        // 2:1 source in a square frame: fit leaves top and bottom bands empty.
        let src = PixelFrame::solid(PixelSize::new(4, 2).unwrap(), [0, 255, 0, 255]);
        let frame = LayerFrame {
            origin: Point::new(0.0, 0.0),
            size: Vec2::new(8.0, 8.0),
        };
        let fit = fit_transform(src.size(), &frame, FitMode::Fit);
        draw_layer(&mut dst, dst_size, &src, &frame, &fit, 1.0).unwrap();

        let alpha_at = |x: u32, y: u32| dst[(y as usize * 8 + x as usize) * 4 + 3];
        assert_eq!(alpha_at(4, 0), 0);
        assert_eq!(alpha_at(4, 4), 255);
        assert_eq!(alpha_at(4, 7), 0);
    }

    #[test]
    fn offscreen_overflow_is_clipped() {
        let dst_size = PixelSize::new(4, 4).unwrap();
        let mut dst = transparent_surface(dst_size);
        let src = PixelFrame::solid(PixelSize::new(4, 4).unwrap(), [0, 0, 255, 255]);
        let frame = LayerFrame {
            origin: Point::new(-2.0, -2.0),
            size: Vec2::new(4.0, 4.0),
        };
        let fit = fit_transform(src.size(), &frame, FitMode::Fill);
        draw_layer(&mut dst, dst_size, &src, &frame, &fit, 1.0).unwrap();

        let alpha_at = |x: u32, y: u32| dst[(y as usize * 4 + x as usize) * 4 + 3];
        assert_eq!(alpha_at(0, 0), 255);
        assert_eq!(alpha_at(1, 1), 255);
        assert_eq!(alpha_at(2, 2), 0);
    }

    #[test]
    fn zero_opacity_draws_nothing() {
        let dst_size = PixelSize::new(2, 2).unwrap();
        let mut dst = transparent_surface(dst_size);
        let src = PixelFrame::solid(dst_size, [255, 255, 255, 255]);
        let frame = LayerFrame {
            origin: Point::new(0.0, 0.0),
            size: Vec2::new(2.0, 2.0),
        };
        let fit = fit_transform(src.size(), &frame, FitMode::Fill);
        draw_layer(&mut dst, dst_size, &src, &frame, &fit, 0.0).unwrap();
        assert!(dst.iter().all(|&b| b == 0));
    }
}
