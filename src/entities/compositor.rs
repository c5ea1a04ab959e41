//! Frame compositor - blends RGBA8 layers onto a canvas.
//!
//! Used by the bundled host for both document rendering (stacking visible
//! layers) and sheet assembly (merging a placed frame down).
//! Straight (non-premultiplied) alpha, "over" operator.

use image::RgbaImage;

/// CPU compositor - simple alpha blending on CPU.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuCompositor;

impl CpuCompositor {
    /// Blend `top` over `bottom` in place (RGBA rows of equal length)
    fn blend_u8(bottom: &mut [u8], top: &[u8], opacity: f32) {
        debug_assert_eq!(bottom.len(), top.len());

        for (b, t) in bottom.chunks_exact_mut(4).zip(top.chunks_exact(4)) {
            let top_alpha = t[3] as f32 / 255.0 * opacity;
            if top_alpha <= 0.0 {
                continue;
            }
            let bottom_alpha = b[3] as f32 / 255.0;
            let inv_alpha = 1.0 - top_alpha;
            let out_alpha = top_alpha + bottom_alpha * inv_alpha;

            for c in 0..3 {
                let value = (t[c] as f32 * top_alpha + b[c] as f32 * bottom_alpha * inv_alpha) / out_alpha;
                b[c] = value.round().clamp(0.0, 255.0) as u8;
            }
            b[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }

    /// Blend `layer` onto `canvas` with its top-left corner at `(x, y)`.
    ///
    /// Parts of the layer outside the canvas are clipped.
    pub fn overlay(canvas: &mut RgbaImage, layer: &RgbaImage, x: u32, y: u32, opacity: f32) {
        let (canvas_w, canvas_h) = canvas.dimensions();
        let (layer_w, layer_h) = layer.dimensions();
        if x >= canvas_w || y >= canvas_h || opacity <= 0.0 {
            return;
        }

        let overlap_w = layer_w.min(canvas_w - x) as usize;
        let overlap_h = layer_h.min(canvas_h - y) as usize;
        if overlap_w == 0 || overlap_h == 0 {
            return;
        }

        let opacity = opacity.min(1.0);
        let canvas_stride = canvas_w as usize * 4;
        let layer_stride = layer_w as usize * 4;
        let base: &mut [u8] = &mut **canvas;
        let top: &[u8] = layer.as_raw();

        for row in 0..overlap_h {
            let b_off = (y as usize + row) * canvas_stride + x as usize * 4;
            let l_off = row * layer_stride;
            Self::blend_u8(
                &mut base[b_off..b_off + overlap_w * 4],
                &top[l_off..l_off + overlap_w * 4],
                opacity,
            );
        }
    }
}
