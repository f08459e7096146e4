//! Aspect-preserving downscale into a bounding box.

/// Fit `width`x`height` into a `max_width`x`max_height` box.
///
/// Sources strictly smaller than the box on both axes are returned unchanged.
/// Otherwise the width is constrained first; only when the implied height
/// still overflows is the height constrained instead. Scaling multiplies by a
/// floating-point ratio and truncates, so `fit_constraint(256, 640, 1920, 1080)`
/// is `(256, 144)`.
///
/// A zero width is returned unchanged; a zero height scales to zero.
pub fn fit_constraint(max_width: u32, max_height: u32, width: u32, height: u32) -> (u32, u32) {
    if width < max_width && height < max_height {
        return (width, height);
    }
    if width == 0 {
        return (width, height);
    }

    let scaled_height = (max_width as f64 / width as f64 * height as f64) as u32;
    if scaled_height > max_height {
        let scaled_width = (max_height as f64 / height as f64 * width as f64) as u32;
        return (scaled_width, max_height);
    }

    (max_width, scaled_height)
}
