//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! The `size` manipulator combines them to turn `w`/`h`/`fit` parameters into
//! concrete resize and crop rectangles.

/// Fill in a missing target edge from the source aspect ratio.
///
/// Returns `None` when neither edge was requested.
///
/// # Examples
/// ```
/// # use glidekit::imaging::calculations::resolve_target_dimensions;
/// // Width only: height follows the 4:3 source
/// assert_eq!(resolve_target_dimensions((800, 600), Some(400), None), Some((400, 300)));
/// ```
pub fn resolve_target_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    match (width, height) {
        (Some(w), Some(h)) => Some((w, h)),
        (Some(w), None) => {
            let h = (w as f64 * src_h as f64 / src_w as f64).round() as u32;
            Some((w, h.max(1)))
        }
        (None, Some(h)) => {
            let w = (h as f64 * src_w as f64 / src_h as f64).round() as u32;
            Some((w.max(1), h))
        }
        (None, None) => None,
    }
}

/// Calculate the largest dimensions that fit inside a target box while
/// keeping the source aspect ratio. One edge matches the box exactly.
pub fn calculate_contain_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let scale = (tgt_w as f64 / src_w as f64).min(tgt_h as f64 / src_h as f64);
    let w = (src_w as f64 * scale).round() as u32;
    let h = (src_h as f64 * scale).round() as u32;
    (w.clamp(1, tgt_w.max(1)), h.clamp(1, tgt_h.max(1)))
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Fill dimensions (at least one matches target)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = (h as f64 * src_aspect).round() as u32;
        (w.max(tgt_w), h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = (w as f64 / src_aspect).round() as u32;
        (w, h.max(tgt_h))
    }
}

/// Top-left offset that centers a `target` rectangle inside `outer`.
pub fn center_offset(outer: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    (
        outer.0.saturating_sub(target.0) / 2,
        outer.1.saturating_sub(target.1) / 2,
    )
}

/// Scale requested dimensions by a device pixel ratio.
pub fn apply_device_pixel_ratio(dims: (u32, u32), dpr: f64) -> (u32, u32) {
    (
        ((dims.0 as f64 * dpr).round() as u32).max(1),
        ((dims.1 as f64 * dpr).round() as u32).max(1),
    )
}

/// Shrink `dims` proportionally until their area is at most `max_pixels`.
pub fn limit_area(dims: (u32, u32), max_pixels: u64) -> (u32, u32) {
    let area = dims.0 as u64 * dims.1 as u64;
    if area <= max_pixels || area == 0 {
        return dims;
    }
    let scale = (max_pixels as f64 / area as f64).sqrt();
    (
        ((dims.0 as f64 * scale).floor() as u32).max(1),
        ((dims.1 as f64 * scale).floor() as u32).max(1),
    )
}
