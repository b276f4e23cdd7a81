//! Container header sniffing for the declared color space.
//!
//! The `image` crate hands back RGB pixels for CMYK and YCCK JPEGs, so the
//! declared space has to be read from the container itself:
//!
//! - JPEG: component count of the first SOFn frame header, refined by the
//!   Adobe APP14 transform flag (`0` = no transform, `2` = YCCK).
//! - PNG: IHDR color type (`0`/`4` are grayscale).
//!
//! Anything else returns `None` and the caller falls back to what the decoder
//! reports.

use super::ColorSpace;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const ADOBE_HEADER: &[u8] = b"Adobe";

/// Declared color space from the container header, if this container is one
/// we can read directly.
pub fn declared_color_space(data: &[u8]) -> Option<ColorSpace> {
    if data.starts_with(&[0xFF, 0xD8]) {
        return jpeg_color_space(data);
    }
    if data.starts_with(PNG_SIGNATURE) {
        return png_color_space(data);
    }
    None
}

// ---------------------------------------------------------------------------
// JPEG: SOFn component count + Adobe APP14
// ---------------------------------------------------------------------------

fn jpeg_color_space(data: &[u8]) -> Option<ColorSpace> {
    let mut components = None;
    let mut adobe_transform = None;

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        // Fill bytes and markers without a length field
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0x01 || marker == 0xD8 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        // SOS (0xDA) means entropy-coded data starts; headers are done
        if marker == 0xDA || marker == 0xD9 {
            break;
        }

        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if seg_len < 2 {
            break;
        }
        let seg_start = pos + 4;
        let seg_end = (pos + 2 + seg_len).min(data.len());
        let segment = &data[seg_start.min(seg_end)..seg_end];

        match marker {
            // SOF0..SOF15 except DHT (C4), JPG (C8) and DAC (CC)
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                // precision(1) height(2) width(2) components(1)
                if components.is_none() {
                    components = segment.get(5).copied();
                }
            }
            // APP14: "Adobe" version(2) flags0(2) flags1(2) transform(1)
            0xEE if segment.starts_with(ADOBE_HEADER) => {
                adobe_transform = segment.get(11).copied();
            }
            _ => {}
        }

        pos += 2 + seg_len;
    }

    match components? {
        1 => Some(ColorSpace::Gray),
        3 => Some(ColorSpace::Srgb),
        4 if adobe_transform == Some(2) => Some(ColorSpace::Ycck),
        4 => Some(ColorSpace::Cmyk),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// PNG: IHDR color type
// ---------------------------------------------------------------------------

fn png_color_space(data: &[u8]) -> Option<ColorSpace> {
    // signature(8) length(4) "IHDR"(4) width(4) height(4) depth(1) color_type(1)
    let ihdr = data.get(8..)?;
    if ihdr.get(4..8)? != b"IHDR" {
        return None;
    }
    match *ihdr.get(17)? {
        0 | 4 => Some(ColorSpace::Gray),
        2 | 3 | 6 => Some(ColorSpace::Srgb),
        _ => None,
    }
}
