//! Decode/encode collaborator.
//!
//! The [`ImageCodec`] trait is the seam between the pipeline and the byte-level
//! image engine: `decode(bytes) -> DecodedImage` and `encode(DecodedImage) ->
//! bytes`. The production implementation is [`RustCodec`] over the `image`
//! crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Format sniffing | `ImageReader::with_guessed_format` |
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image` crate decoders |
//! | EXIF orientation | `ImageDecoder::orientation` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG / WebP (lossless) / TIFF | `PngEncoder`, `WebPEncoder`, `TiffEncoder` |
//! | ICC tag on output | `ImageEncoder::set_icc_profile` |

use super::params::Quality;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageEncoder, ImageError, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::Cursor;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognized or unsupported image format")]
    UnknownFormat,
    #[error("failed to decode {format:?} image: {source}")]
    Malformed {
        format: ImageFormat,
        #[source]
        source: ImageError,
    },
    #[error("unreadable embedded ICC profile: {0}")]
    Profile(String),
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("no encoder available for {0:?}")]
    Unsupported(ImageFormat),
    #[error("failed to encode {format:?}: {source}")]
    Failed {
        format: ImageFormat,
        #[source]
        source: ImageError,
    },
}

/// The working image handed from stage to stage.
///
/// Owns the decoded pixels together with the container format they came from
/// and the EXIF orientation found at decode time.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixels: DynamicImage,
    pub format: ImageFormat,
    pub orientation: Orientation,
}

impl DecodedImage {
    pub fn new(pixels: DynamicImage, format: ImageFormat) -> Self {
        Self {
            pixels,
            format,
            orientation: Orientation::NoTransforms,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Replace the pixels, keeping format and orientation.
    pub fn map(self, f: impl FnOnce(DynamicImage) -> DynamicImage) -> Self {
        Self {
            pixels: f(self.pixels),
            ..self
        }
    }
}

/// Output container selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Same container as the input.
    #[default]
    Auto,
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Webp,
    #[serde(alias = "tif")]
    Tiff,
    Gif,
    Bmp,
}

impl OutputFormat {
    /// Parse the short names accepted in config and in the `fm` parameter.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "jpg" | "jpeg" | "pjpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "tif" | "tiff" => Some(Self::Tiff),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Concrete container for an image that was decoded from `source`.
    pub fn resolve(self, source: ImageFormat) -> ImageFormat {
        match self {
            Self::Auto => source,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Webp => ImageFormat::WebP,
            Self::Tiff => ImageFormat::Tiff,
            Self::Gif => ImageFormat::Gif,
            Self::Bmp => ImageFormat::Bmp,
        }
    }
}

/// How to encode one image.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions<'a> {
    pub format: ImageFormat,
    pub quality: Quality,
    /// ICC profile to embed, when the container supports it.
    pub icc_profile: Option<&'a [u8]>,
}

/// Decode/encode collaborator used by the pipeline.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError>;

    fn encode(
        &self,
        image: &DecodedImage,
        options: &EncodeOptions<'_>,
    ) -> Result<Vec<u8>, EncodeError>;
}

/// Pure Rust codec using the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for RustCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
        let (format, mut decoder) = open_decoder(bytes)?;
        let orientation = decoder
            .orientation()
            .unwrap_or(Orientation::NoTransforms);
        let pixels = DynamicImage::from_decoder(decoder)
            .map_err(|source| DecodeError::Malformed { format, source })?;
        Ok(DecodedImage {
            pixels,
            format,
            orientation,
        })
    }

    fn encode(
        &self,
        image: &DecodedImage,
        options: &EncodeOptions<'_>,
    ) -> Result<Vec<u8>, EncodeError> {
        encode_pixels(&image.pixels, options)
    }
}

/// Formats whose decoders are compiled in, with their file extensions.
const INPUT_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    INPUT_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Preferred file extension for an output container.
pub fn extension_for(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}

/// Sniff the container and open a decoder over in-memory bytes.
pub(crate) fn open_decoder(
    bytes: &[u8],
) -> Result<(ImageFormat, impl ImageDecoder + '_), DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader
        .format()
        .filter(|f| f.reading_enabled())
        .ok_or(DecodeError::UnknownFormat)?;
    let decoder = reader
        .into_decoder()
        .map_err(|source| DecodeError::Malformed { format, source })?;
    Ok((format, decoder))
}

/// Encode pixels into `options.format`, converting the pixel layout to one the
/// target encoder accepts.
pub(crate) fn encode_pixels(
    img: &DynamicImage,
    options: &EncodeOptions<'_>,
) -> Result<Vec<u8>, EncodeError> {
    let format = options.format;
    let mut buf = Vec::new();
    let failed = |source| EncodeError::Failed { format, source };

    match format {
        ImageFormat::Jpeg => {
            let pixels = jpeg_compatible(img);
            let mut encoder =
                JpegEncoder::new_with_quality(&mut buf, options.quality.value() as u8);
            attach_icc(&mut encoder, options.icc_profile, format);
            pixels.write_with_encoder(encoder).map_err(failed)?;
        }
        ImageFormat::Png => {
            let pixels = sixteen_bit_max(img);
            let mut encoder = PngEncoder::new(&mut buf);
            attach_icc(&mut encoder, options.icc_profile, format);
            pixels.write_with_encoder(encoder).map_err(failed)?;
        }
        ImageFormat::WebP => {
            let pixels = eight_bit_rgb(img);
            let mut encoder = WebPEncoder::new_lossless(&mut buf);
            attach_icc(&mut encoder, options.icc_profile, format);
            pixels.write_with_encoder(encoder).map_err(failed)?;
        }
        ImageFormat::Tiff => {
            let pixels = sixteen_bit_max(img);
            let mut encoder = TiffEncoder::new(Cursor::new(&mut buf));
            attach_icc(&mut encoder, options.icc_profile, format);
            pixels.write_with_encoder(encoder).map_err(failed)?;
        }
        ImageFormat::Gif | ImageFormat::Bmp => {
            let pixels = DynamicImage::ImageRgba8(img.to_rgba8());
            pixels
                .write_to(&mut Cursor::new(&mut buf), format)
                .map_err(failed)?;
        }
        other => return Err(EncodeError::Unsupported(other)),
    }

    Ok(buf)
}

fn attach_icc(encoder: &mut impl ImageEncoder, icc: Option<&[u8]>, format: ImageFormat) {
    if let Some(icc) = icc {
        if let Err(e) = encoder.set_icc_profile(icc.to_vec()) {
            tracing::debug!(?format, error = %e, "encoder cannot embed ICC profile");
        }
    }
}

/// JPEG takes 8-bit gray or RGB only.
fn jpeg_compatible(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => Cow::Borrowed(img),
        _ if !img.color().has_color() => Cow::Owned(DynamicImage::ImageLuma8(img.to_luma8())),
        _ => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
    }
}

/// PNG and TIFF take up to 16 bits per channel; float buffers are narrowed.
fn sixteen_bit_max(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img {
        DynamicImage::ImageRgb32F(_) => Cow::Owned(DynamicImage::ImageRgb16(img.to_rgb16())),
        DynamicImage::ImageRgba32F(_) => Cow::Owned(DynamicImage::ImageRgba16(img.to_rgba16())),
        _ => Cow::Borrowed(img),
    }
}

/// Lossless WebP takes 8-bit RGB(A).
fn eight_bit_rgb(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => Cow::Borrowed(img),
        _ if img.color().has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
        _ => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
    }
}
