use std::{collections::BTreeSet, fmt, io::Write};

use image::{
    ExtendedColorType, ImageEncoder, ImageFormat,
    codecs::{jpeg::JpegEncoder, png::PngEncoder, webp::WebPEncoder},
};
use serde::Deserialize;

use crate::{error::PipelineError, scene::Scene};

pub const DEFAULT_TEXTURE_SIZE: u32 = 128;

/// Largest accepted edge; larger targets would upscale into huge buffers.
pub const MAX_TEXTURE_SIZE: u32 = 8192;

const JPEG_QUALITY: u8 = 90;

/// Target resolution for every material-bound image.
///
/// Deserializes from either a single number (square) or `[width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "SizeRepr")]
pub struct TextureSize {
    pub width: u32,
    pub height: u32,
}

impl TextureSize {
    pub const fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Both edges must lie in `1..=MAX_TEXTURE_SIZE`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.is_empty() || self.width > MAX_TEXTURE_SIZE || self.height > MAX_TEXTURE_SIZE {
            return Err(PipelineError::InvalidConfig(format!(
                "texture size must be between 1x1 and {MAX_TEXTURE_SIZE}x{MAX_TEXTURE_SIZE}, got {self}"
            )));
        }
        Ok(())
    }
}

impl Default for TextureSize {
    fn default() -> Self {
        Self::square(DEFAULT_TEXTURE_SIZE)
    }
}

impl fmt::Display for TextureSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeRepr {
    Square(u32),
    Pair([u32; 2]),
}

impl From<SizeRepr> for TextureSize {
    fn from(repr: SizeRepr) -> Self {
        match repr {
            SizeRepr::Square(size) => TextureSize::square(size),
            SizeRepr::Pair([width, height]) => TextureSize { width, height },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("image has no pixels")]
    EmptyImage,

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Buffer(#[from] fast_image_resize::ImageBufferError),

    #[error(transparent)]
    Resize(#[from] fast_image_resize::ResizeError),
}

/// Encodings the resizer can decode and write back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCodec {
    Png,
    Jpeg,
    WebP,
}

impl ImageCodec {
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/png" => Some(ImageCodec::Png),
            "image/jpeg" => Some(ImageCodec::Jpeg),
            "image/webp" => Some(ImageCodec::WebP),
            _ => None,
        }
    }

    /// Sniff the codec from the encoded bytes.
    pub fn guess(data: &[u8]) -> Option<Self> {
        match image::guess_format(data).ok()? {
            ImageFormat::Png => Some(ImageCodec::Png),
            ImageFormat::Jpeg => Some(ImageCodec::Jpeg),
            ImageFormat::WebP => Some(ImageCodec::WebP),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageCodec::Png => "image/png",
            ImageCodec::Jpeg => "image/jpeg",
            ImageCodec::WebP => "image/webp",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownsampleReport {
    pub resized: usize,
    pub skipped: usize,
}

/// Resize every image bound to a material of `scene` to exactly `size`.
///
/// Each image is resized once even when several slots share it. Images that
/// cannot be reached (dangling references, external URIs, unsupported
/// encodings) are skipped with a warning.
pub fn downsample_scene(
    scene: &mut Scene,
    size: TextureSize,
) -> Result<DownsampleReport, PipelineError> {
    let mut report = DownsampleReport::default();
    let mut images = BTreeSet::new();

    for binding in scene.image_bindings() {
        match binding.image {
            Some(image) => {
                images.insert(image);
            }
            None => {
                tracing::warn!(
                    "material {} {} texture {} has no image, skipping",
                    binding.material,
                    binding.slot,
                    binding.texture
                );
                report.skipped += 1;
            }
        }
    }

    for image in images {
        let Some(data) = scene.image_data(image) else {
            tracing::warn!("image {image} is not stored in the binary chunk, skipping");
            report.skipped += 1;
            continue;
        };

        let codec = scene
            .mime_type(image)
            .and_then(ImageCodec::from_mime_type)
            .or_else(|| ImageCodec::guess(data));
        let Some(codec) = codec else {
            tracing::warn!(
                "image {image} has unsupported type {:?}, skipping",
                scene.mime_type(image)
            );
            report.skipped += 1;
            continue;
        };

        match imagesize::blob_size(data) {
            Ok(original) => tracing::debug!(
                "resizing image {image} {}x{} -> {size}",
                original.width,
                original.height
            ),
            Err(_) => tracing::debug!("resizing image {image} -> {size}"),
        }

        let mut resized: Vec<u8> = Vec::new();
        resize_image(data, codec, size, &mut resized)
            .map_err(|source| PipelineError::Texture { image, source })?;

        scene.replace_image(image, resized, codec.mime_type());
        report.resized += 1;
    }

    Ok(report)
}

/// Decode, resize to exactly `size` and re-encode with the same codec.
pub fn resize_image<W: Write>(
    img_data: &[u8],
    codec: ImageCodec,
    size: TextureSize,
    mut buf: W,
) -> Result<(), TextureError> {
    if size.is_empty() {
        return Err(TextureError::EmptyImage);
    }

    let img = image::load_from_memory(img_data)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(TextureError::EmptyImage);
    }

    // JPEG has no alpha channel
    let (pixels, pixel_type, color) = match codec {
        ImageCodec::Jpeg => (
            img.to_rgb8().into_raw(),
            fast_image_resize::PixelType::U8x3,
            ExtendedColorType::Rgb8,
        ),
        ImageCodec::Png | ImageCodec::WebP => (
            img.to_rgba8().into_raw(),
            fast_image_resize::PixelType::U8x4,
            ExtendedColorType::Rgba8,
        ),
    };

    let src_img =
        fast_image_resize::images::Image::from_vec_u8(img.width(), img.height(), pixels, pixel_type)?;

    let mut dst_img = fast_image_resize::images::Image::new(size.width, size.height, pixel_type);

    let mut resizer = fast_image_resize::Resizer::new();
    resizer.resize(&src_img, &mut dst_img, None)?;

    match codec {
        ImageCodec::Png => PngEncoder::new(&mut buf).write_image(
            dst_img.buffer(),
            size.width,
            size.height,
            color,
        )?,
        ImageCodec::Jpeg => JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).write_image(
            dst_img.buffer(),
            size.width,
            size.height,
            color,
        )?,
        ImageCodec::WebP => WebPEncoder::new_lossless(&mut buf).write_image(
            dst_img.buffer(),
            size.width,
            size.height,
            color,
        )?,
    }

    Ok(())
}
