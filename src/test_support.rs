//! Programmatic GLB fixtures, shared by unit and integration tests.
//!
//! Compiled for `cargo test` and behind the `test-support` feature.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use serde_json::{Value, json};

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode PNG");
    out.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 64]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .expect("Failed to encode JPEG");
    out.into_inner()
}

/// Builds a minimal `.glb` with raw buffer views, images, textures and materials.
#[derive(Default)]
pub struct GlbBuilder {
    blob: Vec<u8>,
    views: Vec<Value>,
    images: Vec<Value>,
    textures: Vec<Value>,
    materials: Vec<Value>,
}

impl GlbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_view(&mut self, data: &[u8]) -> usize {
        while self.blob.len() % 4 != 0 {
            self.blob.push(0);
        }
        let offset = self.blob.len();
        self.blob.extend_from_slice(data);
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": data.len(),
        }));
        self.views.len() - 1
    }

    pub fn raw_view(mut self, data: Vec<u8>) -> Self {
        self.push_view(&data);
        self
    }

    /// Adds an image plus a texture sampling it; both get the same index.
    pub fn image(mut self, mime_type: &str, data: Vec<u8>) -> Self {
        let view = self.push_view(&data);
        self.images.push(json!({ "bufferView": view, "mimeType": mime_type }));
        self.textures.push(json!({ "source": self.images.len() - 1 }));
        self
    }

    pub fn uri_image(mut self, uri: &str) -> Self {
        self.images.push(json!({ "uri": uri }));
        self.textures.push(json!({ "source": self.images.len() - 1 }));
        self
    }

    pub fn material(mut self, material: Value) -> Self {
        self.materials.push(material);
        self
    }

    pub fn material_with_base_color(mut self, texture: usize) -> Self {
        self.materials.push(json!({
            "name": format!("material_{}", self.materials.len()),
            "pbrMetallicRoughness": { "baseColorTexture": { "index": texture } },
        }));
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        if self.blob.is_empty() {
            self.blob.extend_from_slice(&[0; 4]);
        }
        while self.blob.len() % 4 != 0 {
            self.blob.push(0);
        }

        let root = json!({
            "asset": { "version": "2.0" },
            "buffers": [{ "byteLength": self.blob.len() }],
            "bufferViews": self.views,
            "images": self.images,
            "textures": self.textures,
            "materials": self.materials,
        });

        assemble_glb(&serde_json::to_vec(&root).expect("Failed to serialize JSON"), &self.blob)
    }
}

pub fn assemble_glb(json_bytes: &[u8], bin: &[u8]) -> Vec<u8> {
    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let json_chunk_length = json_bytes.len() + json_padding;
    let bin_padding = (4 - (bin.len() % 4)) % 4;
    let bin_chunk_length = bin.len() + bin_padding;
    let total_length = 12 + 8 + json_chunk_length + 8 + bin_chunk_length;

    let mut glb = Vec::with_capacity(total_length);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    glb.extend_from_slice(&(json_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F534Au32.to_le_bytes()); // "JSON"
    glb.extend_from_slice(json_bytes);
    glb.extend(std::iter::repeat_n(0x20u8, json_padding));

    glb.extend_from_slice(&(bin_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x004E4942u32.to_le_bytes()); // "BIN\0"
    glb.extend_from_slice(bin);
    glb.extend(std::iter::repeat_n(0u8, bin_padding));

    glb
}
