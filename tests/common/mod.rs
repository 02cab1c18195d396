//! Shared helpers: textured GLB fixtures and output checks.

#![allow(dead_code)]

use std::path::Path;

use glb_shrink::test_support::{GlbBuilder, png_bytes};
use serde_json::json;

/// GLB with a 36-byte geometry view, a base color and a normal texture.
pub fn textured_glb(base_color: (u32, u32), normal: (u32, u32)) -> Vec<u8> {
    GlbBuilder::new()
        .raw_view((0u8..36).collect())
        .image("image/png", png_bytes(base_color.0, base_color.1))
        .image("image/png", png_bytes(normal.0, normal.1))
        .material(json!({
            "name": "Body",
            "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } },
            "normalTexture": { "index": 1 },
        }))
        .build()
}

/// Dimensions of every image stored in the binary chunk of a GLB on disk.
pub fn image_sizes(path: &Path) -> Vec<(u32, u32)> {
    let data = std::fs::read(path).expect("Failed to read output");
    let gltf = gltf::Gltf::from_slice(&data).expect("Output is not a valid GLB");
    let blob = gltf.blob.clone().expect("Output has no binary chunk");

    gltf.images()
        .map(|img| match img.source() {
            gltf::image::Source::View { view, .. } => {
                let bytes = &blob[view.offset()..view.offset() + view.length()];
                let decoded = image::load_from_memory(bytes).expect("Failed to decode image");
                (decoded.width(), decoded.height())
            }
            gltf::image::Source::Uri { .. } => panic!("unexpected external image"),
        })
        .collect()
}

/// Bytes of buffer view 0 (the geometry stand-in).
pub fn geometry_view(path: &Path) -> Vec<u8> {
    let data = std::fs::read(path).expect("Failed to read output");
    let gltf = gltf::Gltf::from_slice(&data).expect("Output is not a valid GLB");
    let blob = gltf.blob.clone().expect("Output has no binary chunk");
    let view = gltf.views().next().expect("Output has no buffer views");
    blob[view.offset()..view.offset() + view.length()].to_vec()
}

/// Executable script standing in for gltf-pipeline; `body` sees `-i <in> -o <out>` as `$1..$4`.
#[cfg(unix)]
pub fn fake_compressor(dir: &Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-gltf-pipeline");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
    path
}
