//! One imported `.glb` as an owned, disposable session.
//!
//! A [`Scene`] owns the glTF JSON document and its binary chunk. Nothing is
//! shared between scenes, so processing one file can never touch materials
//! imported from another.
//!
//! The document is kept as untyped JSON: export only patches `images`,
//! `bufferViews` and `buffers`, and every extension or extra is written back
//! as it was read.

use std::{borrow::Cow, collections::BTreeMap, fmt, fs, path::Path};

use serde_json::Value;

use crate::error::PipelineError;

/// A texture bound to a material, resolved down to its image.
///
/// `slot` is the JSON path of the texture info inside the material, such as
/// `pbrMetallicRoughness.baseColorTexture` or
/// `extensions.KHR_materials_clearcoat.clearcoatTexture`.
/// `image` is `None` when the texture or its source points nowhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBinding {
    pub material: usize,
    pub material_name: Option<String>,
    pub slot: String,
    pub texture: usize,
    pub image: Option<usize>,
}

pub struct Scene {
    json: Value,
    blob: Vec<u8>,
    // buffer view index -> new bytes
    replacements: BTreeMap<usize, Vec<u8>>,
}

impl Scene {
    /// Import a `.glb` from disk.
    pub fn import(path: &Path) -> Result<Self, PipelineError> {
        let data = fs::read(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_slice(&data).map_err(|source| PipelineError::Import {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, gltf::Error> {
        // full parse for validation, the raw chunk for the document itself
        let gltf::Gltf { blob, .. } = gltf::Gltf::from_slice(data)?;
        let glb = gltf::binary::Glb::from_slice(data)?;
        let json: Value = serde_json::from_slice(&glb.json).map_err(gltf::Error::Deserialize)?;

        Ok(Self {
            json,
            blob: blob.unwrap_or_default(),
            replacements: BTreeMap::new(),
        })
    }

    pub fn as_json(&self) -> &Value {
        &self.json
    }

    fn array(&self, key: &str) -> &[Value] {
        self.json
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every texture bound to a material of this scene, in material order.
    ///
    /// Any object under a material whose key ends in `Texture` and which
    /// carries an `index` counts, so extension slots are found too.
    pub fn image_bindings(&self) -> Vec<ImageBinding> {
        let textures = self.array("textures");
        let image_count = self.array("images").len();
        let mut bindings = Vec::new();

        for (idx_mat, mat) in self.array("materials").iter().enumerate() {
            let mut refs = Vec::new();
            collect_texture_refs(mat, "", &mut refs);

            for (slot, texture) in refs {
                let image = textures
                    .get(texture)
                    .and_then(|tex| tex.get("source"))
                    .and_then(as_index)
                    .filter(|idx| *idx < image_count);

                bindings.push(ImageBinding {
                    material: idx_mat,
                    material_name: mat.get("name").and_then(Value::as_str).map(str::to_string),
                    slot,
                    texture,
                    image,
                });
            }
        }

        bindings
    }

    pub fn mime_type(&self, image: usize) -> Option<&str> {
        self.array("images").get(image)?.get("mimeType")?.as_str()
    }

    /// Encoded bytes of an image stored in the binary chunk.
    ///
    /// Returns `None` for images referenced by URI or with a broken view.
    pub fn image_data(&self, image: usize) -> Option<&[u8]> {
        let idx_view = self.image_view(image)?;
        self.view_data(idx_view)
    }

    /// Width and height read from the encoded image header.
    pub fn image_dimensions(&self, image: usize) -> Option<(u32, u32)> {
        let data = self.image_data(image)?;
        let size = imagesize::blob_size(data).ok()?;
        Some((size.width as u32, size.height as u32))
    }

    /// Replace an image's encoded bytes; applied to the binary chunk on export.
    pub fn replace_image(&mut self, image: usize, data: Vec<u8>, mime_type: &str) -> bool {
        let Some(idx_view) = self.image_view(image) else {
            return false;
        };
        let Some(img) = self
            .json
            .get_mut("images")
            .and_then(|images| images.get_mut(image))
            .and_then(Value::as_object_mut)
        else {
            return false;
        };

        img.insert("mimeType".to_string(), Value::from(mime_type));
        self.replacements.insert(idx_view, data);
        true
    }

    /// Serialize the scene back to a `.glb` file.
    pub fn export(&mut self, path: &Path) -> Result<(), PipelineError> {
        let glb = self.to_glb().map_err(|message| PipelineError::Export {
            path: path.to_path_buf(),
            message,
        })?;
        fs::write(path, glb).map_err(|e| PipelineError::io(path, e))
    }

    pub fn to_glb(&mut self) -> Result<Vec<u8>, String> {
        self.repack()?;

        let json_bytes = serde_json::to_vec(&self.json).map_err(|e| e.to_string())?;
        let bin = self.blob_buffer().map(|_| Cow::Borrowed(self.blob.as_slice()));

        let glb = gltf::binary::Glb {
            header: gltf::binary::Header {
                magic: *b"glTF",
                version: 2,
                length: (json_bytes.len() + self.blob.len()) as u32,
            },
            json: Cow::Owned(json_bytes),
            bin,
        };

        let mut result: Vec<u8> = Vec::new();
        glb.to_writer(&mut result).map_err(|e| e.to_string())?;

        Ok(result)
    }

    fn image_view(&self, image: usize) -> Option<usize> {
        self.array("images").get(image)?.get("bufferView").and_then(as_index)
    }

    fn blob_buffer(&self) -> Option<usize> {
        self.array("buffers")
            .first()
            .filter(|buffer| buffer.get("uri").is_none())
            .map(|_| 0)
    }

    fn view_data(&self, idx_view: usize) -> Option<&[u8]> {
        let view = self.array("bufferViews").get(idx_view)?;
        if view.get("buffer").and_then(as_index) != self.blob_buffer() {
            return None;
        }

        if let Some(data) = self.replacements.get(&idx_view) {
            return Some(data.as_slice());
        }

        self.blob.get(view_range(view)?)
    }

    /// Rebuild the binary chunk view by view so replaced images can change size.
    fn repack(&mut self) -> Result<(), String> {
        let Some(idx_buffer) = self.blob_buffer() else {
            return Ok(());
        };
        if self.replacements.is_empty() {
            return Ok(());
        }

        let mut n_blob: Vec<u8> = Vec::with_capacity(self.blob.len());

        let views = self
            .json
            .get_mut("bufferViews")
            .and_then(Value::as_array_mut)
            .ok_or("document has no buffer views")?;

        for (idx_view, view) in views.iter_mut().enumerate() {
            if view.get("buffer").and_then(as_index) != Some(idx_buffer) {
                continue;
            }

            let data: &[u8] = match self.replacements.get(&idx_view) {
                Some(data) => data,
                None => view_range(view)
                    .and_then(|range| self.blob.get(range))
                    .ok_or_else(|| format!("buffer view {idx_view} lies outside the binary chunk"))?,
            };

            pad_to_4bytes(&mut n_blob);
            let offset = n_blob.len();
            n_blob.extend_from_slice(data);

            let Some(view) = view.as_object_mut() else {
                return Err(format!("buffer view {idx_view} is not an object"));
            };
            if offset == 0 {
                view.remove("byteOffset");
            } else {
                view.insert("byteOffset".to_string(), Value::from(offset));
            }
            view.insert("byteLength".to_string(), Value::from(data.len()));
        }

        pad_to_4bytes(&mut n_blob);

        if let Some(buffer) = self
            .json
            .get_mut("buffers")
            .and_then(|buffers| buffers.get_mut(idx_buffer))
            .and_then(Value::as_object_mut)
        {
            buffer.insert("byteLength".to_string(), Value::from(n_blob.len()));
        }
        self.blob = n_blob;
        self.replacements.clear();

        Ok(())
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("materials", &self.array("materials").len())
            .field("images", &self.array("images").len())
            .field("blob_len", &self.blob.len())
            .field("pending_replacements", &self.replacements.len())
            .finish()
    }
}

fn as_index(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|v| usize::try_from(v).ok())
}

/// Byte range of a buffer view, `None` if it does not fit in `usize`.
fn view_range(view: &Value) -> Option<std::ops::Range<usize>> {
    let offset = match view.get("byteOffset") {
        Some(o) => as_index(o)?,
        None => 0,
    };
    let length = as_index(view.get("byteLength")?)?;
    Some(offset..offset.checked_add(length)?)
}

fn collect_texture_refs(value: &Value, path: &str, out: &mut Vec<(String, usize)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "extras" {
                    continue;
                }
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };

                if key.ends_with("Texture")
                    && let Some(index) = child.get("index").and_then(as_index)
                {
                    out.push((child_path.clone(), index));
                }
                collect_texture_refs(child, &child_path, out);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_texture_refs(item, &format!("{path}[{i}]"), out);
            }
        }
        _ => {}
    }
}

fn pad_to_4bytes(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}
