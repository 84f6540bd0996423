use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextureKeyError {
    #[error("texture key must not be empty")]
    Empty,
    #[error("texture key must not start with '/'")]
    LeadingSlash,
    #[error("texture key must not contain '\\\\'")]
    Backslash,
    #[error("texture key must not contain '..'")]
    ParentTraversal,
    #[error("texture key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Keys are lowercase relative paths without extension, e.g. `bubbles/fire`.
pub fn validate_texture_key(key: &str) -> Result<(), TextureKeyError> {
    if key.is_empty() {
        return Err(TextureKeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(TextureKeyError::LeadingSlash);
    }
    if key.contains('\\') {
        return Err(TextureKeyError::Backslash);
    }
    if key.contains("..") {
        return Err(TextureKeyError::ParentTraversal);
    }
    if let Some(character) = key
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '/' | '-')))
    {
        return Err(TextureKeyError::InvalidCharacter { character });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Texture {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba,
        }
    }
}

/// PNG textures under `<asset_root>/textures`, loaded on first use. Failed loads are
/// cached as misses and warned about once per key.
#[derive(Debug)]
pub struct TextureCache {
    root: PathBuf,
    textures: HashMap<String, Option<Texture>>,
    warned: HashSet<String>,
}

impl TextureCache {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            root: asset_root.into(),
            textures: HashMap::new(),
            warned: HashSet::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, texture: Texture) {
        self.textures.insert(key.into(), Some(texture));
    }

    pub fn get(&mut self, key: &str) -> Option<&Texture> {
        if !self.textures.contains_key(key) {
            let loaded = self.load(key);
            self.textures.insert(key.to_string(), loaded);
        }
        self.textures.get(key).and_then(Option::as_ref)
    }

    pub fn cached_len(&self) -> usize {
        self.textures.len()
    }

    fn load(&mut self, key: &str) -> Option<Texture> {
        let path = match resolve_texture_path(&self.root, key) {
            Ok(path) => path,
            Err(reason) => {
                self.warn_once(key, None, &reason);
                return None;
            }
        };
        match load_texture_rgba(&path) {
            Ok(texture) => Some(texture),
            Err(reason) => {
                self.warn_once(key, Some(&path), &reason);
                None
            }
        }
    }

    fn warn_once(&mut self, key: &str, path: Option<&Path>, reason: &str) {
        if !self.warned.insert(key.to_string()) {
            return;
        }
        let path_display = path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<unresolved>".to_string());
        warn!(
            texture_key = key,
            path = %path_display,
            reason = reason,
            "texture_load_failed_using_placeholder"
        );
    }
}

fn resolve_texture_path(asset_root: &Path, key: &str) -> Result<PathBuf, String> {
    validate_texture_key(key).map_err(|error| format!("invalid_key:{error}"))?;
    Ok(asset_root.join("textures").join(format!("{key}.png")))
}

fn load_texture_rgba(path: &Path) -> Result<Texture, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(Texture {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}
