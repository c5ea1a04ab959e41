//! JSON texture atlas next to the sheet.
//!
//! Layout follows the "JSON hash" format read by Phaser 3 and most engines
//! that consume TexturePacker output: one entry per frame keyed by the frame
//! file name, in placement order.

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use super::error::ExportError;
use super::placement::Placement;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AtlasSize {
    pub w: u32,
    pub h: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AtlasFrame {
    pub frame: AtlasRect,
    pub rotated: bool,
    pub trimmed: bool,
    pub sprite_source_size: AtlasRect,
    pub source_size: AtlasSize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AtlasMeta {
    pub app: String,
    pub version: String,
    pub image: String,
    pub format: String,
    pub size: AtlasSize,
    pub scale: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextureAtlas {
    pub frames: IndexMap<String, AtlasFrame>,
    pub meta: AtlasMeta,
}

impl TextureAtlas {
    pub fn new(image: String, sheet_width: u32, sheet_height: u32) -> Self {
        Self {
            frames: IndexMap::new(),
            meta: AtlasMeta {
                app: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                image,
                format: "RGBA8888".to_string(),
                size: AtlasSize { w: sheet_width, h: sheet_height },
                scale: "1".to_string(),
            },
        }
    }

    /// Add a frame placed at `at`; frames are never trimmed or rotated.
    pub fn push(&mut self, name: String, at: Placement, width: u32, height: u32) {
        self.frames.insert(
            name,
            AtlasFrame {
                frame: AtlasRect { x: at.x, y: at.y, w: width, h: height },
                rotated: false,
                trimmed: false,
                sprite_source_size: AtlasRect { x: 0, y: 0, w: width, h: height },
                source_size: AtlasSize { w: width, h: height },
            },
        );
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write(&self, path: &Path) -> Result<(), ExportError> {
        let json = self
            .to_json()
            .map_err(|e| ExportError::io(path, std::io::Error::other(e)))?;
        std::fs::write(path, json).map_err(|e| ExportError::io(path, e))
    }
}
