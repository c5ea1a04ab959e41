//! RGBA8 sheet canvas backed by the `image` crate.

use std::path::Path;

use image::{ImageFormat, RgbaImage};
use indexmap::IndexMap;
use log::{debug, trace};
use uuid::Uuid;

use super::{Canvas, DocumentInfo, HostError};
use crate::entities::compositor::CpuCompositor;

/// Load any supported image file as straight-alpha RGBA8.
pub(crate) fn load_rgba(path: &Path) -> Result<RgbaImage, HostError> {
    let img = image::open(path).map_err(|e| HostError::Image {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(img.to_rgba8())
}

/// Write an RGBA8 buffer as PNG.
pub(crate) fn save_png(image: &RgbaImage, path: &Path) -> Result<(), HostError> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| HostError::Image {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Byte length of a `width` x `height` RGBA8 buffer, if addressable.
fn rgba_buffer_len(width: u32, height: u32) -> Option<usize> {
    let len = (width as u64).checked_mul(height as u64)?.checked_mul(4)?;
    usize::try_from(len).ok().filter(|&len| len <= isize::MAX as usize)
}

#[derive(Debug)]
struct CanvasLayer {
    image: RgbaImage,
    x: u32,
    y: u32,
}

/// Transparent canvas with a stack of floating image layers.
///
/// Floating layers live above the base until merged down; export writes the
/// base only.
#[derive(Debug)]
pub struct ImageCanvas {
    name: String,
    info: DocumentInfo,
    base: RgbaImage,
    layers: IndexMap<Uuid, CanvasLayer>,
}

impl ImageCanvas {
    /// Fails with [`HostError::CanvasTooLarge`] when the RGBA8 buffer cannot
    /// be allocated.
    pub fn new(width: u32, height: u32, name: &str, info: &DocumentInfo) -> Result<Self, HostError> {
        if rgba_buffer_len(width, height).is_none() {
            return Err(HostError::CanvasTooLarge { width, height });
        }
        debug!(
            "Canvas '{}' {}x{} ({} {}, {} dpi)",
            name, width, height, info.color_model, info.color_depth, info.resolution
        );
        Ok(Self {
            name: name.to_string(),
            info: info.clone(),
            base: RgbaImage::new(width, height),
            layers: IndexMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    /// Composed pixels (merged layers only).
    pub fn image(&self) -> &RgbaImage {
        &self.base
    }

    /// Floating layers not yet merged.
    pub fn floating_layers(&self) -> usize {
        self.layers.len()
    }
}

impl Canvas for ImageCanvas {
    fn insert_image_layer(&mut self, path: &Path) -> Result<Uuid, HostError> {
        let image = load_rgba(path)?;
        let handle = Uuid::new_v4();
        trace!("Canvas '{}': layer {} from {}", self.name, handle, path.display());
        self.layers.insert(handle, CanvasLayer { image, x: 0, y: 0 });
        Ok(handle)
    }

    fn move_layer(&mut self, layer: Uuid, x: u32, y: u32) -> Result<(), HostError> {
        let entry = self.layers.get_mut(&layer).ok_or(HostError::UnknownHandle(layer))?;
        entry.x = x;
        entry.y = y;
        Ok(())
    }

    fn merge_down(&mut self, layer: Uuid) -> Result<(), HostError> {
        let entry = self
            .layers
            .shift_remove(&layer)
            .ok_or(HostError::UnknownHandle(layer))?;
        CpuCompositor::overlay(&mut self.base, &entry.image, entry.x, entry.y, 1.0);
        Ok(())
    }

    fn export(&mut self, path: &Path) -> Result<(), HostError> {
        if !self.layers.is_empty() {
            debug!(
                "Canvas '{}': {} unmerged layer(s) left out of export",
                self.name,
                self.layers.len()
            );
        }
        save_png(&self.base, path)
    }
}
