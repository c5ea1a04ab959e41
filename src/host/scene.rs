//! File-based document: a layer stack of image files on a timeline.
//!
//! A scene is described by a JSON manifest:
//!
//! ```json
//! {
//!   "width": 64, "height": 64, "clip_end": 24,
//!   "layers": [
//!     { "name": "bg", "image": "bg.png" },
//!     { "name": "hero", "keyframes": { "0": "hero_0.png", "6": "hero_1.png" } },
//!     { "name": "fx", "visible": false, "children": [ { "name": "spark", "image": "spark.png" } ] }
//!   ]
//! }
//! ```
//!
//! Layers are listed bottom to top. Image paths are relative to the manifest's
//! directory. A keyframed layer shows the image of the latest keyframe at or
//! before the current time and nothing before its first keyframe.
//!
//! Rendering is deferred like on an interactive host: time and visibility
//! changes only mark the frame dirty, [`Document::wait_for_pending_render`]
//! composites it, and exporting a dirty frame is refused.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use image::RgbaImage;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::canvas::{ImageCanvas, load_rgba, save_png};
use super::{Document, DocumentInfo, HostError};
use crate::entities::compositor::CpuCompositor;
use crate::entities::layer::{LayerId, LayerNode};
use crate::utils::sequences::detect_sequence;

fn default_true() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

fn default_clip_end() -> i32 {
    100
}

fn default_color_model() -> String {
    "RGBA".to_string()
}

fn default_color_depth() -> String {
    "U8".to_string()
}

fn default_color_profile() -> String {
    "sRGB-elle-V2-srgbtrc.icc".to_string()
}

fn default_resolution() -> f64 {
    72.0
}

/// One layer of a scene manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Static content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    /// Time -> image; overrides `image` when non-empty
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keyframes: BTreeMap<i32, PathBuf>,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Non-empty makes this a group layer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LayerSpec>,
}

impl LayerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            image: None,
            keyframes: BTreeMap::new(),
            opacity: 1.0,
            children: Vec::new(),
        }
    }
}

/// Scene manifest (JSON).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneManifest {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_clip_end")]
    pub clip_end: i32,
    #[serde(default = "default_color_model")]
    pub color_model: String,
    #[serde(default = "default_color_depth")]
    pub color_depth: String,
    #[serde(default = "default_color_profile")]
    pub color_profile: String,
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
}

impl SceneManifest {
    pub fn from_file(path: &Path) -> Result<Self, HostError> {
        let text = std::fs::read_to_string(path).map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text)
            .map_err(|e| HostError::InvalidScene(format!("{}: {}", path.display(), e)))
    }
}

#[derive(Debug)]
struct SceneNode {
    name: String,
    visible: bool,
    opacity: f32,
    image: Option<PathBuf>,
    keyframes: BTreeMap<i32, PathBuf>,
    children: Vec<usize>,
}

impl SceneNode {
    /// Image shown at `time`, if any.
    fn image_at(&self, time: i32) -> Option<&Path> {
        if self.keyframes.is_empty() {
            return self.image.as_deref();
        }
        self.keyframes
            .range(..=time)
            .next_back()
            .map(|(_, path)| path.as_path())
    }
}

/// Document backed by image files.
///
/// Layer ids are indices in depth-first manifest order.
#[derive(Debug)]
pub struct SceneDocument {
    nodes: Vec<SceneNode>,
    roots: Vec<usize>,
    info: DocumentInfo,
    clip_end: i32,
    time: i32,
    pending: bool,
    rendered: Option<RgbaImage>,
    images: HashMap<PathBuf, RgbaImage>,
}

impl SceneDocument {
    /// Build from a manifest; relative image paths resolve against `base_dir`.
    pub fn new(manifest: SceneManifest, base_dir: &Path) -> Result<Self, HostError> {
        if manifest.width == 0 || manifest.height == 0 {
            return Err(HostError::InvalidScene(format!(
                "document size {}x{} is empty",
                manifest.width, manifest.height
            )));
        }

        let mut nodes = Vec::new();
        let roots = manifest
            .layers
            .iter()
            .map(|spec| flatten(spec, base_dir, &mut nodes))
            .collect();

        let info = DocumentInfo {
            width: manifest.width,
            height: manifest.height,
            color_model: manifest.color_model,
            color_depth: manifest.color_depth,
            color_profile: manifest.color_profile,
            resolution: manifest.resolution,
        };
        debug!(
            "Scene {}x{}, {} layer(s), clip end {}",
            info.width,
            info.height,
            nodes.len(),
            manifest.clip_end
        );

        Ok(Self {
            nodes,
            roots,
            info,
            clip_end: manifest.clip_end,
            time: 0,
            pending: true,
            rendered: None,
            images: HashMap::new(),
        })
    }

    /// Load a JSON scene manifest.
    pub fn from_manifest_file(path: &Path) -> Result<Self, HostError> {
        let manifest = SceneManifest::from_file(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        info!("Loaded scene {}", path.display());
        Self::new(manifest, base_dir)
    }

    /// One animated layer from a numbered image sequence; frame numbers
    /// become keyframe times.
    pub fn from_sequence(pattern: &str) -> Result<Self, HostError> {
        let frames = detect_sequence(pattern)?;
        let first = frames
            .first()
            .ok_or_else(|| HostError::InvalidScene(format!("Empty sequence: {}", pattern)))?;
        let (width, height) = image::image_dimensions(&first.path).map_err(|e| HostError::Image {
            path: first.path.clone(),
            message: e.to_string(),
        })?;

        let name = sequence_name(&first.path);
        let last_number = frames.last().map(|f| f.number).unwrap_or(first.number);

        let mut layer = LayerSpec::new(name);
        layer.keyframes = frames.into_iter().map(|f| (f.number, f.path)).collect();

        let manifest = SceneManifest {
            width,
            height,
            clip_end: last_number.max(0),
            color_model: default_color_model(),
            color_depth: default_color_depth(),
            color_profile: default_color_profile(),
            resolution: default_resolution(),
            layers: vec![layer],
        };
        Self::new(manifest, Path::new(""))
    }

    /// Last composited frame, if rendered.
    pub fn rendered(&self) -> Option<&RgbaImage> {
        self.rendered.as_ref()
    }

    fn node(&self, id: LayerId) -> Option<&SceneNode> {
        self.nodes.get(id.0 as usize)
    }

    fn snapshot(&self, index: usize) -> LayerNode {
        let node = &self.nodes[index];
        LayerNode {
            id: LayerId(index as u32),
            name: node.name.clone(),
            visible: node.visible,
            animated: !node.keyframes.is_empty(),
            children: node.children.iter().map(|&c| self.snapshot(c)).collect(),
        }
    }

    /// Visible leaf images at the current time, bottom to top, with
    /// accumulated group opacity.
    fn visible_sources(&self, index: usize, opacity: f32, out: &mut Vec<(PathBuf, f32)>) {
        let node = &self.nodes[index];
        if !node.visible {
            return;
        }
        let opacity = opacity * node.opacity;
        if node.children.is_empty() {
            if let Some(path) = node.image_at(self.time) {
                out.push((path.to_path_buf(), opacity));
            }
            return;
        }
        for &child in &node.children {
            self.visible_sources(child, opacity, out);
        }
    }

    fn cached_image(&mut self, path: &Path) -> Result<&RgbaImage, HostError> {
        match self.images.entry(path.to_path_buf()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                trace!("Loading {}", path.display());
                Ok(e.insert(load_rgba(path)?))
            }
        }
    }

    fn render(&mut self) -> Result<RgbaImage, HostError> {
        let mut sources = Vec::new();
        for &root in &self.roots {
            self.visible_sources(root, 1.0, &mut sources);
        }

        let mut frame = RgbaImage::new(self.info.width, self.info.height);
        for (path, opacity) in sources {
            let layer = self.cached_image(&path)?;
            CpuCompositor::overlay(&mut frame, layer, 0, 0, opacity);
        }
        Ok(frame)
    }
}

fn flatten(spec: &LayerSpec, base_dir: &Path, nodes: &mut Vec<SceneNode>) -> usize {
    let index = nodes.len();
    nodes.push(SceneNode {
        name: spec.name.clone(),
        visible: spec.visible,
        opacity: spec.opacity.clamp(0.0, 1.0),
        image: spec.image.as_ref().map(|p| base_dir.join(p)),
        keyframes: spec
            .keyframes
            .iter()
            .map(|(&t, p)| (t, base_dir.join(p)))
            .collect(),
        children: Vec::new(),
    });
    let children = spec
        .children
        .iter()
        .map(|child| flatten(child, base_dir, nodes))
        .collect();
    nodes[index].children = children;
    index
}

/// "renders/walk_0001.png" -> "walk"
fn sequence_name(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let name = stem.trim_end_matches(|c: char| c.is_ascii_digit() || matches!(c, '_' | '.' | '-'));
    if name.is_empty() {
        "sequence".to_string()
    } else {
        name.to_string()
    }
}

impl Document for SceneDocument {
    type Canvas = ImageCanvas;

    fn top_level_layers(&self) -> Vec<LayerNode> {
        self.roots.iter().map(|&r| self.snapshot(r)).collect()
    }

    fn has_keyframe_at(&self, layer: LayerId, time: i32) -> bool {
        self.node(layer)
            .is_some_and(|node| node.keyframes.contains_key(&time))
    }

    fn clip_range_end(&self) -> i32 {
        self.clip_end
    }

    fn current_time(&self) -> i32 {
        self.time
    }

    fn set_current_time(&mut self, time: i32) {
        if self.time != time {
            self.time = time;
            self.pending = true;
        }
    }

    fn set_layer_visible(&mut self, layer: LayerId, visible: bool) -> Result<(), HostError> {
        let node = self
            .nodes
            .get_mut(layer.0 as usize)
            .ok_or(HostError::UnknownLayer(layer))?;
        if node.visible != visible {
            node.visible = visible;
            self.pending = true;
        }
        Ok(())
    }

    fn wait_for_pending_render(&mut self) -> Result<(), HostError> {
        if self.pending {
            let frame = self.render()?;
            self.rendered = Some(frame);
            self.pending = false;
        }
        Ok(())
    }

    fn export_current_frame(&mut self, path: &Path) -> Result<(), HostError> {
        match (&self.rendered, self.pending) {
            (Some(frame), false) => save_png(frame, path),
            _ => Err(HostError::Refused(format!(
                "render pending at time {}",
                self.time
            ))),
        }
    }

    fn info(&self) -> DocumentInfo {
        self.info.clone()
    }

    fn create_canvas(&self, width: u32, height: u32, name: &str, info: &DocumentInfo) -> Result<ImageCanvas, HostError> {
        ImageCanvas::new(width, height, name, info)
    }
}
