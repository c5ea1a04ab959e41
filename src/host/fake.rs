//! Recording in-memory host used by unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use uuid::Uuid;

use super::{Canvas, Document, DocumentInfo, HostError};
use crate::entities::layer::{LayerId, LayerNode};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    SetTime(i32),
    SetVisible(LayerId, bool),
    Wait,
    ExportFrame(PathBuf),
    CreateCanvas(u32, u32),
    Merge(PathBuf, u32, u32),
    ExportCanvas(PathBuf),
}

pub struct FakeDocument {
    layers: Vec<LayerNode>,
    visibility: HashMap<LayerId, bool>,
    keyframes: HashSet<(LayerId, i32)>,
    pub clip_end: i32,
    pub keyframe_queries: bool,
    pub width: u32,
    pub height: u32,
    time: i32,
    pending: bool,
    frame_exports: usize,
    /// Fail the n-th (0-based) frame export
    pub fail_frame_export: Option<usize>,
    pub fail_canvas_export: bool,
    pub fail_create_canvas: bool,
    /// Refuse visibility changes of this layer
    pub fail_visibility: Option<LayerId>,
    pub calls: Rc<RefCell<Vec<Call>>>,
}

impl FakeDocument {
    pub fn new(layers: Vec<LayerNode>) -> Self {
        let mut visibility = HashMap::new();
        collect_visibility(&layers, &mut visibility);
        Self {
            layers,
            visibility,
            keyframes: HashSet::new(),
            clip_end: 100,
            keyframe_queries: true,
            width: 8,
            height: 4,
            time: 0,
            pending: false,
            frame_exports: 0,
            fail_frame_export: None,
            fail_canvas_export: false,
            fail_create_canvas: false,
            fail_visibility: None,
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn add_keyframe(&mut self, layer: LayerId, time: i32) {
        self.keyframes.insert((layer, time));
    }

    pub fn visible(&self, layer: LayerId) -> bool {
        self.visibility.get(&layer).copied().unwrap_or(false)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

fn collect_visibility(nodes: &[LayerNode], out: &mut HashMap<LayerId, bool>) {
    for node in nodes {
        out.insert(node.id, node.visible);
        collect_visibility(&node.children, out);
    }
}

fn apply_visibility(nodes: &[LayerNode], visibility: &HashMap<LayerId, bool>) -> Vec<LayerNode> {
    nodes
        .iter()
        .map(|node| LayerNode {
            visible: visibility.get(&node.id).copied().unwrap_or(node.visible),
            children: apply_visibility(&node.children, visibility),
            ..node.clone()
        })
        .collect()
}

impl Document for FakeDocument {
    type Canvas = FakeCanvas;

    fn top_level_layers(&self) -> Vec<LayerNode> {
        apply_visibility(&self.layers, &self.visibility)
    }

    fn has_keyframe_at(&self, layer: LayerId, time: i32) -> bool {
        self.keyframes.contains(&(layer, time))
    }

    fn supports_keyframe_queries(&self) -> bool {
        self.keyframe_queries
    }

    fn clip_range_end(&self) -> i32 {
        self.clip_end
    }

    fn current_time(&self) -> i32 {
        self.time
    }

    fn set_current_time(&mut self, time: i32) {
        self.record(Call::SetTime(time));
        self.time = time;
        self.pending = true;
    }

    fn set_layer_visible(&mut self, layer: LayerId, visible: bool) -> Result<(), HostError> {
        if !self.visibility.contains_key(&layer) {
            return Err(HostError::UnknownLayer(layer));
        }
        if self.fail_visibility == Some(layer) {
            return Err(HostError::Refused(format!("{} is locked", layer)));
        }
        self.record(Call::SetVisible(layer, visible));
        self.visibility.insert(layer, visible);
        self.pending = true;
        Ok(())
    }

    fn wait_for_pending_render(&mut self) -> Result<(), HostError> {
        self.record(Call::Wait);
        self.pending = false;
        Ok(())
    }

    fn export_current_frame(&mut self, path: &Path) -> Result<(), HostError> {
        if self.pending {
            return Err(HostError::Refused("render pending".into()));
        }
        let n = self.frame_exports;
        self.frame_exports += 1;
        if self.fail_frame_export == Some(n) {
            return Err(HostError::Refused(format!("frame export {} failed", n)));
        }
        std::fs::write(path, b"frame").map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.record(Call::ExportFrame(path.to_path_buf()));
        Ok(())
    }

    fn info(&self) -> DocumentInfo {
        DocumentInfo {
            width: self.width,
            height: self.height,
            color_model: "RGBA".into(),
            color_depth: "U8".into(),
            color_profile: "sRGB".into(),
            resolution: 72.0,
        }
    }

    fn create_canvas(&self, width: u32, height: u32, _name: &str, _info: &DocumentInfo) -> Result<FakeCanvas, HostError> {
        if self.fail_create_canvas {
            return Err(HostError::CanvasTooLarge { width, height });
        }
        self.record(Call::CreateCanvas(width, height));
        Ok(FakeCanvas {
            layers: HashMap::new(),
            fail_export: self.fail_canvas_export,
            calls: Rc::clone(&self.calls),
        })
    }
}

pub struct FakeCanvas {
    layers: HashMap<Uuid, (PathBuf, u32, u32)>,
    fail_export: bool,
    calls: Rc<RefCell<Vec<Call>>>,
}

impl Canvas for FakeCanvas {
    fn insert_image_layer(&mut self, path: &Path) -> Result<Uuid, HostError> {
        if !path.exists() {
            return Err(HostError::Image {
                path: path.to_path_buf(),
                message: "missing".into(),
            });
        }
        let handle = Uuid::new_v4();
        self.layers.insert(handle, (path.to_path_buf(), 0, 0));
        Ok(handle)
    }

    fn move_layer(&mut self, layer: Uuid, x: u32, y: u32) -> Result<(), HostError> {
        let entry = self.layers.get_mut(&layer).ok_or(HostError::UnknownHandle(layer))?;
        entry.1 = x;
        entry.2 = y;
        Ok(())
    }

    fn merge_down(&mut self, layer: Uuid) -> Result<(), HostError> {
        let (path, x, y) = self.layers.remove(&layer).ok_or(HostError::UnknownHandle(layer))?;
        self.calls.borrow_mut().push(Call::Merge(path, x, y));
        Ok(())
    }

    fn export(&mut self, path: &Path) -> Result<(), HostError> {
        if self.fail_export {
            return Err(HostError::Refused("sheet export failed".into()));
        }
        std::fs::write(path, b"sheet").map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.calls.borrow_mut().push(Call::ExportCanvas(path.to_path_buf()));
        Ok(())
    }
}
