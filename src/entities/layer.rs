//! Layer tree snapshot as seen by the exporter.
//!
//! The host owns the real layer objects. The exporter only needs a read-only
//! snapshot of the tree (identity, visibility, animation flag, children) to
//! pick sampling boundaries and to enumerate leaf layers in layer mode.
//!
//! Order of `children` is the host's traversal order. Leaf enumeration is
//! depth-first in that order and defines the raw layer ordinals used in
//! intermediate file names.

use serde::{Deserialize, Serialize};

/// Stable host-side identifier of a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u32);

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// One node of the layer tree.
///
/// Group layers carry children; leaves carry content. A node with no
/// children is a leaf regardless of its kind on the host.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerNode {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    /// Layer has at least one keyframe on the timeline
    pub animated: bool,
    pub children: Vec<LayerNode>,
}

impl LayerNode {
    pub fn leaf(id: u32, name: impl Into<String>, visible: bool) -> Self {
        Self {
            id: LayerId(id),
            name: name.into(),
            visible,
            animated: false,
            children: Vec::new(),
        }
    }

    pub fn group(id: u32, name: impl Into<String>, visible: bool, children: Vec<LayerNode>) -> Self {
        Self {
            id: LayerId(id),
            name: name.into(),
            visible,
            animated: false,
            children,
        }
    }

    pub fn animated(mut self) -> Self {
        self.animated = true;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Depth-first list of leaf layers, in traversal order.
pub fn leaf_layers(nodes: &[LayerNode]) -> Vec<&LayerNode> {
    nodes
        .iter()
        .flat_map(|node| {
            if node.is_leaf() {
                vec![node]
            } else {
                leaf_layers(&node.children)
            }
        })
        .collect()
}

/// Visible animated layers, recursing into visible groups only.
///
/// A hidden group hides its whole subtree, so nothing below it can bound
/// the exported range.
pub fn visible_animated_layers(nodes: &[LayerNode]) -> Vec<LayerId> {
    nodes
        .iter()
        .filter(|node| node.visible)
        .flat_map(|node| {
            let mut ids = if node.animated { vec![node.id] } else { Vec::new() };
            ids.extend(visible_animated_layers(&node.children));
            ids
        })
        .collect()
}
