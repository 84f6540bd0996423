use std::collections::HashMap;

use thiserror::Error;
use tracing::error;

use super::geometry::{Rect, Rgba, Vec2};
use super::object::ObjectId;

/// Horizontal advance of one text glyph, in units of the text scale.
pub const GLYPH_ADVANCE_UNITS: f32 = 4.0;
/// Height of one text line, in units of the text scale.
pub const GLYPH_HEIGHT_UNITS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect { rect: Rect, color: Rgba },
    Outline { rect: Rect, color: Rgba },
    Circle { center: Vec2, radius: f32, color: Rgba },
}

impl Shape {
    pub fn bounds(&self) -> Rect {
        match self {
            Shape::Rect { rect, .. } | Shape::Outline { rect, .. } => *rect,
            Shape::Circle { center, radius, .. } => Rect::new(
                center.x - radius,
                center.y - radius,
                radius * 2.0,
                radius * 2.0,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Container,
    Sprite {
        texture: String,
        size: Vec2,
        tint: Rgba,
    },
    Text {
        content: String,
        color: Rgba,
        scale: u8,
    },
    Graphics {
        shapes: Vec<Shape>,
    },
}

#[derive(Debug, Clone)]
pub struct DisplayNode {
    kind: NodeKind,
    position: Vec2,
    visible: bool,
    depth: f32,
    mask: Option<Rect>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    owner: Option<ObjectId>,
}

impl DisplayNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            position: Vec2::ZERO,
            visible: true,
            depth: 0.0,
            mask: None,
            parent: None,
            children: Vec::new(),
            owner: None,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn mask(&self) -> Option<Rect> {
        self.mask
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn owner(&self) -> Option<ObjectId> {
        self.owner
    }

    fn own_bounds(&self) -> Option<Rect> {
        match &self.kind {
            NodeKind::Container => None,
            NodeKind::Sprite { size, .. } => Some(Rect::new(0.0, 0.0, size.x, size.y)),
            NodeKind::Text { content, scale, .. } => {
                let scale = f32::from((*scale).max(1));
                let columns = content.lines().map(|line| line.chars().count()).max()?;
                let rows = content.lines().count().max(1);
                Some(Rect::new(
                    0.0,
                    0.0,
                    columns as f32 * GLYPH_ADVANCE_UNITS * scale,
                    rows as f32 * (GLYPH_HEIGHT_UNITS + 2.0) * scale,
                ))
            }
            NodeKind::Graphics { shapes } => shapes
                .iter()
                .map(Shape::bounds)
                .reduce(|acc, rect| acc.union(&rect)),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DisplayError {
    #[error("display node {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("the stage cannot be attached to another node")]
    StageIsRoot,
}

/// Retained display tree: one stage root, per-state containers below it.
///
/// Children paint in list order, so the first child ends up furthest back.
/// [`DisplayTree::sort_displays`] orders children by descending depth: a larger depth
/// is painted earlier and appears behind smaller depths.
#[derive(Debug)]
pub struct DisplayTree {
    next_id: u64,
    nodes: HashMap<NodeId, DisplayNode>,
    stage: NodeId,
    dirty: bool,
}

impl Default for DisplayTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayTree {
    pub fn new() -> Self {
        let stage = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(stage, DisplayNode::new(NodeKind::Container));
        Self {
            next_id: 1,
            nodes,
            stage,
            dirty: false,
        }
    }

    pub fn stage(&self) -> NodeId {
        self.stage
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&DisplayNode> {
        self.nodes.get(&id)
    }

    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.nodes.insert(id, DisplayNode::new(kind));
        id
    }

    pub fn create_container(&mut self) -> NodeId {
        self.create(NodeKind::Container)
    }

    pub fn create_sprite(&mut self, texture: impl Into<String>, size: Vec2) -> NodeId {
        self.create(NodeKind::Sprite {
            texture: texture.into(),
            size,
            tint: [255, 255, 255, 255],
        })
    }

    pub fn create_text(&mut self, content: impl Into<String>, color: Rgba, scale: u8) -> NodeId {
        self.create(NodeKind::Text {
            content: content.into(),
            color,
            scale: scale.max(1),
        })
    }

    pub fn create_graphics(&mut self, shapes: Vec<Shape>) -> NodeId {
        self.create(NodeKind::Graphics { shapes })
    }

    /// Attaches `child` as the last child of `parent`, detaching it from any previous parent.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DisplayError> {
        if !self.nodes.contains_key(&parent) {
            return Err(DisplayError::UnknownNode(parent));
        }
        if !self.nodes.contains_key(&child) {
            return Err(DisplayError::UnknownNode(child));
        }
        if child == self.stage {
            return Err(DisplayError::StageIsRoot);
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(DisplayError::Cycle { parent, child });
        }

        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        Ok(())
    }

    /// Removes `child` from `parent`. A missing parent relation is logged and tolerated.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(parent_node) = self.nodes.get_mut(&parent) else {
            error!(parent = parent.0, child = child.0, "display_remove_unknown_parent");
            return false;
        };
        let Some(index) = parent_node.children.iter().position(|id| *id == child) else {
            error!(parent = parent.0, child = child.0, "display_remove_not_a_child");
            return false;
        };
        parent_node.children.remove(index);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
        true
    }

    pub fn detach(&mut self, node: NodeId) -> bool {
        match self.nodes.get(&node).and_then(DisplayNode::parent) {
            Some(parent) => self.remove_child(parent, node),
            None => false,
        }
    }

    /// Detaches `node` and drops it together with every descendant.
    pub fn destroy(&mut self, node: NodeId) {
        if node == self.stage {
            error!("display_destroy_stage_refused");
            return;
        }
        self.detach(node);
        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            if let Some(removed) = self.nodes.remove(&id) {
                pending.extend(removed.children);
            }
        }
    }

    /// Drops every child subtree of `node`, keeping the node itself.
    pub fn clear_children(&mut self, node: NodeId) {
        let children = self
            .nodes
            .get(&node)
            .map(|node| node.children.clone())
            .unwrap_or_default();
        for child in children {
            self.destroy(child);
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(DisplayNode::children)
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(DisplayNode::parent)
    }

    pub fn set_position(&mut self, id: NodeId, position: Vec2) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = position;
        }
    }

    pub fn position(&self, id: NodeId) -> Vec2 {
        self.nodes
            .get(&id)
            .map(DisplayNode::position)
            .unwrap_or_default()
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.visible = visible;
        }
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(DisplayNode::is_visible)
    }

    pub fn set_mask(&mut self, id: NodeId, mask: Option<Rect>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.mask = mask;
        }
    }

    /// Returns whether the depth changed. Only a change marks the tree dirty.
    pub fn set_depth(&mut self, id: NodeId, depth: f32) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        if node.depth == depth {
            return false;
        }
        node.depth = depth;
        self.dirty = true;
        true
    }

    pub fn depth(&self, id: NodeId) -> f32 {
        self.nodes.get(&id).map(DisplayNode::depth).unwrap_or(0.0)
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let Some(NodeKind::Text { content, .. }) = self.nodes.get_mut(&id).map(|node| &mut node.kind)
        {
            if content != text {
                content.clear();
                content.push_str(text);
            }
        }
    }

    pub fn set_text_color(&mut self, id: NodeId, new_color: Rgba) {
        if let Some(NodeKind::Text { color, .. }) = self.nodes.get_mut(&id).map(|node| &mut node.kind)
        {
            *color = new_color;
        }
    }

    pub fn set_shapes(&mut self, id: NodeId, new_shapes: Vec<Shape>) {
        if let Some(NodeKind::Graphics { shapes }) =
            self.nodes.get_mut(&id).map(|node| &mut node.kind)
        {
            *shapes = new_shapes;
        }
    }

    pub fn set_tint(&mut self, id: NodeId, new_tint: Rgba) {
        if let Some(NodeKind::Sprite { tint, .. }) = self.nodes.get_mut(&id).map(|node| &mut node.kind)
        {
            *tint = new_tint;
        }
    }

    pub(crate) fn set_owner(&mut self, id: NodeId, owner: Option<ObjectId>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.owner = owner;
        }
    }

    pub fn owner(&self, id: NodeId) -> Option<ObjectId> {
        self.nodes.get(&id).and_then(DisplayNode::owner)
    }

    /// Sum of the node's and its ancestors' positions.
    pub fn screen_position(&self, id: NodeId) -> Vec2 {
        let mut position = Vec2::ZERO;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(&current) else {
                break;
            };
            position = position + node.position;
            cursor = node.parent;
        }
        position
    }

    pub fn is_effectively_visible(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(&current) else {
                return false;
            };
            if !node.visible {
                return false;
            }
            cursor = node.parent;
        }
        true
    }

    /// Extent of the node's content and descendants, relative to the node's own origin.
    pub fn local_bounds(&self, id: NodeId) -> Option<Rect> {
        let node = self.nodes.get(&id)?;
        let mut bounds = node.own_bounds();
        for child in &node.children {
            let Some(child_node) = self.nodes.get(child) else {
                continue;
            };
            let Some(child_bounds) = self.local_bounds(*child) else {
                continue;
            };
            let child_bounds = child_bounds.translated(child_node.position);
            bounds = Some(match bounds {
                Some(existing) => existing.union(&child_bounds),
                None => child_bounds,
            });
        }
        bounds
    }

    /// Screen-space intersection of every mask on the node and its ancestors.
    /// `None` means nothing clips the node.
    pub fn clip_rect(&self, id: NodeId) -> Option<Rect> {
        let mut clip: Option<Rect> = None;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(&current) else {
                break;
            };
            if let Some(mask) = node.mask {
                let screen_mask = mask.translated(self.screen_position(current));
                clip = Some(match clip {
                    Some(existing) => existing.intersection(&screen_mask).unwrap_or_default(),
                    None => screen_mask,
                });
            }
            cursor = node.parent;
        }
        clip
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Stable insertion sort of a container's children (the stage when `None`) by
    /// descending depth. Equal depths keep their relative order.
    pub fn sort_displays(&mut self, container: Option<NodeId>) {
        let container = container.unwrap_or(self.stage);
        let Some(node) = self.nodes.get(&container) else {
            return;
        };
        let mut keyed: Vec<(f32, NodeId)> = node
            .children
            .iter()
            .map(|child| (self.depth(*child), *child))
            .collect();
        insertion_sort_by_depth(&mut keyed);
        if let Some(node) = self.nodes.get_mut(&container) {
            node.children = keyed.into_iter().map(|(_, id)| id).collect();
        }
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cursor = Some(of);
        while let Some(current) = cursor {
            if current == candidate {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(DisplayNode::parent);
        }
        false
    }
}

fn insertion_sort_by_depth(items: &mut [(f32, NodeId)]) {
    for index in 1..items.len() {
        let mut cursor = index;
        while cursor > 0 && items[cursor - 1].0 < items[cursor].0 {
            items.swap(cursor - 1, cursor);
            cursor -= 1;
        }
    }
}
