use tracing::error;

use super::UiCore;
use crate::app::display::{DisplayTree, NodeId, Shape};
use crate::app::geometry::{Rect, Rgba, Vec2};
use crate::app::object::{GameObject, ObjectCore};
use crate::app::state::Scope;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    #[default]
    Vertical,
}

impl Axis {
    fn main(self, v: Vec2) -> f32 {
        match self {
            Axis::Horizontal => v.x,
            Axis::Vertical => v.y,
        }
    }

    fn cross(self, v: Vec2) -> f32 {
        match self {
            Axis::Horizontal => v.y,
            Axis::Vertical => v.x,
        }
    }

    fn compose(self, main: f32, cross: f32) -> Vec2 {
        match self {
            Axis::Horizontal => Vec2::new(main, cross),
            Axis::Vertical => Vec2::new(cross, main),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayoutSpec {
    pub axis: Axis,
    pub padding: f32,
    pub spacing: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub slots: Vec<Rect>,
    /// Outer size of the frame holding the slots.
    pub size: Vec2,
}

/// Packs items one after another along the axis; the frame grows to fit.
pub fn layout_dynamic(sizes: &[Vec2], spec: LayoutSpec) -> Layout {
    let axis = spec.axis;
    let mut cursor = spec.padding;
    let mut cross_extent: f32 = 0.0;
    let mut slots = Vec::with_capacity(sizes.len());
    for (index, size) in sizes.iter().enumerate() {
        if index > 0 {
            cursor += spec.spacing;
        }
        let origin = axis.compose(cursor, spec.padding);
        slots.push(Rect::from_origin_size(origin, *size));
        cursor += axis.main(*size);
        cross_extent = cross_extent.max(axis.cross(*size));
    }
    let main = if sizes.is_empty() {
        spec.padding * 2.0
    } else {
        cursor + spec.padding
    };
    Layout {
        slots,
        size: axis.compose(main, cross_extent + spec.padding * 2.0),
    }
}

/// Divides `available` evenly between `count` items after padding and spacing.
pub fn layout_stretch(count: usize, available: Vec2, spec: LayoutSpec) -> Layout {
    let axis = spec.axis;
    if count == 0 {
        return Layout {
            slots: Vec::new(),
            size: available,
        };
    }
    let gaps = spec.spacing * (count - 1) as f32;
    let usable = (axis.main(available) - spec.padding * 2.0 - gaps).max(0.0);
    let each = usable / count as f32;
    let cross = (axis.cross(available) - spec.padding * 2.0).max(0.0);
    let slots = (0..count)
        .map(|index| {
            let main = spec.padding + index as f32 * (each + spec.spacing);
            Rect::from_origin_size(axis.compose(main, spec.padding), axis.compose(each, cross))
        })
        .collect();
    Layout {
        slots,
        size: available,
    }
}

/// Panel with an optional background. Child widgets use [`Frame::body`] as parent.
pub struct Frame {
    ui: UiCore,
    background: Option<Rgba>,
    backdrop: Option<NodeId>,
}

impl Frame {
    pub fn new(tree: &mut DisplayTree, position: Vec2, size: Vec2) -> Self {
        Self {
            ui: UiCore::new(tree, position, size),
            background: None,
            backdrop: None,
        }
    }

    pub fn with_background(mut self, color: Rgba) -> Self {
        self.background = Some(color);
        self
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.ui = self.ui.with_parent(parent);
        self
    }

    pub fn ui(&self) -> &UiCore {
        &self.ui
    }

    pub fn body(&self) -> NodeId {
        self.ui.container()
    }

    pub fn size(&self) -> Vec2 {
        self.ui.size()
    }

    /// Positions `items` (node plus size) back to back and grows the frame to fit.
    pub fn arrange_dynamic(
        &mut self,
        tree: &mut DisplayTree,
        items: &[(NodeId, Vec2)],
        spec: LayoutSpec,
    ) -> Layout {
        let sizes: Vec<Vec2> = items.iter().map(|(_, size)| *size).collect();
        let layout = layout_dynamic(&sizes, spec);
        for ((node, _), slot) in items.iter().zip(&layout.slots) {
            tree.set_position(*node, Vec2::new(slot.x, slot.y));
        }
        self.ui.set_size(layout.size);
        self.redraw(tree);
        layout
    }

    /// Positions `nodes` in evenly sized slots across the frame. Callers size the
    /// items from the returned slots.
    pub fn arrange_stretch(
        &mut self,
        tree: &mut DisplayTree,
        nodes: &[NodeId],
        spec: LayoutSpec,
    ) -> Layout {
        let layout = layout_stretch(nodes.len(), self.ui.size(), spec);
        for (node, slot) in nodes.iter().zip(&layout.slots) {
            tree.set_position(*node, Vec2::new(slot.x, slot.y));
        }
        layout
    }

    fn redraw(&self, tree: &mut DisplayTree) {
        let (Some(backdrop), Some(color)) = (self.backdrop, self.background) else {
            return;
        };
        let size = self.ui.size();
        tree.set_shapes(
            backdrop,
            vec![Shape::Rect {
                rect: Rect::new(0.0, 0.0, size.x, size.y),
                color,
            }],
        );
    }
}

impl GameObject for Frame {
    fn core(&self) -> &ObjectCore {
        self.ui.object()
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        self.ui.object_mut()
    }

    fn name(&self) -> &'static str {
        "frame"
    }

    fn is_ui(&self) -> bool {
        true
    }

    fn init(&mut self, scope: &mut Scope<'_>) {
        if let Err(error) = self.ui.attach(scope) {
            error!(error = %error, "frame_attach_failed");
            return;
        }
        if self.background.is_some() {
            let backdrop = scope.tree_mut().create_graphics(Vec::new());
            if let Err(error) = self.ui.add_visual(scope.tree_mut(), backdrop) {
                error!(error = %error, "frame_visual_failed");
                return;
            }
            // Keep the backdrop behind children attached before init ran.
            let body = self.body();
            scope.tree_mut().set_depth(backdrop, f32::MAX);
            scope.tree_mut().sort_displays(Some(body));
            self.backdrop = Some(backdrop);
            self.redraw(scope.tree_mut());
        }
    }

    fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
        self.ui.register_exclusion(scope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_layout_packs_and_grows() {
        let spec = LayoutSpec {
            axis: Axis::Vertical,
            padding: 4.0,
            spacing: 2.0,
        };
        let layout = layout_dynamic(
            &[Vec2::new(50.0, 10.0), Vec2::new(80.0, 20.0), Vec2::new(30.0, 5.0)],
            spec,
        );
        assert_eq!(
            layout.slots,
            vec![
                Rect::new(4.0, 4.0, 50.0, 10.0),
                Rect::new(4.0, 16.0, 80.0, 20.0),
                Rect::new(4.0, 38.0, 30.0, 5.0),
            ]
        );
        assert_eq!(layout.size, Vec2::new(88.0, 47.0));
    }

    #[test]
    fn dynamic_layout_of_nothing_is_padding_only() {
        let spec = LayoutSpec {
            axis: Axis::Horizontal,
            padding: 3.0,
            spacing: 10.0,
        };
        let layout = layout_dynamic(&[], spec);
        assert!(layout.slots.is_empty());
        assert_eq!(layout.size, Vec2::new(6.0, 6.0));
    }

    #[test]
    fn stretch_layout_divides_evenly() {
        let spec = LayoutSpec {
            axis: Axis::Horizontal,
            padding: 10.0,
            spacing: 5.0,
        };
        let layout = layout_stretch(3, Vec2::new(330.0, 40.0), spec);
        assert_eq!(
            layout.slots,
            vec![
                Rect::new(10.0, 10.0, 100.0, 20.0),
                Rect::new(115.0, 10.0, 100.0, 20.0),
                Rect::new(220.0, 10.0, 100.0, 20.0),
            ]
        );
        assert_eq!(layout.size, Vec2::new(330.0, 40.0));
    }

    #[test]
    fn stretch_layout_never_goes_negative() {
        let spec = LayoutSpec {
            axis: Axis::Vertical,
            padding: 50.0,
            spacing: 5.0,
        };
        let layout = layout_stretch(2, Vec2::new(20.0, 40.0), spec);
        assert!(layout
            .slots
            .iter()
            .all(|slot| slot.width == 0.0 && slot.height == 0.0));
    }

    #[test]
    fn arrange_dynamic_positions_nodes_and_resizes_frame() {
        let mut tree = DisplayTree::new();
        let mut frame = Frame::new(&mut tree, Vec2::ZERO, Vec2::ZERO);
        let a = tree.create_container();
        let b = tree.create_container();
        let spec = LayoutSpec {
            axis: Axis::Horizontal,
            padding: 2.0,
            spacing: 1.0,
        };
        frame.arrange_dynamic(
            &mut tree,
            &[(a, Vec2::new(10.0, 10.0)), (b, Vec2::new(20.0, 4.0))],
            spec,
        );
        assert_eq!(tree.position(a), Vec2::new(2.0, 2.0));
        assert_eq!(tree.position(b), Vec2::new(13.0, 2.0));
        assert_eq!(frame.size(), Vec2::new(35.0, 14.0));
    }
}
