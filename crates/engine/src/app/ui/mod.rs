mod button;
mod frame;
mod scroll;
mod status_bar;
mod text_field;

pub use button::{step_button, BasicButton, Button, ButtonPalette, ButtonSignals, ButtonStatus};
pub use frame::{layout_dynamic, layout_stretch, Axis, Frame, Layout, LayoutSpec};
pub use scroll::{clamp_scroll_offset, scroll_extent, ScrollField};
pub use status_bar::{fill_fraction, StatusBar};
pub use text_field::TextField;

use tracing::warn;

use super::display::{DisplayTree, NodeId};
use super::geometry::{Rect, Vec2};
use super::input::{InputPoller, PointerButton};
use super::object::{ObjectCore, ObjectId};
use super::state::{LifecycleError, Scope};

/// Callback run by a widget with the owning state's scope.
pub type UiCallback = Box<dyn FnMut(&mut Scope<'_>)>;

/// Shared widget plumbing: a container node positioned relative to a parent node,
/// a size, and an optional input-exclusion area.
#[derive(Debug)]
pub struct UiCore {
    object: ObjectCore,
    container: NodeId,
    parent: Option<NodeId>,
    position: Vec2,
    size: Vec2,
    exclusion: bool,
}

impl UiCore {
    pub fn new(tree: &mut DisplayTree, position: Vec2, size: Vec2) -> Self {
        let container = tree.create_container();
        tree.set_position(container, position);
        Self {
            object: ObjectCore::new(),
            container,
            parent: None,
            position,
            size,
            exclusion: true,
        }
    }

    /// Nests the widget inside another node instead of the state root.
    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_exclusion(mut self, enabled: bool) -> Self {
        self.exclusion = enabled;
        self
    }

    pub fn object(&self) -> &ObjectCore {
        &self.object
    }

    pub fn object_mut(&mut self) -> &mut ObjectCore {
        &mut self.object
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.object.id()
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn set_size(&mut self, size: Vec2) {
        self.size = size;
    }

    pub fn exclusion_enabled(&self) -> bool {
        self.exclusion
    }

    pub fn set_exclusion(&mut self, enabled: bool) {
        self.exclusion = enabled;
    }

    /// Claims the container under the parent node, or the state root when the
    /// widget has no parent.
    pub fn attach(&mut self, scope: &mut Scope<'_>) -> Result<(), LifecycleError> {
        let parent = match self.parent {
            Some(parent) if scope.tree().contains(parent) => parent,
            Some(parent) => {
                warn!(parent = parent.0, "ui_parent_missing_using_root");
                scope.root()
            }
            None => scope.root(),
        };
        self.object
            .add_display(scope.tree_mut(), parent, self.container)
    }

    /// Adds a visual node inside the widget's container.
    pub fn add_visual(&mut self, tree: &mut DisplayTree, node: NodeId) -> Result<(), LifecycleError> {
        self.object.add_display(tree, self.container, node)
    }

    /// Moves the widget relative to its parent node.
    pub fn set_ui_pos(&mut self, tree: &mut DisplayTree, position: Vec2) {
        self.position = position;
        tree.set_position(self.container, position);
    }

    pub fn set_visible(&self, tree: &mut DisplayTree, visible: bool) {
        tree.set_visible(self.container, visible);
    }

    pub fn screen_rect(&self, tree: &DisplayTree) -> Rect {
        Rect::from_origin_size(tree.screen_position(self.container), self.size)
    }

    /// Portion of the widget that can be seen, after ancestor masks.
    pub fn visible_rect(&self, tree: &DisplayTree) -> Option<Rect> {
        if !tree.is_effectively_visible(self.container) {
            return None;
        }
        let rect = self.screen_rect(tree);
        match tree.clip_rect(self.container) {
            Some(clip) => rect.intersection(&clip),
            None => Some(rect),
        }
    }

    pub fn hit_test(&self, tree: &DisplayTree, point: Vec2) -> bool {
        self.visible_rect(tree)
            .is_some_and(|rect| rect.contains(point))
    }

    /// Registers this frame's exclusion area. Areas are cleared on every input snapshot.
    pub fn register_exclusion(&self, scope: &mut Scope<'_>) {
        if !self.exclusion {
            return;
        }
        let (Some(id), Some(rect)) = (self.object.id(), self.visible_rect(scope.tree())) else {
            return;
        };
        scope.input_mut().register_exclusion(id, rect);
    }
}

/// Left-button pointer state read on behalf of a widget, with exclusion enforcement
/// suspended so widgets see input inside their own areas.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerSnapshot {
    pub position: Vec2,
    pub delta: Vec2,
    pub pressed: bool,
    pub down: bool,
    pub released: bool,
    pub wheel: f32,
}

impl PointerSnapshot {
    pub fn read(input: &mut InputPoller) -> Self {
        input.with_exclusion_suspended(|input| Self {
            position: input.pointer(),
            delta: input.pointer_delta(),
            pressed: input.pointer_pressed(PointerButton::Left),
            down: input.pointer_down(PointerButton::Left),
            released: input.pointer_released(PointerButton::Left),
            wheel: input.wheel_delta(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::input::InputEvent;

    #[test]
    fn screen_rect_composes_parent_positions() {
        let mut tree = DisplayTree::new();
        let stage = tree.stage();
        let panel = tree.create_container();
        tree.add_child(stage, panel).expect("panel");
        tree.set_position(panel, Vec2::new(100.0, 50.0));

        let mut core = UiCore::new(&mut tree, Vec2::new(10.0, 5.0), Vec2::new(40.0, 20.0))
            .with_parent(panel);
        tree.add_child(panel, core.container()).expect("attach");
        assert_eq!(core.screen_rect(&tree), Rect::new(110.0, 55.0, 40.0, 20.0));

        core.set_ui_pos(&mut tree, Vec2::new(0.0, 0.0));
        assert_eq!(core.screen_rect(&tree), Rect::new(100.0, 50.0, 40.0, 20.0));
    }

    #[test]
    fn hit_test_respects_masks_and_visibility() {
        let mut tree = DisplayTree::new();
        let stage = tree.stage();
        let window = tree.create_container();
        tree.add_child(stage, window).expect("window");
        tree.set_mask(window, Some(Rect::new(0.0, 0.0, 100.0, 100.0)));

        let core = UiCore::new(&mut tree, Vec2::new(80.0, 80.0), Vec2::new(50.0, 50.0));
        tree.add_child(window, core.container()).expect("attach");

        assert!(core.hit_test(&tree, Vec2::new(90.0, 90.0)));
        assert!(!core.hit_test(&tree, Vec2::new(120.0, 120.0)));
        core.set_visible(&mut tree, false);
        assert!(!core.hit_test(&tree, Vec2::new(90.0, 90.0)));
    }

    #[test]
    fn pointer_snapshot_sees_input_inside_exclusion_areas() {
        let mut input = InputPoller::new();
        input.push_event(InputEvent::PointerMoved(Vec2::new(5.0, 5.0)));
        input.push_event(InputEvent::ButtonPressed(PointerButton::Left));
        input.begin_frame();
        input.register_exclusion(ObjectId(1), Rect::new(0.0, 0.0, 10.0, 10.0));

        assert!(!input.pointer_pressed(PointerButton::Left));
        let snapshot = PointerSnapshot::read(&mut input);
        assert!(snapshot.pressed);
        assert!(snapshot.down);
        assert!(input.world_input_blocked());
    }
}
