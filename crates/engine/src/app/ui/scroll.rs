use tracing::error;

use super::{PointerSnapshot, UiCore};
use crate::app::display::{DisplayTree, NodeId, Shape};
use crate::app::geometry::{Rect, Rgba, Vec2};
use crate::app::object::{GameObject, ObjectCore};
use crate::app::state::Scope;

const SCROLLBAR_WIDTH: f32 = 8.0;
const MIN_THUMB_LENGTH: f32 = 16.0;
const WHEEL_STEP: f32 = 24.0;
const TRACK_COLOR: Rgba = [30, 30, 38, 200];
const THUMB_COLOR: Rgba = [150, 150, 170, 255];

/// How far content reaching `content_bottom` can scroll inside a window of
/// `viewport_height`.
pub fn scroll_extent(content_bottom: f32, viewport_height: f32) -> f32 {
    (content_bottom - viewport_height).max(0.0)
}

pub fn clamp_scroll_offset(offset: f32, scroll_height: f32) -> f32 {
    offset.clamp(-scroll_height.max(0.0), 0.0)
}

fn thumb_length(track: f32, scroll_height: f32) -> f32 {
    if track <= 0.0 {
        return 0.0;
    }
    (track * track / (track + scroll_height.max(0.0)))
        .max(MIN_THUMB_LENGTH)
        .min(track)
}

fn thumb_position(offset: f32, scroll_height: f32, track: f32, thumb: f32) -> f32 {
    if scroll_height <= 0.0 {
        return 0.0;
    }
    (-offset / scroll_height) * (track - thumb)
}

fn offset_from_thumb(position: f32, scroll_height: f32, track: f32, thumb: f32) -> f32 {
    let travel = track - thumb;
    if travel <= 0.0 {
        return 0.0;
    }
    let fraction = (position / travel).clamp(0.0, 1.0);
    clamp_scroll_offset(-fraction * scroll_height, scroll_height)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScrollDrag {
    Content,
    Thumb { grab: f32 },
}

/// Masked window over a taller content container. Widgets placed inside pass
/// [`ScrollField::content`] as their parent.
pub struct ScrollField {
    ui: UiCore,
    content: NodeId,
    scrollbar: Option<NodeId>,
    offset: f32,
    scroll_height: f32,
    drag: Option<ScrollDrag>,
    drawn: Option<(f32, f32)>,
}

impl ScrollField {
    pub fn new(tree: &mut DisplayTree, position: Vec2, size: Vec2) -> Self {
        let ui = UiCore::new(tree, position, size);
        tree.set_mask(ui.container(), Some(Rect::new(0.0, 0.0, size.x, size.y)));
        let content = tree.create_container();
        Self {
            ui,
            content,
            scrollbar: None,
            offset: 0.0,
            scroll_height: 0.0,
            drag: None,
            drawn: None,
        }
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.ui = self.ui.with_parent(parent);
        self
    }

    pub fn ui(&self) -> &UiCore {
        &self.ui
    }

    pub fn content(&self) -> NodeId {
        self.content
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn scroll_height(&self) -> f32 {
        self.scroll_height
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Recomputes the extent from the deepest descendant of the content container.
    pub fn refresh_extent(&mut self, tree: &DisplayTree) {
        let bottom = tree
            .local_bounds(self.content)
            .map(|bounds| bounds.bottom())
            .unwrap_or(0.0);
        self.scroll_height = scroll_extent(bottom, self.ui.size().y);
        self.offset = clamp_scroll_offset(self.offset, self.scroll_height);
    }

    pub fn set_offset(&mut self, tree: &mut DisplayTree, offset: f32) {
        self.offset = clamp_scroll_offset(offset, self.scroll_height);
        tree.set_position(self.content, Vec2::new(0.0, self.offset));
    }

    pub fn scroll_by(&mut self, tree: &mut DisplayTree, delta: f32) {
        self.set_offset(tree, self.offset + delta);
    }

    fn track(&self) -> f32 {
        self.ui.size().y
    }

    fn thumb_rect(&self) -> Rect {
        let track = self.track();
        let thumb = thumb_length(track, self.scroll_height);
        let y = thumb_position(self.offset, self.scroll_height, track, thumb);
        Rect::new(self.ui.size().x - SCROLLBAR_WIDTH, y, SCROLLBAR_WIDTH, thumb)
    }

    fn redraw_scrollbar(&mut self, tree: &mut DisplayTree) {
        let key = (self.offset, self.scroll_height);
        if self.drawn == Some(key) {
            return;
        }
        self.drawn = Some(key);
        let Some(scrollbar) = self.scrollbar else {
            return;
        };
        if self.scroll_height <= 0.0 {
            tree.set_shapes(scrollbar, Vec::new());
            return;
        }
        let size = self.ui.size();
        tree.set_shapes(
            scrollbar,
            vec![
                Shape::Rect {
                    rect: Rect::new(size.x - SCROLLBAR_WIDTH, 0.0, SCROLLBAR_WIDTH, size.y),
                    color: TRACK_COLOR,
                },
                Shape::Rect {
                    rect: self.thumb_rect(),
                    color: THUMB_COLOR,
                },
            ],
        );
    }

    fn handle_pointer(&mut self, scope: &mut Scope<'_>) {
        let pointer = PointerSnapshot::read(scope.input_mut());
        let inside = scope.input().pointer_position().is_some()
            && self.ui.hit_test(scope.tree(), pointer.position);
        let origin = self.ui.screen_rect(scope.tree());

        if pointer.pressed && inside {
            let local = pointer.position - Vec2::new(origin.x, origin.y);
            let thumb = self.thumb_rect();
            self.drag = if self.scroll_height > 0.0 && thumb.contains(local) {
                Some(ScrollDrag::Thumb {
                    grab: local.y - thumb.y,
                })
            } else {
                Some(ScrollDrag::Content)
            };
        } else if pointer.down {
            match self.drag {
                Some(ScrollDrag::Content) => self.scroll_by(scope.tree_mut(), pointer.delta.y),
                Some(ScrollDrag::Thumb { grab }) => {
                    let track = self.track();
                    let thumb = thumb_length(track, self.scroll_height);
                    let position = pointer.position.y - origin.y - grab;
                    let offset = offset_from_thumb(position, self.scroll_height, track, thumb);
                    self.set_offset(scope.tree_mut(), offset);
                }
                None => {}
            }
        }

        if pointer.released || !pointer.down {
            self.drag = None;
        }
        if inside && pointer.wheel != 0.0 {
            self.scroll_by(scope.tree_mut(), pointer.wheel * WHEEL_STEP);
        }
    }
}

impl GameObject for ScrollField {
    fn core(&self) -> &ObjectCore {
        self.ui.object()
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        self.ui.object_mut()
    }

    fn name(&self) -> &'static str {
        "scroll_field"
    }

    fn is_ui(&self) -> bool {
        true
    }

    fn init(&mut self, scope: &mut Scope<'_>) {
        if let Err(error) = self.ui.attach(scope) {
            error!(error = %error, "scroll_attach_failed");
            return;
        }
        let scrollbar = scope.tree_mut().create_graphics(Vec::new());
        for node in [self.content, scrollbar] {
            if let Err(error) = self.ui.add_visual(scope.tree_mut(), node) {
                error!(error = %error, "scroll_visual_failed");
            }
        }
        self.scrollbar = Some(scrollbar);
        self.refresh_extent(scope.tree());
    }

    fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
        self.ui.register_exclusion(scope);
        self.refresh_extent(scope.tree());
        self.handle_pointer(scope);
        let offset = self.offset;
        self.set_offset(scope.tree_mut(), offset);
        self.redraw_scrollbar(scope.tree_mut());
    }
}
