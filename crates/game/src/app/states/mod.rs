mod cutscene;
mod field;
mod name_entry;
mod pause;
mod town;

pub(crate) use cutscene::{Cutscene, CutsceneNext};
pub(crate) use field::Field;
pub(crate) use name_entry::NameEntry;
pub(crate) use pause::PauseMenu;
pub(crate) use town::TownMenu;

use bubble_engine::app::display::{NodeId, Shape, GLYPH_ADVANCE_UNITS};
use bubble_engine::app::{GameObject, Rect, Rgba, Scope, Vec2};
use tracing::error;

pub(crate) const SCREEN: Vec2 = Vec2::new(480.0, 270.0);

// Larger depth draws further back.
pub(crate) const DEPTH_BACKGROUND: f32 = 100.0;
pub(crate) const DEPTH_BUBBLES: f32 = 50.0;
pub(crate) const DEPTH_HUD: f32 = 0.0;
pub(crate) const DEPTH_OVERLAY: f32 = -10.0;

pub(crate) const TEXT_COLOR: Rgba = [236, 236, 244, 255];
pub(crate) const MUTED_TEXT: Rgba = [150, 160, 180, 255];
pub(crate) const ACCENT_TEXT: Rgba = [250, 210, 90, 255];

pub(crate) fn text_width(text: &str, scale: u8) -> f32 {
    let columns = text.lines().map(|line| line.chars().count()).max().unwrap_or(0);
    columns as f32 * GLYPH_ADVANCE_UNITS * f32::from(scale.max(1))
}

/// Places a text node directly under `parent`.
pub(crate) fn add_text(
    scope: &mut Scope<'_>,
    parent: NodeId,
    content: impl Into<String>,
    position: Vec2,
    color: Rgba,
    scale: u8,
) -> Option<NodeId> {
    let tree = scope.tree_mut();
    let node = tree.create_text(content, color, scale);
    tree.set_position(node, position);
    match tree.add_child(parent, node) {
        Ok(()) => Some(node),
        Err(error) => {
            error!(error = %error, "text_attach_failed");
            tree.destroy(node);
            None
        }
    }
}

/// Full-screen backdrop for a state, drawn behind everything else in it.
pub(crate) fn add_backdrop(scope: &mut Scope<'_>, color: Rgba) {
    let root = scope.root();
    let tree = scope.tree_mut();
    let node = tree.create_graphics(vec![Shape::Rect {
        rect: Rect::new(0.0, 0.0, SCREEN.x, SCREEN.y),
        color,
    }]);
    tree.set_depth(node, DEPTH_BACKGROUND);
    if let Err(error) = tree.add_child(root, node) {
        error!(error = %error, "backdrop_attach_failed");
        tree.destroy(node);
    }
}

pub(crate) fn add_object(scope: &mut Scope<'_>, object: Box<dyn GameObject>) {
    let name = object.name();
    if let Err(error) = scope.add(object) {
        error!(object = name, error = %error, "object_add_failed");
    }
}
