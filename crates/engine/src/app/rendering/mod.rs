mod font;
mod raster;
mod renderer;
mod textures;

pub use raster::{Canvas, PixelRect};
pub use renderer::{RenderError, Renderer};
pub use textures::{validate_texture_key, Texture, TextureCache, TextureKeyError};

use std::convert::Infallible;

use super::display::{DisplayTree, NodeId, NodeKind, Shape};
use super::geometry::{Rect, Rgba, Vec2};

const PLACEHOLDER_COLOR: Rgba = [220, 60, 200, 255];

/// Draws a finished frame of the display tree.
pub trait RenderBackend {
    type Error;

    fn draw(&mut self, tree: &DisplayTree) -> Result<(), Self::Error>;
}

/// Backend that draws nothing; counts frames and visible nodes for headless runs.
#[derive(Debug, Default)]
pub struct NullBackend {
    frames: u64,
    last_visible_nodes: usize,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_visible_nodes(&self) -> usize {
        self.last_visible_nodes
    }
}

impl RenderBackend for NullBackend {
    type Error = Infallible;

    fn draw(&mut self, tree: &DisplayTree) -> Result<(), Infallible> {
        self.frames += 1;
        self.last_visible_nodes = count_visible(tree, tree.stage());
        Ok(())
    }
}

fn count_visible(tree: &DisplayTree, node: NodeId) -> usize {
    if !tree.is_visible(node) {
        return 0;
    }
    1 + tree
        .children(node)
        .iter()
        .map(|child| count_visible(tree, *child))
        .sum::<usize>()
}

/// Paints the tree from the stage down. Children draw in list order, so the depth
/// sort (deepest first) leaves shallower nodes on top.
pub fn paint_tree(canvas: &mut Canvas<'_>, tree: &DisplayTree, textures: &mut TextureCache) {
    let stage = tree.stage();
    paint_node(canvas, tree, textures, stage, Vec2::ZERO, None);
}

fn paint_node(
    canvas: &mut Canvas<'_>,
    tree: &DisplayTree,
    textures: &mut TextureCache,
    id: NodeId,
    parent_origin: Vec2,
    clip: Option<PixelRect>,
) {
    let Some(node) = tree.node(id) else {
        return;
    };
    if !node.is_visible() {
        return;
    }
    let origin = parent_origin + node.position();
    let clip = match node.mask() {
        Some(mask) => {
            let mask = PixelRect::from_rect(&mask.translated(origin));
            Some(match clip {
                Some(existing) => existing.intersect(&mask),
                None => mask,
            })
        }
        None => clip,
    };
    if clip.is_some_and(|clip| clip.is_empty()) {
        return;
    }

    match node.kind() {
        NodeKind::Container => {}
        NodeKind::Graphics { shapes } => {
            for shape in shapes {
                paint_shape(canvas, shape, origin, clip);
            }
        }
        NodeKind::Text {
            content,
            color,
            scale,
        } => canvas.draw_text(content, origin.x, origin.y, *color, *scale, clip),
        NodeKind::Sprite {
            texture,
            size,
            tint,
        } => match textures.get(texture) {
            Some(loaded) => {
                let size = if size.x > 0.0 && size.y > 0.0 {
                    *size
                } else {
                    Vec2::new(loaded.width as f32, loaded.height as f32)
                };
                canvas.blit(loaded, &Rect::from_origin_size(origin, size), *tint, clip);
            }
            None => {
                let size = Vec2::new(size.x.max(4.0), size.y.max(4.0));
                canvas.outline_rect(&Rect::from_origin_size(origin, size), PLACEHOLDER_COLOR, clip);
            }
        },
    }

    for child in node.children() {
        paint_node(canvas, tree, textures, *child, origin, clip);
    }
}

fn paint_shape(canvas: &mut Canvas<'_>, shape: &Shape, origin: Vec2, clip: Option<PixelRect>) {
    match shape {
        Shape::Rect { rect, color } => canvas.fill_rect(&rect.translated(origin), *color, clip),
        Shape::Outline { rect, color } => {
            canvas.outline_rect(&rect.translated(origin), *color, clip)
        }
        Shape::Circle {
            center,
            radius,
            color,
        } => {
            let center = origin + *center;
            canvas.fill_circle(center.x, center.y, *radius, *color, clip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = [255, 0, 0, 255];
    const BLUE: Rgba = [0, 0, 255, 255];

    fn square(tree: &mut DisplayTree, color: Rgba, depth: f32) -> NodeId {
        let node = tree.create_graphics(vec![Shape::Rect {
            rect: Rect::new(0.0, 0.0, 4.0, 4.0),
            color,
        }]);
        tree.set_depth(node, depth);
        node
    }

    #[test]
    fn shallower_nodes_paint_over_deeper_ones_after_sort() {
        let mut tree = DisplayTree::new();
        let stage = tree.stage();
        let front = square(&mut tree, RED, 0.0);
        let back = square(&mut tree, BLUE, 10.0);
        tree.add_child(stage, front).expect("front");
        tree.add_child(stage, back).expect("back");
        tree.sort_displays(None);

        let mut buffer = vec![0; 4 * 4 * 4];
        let mut canvas = Canvas::new(&mut buffer, 4, 4);
        let mut textures = TextureCache::new("unused");
        paint_tree(&mut canvas, &tree, &mut textures);
        assert_eq!(canvas.pixel(1, 1), Some(RED));
    }

    #[test]
    fn masks_clip_descendants_and_hidden_nodes_are_skipped() {
        let mut tree = DisplayTree::new();
        let stage = tree.stage();
        let window = tree.create_container();
        tree.add_child(stage, window).expect("window");
        tree.set_position(window, Vec2::new(1.0, 1.0));
        tree.set_mask(window, Some(Rect::new(0.0, 0.0, 2.0, 2.0)));
        let content = square(&mut tree, RED, 0.0);
        tree.add_child(window, content).expect("content");
        let hidden = square(&mut tree, BLUE, 0.0);
        tree.add_child(stage, hidden).expect("hidden");
        tree.set_visible(hidden, false);

        let mut buffer = vec![0; 6 * 6 * 4];
        let mut canvas = Canvas::new(&mut buffer, 6, 6);
        let mut textures = TextureCache::new("unused");
        paint_tree(&mut canvas, &tree, &mut textures);
        assert_eq!(canvas.pixel(2, 2), Some(RED));
        assert_eq!(canvas.pixel(3, 3), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn missing_texture_draws_placeholder_outline() {
        let mut tree = DisplayTree::new();
        let stage = tree.stage();
        let sprite = tree.create_sprite("nowhere", Vec2::new(4.0, 4.0));
        tree.add_child(stage, sprite).expect("sprite");

        let mut buffer = vec![0; 4 * 4 * 4];
        let mut canvas = Canvas::new(&mut buffer, 4, 4);
        let mut textures = TextureCache::new("unused");
        paint_tree(&mut canvas, &tree, &mut textures);
        assert_eq!(canvas.pixel(0, 0), Some(PLACEHOLDER_COLOR));
        assert_eq!(canvas.pixel(1, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn null_backend_counts_visible_nodes() {
        let mut tree = DisplayTree::new();
        let stage = tree.stage();
        let a = tree.create_container();
        let b = tree.create_container();
        tree.add_child(stage, a).expect("a");
        tree.add_child(a, b).expect("b");
        tree.set_visible(a, false);

        let mut backend = NullBackend::new();
        backend.draw(&tree).expect("draw");
        assert_eq!(backend.frames(), 1);
        assert_eq!(backend.last_visible_nodes(), 1);
    }
}
