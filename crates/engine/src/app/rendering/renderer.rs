use std::path::PathBuf;
use std::sync::Arc;

use pixels::{Pixels, SurfaceTexture};
use thiserror::Error;
use winit::window::Window;

use crate::app::display::DisplayTree;
use crate::app::geometry::{Rgba, Vec2};

use super::raster::Canvas;
use super::textures::TextureCache;
use super::{paint_tree, RenderBackend};

const CLEAR_COLOR: Rgba = [18, 22, 34, 255];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Pixels(#[from] pixels::Error),
    #[error(transparent)]
    Texture(#[from] pixels::TextureError),
}

/// Fixed-size pixel buffer scaled onto the window surface.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    buffer_width: u32,
    buffer_height: u32,
    textures: TextureCache,
}

impl Renderer {
    pub fn new(
        window: Arc<Window>,
        buffer_width: u32,
        buffer_height: u32,
        asset_root: PathBuf,
    ) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width.max(1), size.height.max(1), Arc::clone(&window));
        let pixels = Pixels::new(buffer_width.max(1), buffer_height.max(1), surface)?;
        Ok(Self {
            window,
            pixels,
            buffer_width: buffer_width.max(1),
            buffer_height: buffer_height.max(1),
            textures: TextureCache::new(asset_root),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn buffer_size(&self) -> (u32, u32) {
        (self.buffer_width, self.buffer_height)
    }

    pub fn textures_mut(&mut self) -> &mut TextureCache {
        &mut self.textures
    }

    pub fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels.resize_surface(width, height)?;
        Ok(())
    }

    /// Maps a physical window position to buffer coordinates. `None` outside the buffer.
    pub fn window_pos_to_pixel(&self, x: f64, y: f64) -> Option<Vec2> {
        self.pixels
            .window_pos_to_pixel((x as f32, y as f32))
            .ok()
            .map(|(px, py)| Vec2::new(px as f32, py as f32))
    }
}

impl RenderBackend for Renderer {
    type Error = RenderError;

    fn draw(&mut self, tree: &DisplayTree) -> Result<(), RenderError> {
        let frame = self.pixels.frame_mut();
        let mut canvas = Canvas::new(frame, self.buffer_width, self.buffer_height);
        canvas.clear(CLEAR_COLOR);
        paint_tree(&mut canvas, tree, &mut self.textures);
        self.pixels.render()?;
        Ok(())
    }
}
