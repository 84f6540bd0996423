use crate::app::geometry::{Rect, Rgba};

use super::font::glyph_rows;
use super::textures::Texture;

/// Glyph height plus line gap, in font pixels.
const LINE_HEIGHT_UNITS: i32 = 7;

/// Integer pixel rectangle, `right`/`bottom` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    pub fn from_rect(rect: &Rect) -> Self {
        Self {
            left: rect.x.floor() as i32,
            top: rect.y.floor() as i32,
            right: rect.right().ceil() as i32,
            bottom: rect.bottom().ceil() as i32,
        }
    }

    pub fn intersect(&self, other: &PixelRect) -> PixelRect {
        PixelRect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }
}

/// RGBA8 frame buffer view with clipping and alpha blending.
pub struct Canvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> PixelRect {
        PixelRect {
            left: 0,
            top: 0,
            right: self.width as i32,
            bottom: self.height as i32,
        }
    }

    pub fn clear(&mut self, color: Rgba) {
        for chunk in self.frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&color);
        }
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgba> {
        let offset = self.offset(x, y)?;
        let mut color = [0; 4];
        color.copy_from_slice(&self.frame[offset..offset + 4]);
        Some(color)
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let pixel = (y as usize)
            .checked_mul(self.width as usize)?
            .checked_add(x as usize)?;
        let offset = pixel.checked_mul(4)?;
        (offset + 4 <= self.frame.len()).then_some(offset)
    }

    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if color[3] == 0 {
            return;
        }
        let Some(offset) = self.offset(x, y) else {
            return;
        };
        let dst = &mut self.frame[offset..offset + 4];
        if color[3] == u8::MAX {
            dst.copy_from_slice(&color);
            return;
        }
        let alpha = u32::from(color[3]);
        let inverse = 255 - alpha;
        for channel in 0..3 {
            let blended = (u32::from(color[channel]) * alpha + u32::from(dst[channel]) * inverse) / 255;
            dst[channel] = blended as u8;
        }
        dst[3] = dst[3].max(color[3]);
    }

    fn visible(&self, area: PixelRect, clip: Option<PixelRect>) -> PixelRect {
        let area = area.intersect(&self.bounds());
        match clip {
            Some(clip) => area.intersect(&clip),
            None => area,
        }
    }

    pub fn fill_rect(&mut self, rect: &Rect, color: Rgba, clip: Option<PixelRect>) {
        let area = self.visible(PixelRect::from_rect(rect), clip);
        if area.is_empty() {
            return;
        }
        for y in area.top..area.bottom {
            for x in area.left..area.right {
                self.blend_pixel(x, y, color);
            }
        }
    }

    pub fn outline_rect(&mut self, rect: &Rect, color: Rgba, clip: Option<PixelRect>) {
        let outer = PixelRect::from_rect(rect);
        if outer.is_empty() {
            return;
        }
        let area = self.visible(outer, clip);
        for y in area.top..area.bottom {
            for x in area.left..area.right {
                let edge = x == outer.left
                    || x == outer.right - 1
                    || y == outer.top
                    || y == outer.bottom - 1;
                if edge {
                    self.blend_pixel(x, y, color);
                }
            }
        }
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba, clip: Option<PixelRect>) {
        if radius.is_nan() || radius <= 0.0 {
            return;
        }
        let bounds = Rect::new(cx - radius, cy - radius, radius * 2.0, radius * 2.0);
        let area = self.visible(PixelRect::from_rect(&bounds), clip);
        let radius_sq = radius * radius;
        for y in area.top..area.bottom {
            for x in area.left..area.right {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= radius_sq {
                    self.blend_pixel(x, y, color);
                }
            }
        }
    }

    /// Nearest-neighbour blit of `texture` scaled into `dest`, multiplied by `tint`.
    /// Fully transparent texels are skipped.
    pub fn blit(&mut self, texture: &Texture, dest: &Rect, tint: Rgba, clip: Option<PixelRect>) {
        if texture.width == 0 || texture.height == 0 || dest.width <= 0.0 || dest.height <= 0.0 {
            return;
        }
        let expected = texture.width as usize * texture.height as usize * 4;
        if texture.rgba.len() < expected {
            return;
        }
        let target = PixelRect::from_rect(dest);
        let area = self.visible(target, clip);
        let scale_x = texture.width as f32 / dest.width;
        let scale_y = texture.height as f32 / dest.height;
        for y in area.top..area.bottom {
            let src_y = (((y - target.top) as f32 + 0.5) * scale_y).floor() as u32;
            let src_y = src_y.min(texture.height - 1) as usize;
            for x in area.left..area.right {
                let src_x = (((x - target.left) as f32 + 0.5) * scale_x).floor() as u32;
                let src_x = src_x.min(texture.width - 1) as usize;
                let offset = (src_y * texture.width as usize + src_x) * 4;
                let texel = &texture.rgba[offset..offset + 4];
                if texel[3] == 0 {
                    continue;
                }
                let color = [
                    modulate(texel[0], tint[0]),
                    modulate(texel[1], tint[1]),
                    modulate(texel[2], tint[2]),
                    modulate(texel[3], tint[3]),
                ];
                self.blend_pixel(x, y, color);
            }
        }
    }

    /// Draws `text` with the built-in 3x5 font, each font pixel `scale` pixels wide.
    pub fn draw_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        color: Rgba,
        scale: u8,
        clip: Option<PixelRect>,
    ) {
        let scale = i32::from(scale.max(1));
        let origin_x = x.round() as i32;
        let origin_y = y.round() as i32;
        let glyphs = text.lines().enumerate().flat_map(|(line, content)| {
            content
                .chars()
                .enumerate()
                .map(move |(column, ch)| (line as i32, column as i32, ch))
        });
        for (line, index, ch) in glyphs {
            let rows = glyph_rows(ch);
            let glyph_x = origin_x + index * 4 * scale;
            let glyph_y = origin_y + line * LINE_HEIGHT_UNITS * scale;
            for (row, pattern) in rows.iter().enumerate() {
                for (column, cell) in pattern.bytes().enumerate() {
                    if cell != b'#' {
                        continue;
                    }
                    let cell_rect = PixelRect {
                        left: glyph_x + column as i32 * scale,
                        top: glyph_y + row as i32 * scale,
                        right: glyph_x + (column as i32 + 1) * scale,
                        bottom: glyph_y + (row as i32 + 1) * scale,
                    };
                    let area = self.visible(cell_rect, clip);
                    for py in area.top..area.bottom {
                        for px in area.left..area.right {
                            self.blend_pixel(px, py, color);
                        }
                    }
                }
            }
        }
    }
}

fn modulate(value: u8, tint: u8) -> u8 {
    ((u32::from(value) * u32::from(tint)) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = [255, 0, 0, 255];

    #[test]
    fn fill_rect_is_clipped_to_frame_and_clip_rect() {
        let mut buffer = vec![0; 8 * 8 * 4];
        let mut canvas = Canvas::new(&mut buffer, 8, 8);
        let clip = PixelRect {
            left: 0,
            top: 0,
            right: 4,
            bottom: 4,
        };
        canvas.fill_rect(&Rect::new(-2.0, -2.0, 20.0, 20.0), RED, Some(clip));
        assert_eq!(canvas.pixel(3, 3), Some(RED));
        assert_eq!(canvas.pixel(4, 4), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(9, 0), None);
    }

    #[test]
    fn half_alpha_blends_with_destination() {
        let mut buffer = vec![0; 4];
        let mut canvas = Canvas::new(&mut buffer, 1, 1);
        canvas.clear([0, 0, 200, 255]);
        canvas.blend_pixel(0, 0, [200, 0, 0, 128]);
        let pixel = canvas.pixel(0, 0).expect("pixel");
        assert_eq!(pixel[0], 100);
        assert_eq!(pixel[2], 99);
        assert_eq!(pixel[3], 255);
    }

    #[test]
    fn outline_only_touches_edges() {
        let mut buffer = vec![0; 5 * 5 * 4];
        let mut canvas = Canvas::new(&mut buffer, 5, 5);
        canvas.outline_rect(&Rect::new(0.0, 0.0, 5.0, 5.0), RED, None);
        assert_eq!(canvas.pixel(0, 2), Some(RED));
        assert_eq!(canvas.pixel(4, 4), Some(RED));
        assert_eq!(canvas.pixel(2, 2), Some([0, 0, 0, 0]));
    }

    #[test]
    fn blit_scales_and_skips_transparent_texels() {
        let texture = Texture::from_rgba(2, 1, vec![255, 255, 255, 255, 0, 0, 0, 0]);
        let mut buffer = vec![0; 4 * 2 * 4];
        let mut canvas = Canvas::new(&mut buffer, 4, 2);
        canvas.blit(&texture, &Rect::new(0.0, 0.0, 4.0, 2.0), [0, 255, 0, 255], None);
        assert_eq!(canvas.pixel(1, 1), Some([0, 255, 0, 255]));
        assert_eq!(canvas.pixel(3, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn text_renders_glyph_cells() {
        let mut buffer = vec![0; 8 * 5 * 4];
        let mut canvas = Canvas::new(&mut buffer, 8, 5);
        canvas.draw_text("i", 0.0, 0.0, RED, 1, None);
        assert_eq!(canvas.pixel(0, 0), Some(RED));
        assert_eq!(canvas.pixel(0, 1), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(1, 2), Some(RED));
    }

    #[test]
    fn text_breaks_lines_on_newline() {
        let mut buffer = vec![0; 8 * 12 * 4];
        let mut canvas = Canvas::new(&mut buffer, 8, 12);
        canvas.draw_text("i\ni", 0.0, 0.0, RED, 1, None);
        assert_eq!(canvas.pixel(0, 7), Some(RED));
        assert_eq!(canvas.pixel(4, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn circle_covers_center_not_corners() {
        let mut buffer = vec![0; 10 * 10 * 4];
        let mut canvas = Canvas::new(&mut buffer, 10, 10);
        canvas.fill_circle(5.0, 5.0, 4.0, RED, None);
        assert_eq!(canvas.pixel(5, 5), Some(RED));
        assert_eq!(canvas.pixel(1, 1), Some([0, 0, 0, 0]));
    }
}
