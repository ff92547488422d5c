//! Heap framebuffer that pages are composited into.
//!
//! All page drawing targets this RAM buffer. The finished buffer is saved
//! as the page artifact and, after rotation, handed to the renderer, which
//! pushes it to the panel in a single transfer.

use core::convert::Infallible;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use image::RgbImage;
use log::debug;

/// RGB framebuffer implementing `DrawTarget<Color = Rgb888>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    pixels: Vec<Rgb888>,
}

impl FrameBuffer {
    /// Allocate a framebuffer filled with `background`.
    pub fn new(width: u32, height: u32, background: Rgb888) -> Self {
        let (width, height) = (width as usize, height as usize);
        Self {
            width,
            height,
            pixels: vec![background; width * height],
        }
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    /// Color at `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        let (x, y) = (x as usize, y as usize);
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, color: Rgb888) {
        let idx = y * self.width + x;
        self.pixels[idx] = color;
    }

    /// Copy an RGB image into the buffer with its top-left corner at `origin`.
    ///
    /// Parts falling outside the buffer are clipped.
    pub fn paste(&mut self, image: &RgbImage, origin: Point) {
        let area = Rectangle::new(origin, Size::new(image.width(), image.height()));
        let colors = image.pixels().map(|p| Rgb888::new(p[0], p[1], p[2]));
        let Ok(()) = self.fill_contiguous(&area, colors);
    }

    /// Wrap a decoded image.
    pub fn from_image(image: &RgbImage) -> Self {
        let mut frame = Self::new(image.width(), image.height(), Rgb888::WHITE);
        frame.paste(image, Point::zero());
        frame
    }

    /// Export the buffer as an RGB image.
    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let c = self.pixels[y as usize * self.width + x as usize];
            image::Rgb([c.r(), c.g(), c.b()])
        })
    }

    /// A copy turned 90° counter-clockwise; width and height swap.
    pub fn rotated_ccw(&self) -> Self {
        let (src_w, src_h) = (self.width, self.height);
        let mut pixels = Vec::with_capacity(self.pixels.len());
        for y in 0..src_w {
            for x in 0..src_h {
                pixels.push(self.pixels[x * src_w + (src_w - 1 - y)]);
            }
        }
        Self {
            width: src_h,
            height: src_w,
            pixels,
        }
    }

    /// Push the whole buffer to another draw target in one contiguous fill.
    pub fn flush<D>(&self, display: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        debug!(" Flushing {}x{} frame", self.width, self.height);
        let area = Rectangle::new(Point::zero(), self.size());
        display.fill_contiguous(&area, self.pixels.iter().copied())
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (w, h) = (self.width, self.height);

        for Pixel(coord, color) in pixels {
            let x = coord.x;
            let y = coord.y;
            if x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < h {
                self.set_pixel(x as usize, y as usize, color);
            }
        }
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let (w, h) = (self.width as i64, self.height as i64);
        let origin_x = area.top_left.x as i64;
        let origin_y = area.top_left.y as i64;
        let area_w = area.size.width as i64;

        // Colors arrive row-major over the whole area, including clipped parts.
        for (i, color) in colors
            .into_iter()
            .take(area.size.width as usize * area.size.height as usize)
            .enumerate()
        {
            let x = origin_x + i as i64 % area_w;
            let y = origin_y + i as i64 / area_w;
            if (0..w).contains(&x) && (0..h).contains(&y) {
                self.set_pixel(x as usize, y as usize, color);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let (w, h) = (self.width, self.height);

        let x_start = (area.top_left.x.max(0) as usize).min(w);
        let y_start = (area.top_left.y.max(0) as usize).min(h);
        let x_end = ((area.top_left.x.max(0) as usize).saturating_add(area.size.width as usize)).min(w);
        let y_end =
            ((area.top_left.y.max(0) as usize).saturating_add(area.size.height as usize)).min(h);

        for y in y_start..y_end {
            for x in x_start..x_end {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.pixels.fill(color);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_clips_outside_pixels() {
        let mut frame = FrameBuffer::new(4, 3, Rgb888::WHITE);
        let Ok(()) = frame.draw_iter([
            Pixel(Point::new(1, 1), Rgb888::BLACK),
            Pixel(Point::new(-1, 0), Rgb888::BLACK),
            Pixel(Point::new(4, 0), Rgb888::BLACK),
        ]);
        assert_eq!(frame.pixel(1, 1), Some(Rgb888::BLACK));
        assert_eq!(frame.pixel(0, 0), Some(Rgb888::WHITE));
        assert_eq!(frame.pixel(4, 0), None);
    }

    #[test]
    fn test_paste_clips_to_buffer() {
        let mut frame = FrameBuffer::new(3, 3, Rgb888::WHITE);
        let red = RgbImage::from_pixel(2, 2, image::Rgb([255, 0, 0]));
        frame.paste(&red, Point::new(2, 2));

        assert_eq!(frame.pixel(2, 2), Some(Rgb888::RED));
        assert_eq!(frame.pixel(1, 1), Some(Rgb888::WHITE));
    }

    #[test]
    fn test_rotation_is_counter_clockwise() {
        // 3 wide, 2 tall, top-right corner marked.
        let mut frame = FrameBuffer::new(3, 2, Rgb888::WHITE);
        let Ok(()) = frame.draw_iter([Pixel(Point::new(2, 0), Rgb888::BLACK)]);

        let rotated = frame.rotated_ccw();
        assert_eq!((rotated.width(), rotated.height()), (2, 3));
        // Counter-clockwise turn brings the top-right corner to the top-left.
        assert_eq!(rotated.pixel(0, 0), Some(Rgb888::BLACK));
        assert_eq!(rotated.pixel(1, 2), Some(Rgb888::WHITE));
    }

    #[test]
    fn test_image_round_trip_preserves_pixels() {
        let mut frame = FrameBuffer::new(5, 4, Rgb888::WHITE);
        let Ok(()) = frame.fill_solid(
            &Rectangle::new(Point::new(1, 1), Size::new(2, 2)),
            Rgb888::BLUE,
        );
        assert_eq!(FrameBuffer::from_image(&frame.to_image()), frame);
    }

    #[test]
    fn test_flush_copies_every_pixel() {
        let mut source = FrameBuffer::new(3, 3, Rgb888::WHITE);
        let Ok(()) = source.draw_iter([Pixel(Point::new(2, 1), Rgb888::GREEN)]);

        let mut target = FrameBuffer::new(3, 3, Rgb888::BLACK);
        let Ok(()) = source.flush(&mut target);
        assert_eq!(target, source);
    }
}
