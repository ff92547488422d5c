//! Page compositing: illustration on top, reflowed text below.
//!
//! Layout of the portrait page (before rotation for the panel):
//!
//! ```text
//! +-----------------+  y = 0
//! |                 |
//! |  illustration   |  448 x 448
//! |                 |
//! +-----------------+  y = 448
//! |  text band      |  text origin (7, 450)
//! +-----------------+  y = 600
//! ```

use std::io::BufReader;
use std::path::Path;

use embedded_graphics::mono_font::{MonoFont, MonoTextStyle, iso_8859_1::FONT_8X13};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use image::imageops::FilterType;
use image::{ImageFormat, ImageReader, RgbImage};

use crate::error::StoryError;
use crate::framebuffer::FrameBuffer;
use crate::persistence::write_file_atomic;
use crate::reflow::wrap;

/// Portrait page width in pixels.
pub const PAGE_WIDTH_PX: u32 = 448;

/// Portrait page height in pixels.
pub const PAGE_HEIGHT_PX: u32 = 600;

/// Edge length of the square illustration region.
pub const ILLUSTRATION_SIZE_PX: u32 = 448;

/// Top-left corner of the first text line.
pub const TEXT_ORIGIN: Point = Point::new(7, 450);

/// Column limit for page text; sized so a full line of the page font fits
/// between the text origin and the right edge.
pub const TEXT_COLUMNS: usize = 53;

/// Fixed font used for page text. Covers Latin-1; see [`to_page_charset`].
pub const PAGE_FONT: &MonoFont<'static> = &FONT_8X13;

/// Decode an illustration and scale it to the square illustration region.
pub fn load_illustration(path: &Path) -> Result<RgbImage, StoryError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image
        .resize_exact(ILLUSTRATION_SIZE_PX, ILLUSTRATION_SIZE_PX, FilterType::CatmullRom)
        .to_rgb8())
}

/// Replace typographic punctuation the page font lacks with ASCII look-alikes.
///
/// Anything else outside Latin-1 is left alone and drawn as the font's
/// replacement glyph.
pub fn to_page_charset(text: &str) -> String {
    let mut mapped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => mapped.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => mapped.push('"'),
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' | '\u{2212}' => {
                mapped.push('-')
            }
            '\u{2026}' => mapped.push_str("..."),
            '\u{2022}' => mapped.push('*'),
            '\u{2002}'..='\u{200A}' | '\u{202F}' => mapped.push(' '),
            '\u{200B}' | '\u{FEFF}' => {}
            other => mapped.push(other),
        }
    }
    mapped
}

/// Composite one portrait page. A missing illustration leaves its region white.
pub fn compose_page(text: &str, illustration: Option<&RgbImage>) -> FrameBuffer {
    let mut page = FrameBuffer::new(PAGE_WIDTH_PX, PAGE_HEIGHT_PX, Rgb888::WHITE);

    if let Some(illustration) = illustration {
        page.paste(illustration, Point::zero());
    }

    let wrapped = wrap(&to_page_charset(text), TEXT_COLUMNS);
    let style = MonoTextStyle::new(PAGE_FONT, Rgb888::BLACK);
    let Ok(_) = Text::with_baseline(&wrapped, TEXT_ORIGIN, style, Baseline::Top).draw(&mut page);

    page
}

/// Orientation the panel expects: the portrait page turned 90°.
pub fn for_display(page: &FrameBuffer) -> FrameBuffer {
    page.rotated_ccw()
}

/// Save a frame as PNG, replacing any previous file in one step.
pub fn save_png(frame: &FrameBuffer, path: &Path) -> Result<(), StoryError> {
    let image = frame.to_image();
    write_file_atomic(path, |file| {
        image.write_to(file, ImageFormat::Png)?;
        Ok(())
    })
}

/// Load a previously saved frame.
pub fn load_png(path: &Path) -> Result<FrameBuffer, StoryError> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let image = image::load(reader, ImageFormat::Png)?.to_rgb8();
    Ok(FrameBuffer::from_image(&image))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_dark(frame: &FrameBuffer, rows: core::ops::Range<u32>) -> usize {
        rows.flat_map(|y| (0..frame.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.pixel(x, y) == Some(Rgb888::BLACK))
            .count()
    }

    #[test]
    fn test_text_lands_in_text_band() {
        let page = compose_page("The moon sang to the sleeping sea.", None);

        assert_eq!((page.width(), page.height()), (PAGE_WIDTH_PX, PAGE_HEIGHT_PX));
        assert_eq!(count_dark(&page, 0..ILLUSTRATION_SIZE_PX), 0);
        assert!(count_dark(&page, ILLUSTRATION_SIZE_PX..PAGE_HEIGHT_PX) > 0);
    }

    #[test]
    fn test_illustration_fills_top_square() {
        let green = RgbImage::from_pixel(
            ILLUSTRATION_SIZE_PX,
            ILLUSTRATION_SIZE_PX,
            image::Rgb([0, 255, 0]),
        );
        let page = compose_page("", Some(&green));

        assert_eq!(page.pixel(0, 0), Some(Rgb888::GREEN));
        assert_eq!(page.pixel(447, 447), Some(Rgb888::GREEN));
        assert_eq!(page.pixel(0, 448), Some(Rgb888::WHITE));
    }

    #[test]
    fn test_long_text_is_wrapped_inside_the_page() {
        let text = "word ".repeat(80);
        let page = compose_page(&text, None);
        // Nothing drawn in the right margin beyond the last column.
        let right_edge = TEXT_ORIGIN.x as u32 + TEXT_COLUMNS as u32 * PAGE_FONT.character_size.width;
        for y in ILLUSTRATION_SIZE_PX..PAGE_HEIGHT_PX {
            for x in right_edge..PAGE_WIDTH_PX {
                assert_eq!(page.pixel(x, y), Some(Rgb888::WHITE));
            }
        }
    }

    #[test]
    fn test_typographic_punctuation_is_mapped() {
        assert_eq!(
            to_page_charset("\u{201C}Wait\u{2026}\u{201D} she said \u{2014} it\u{2019}s late."),
            "\"Wait...\" she said - it's late."
        );
        assert_eq!(to_page_charset("caf\u{e9} na\u{ef}ve"), "caf\u{e9} na\u{ef}ve");
    }

    #[test]
    fn test_accented_letters_have_their_own_glyph() {
        let accented = compose_page("\u{e9}", None);
        let unknown = compose_page("?", None);
        assert_ne!(accented, unknown);
    }

    #[test]
    fn test_curly_quotes_render_like_straight_ones() {
        assert_eq!(
            compose_page("\u{2018}hi\u{2019}", None),
            compose_page("'hi'", None)
        );
    }

    #[test]
    fn test_display_orientation_is_landscape() {
        let landscape = for_display(&compose_page("", None));
        assert_eq!((landscape.width(), landscape.height()), (PAGE_HEIGHT_PX, PAGE_WIDTH_PX));
    }

    #[test]
    fn test_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_1.png");
        let page = compose_page("Hello", None);

        save_png(&page, &path).unwrap();
        assert_eq!(load_png(&path).unwrap(), page);
    }

    #[test]
    fn test_load_illustration_scales_to_square() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_1_image.png");
        RgbImage::from_pixel(64, 32, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let illustration = load_illustration(&path).unwrap();
        assert_eq!(illustration.dimensions(), (448, 448));
    }

    #[test]
    fn test_load_illustration_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(load_illustration(&path).is_err());
    }
}
