use trellis::ColorRGB;

use crate::BACKGROUND;

/// Channel tolerance used unless [`PixelExpectation::with_tolerance`] overrides it.
const DEFAULT_TOLERANCE: u8 = 5;

/// The color one output pixel should have after the scene is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelExpectation {
    pub x: u32,
    pub y: u32,
    pub rgba: [u8; 4],
    /// Largest per-channel difference still accepted.
    pub tolerance: u8,
    /// Shown in failure messages.
    pub label: &'static str,
}

impl PixelExpectation {
    pub fn new(x: u32, y: u32, rgba: [u8; 4], label: &'static str) -> Self {
        Self {
            x,
            y,
            rgba,
            tolerance: DEFAULT_TOLERANCE,
            label,
        }
    }

    pub fn opaque(x: u32, y: u32, r: u8, g: u8, b: u8, label: &'static str) -> Self {
        Self::new(x, y, [r, g, b, 255], label)
    }

    /// Nothing was drawn here: the pixel keeps the clear color.
    pub fn background(x: u32, y: u32, label: &'static str) -> Self {
        let ColorRGB { r, g, b } = BACKGROUND;
        Self::opaque(x, y, r, g, b, label)
    }

    pub fn with_tolerance(mut self, tolerance: u8) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn accepts(&self, actual: [u8; 4]) -> bool {
        self.rgba
            .iter()
            .zip(actual)
            .all(|(&expected, actual)| expected.abs_diff(actual) <= self.tolerance)
    }
}

/// Checks `expectations` against a `width` x `height` frame of tightly packed RGBA8 rows, top
/// row first, such as `WgpuBackend::read_pixels` returns.
///
/// Returns one message per failed expectation.
pub fn check_pixels(
    pixels: &[u8],
    width: u32,
    height: u32,
    expectations: &[PixelExpectation],
) -> Vec<String> {
    expectations
        .iter()
        .filter_map(|expectation| {
            let PixelExpectation { x, y, label, .. } = *expectation;
            if x >= width || y >= height {
                return Some(format!(
                    "[{label}] ({x},{y}) lies outside the {width}x{height} canvas"
                ));
            }

            let offset = (y as usize * width as usize + x as usize) * 4;
            let Some(actual) = pixels
                .get(offset..offset + 4)
                .and_then(|pixel| <[u8; 4]>::try_from(pixel).ok())
            else {
                return Some(format!(
                    "[{label}] ({x},{y}) is past the end of a {} byte frame",
                    pixels.len()
                ));
            };

            (!expectation.accepts(actual)).then(|| {
                format!(
                    "[{label}] ({x},{y}) expected {:?} ±{} but found {actual:?}",
                    expectation.rgba, expectation.tolerance
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixels_within_tolerance_pass() {
        let pixels = [10, 20, 30, 255, 0, 0, 0, 0];
        let expectations = [
            PixelExpectation::opaque(0, 0, 12, 18, 30, "first"),
            PixelExpectation::new(1, 0, [0, 0, 0, 0], "second"),
        ];
        assert!(check_pixels(&pixels, 2, 1, &expectations).is_empty());
    }

    #[test]
    fn wrong_colors_and_positions_outside_the_canvas_fail() {
        let pixels = [255, 0, 0, 255];
        let expectations = [
            PixelExpectation::opaque(0, 0, 0, 0, 255, "wrong_color").with_tolerance(0),
            PixelExpectation::background(3, 0, "outside"),
        ];
        let failures = check_pixels(&pixels, 1, 1, &expectations);
        assert_eq!(failures.len(), 2);
        assert!(failures[0].contains("wrong_color"));
        assert!(failures[1].contains("outside the 1x1 canvas"));
    }

    #[test]
    fn short_frames_are_reported() {
        let failures = check_pixels(&[0; 4], 2, 1, &[PixelExpectation::background(1, 0, "short")]);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("past the end"));
    }
}
