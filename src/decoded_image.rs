use std::path::Path;

use crate::error::ImageLoadError;

/// Tightly packed RGBA8 pixels produced by the `image` crate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wraps already decoded RGBA pixels.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ImageLoadError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(ImageLoadError::PixelLength {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A `width` x `height` image filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba.repeat(width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageLoadError> {
        let mut image = Self::empty();
        image.load(path)?;
        Ok(image)
    }

    pub fn from_memory(bytes: &[u8]) -> Result<Self, ImageLoadError> {
        let mut image = Self::empty();
        image.load_from_memory(bytes)?;
        Ok(image)
    }

    /// Decodes the file at `path`, replacing the current contents. On failure the image is left
    /// empty.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), ImageLoadError> {
        let path = path.as_ref();
        let decoded = image::open(path);
        self.replace_with(decoded).inspect_err(|error| {
            tracing::warn!("Failed to load image {}: {error}", path.display());
        })
    }

    /// Like [`DecodedImage::load`], for encoded bytes already in memory.
    pub fn load_from_memory(&mut self, bytes: &[u8]) -> Result<(), ImageLoadError> {
        self.replace_with(image::load_from_memory(bytes))
    }

    fn replace_with(
        &mut self,
        decoded: image::ImageResult<image::DynamicImage>,
    ) -> Result<(), ImageLoadError> {
        match decoded {
            Ok(decoded) => {
                let rgba = decoded.into_rgba8();
                self.width = rgba.width();
                self.height = rgba.height();
                self.pixels = rgba.into_raw();
                Ok(())
            }
            Err(error) => {
                *self = Self::empty();
                Err(error.into())
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let buffer = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut bytes = std::io::Cursor::new(Vec::new());
        buffer
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn decodes_png_from_memory_into_rgba() {
        let image = DecodedImage::from_memory(&encoded_png(3, 2, [10, 20, 30, 255])).unwrap();
        assert_eq!((image.width(), image.height()), (3, 2));
        assert_eq!(image.pixels().len(), 3 * 2 * 4);
        assert_eq!(&image.pixels()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn failed_load_resets_to_empty() {
        let mut image = DecodedImage::solid(4, 4, [255; 4]);
        assert!(image.load_from_memory(b"definitely not an image").is_err());
        assert!(image.is_empty());
        assert!(image.pixels().is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut image = DecodedImage::solid(1, 1, [0; 4]);
        assert!(image.load("/nonexistent/trellis/image.png").is_err());
        assert_eq!(image, DecodedImage::empty());
    }

    #[test]
    fn from_rgba_checks_pixel_length() {
        let error = DecodedImage::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            error,
            ImageLoadError::PixelLength {
                expected: 16,
                actual: 15,
                ..
            }
        ));
    }
}
