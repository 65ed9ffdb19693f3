use regex::Regex;
use std::sync::OnceLock;

fn hex_color_regex() -> &'static Regex {
    static HEX_COLOR: OnceLock<Regex> = OnceLock::new();
    HEX_COLOR.get_or_init(|| {
        Regex::new(r"^#([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$").unwrap()
    })
}

fn parse_hex_channels(hex: &str) -> Option<[u8; 3]> {
    let captures = hex_color_regex().captures(hex)?;
    let mut channels = [0u8; 3];
    for (channel, capture) in channels.iter_mut().zip(captures.iter().skip(1)) {
        *channel = u8::from_str_radix(capture?.as_str(), 16).ok()?;
    }
    Some(channels)
}

/// An opaque 8-bit-per-channel color.
///
/// Used for text colors and the renderer's background color.
///
/// # Examples
///
/// ```
/// use trellis::ColorRGB;
///
/// let orange = ColorRGB::from_hex("#ff8000").unwrap();
/// assert_eq!(orange, ColorRGB::new(255, 128, 0));
///
/// // Anything other than `#RRGGBB` is rejected.
/// assert_eq!(ColorRGB::from_hex("ff8000"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColorRGB {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ColorRGB {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Creates a color and premultiplies it by `alpha`.
    pub fn with_alpha(r: u8, g: u8, b: u8, alpha: f32) -> Self {
        let mut color = Self::new(r, g, b);
        color.adjust_alpha(alpha);
        color
    }

    /// Parses a `#RRGGBB` string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let [r, g, b] = parse_hex_channels(hex)?;
        Some(Self::new(r, g, b))
    }

    /// Multiplies every channel by `alpha`, rounding to the nearest value.
    ///
    /// ```
    /// use trellis::ColorRGB;
    ///
    /// let mut color = ColorRGB::new(200, 100, 51);
    /// color.adjust_alpha(0.5);
    /// assert_eq!(color, ColorRGB::new(100, 50, 26));
    /// ```
    pub fn adjust_alpha(&mut self, alpha: f32) {
        let scale = |channel: u8| (alpha * channel as f32).round().clamp(0.0, 255.0) as u8;
        self.r = scale(self.r);
        self.g = scale(self.g);
        self.b = scale(self.b);
    }

    /// Packs the color as `0xRRGGBB`, the layout sprite tints use.
    pub fn to_packed(&self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    pub fn from_packed(packed: u32) -> Self {
        Self::new(
            (packed >> 16 & 0xFF) as u8,
            (packed >> 8 & 0xFF) as u8,
            (packed & 0xFF) as u8,
        )
    }

    /// Channels normalized to `[0.0, 1.0]`.
    pub fn normalize(&self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

/// A floating point color with alpha, channels in `[0.0, 1.0]`.
///
/// # Examples
///
/// ```
/// use trellis::{ColorRGB, ColorRGBA};
///
/// let white: ColorRGBA = ColorRGB::WHITE.into();
/// assert_eq!(white.to_array(), [1.0, 1.0, 1.0, 1.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorRGBA {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for ColorRGBA {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }
}

impl ColorRGBA {
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parses a `#RRGGBB` string into an opaque color.
    pub fn from_hex(hex: &str) -> Option<Self> {
        ColorRGB::from_hex(hex).map(Self::from)
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<ColorRGB> for ColorRGBA {
    fn from(color: ColorRGB) -> Self {
        let [r, g, b] = color.normalize();
        Self::new(r, g, b, 1.0)
    }
}

/// Packs a `0xRRGGBB` tint and an alpha into the little-endian RGBA word the sprite vertex
/// layout reads as four normalized bytes.
///
/// Red and blue trade places so that the lowest byte in memory is red; the alpha, rounded to
/// 8 bits, lands in the top byte.
///
/// ```
/// use trellis::color::pack_tint;
///
/// assert_eq!(pack_tint(0x112233, 1.0), 0xFF332211);
/// assert_eq!(pack_tint(0xFFFFFF, 0.0), 0x00FFFFFF);
/// ```
pub fn pack_tint(tint: u32, alpha: f32) -> u32 {
    let alpha = (alpha * 255.0).round().clamp(0.0, 255.0) as u32;
    (tint >> 16 & 0xFF) | ((tint & 0xFF) << 16) | (tint & 0xFF00) | (alpha << 24)
}
