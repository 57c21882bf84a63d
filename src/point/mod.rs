//! Point formats and the attributes they carry.

mod codec;
mod format;

pub use self::codec::{LasDimensions, PointCodec};
pub use self::format::Format;

/// A RGB color value, normalized to 16 bits per channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
    /// Red channel.
    pub red: u16,

    /// Green channel.
    pub green: u16,

    /// Blue channel.
    pub blue: u16,
}

impl Color {
    /// Creates a new color.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::Color;
    /// let color = Color::new(1, 2, 3);
    /// assert_eq!((1, 2, 3), (color.red, color.green, color.blue));
    /// ```
    pub fn new(red: u16, green: u16, blue: u16) -> Color {
        Color { red, green, blue }
    }
}
