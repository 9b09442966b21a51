//! Output aspect ratios and the pixel resolutions they map to.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aspect ratio the user can pick for the generated video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectRatio {
    /// Widescreen (16:9), the default
    #[default]
    #[serde(rename = "16:9")]
    Landscape16x9,
    /// Vertical (9:16) for phone screens
    #[serde(rename = "9:16")]
    Portrait9x16,
    /// Square (1:1)
    #[serde(rename = "1:1")]
    Square1x1,
}

impl AspectRatio {
    pub const ALL: &'static [AspectRatio] = &[
        AspectRatio::Landscape16x9,
        AspectRatio::Portrait9x16,
        AspectRatio::Square1x1,
    ];

    /// Parse any user-supplied string.
    ///
    /// Never fails: anything other than `9:16` or `1:1` (including `None`)
    /// resolves to landscape.
    pub fn from_lenient(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("9:16") => AspectRatio::Portrait9x16,
            Some("1:1") => AspectRatio::Square1x1,
            _ => AspectRatio::Landscape16x9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Square1x1 => "1:1",
        }
    }

    /// Fixed pixel resolution used by backends that take explicit sizes.
    pub fn resolution(&self) -> Resolution {
        match self {
            AspectRatio::Portrait9x16 => Resolution::PORTRAIT,
            AspectRatio::Square1x1 => Resolution::SQUARE,
            AspectRatio::Landscape16x9 => Resolution::LANDSCAPE,
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit output size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const PORTRAIT: Resolution = Resolution::new(480, 832);
    pub const SQUARE: Resolution = Resolution::new(640, 640);
    pub const LANDSCAPE: Resolution = Resolution::new(832, 480);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Aspect ratio this resolution was derived from.
    pub fn aspect_ratio(&self) -> AspectRatio {
        match *self {
            Resolution::PORTRAIT => AspectRatio::Portrait9x16,
            Resolution::SQUARE => AspectRatio::Square1x1,
            _ => AspectRatio::Landscape16x9,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl Serialize for Resolution {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ratios() {
        assert_eq!(AspectRatio::from_lenient(Some("9:16")), AspectRatio::Portrait9x16);
        assert_eq!(AspectRatio::from_lenient(Some("1:1")), AspectRatio::Square1x1);
        assert_eq!(AspectRatio::from_lenient(Some("16:9")), AspectRatio::Landscape16x9);
        assert_eq!(AspectRatio::from_lenient(None), AspectRatio::Landscape16x9);
    }

    #[test]
    fn test_unknown_ratios_fall_back_to_landscape() {
        for input in ["", "4:3", "21:9", "portrait", "9:16:1", "１:１", "\u{0}", "16 : 9"] {
            let ratio = AspectRatio::from_lenient(Some(input));
            assert_eq!(ratio, AspectRatio::Landscape16x9, "input {:?}", input);
            assert_eq!(ratio.resolution(), Resolution::LANDSCAPE);
        }
    }

    #[test]
    fn test_resolution_table_is_closed() {
        let known = [Resolution::PORTRAIT, Resolution::SQUARE, Resolution::LANDSCAPE];
        for ratio in AspectRatio::ALL {
            let resolution = ratio.resolution();
            assert!(known.contains(&resolution));
            assert_eq!(resolution.aspect_ratio(), *ratio);
        }
    }

    #[test]
    fn test_resolution_display() {
        assert_eq!(Resolution::PORTRAIT.to_string(), "480x832");
        assert_eq!(Resolution::SQUARE.to_string(), "640x640");
        assert_eq!(Resolution::LANDSCAPE.to_string(), "832x480");
    }
}
