//! Colors, the named-color table, and color text parsing

use crate::error::{CompilerError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    pub fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    pub fn to_argb(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Parse `#RGB`, `#ARGB`, `#RRGGBB`, `#AARRGGBB`, `sc#r,g,b` or `sc#a,r,g,b`
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();

        if HEX_COLOR_REGEX.is_match(trimmed) {
            return parse_hex(&trimmed[1..]).ok_or_else(|| invalid_color(text));
        }
        if let Some(rest) = trimmed.strip_prefix("sc#") {
            return parse_sc_rgb(rest).ok_or_else(|| invalid_color(text));
        }
        if let Some(known) = KnownColor::from_name(trimmed) {
            return Ok(known.color());
        }
        Err(invalid_color(text))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
    }
}

static HEX_COLOR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([0-9A-Fa-f]{3,4}|[0-9A-Fa-f]{6}|[0-9A-Fa-f]{8})$").unwrap());

fn invalid_color(text: &str) -> CompilerError {
    CompilerError::InvalidFormat {
        message: format!("'{}' is not a valid color", text),
    }
}

fn parse_hex(digits: &str) -> Option<Color> {
    let nibble = |i: usize| u8::from_str_radix(&digits[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();

    match digits.len() {
        3 => Some(Color::new(0xFF, nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Color::new(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Color::new(0xFF, byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn parse_sc_rgb(components: &str) -> Option<Color> {
    let values: Vec<f64> = components
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;

    let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match values.as_slice() {
        [r, g, b] => Some(Color::new(0xFF, channel(*r), channel(*g), channel(*b))),
        [a, r, g, b] => Some(Color::new(channel(*a), channel(*r), channel(*g), channel(*b))),
        _ => None,
    }
}

macro_rules! known_colors {
    ($($name:ident = $argb:expr),* $(,)?) => {
        /// Named colors. Each entry's ARGB value doubles as the id written
        /// into brush payloads.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum KnownColor {
            $($name),*
        }

        const KNOWN_COLORS: &[(KnownColor, &str, u32)] = &[
            $((KnownColor::$name, stringify!($name), $argb)),*
        ];
    };
}

known_colors! {
    AliceBlue = 0xFFF0F8FF, AntiqueWhite = 0xFFFAEBD7, Aqua = 0xFF00FFFF,
    Aquamarine = 0xFF7FFFD4, Azure = 0xFFF0FFFF, Beige = 0xFFF5F5DC,
    Bisque = 0xFFFFE4C4, Black = 0xFF000000, BlanchedAlmond = 0xFFFFEBCD,
    Blue = 0xFF0000FF, BlueViolet = 0xFF8A2BE2, Brown = 0xFFA52A2A,
    BurlyWood = 0xFFDEB887, CadetBlue = 0xFF5F9EA0, Chartreuse = 0xFF7FFF00,
    Chocolate = 0xFFD2691E, Coral = 0xFFFF7F50, CornflowerBlue = 0xFF6495ED,
    Cornsilk = 0xFFFFF8DC, Crimson = 0xFFDC143C, Cyan = 0xFF00FFFF,
    DarkBlue = 0xFF00008B, DarkCyan = 0xFF008B8B, DarkGoldenrod = 0xFFB8860B,
    DarkGray = 0xFFA9A9A9, DarkGreen = 0xFF006400, DarkKhaki = 0xFFBDB76B,
    DarkMagenta = 0xFF8B008B, DarkOliveGreen = 0xFF556B2F, DarkOrange = 0xFFFF8C00,
    DarkOrchid = 0xFF9932CC, DarkRed = 0xFF8B0000, DarkSalmon = 0xFFE9967A,
    DarkSeaGreen = 0xFF8FBC8F, DarkSlateBlue = 0xFF483D8B, DarkSlateGray = 0xFF2F4F4F,
    DarkTurquoise = 0xFF00CED1, DarkViolet = 0xFF9400D3, DeepPink = 0xFFFF1493,
    DeepSkyBlue = 0xFF00BFFF, DimGray = 0xFF696969, DodgerBlue = 0xFF1E90FF,
    Firebrick = 0xFFB22222, FloralWhite = 0xFFFFFAF0, ForestGreen = 0xFF228B22,
    Fuchsia = 0xFFFF00FF, Gainsboro = 0xFFDCDCDC, GhostWhite = 0xFFF8F8FF,
    Gold = 0xFFFFD700, Goldenrod = 0xFFDAA520, Gray = 0xFF808080,
    Green = 0xFF008000, GreenYellow = 0xFFADFF2F, Honeydew = 0xFFF0FFF0,
    HotPink = 0xFFFF69B4, IndianRed = 0xFFCD5C5C, Indigo = 0xFF4B0082,
    Ivory = 0xFFFFFFF0, Khaki = 0xFFF0E68C, Lavender = 0xFFE6E6FA,
    LavenderBlush = 0xFFFFF0F5, LawnGreen = 0xFF7CFC00, LemonChiffon = 0xFFFFFACD,
    LightBlue = 0xFFADD8E6, LightCoral = 0xFFF08080, LightCyan = 0xFFE0FFFF,
    LightGoldenrodYellow = 0xFFFAFAD2, LightGreen = 0xFF90EE90, LightGray = 0xFFD3D3D3,
    LightPink = 0xFFFFB6C1, LightSalmon = 0xFFFFA07A, LightSeaGreen = 0xFF20B2AA,
    LightSkyBlue = 0xFF87CEFA, LightSlateGray = 0xFF778899, LightSteelBlue = 0xFFB0C4DE,
    LightYellow = 0xFFFFFFE0, Lime = 0xFF00FF00, LimeGreen = 0xFF32CD32,
    Linen = 0xFFFAF0E6, Magenta = 0xFFFF00FF, Maroon = 0xFF800000,
    MediumAquamarine = 0xFF66CDAA, MediumBlue = 0xFF0000CD, MediumOrchid = 0xFFBA55D3,
    MediumPurple = 0xFF9370DB, MediumSeaGreen = 0xFF3CB371, MediumSlateBlue = 0xFF7B68EE,
    MediumSpringGreen = 0xFF00FA9A, MediumTurquoise = 0xFF48D1CC, MediumVioletRed = 0xFFC71585,
    MidnightBlue = 0xFF191970, MintCream = 0xFFF5FFFA, MistyRose = 0xFFFFE4E1,
    Moccasin = 0xFFFFE4B5, NavajoWhite = 0xFFFFDEAD, Navy = 0xFF000080,
    OldLace = 0xFFFDF5E6, Olive = 0xFF808000, OliveDrab = 0xFF6B8E23,
    Orange = 0xFFFFA500, OrangeRed = 0xFFFF4500, Orchid = 0xFFDA70D6,
    PaleGoldenrod = 0xFFEEE8AA, PaleGreen = 0xFF98FB98, PaleTurquoise = 0xFFAFEEEE,
    PaleVioletRed = 0xFFDB7093, PapayaWhip = 0xFFFFEFD5, PeachPuff = 0xFFFFDAB9,
    Peru = 0xFFCD853F, Pink = 0xFFFFC0CB, Plum = 0xFFDDA0DD,
    PowderBlue = 0xFFB0E0E6, Purple = 0xFF800080, Red = 0xFFFF0000,
    RosyBrown = 0xFFBC8F8F, RoyalBlue = 0xFF4169E1, SaddleBrown = 0xFF8B4513,
    Salmon = 0xFFFA8072, SandyBrown = 0xFFF4A460, SeaGreen = 0xFF2E8B57,
    SeaShell = 0xFFFFF5EE, Sienna = 0xFFA0522D, Silver = 0xFFC0C0C0,
    SkyBlue = 0xFF87CEEB, SlateBlue = 0xFF6A5ACD, SlateGray = 0xFF708090,
    Snow = 0xFFFFFAFA, SpringGreen = 0xFF00FF7F, SteelBlue = 0xFF4682B4,
    Tan = 0xFFD2B48C, Teal = 0xFF008080, Thistle = 0xFFD8BFD8,
    Tomato = 0xFFFF6347, Transparent = 0x00FFFFFF, Turquoise = 0xFF40E0D0,
    Violet = 0xFFEE82EE, Wheat = 0xFFF5DEB3, White = 0xFFFFFFFF,
    WhiteSmoke = 0xFFF5F5F5, Yellow = 0xFFFFFF00, YellowGreen = 0xFF9ACD32,
}

impl KnownColor {
    /// Case-insensitive lookup of a color name
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        KNOWN_COLORS
            .iter()
            .find(|(_, known, _)| known.eq_ignore_ascii_case(name))
            .map(|(color, _, _)| *color)
    }

    /// First named color with this ARGB id. Aliases (`Aqua`/`Cyan`,
    /// `Fuchsia`/`Magenta`) share an id and resolve to the first entry.
    pub fn from_id(id: u32) -> Option<Self> {
        KNOWN_COLORS
            .iter()
            .find(|(_, _, argb)| *argb == id)
            .map(|(color, _, _)| *color)
    }

    pub fn id(self) -> u32 {
        self.entry().2
    }

    pub fn name(self) -> &'static str {
        self.entry().1
    }

    pub fn color(self) -> Color {
        Color::from_argb(self.id())
    }

    fn entry(self) -> &'static (KnownColor, &'static str, u32) {
        // Table order matches declaration order
        &KNOWN_COLORS[self as usize]
    }
}
