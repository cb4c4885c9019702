//! The five in-game ink colors and nearest-color classification.
//!
//! Matching is done in CIE Lab space against the colors as they appear on the
//! device (`reference`), never against the user-tweakable preview colors.

use std::sync::Arc;

use ::palette::{FromColor, Lab, LinSrgb, Srgb};
use image::Rgb;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorName {
    Blue,
    Red,
    Yellow,
    Black,
    White,
}

impl ColorName {
    /// Declaration order; ties during classification go to the earlier entry.
    pub const ALL: [ColorName; 5] = [
        ColorName::Blue,
        ColorName::Red,
        ColorName::Yellow,
        ColorName::Black,
        ColorName::White,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ColorName::Blue => "blue",
            ColorName::Red => "red",
            ColorName::Yellow => "yellow",
            ColorName::Black => "black",
            ColorName::White => "white",
        }
    }

    /// White is the canvas background and is never drawn.
    pub fn is_skip(self) -> bool {
        self == ColorName::White
    }

    /// Color as rendered in-game.
    pub fn reference(self) -> Rgb<u8> {
        match self {
            ColorName::Blue => Rgb([123, 210, 217]),
            ColorName::Red => Rgb([253, 169, 153]),
            ColorName::Yellow => Rgb([228, 219, 26]),
            ColorName::Black => Rgb([0, 0, 0]),
            ColorName::White => Rgb([255, 255, 255]),
        }
    }

    /// Screen coordinate of the color's selector button.
    pub fn picker_position(self) -> Option<ScreenPoint> {
        match self {
            ColorName::Blue => Some(ScreenPoint::new(609, 80)),
            ColorName::Red => Some(ScreenPoint::new(670, 80)),
            ColorName::Yellow => Some(ScreenPoint::new(730, 80)),
            ColorName::Black => Some(ScreenPoint::new(540, 80)),
            ColorName::White => None,
        }
    }
}

impl std::fmt::Display for ColorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Absolute touch coordinate on the device screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// User-facing preview colors, one per ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayColors {
    pub red: [u8; 3],
    pub blue: [u8; 3],
    pub yellow: [u8; 3],
    pub black: [u8; 3],
    pub white: [u8; 3],
}

impl Default for DisplayColors {
    fn default() -> Self {
        Self {
            red: [255, 204, 204],
            blue: [173, 216, 230],
            yellow: [255, 255, 208],
            black: [38, 38, 38],
            white: [255, 255, 255],
        }
    }
}

impl DisplayColors {
    pub fn get(&self, name: ColorName) -> Rgb<u8> {
        Rgb(match name {
            ColorName::Red => self.red,
            ColorName::Blue => self.blue,
            ColorName::Yellow => self.yellow,
            ColorName::Black => self.black,
            ColorName::White => self.white,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaletteColor {
    pub name: ColorName,
    pub display: Rgb<u8>,
    pub reference: Rgb<u8>,
    pub picker: Option<ScreenPoint>,
}

impl PaletteColor {
    pub fn is_skip(&self) -> bool {
        self.name.is_skip()
    }
}

/// CIE L*a*b* of an 8-bit sRGB color, D65 white point.
pub fn lab_of(rgb: Rgb<u8>) -> Lab {
    let [r, g, b] = rgb.0;
    let srgb: Srgb<f32> = Srgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let linear: LinSrgb<f32> = srgb.into_linear();
    Lab::from_color(linear)
}

/// CIE76 delta E.
pub fn delta_e(x: &Lab, y: &Lab) -> f32 {
    let dl = x.l - y.l;
    let da = x.a - y.a;
    let db = x.b - y.b;
    (dl * dl + da * da + db * db).sqrt()
}

/// Index of the reference closest to `lab`. On equal distance the earlier
/// index wins.
pub fn nearest(lab: &Lab, references: &[Lab]) -> usize {
    let mut best = 0;
    let mut smallest = f32::MAX;
    for (idx, reference) in references.iter().enumerate() {
        let delta = delta_e(lab, reference);
        if delta < smallest {
            smallest = delta;
            best = idx;
        }
    }
    best
}

static REFERENCE_LAB: Lazy<[Lab; 5]> = Lazy::new(|| ColorName::ALL.map(|name| lab_of(name.reference())));

/// Immutable set of ink colors for one session.
#[derive(Debug, Clone)]
pub struct Palette {
    entries: Vec<Arc<PaletteColor>>,
}

impl Palette {
    pub fn new(display: &DisplayColors) -> Self {
        let entries = ColorName::ALL
            .iter()
            .map(|&name| {
                Arc::new(PaletteColor {
                    name,
                    display: display.get(name),
                    reference: name.reference(),
                    picker: name.picker_position(),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[Arc<PaletteColor>] {
        &self.entries
    }

    pub fn get(&self, name: ColorName) -> &Arc<PaletteColor> {
        // Entries are built from ColorName::ALL, so the index always exists.
        &self.entries[name as usize]
    }

    /// Nearest palette entry by Lab distance. The first minimum wins.
    pub fn classify(&self, rgb: Rgb<u8>) -> &Arc<PaletteColor> {
        let idx = nearest(&lab_of(rgb), &REFERENCE_LAB[..]);
        &self.entries[idx]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(&DisplayColors::default())
    }
}
