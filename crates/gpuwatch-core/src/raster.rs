//! Braille rasterizer.
//!
//! Each terminal cell is a Unicode braille glyph: a 2-wide, 4-tall dot
//! matrix. A `w × h` grid therefore plots `2w` points at `4h` vertical
//! levels.
//!
//! ```text
//!   dot bits        one cell = two data columns
//!   0x01  0x08        col 2c   col 2c+1
//!   0x02  0x10
//!   0x04  0x20
//!   0x40  0x80
//! ```
//!
//! Vertical position shows the *shape* of the series (normalized by its own
//! min/max). Color shows *magnitude*: each cell is graded by the larger of
//! its two raw values against a fixed reference range, so a flat series
//! sitting at 95 % still lights up red.

use serde::{Deserialize, Serialize};

/// First code point of the braille block (no dots raised).
pub const BRAILLE_BLANK: char = '\u{2800}';

const BRAILLE_OFFSET: u32 = 0x2800;

/// Dot bits indexed by `[dot_row][side]`, dot_row 0 at the top.
const BRAILLE_DOTS: [[u8; 2]; 4] = [
    [0x01, 0x08], // dots 1, 4
    [0x02, 0x10], // dots 2, 5
    [0x04, 0x20], // dots 3, 6
    [0x40, 0x80], // dots 7, 8
];

const SPARK_BLOCKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

// ---------------------------------------------------------------------------
// Render options
// ---------------------------------------------------------------------------

/// How data points become dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Area under the curve.
    #[default]
    Filled,
    /// Curve only, with vertical runs joining unequal neighbours.
    Line,
}

impl RenderMode {
    pub fn toggle(self) -> Self {
        match self {
            Self::Filled => Self::Line,
            Self::Line => Self::Filled,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Filled => "filled",
            Self::Line => "line",
        }
    }
}

/// Magnitude bucket for coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Low,
    Mid,
    High,
}

impl Tier {
    /// Below 50 % low, below 75 % mid, otherwise high.
    pub fn from_fraction(fraction: f64) -> Self {
        if fraction < 0.5 {
            Self::Low
        } else if fraction < 0.75 {
            Self::Mid
        } else {
            Self::High
        }
    }
}

/// Reference range a metric's raw values are graded against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorScale {
    pub floor: f64,
    pub ceiling: f64,
}

impl ColorScale {
    pub const fn new(floor: f64, ceiling: f64) -> Self {
        Self { floor, ceiling }
    }

    /// Position of `value` in the range; not clamped.
    pub fn fraction(&self, value: f64) -> f64 {
        let span = self.ceiling - self.floor;
        if span > 0.0 {
            (value - self.floor) / span
        } else {
            0.0
        }
    }

    pub fn tier(&self, value: f64) -> Tier {
        Tier::from_fraction(self.fraction(value))
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A rasterized plot.
#[derive(Debug, Clone, PartialEq)]
pub enum Raster {
    /// Nothing to draw: empty input or a zero-sized target.
    NoData,
    Grid(Grid),
}

impl Raster {
    pub fn grid(&self) -> Option<&Grid> {
        match self {
            Self::Grid(g) => Some(g),
            Self::NoData => None,
        }
    }
}

/// `height` rows of `width` braille glyphs, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: Vec<String>,
    tiers: Option<Vec<Tier>>,
    width: usize,
}

impl Grid {
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Per-column magnitude tiers, when a color scale was supplied.
    pub fn tiers(&self) -> Option<&[Tier]> {
        self.tiers.as_deref()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Glyph at `(row, col)`, row 0 at the top.
    pub fn cell(&self, row: usize, col: usize) -> Option<char> {
        self.rows.get(row)?.chars().nth(col)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Map values to `[0, 1]` by their own min/max. A flat series maps to 0.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = if max > min { max - min } else { 1.0 };
    values.iter().map(|v| (v - min) / range).collect()
}

/// Source index for each of `target` output points.
///
/// Longer inputs are decimated to the nearest lower index `⌊i·n/target⌋`;
/// shorter inputs are left-padded with index 0 so the newest data stays on
/// the right edge.
pub fn resample_indices(n: usize, target: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    if n >= target {
        (0..target).map(|i| i * n / target).collect()
    } else {
        std::iter::repeat_n(0, target - n).chain(0..n).collect()
    }
}

/// Resample `values` to exactly `target` points.
pub fn resample(values: &[f64], target: usize) -> Vec<f64> {
    resample_indices(values.len(), target)
        .into_iter()
        .map(|i| values[i])
        .collect()
}

/// Rasterize `values` into a `width × height` braille grid.
///
/// With a `scale`, each column also gets a [`Tier`] from the larger of its
/// two raw values.
pub fn rasterize(
    values: &[f64],
    width: usize,
    height: usize,
    mode: RenderMode,
    scale: Option<&ColorScale>,
) -> Raster {
    if values.is_empty() || width == 0 || height == 0 {
        return Raster::NoData;
    }

    let points = width * 2;
    let indices = resample_indices(values.len(), points);
    let normalized = normalize(values);
    let raw: Vec<f64> = indices.iter().map(|&i| values[i]).collect();

    let top = (height * 4 - 1) as f64;
    let heights: Vec<usize> = indices
        .iter()
        .map(|&i| (normalized[i] * top).floor() as usize)
        .collect();

    let lit = |point: usize, pos: usize| -> bool {
        let y = heights[point];
        match mode {
            RenderMode::Filled => pos <= y,
            RenderMode::Line => {
                let prev = if point == 0 { y } else { heights[point - 1] };
                let (lo, hi) = (prev.min(y), prev.max(y));
                pos == y || (lo < pos && pos < hi)
            }
        }
    };

    let rows: Vec<String> = (0..height)
        .map(|row| {
            (0..width)
                .map(|col| {
                    let mut code = 0u8;
                    for (dot_row, bits) in BRAILLE_DOTS.iter().enumerate() {
                        let pos = (height - 1 - row) * 4 + (3 - dot_row);
                        for (side, bit) in bits.iter().enumerate() {
                            if lit(col * 2 + side, pos) {
                                code |= bit;
                            }
                        }
                    }
                    char::from_u32(BRAILLE_OFFSET + u32::from(code)).unwrap_or(BRAILLE_BLANK)
                })
                .collect()
        })
        .collect();

    let tiers = scale.map(|s| {
        raw.chunks(2)
            .map(|pair| s.tier(pair.iter().copied().fold(f64::NEG_INFINITY, f64::max)))
            .collect()
    });

    Raster::Grid(Grid { rows, tiers, width })
}

// ---------------------------------------------------------------------------
// Compact glyphs
// ---------------------------------------------------------------------------

/// Horizontal block gauge.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
    pub filled: String,
    pub empty: String,
    pub tier: Tier,
}

/// `width` cells of `█`/`░` showing `value / max`. `None` when `max <= 0`.
pub fn gauge(value: f64, max: f64, width: usize) -> Option<Gauge> {
    if max <= 0.0 {
        return None;
    }
    let fraction = (value / max).clamp(0.0, 1.0);
    let filled = (width as f64 * fraction) as usize;
    Some(Gauge {
        filled: "█".repeat(filled),
        empty: "░".repeat(width - filled),
        tier: Tier::from_fraction(fraction),
    })
}

/// One-row block sparkline, `width` chars, newest on the right.
pub fn sparkline(values: &[f64], width: usize) -> String {
    if values.is_empty() {
        return "─".repeat(width);
    }
    let step_max = (SPARK_BLOCKS.len() - 1) as f64;
    let normalized = normalize(values);
    let shown = if normalized.len() > width {
        resample(&normalized, width)
    } else {
        normalized
    };
    let pad = width - shown.len();
    std::iter::repeat_n(SPARK_BLOCKS[0], pad)
        .chain(
            shown
                .iter()
                .map(|v| SPARK_BLOCKS[((v * step_max) as usize).min(SPARK_BLOCKS.len() - 1)]),
        )
        .collect()
}
