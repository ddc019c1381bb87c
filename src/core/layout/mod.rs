use serde::{Deserialize, Serialize};

/// Tunables for the pointer-follow offsets. Defaults mirror the homepage the
/// service renders fragments for.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_width_threshold")]
    pub width_threshold: f64,
    #[serde(default = "default_padding_divisor")]
    pub padding_divisor: f64,
    #[serde(default = "default_margin_divisor")]
    pub margin_divisor: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width_threshold: default_width_threshold(),
            padding_divisor: default_padding_divisor(),
            margin_divisor: default_margin_divisor(),
        }
    }
}

fn default_width_threshold() -> f64 {
    768.0
}

fn default_padding_divisor() -> f64 {
    3.0
}

fn default_margin_divisor() -> f64 {
    8.0
}

#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParallaxOffsets {
    pub left_percent: i64,
    pub top_percent: i64,
    pub padding_left: f64,
    pub margin_top: f64,
}

impl ParallaxOffsets {
    pub const ZERO: Self = Self {
        left_percent: 0,
        top_percent: 0,
        padding_left: 0.0,
        margin_top: 0.0,
    };
}

#[derive(Debug, Clone, Default)]
pub struct LayoutService;

impl LayoutService {
    pub fn name(&self) -> &'static str {
        "layout"
    }

    pub fn status(&self) -> &'static str {
        "ready"
    }
}

/// Compute pointer-follow offsets for a viewport position.
///
/// Percentages are rounded to whole numbers before the divisor is applied,
/// so the resulting paddings move in discrete steps rather than tracking the
/// pointer continuously. Narrow viewports get zero offsets across the board.
pub fn offsets(config: &LayoutConfig, viewport: Viewport, pointer: Pointer) -> ParallaxOffsets {
    if viewport.width <= config.width_threshold {
        return ParallaxOffsets::ZERO;
    }
    let left_percent = (100.0 * pointer.x / viewport.width).round() as i64;
    let top_percent = (100.0 * pointer.y / viewport.height).round() as i64;
    ParallaxOffsets {
        left_percent,
        top_percent,
        padding_left: round2(left_percent as f64 / config.padding_divisor),
        margin_top: round2(top_percent as f64 / config.margin_divisor),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
