mod engine;
mod font;
mod region;
mod render;

use serde::Serialize;

pub use engine::{
    DrawInstruction, FitKind, LayoutPlan, SizeRange, SizeSearchResult, WrapResult, compose_layout,
    find_font_size, reduce_quad, wrap_relaxed, wrap_words,
};
pub use font::{FontCandidate, FontMetrics, MetricsProvider, MetricsSource, load_font_metrics};
pub use region::{DetectedRegion, RegionDetector, RegionFile};
pub use render::{
    BlockOutcome, BlockPlan, Canvas, OverlayRenderer, OverlayStyle, RenderReport, SvgCanvas,
    render_svg_bytes,
};

/// Corner points of a detected region, in detector order.
#[derive(Debug, Clone, PartialEq)]
pub struct Quad {
    pub points: Vec<(f32, f32)>,
}

/// Axis-aligned pixel rectangle, `x2`/`y2` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl AxisBox {
    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

impl std::fmt::Display for AxisBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{},{},{}]", self.x1, self.y1, self.x2, self.y2)
    }
}

/// A detected region paired with the text that replaces it.
///
/// The region is kept unvalidated; the renderer reduces and clamps it against
/// the canvas so a bad box only affects its own block.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub region: Result<Quad, crate::error::BlockError>,
    pub text: String,
}

impl TextBlock {
    pub fn new(region: Result<Quad, crate::error::BlockError>, text: impl Into<String>) -> Self {
        let text = text.into();
        let text = if text.is_empty() {
            " ".to_string()
        } else {
            text
        };
        Self { region, text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_becomes_single_space() {
        let block = TextBlock::new(Ok(Quad { points: Vec::new() }), "");
        assert_eq!(block.text, " ");
    }

    #[test]
    fn axis_box_dimensions() {
        let rect = AxisBox {
            x1: 10,
            y1: 20,
            x2: 110,
            y2: 70,
        };
        assert_eq!(rect.width(), 100);
        assert_eq!(rect.height(), 50);
        assert_eq!(rect.to_string(), "[10,20,110,70]");
    }
}
