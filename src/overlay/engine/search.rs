use serde::{Deserialize, Serialize};
use tracing::debug;

use super::wrap::{WrapResult, tokenize, wrap_relaxed, wrap_words};
use crate::overlay::MetricsProvider;

/// Candidate pixel sizes, scanned from `max` down to `min` by `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub max: u32,
    pub min: u32,
    pub step: u32,
}

impl Default for SizeRange {
    fn default() -> Self {
        Self {
            max: 40,
            min: 12,
            step: 2,
        }
    }
}

impl SizeRange {
    pub fn sizes(self) -> impl Iterator<Item = u32> {
        (self.min..=self.max).rev().step_by(self.step.max(1) as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FitKind {
    /// Every line fits the box at the chosen size.
    Exact,
    /// Nothing fit cleanly; lines were truncated at the minimum size.
    Truncated,
}

#[derive(Debug, Clone)]
pub struct SizeSearchResult {
    pub wrap: WrapResult,
    pub kind: FitKind,
}

impl SizeSearchResult {
    pub fn size(&self) -> u32 {
        self.wrap.font.size()
    }
}

/// Returns the largest size in `range` whose wrap fits the box.
///
/// Fit is not monotone in size, so every size is tried from the top down
/// instead of bisecting. When none fits, a truncating wrap at `range.min` is
/// returned, which may hold no lines at all.
pub fn find_font_size(
    text: &str,
    box_width: f32,
    box_height: f32,
    range: SizeRange,
    metrics: &MetricsProvider,
) -> SizeSearchResult {
    let words = tokenize(text);
    for size in range.sizes() {
        let font = metrics.candidate(size);
        match wrap_words(&words, box_width, box_height, &font) {
            Ok(wrap) => {
                return SizeSearchResult {
                    wrap,
                    kind: FitKind::Exact,
                };
            }
            Err(failure) => debug!("size {}: {}", size, failure),
        }
    }

    let font = metrics.candidate(range.min);
    SizeSearchResult {
        wrap: wrap_relaxed(&words, box_width, box_height, &font),
        kind: FitKind::Truncated,
    }
}
