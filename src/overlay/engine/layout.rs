use serde::Serialize;

use super::wrap::WrapResult;
use crate::overlay::AxisBox;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawInstruction {
    pub x: f32,
    /// Top of the line box, not the baseline.
    pub y: f32,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutPlan {
    pub size: u32,
    pub line_height: f32,
    pub start_y: f32,
    pub instructions: Vec<DrawInstruction>,
}

/// Centers the wrapped block in `rect`, one instruction per drawable line.
///
/// Text never starts above or left of the box. A line whose bottom would pass
/// `rect.y2` by more than `overflow_tolerance` is dropped, and lines stop once
/// the pen has moved below the box.
pub fn compose_layout(rect: &AxisBox, wrap: &WrapResult, overflow_tolerance: f32) -> LayoutPlan {
    let font = &wrap.font;
    let line_height = font.line_height();
    let box_width = rect.width() as f32;
    let box_height = rect.height() as f32;
    let (x1, y1, y2) = (rect.x1 as f32, rect.y1 as f32, rect.y2 as f32);

    let total_height = wrap.lines.len() as f32 * line_height;
    let start_y = (y1 + (box_height - total_height) / 2.0).max(y1);

    let mut instructions = Vec::with_capacity(wrap.lines.len());
    let mut current_y = start_y;
    for line in &wrap.lines {
        let line_width = font.measure(line);
        let x = (x1 + (box_width - line_width) / 2.0).max(x1);
        if current_y + line_height <= y2 + overflow_tolerance {
            instructions.push(DrawInstruction {
                x,
                y: current_y,
                line: line.clone(),
            });
        }
        current_y += line_height;
        if current_y > y2 {
            break;
        }
    }

    LayoutPlan {
        size: font.size(),
        line_height,
        start_y,
        instructions,
    }
}
