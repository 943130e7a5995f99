use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use tracing::{debug, warn};
use usvg::{Options, Tree, fontdb};

use super::engine::{FitKind, LayoutPlan, SizeRange, compose_layout, find_font_size, reduce_quad};
use super::{AxisBox, FontCandidate, MetricsProvider, TextBlock};
use crate::error::BlockError;

/// Pixel surface the renderer paints on. Only erasing and text drawing are
/// needed; failures here abort the run.
pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn erase_rect(&mut self, rect: &AxisBox, fill: &str, stroke: Option<&str>) -> Result<()>;
    /// `y` is the top of the line box.
    fn draw_text(
        &mut self,
        x: f32,
        y: f32,
        line: &str,
        font: &FontCandidate,
        color: &str,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub text_color: String,
    pub fill_color: String,
    pub stroke_color: Option<String>,
    pub sizes: SizeRange,
    pub overflow_tolerance: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            text_color: "#000000".to_string(),
            fill_color: "#ffffff".to_string(),
            stroke_color: None,
            sizes: SizeRange::default(),
            overflow_tolerance: 5.0,
        }
    }
}

/// Layout decided for one block before anything is painted.
#[derive(Debug, Clone)]
pub enum BlockPlan {
    /// Nothing is painted.
    Skip(BlockError),
    /// The box is erased and left blank.
    Blank { rect: AxisBox, reason: BlockError },
    Text {
        rect: AxisBox,
        layout: LayoutPlan,
        kind: FitKind,
        font: Arc<FontCandidate>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Drawn {
        index: usize,
        rect: AxisBox,
        size: u32,
        lines: usize,
        truncated: bool,
    },
    Skipped {
        index: usize,
        reason: BlockError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    pub outcomes: Vec<BlockOutcome>,
}

impl RenderReport {
    pub fn drawn(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, BlockOutcome::Drawn { .. }))
            .count()
    }

    pub fn truncated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, BlockOutcome::Drawn { truncated: true, .. }))
            .count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (usize, &BlockError)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            BlockOutcome::Skipped { index, reason } => Some((*index, reason)),
            BlockOutcome::Drawn { .. } => None,
        })
    }
}

pub struct OverlayRenderer<'a> {
    metrics: &'a MetricsProvider,
    style: &'a OverlayStyle,
    workers: usize,
}

impl<'a> OverlayRenderer<'a> {
    pub fn new(metrics: &'a MetricsProvider, style: &'a OverlayStyle) -> Self {
        Self {
            metrics,
            style,
            workers: 1,
        }
    }

    /// Number of threads used for layout. Painting is always serial.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn plan_block(&self, block: &TextBlock, width: u32, height: u32) -> BlockPlan {
        let quad = match &block.region {
            Ok(quad) => quad,
            Err(err) => return BlockPlan::Skip(err.clone()),
        };
        let rect = match reduce_quad(quad, width, height) {
            Ok(rect) => rect,
            Err(err) => return BlockPlan::Skip(err),
        };

        let result = find_font_size(
            &block.text,
            rect.width() as f32,
            rect.height() as f32,
            self.style.sizes,
            self.metrics,
        );
        if result.wrap.is_empty() {
            return BlockPlan::Blank {
                rect,
                reason: BlockError::NoLayoutFound(rect),
            };
        }
        let layout = compose_layout(&rect, &result.wrap, self.style.overflow_tolerance);
        BlockPlan::Text {
            rect,
            layout,
            kind: result.kind,
            font: result.wrap.font,
        }
    }

    /// Plans every block, in input order.
    pub fn plan_blocks(&self, blocks: &[TextBlock], width: u32, height: u32) -> Vec<BlockPlan> {
        let workers = self.workers.min(blocks.len());
        if workers <= 1 {
            return blocks
                .iter()
                .map(|block| self.plan_block(block, width, height))
                .collect();
        }

        let chunk_size = blocks.len().div_ceil(workers);
        std::thread::scope(|scope| {
            let handles: Vec<_> = blocks
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|block| self.plan_block(block, width, height))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        })
    }

    pub fn paint<C: Canvas>(&self, canvas: &mut C, plans: &[BlockPlan]) -> Result<RenderReport> {
        let mut report = RenderReport::default();
        let stroke = self.style.stroke_color.as_deref();
        for (index, plan) in plans.iter().enumerate() {
            let number = index + 1;
            match plan {
                BlockPlan::Skip(reason) => {
                    warn!("block {}: skipped: {}", number, reason);
                    report.outcomes.push(BlockOutcome::Skipped {
                        index,
                        reason: reason.clone(),
                    });
                }
                BlockPlan::Blank { rect, reason } => {
                    canvas
                        .erase_rect(rect, &self.style.fill_color, stroke)
                        .with_context(|| format!("block {}: erase", number))?;
                    warn!("block {}: {}", number, reason);
                    report.outcomes.push(BlockOutcome::Skipped {
                        index,
                        reason: reason.clone(),
                    });
                }
                BlockPlan::Text {
                    rect,
                    layout,
                    kind,
                    font,
                } => {
                    canvas
                        .erase_rect(rect, &self.style.fill_color, stroke)
                        .with_context(|| format!("block {}: erase", number))?;
                    for (line_no, instruction) in layout.instructions.iter().enumerate() {
                        canvas
                            .draw_text(
                                instruction.x,
                                instruction.y,
                                &instruction.line,
                                font,
                                &self.style.text_color,
                            )
                            .with_context(|| {
                                format!("block {}: draw line {}", number, line_no + 1)
                            })?;
                    }
                    debug!(
                        "block {}: {} line(s) at {}px in {}",
                        number,
                        layout.instructions.len(),
                        layout.size,
                        rect
                    );
                    report.outcomes.push(BlockOutcome::Drawn {
                        index,
                        rect: *rect,
                        size: layout.size,
                        lines: layout.instructions.len(),
                        truncated: *kind == FitKind::Truncated,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Plans all blocks, then paints them onto `canvas` in input order.
    pub fn render<C: Canvas>(&self, canvas: &mut C, blocks: &[TextBlock]) -> Result<RenderReport> {
        let plans = self.plan_blocks(blocks, canvas.width(), canvas.height());
        self.paint(canvas, &plans)
    }
}

/// SVG document with the source image as background.
pub struct SvgCanvas {
    width: u32,
    height: u32,
    svg: String,
}

impl SvgCanvas {
    pub fn new(image_bytes: &[u8], image_mime: &str, width: u32, height: u32) -> Self {
        let encoded = BASE64.encode(image_bytes);
        let data_uri = format!("data:{};base64,{}", image_mime, encoded);
        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        ));
        svg.push_str(&format!(
            r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
            uri = data_uri,
            w = width,
            h = height
        ));
        Self { width, height, svg }
    }

    pub fn finish(mut self) -> String {
        self.svg.push_str("</svg>");
        self.svg
    }
}

impl Canvas for SvgCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn erase_rect(&mut self, rect: &AxisBox, fill: &str, stroke: Option<&str>) -> Result<()> {
        match stroke {
            Some(stroke) => self.svg.push_str(&format!(
                r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}" stroke="{stroke}" stroke-width="1"/>"#,
                x = rect.x1,
                y = rect.y1,
                w = rect.width(),
                h = rect.height(),
                fill = escape_xml(fill),
                stroke = escape_xml(stroke)
            )),
            None => self.svg.push_str(&format!(
                r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}"/>"#,
                x = rect.x1,
                y = rect.y1,
                w = rect.width(),
                h = rect.height(),
                fill = escape_xml(fill)
            )),
        }
        Ok(())
    }

    fn draw_text(
        &mut self,
        x: f32,
        y: f32,
        line: &str,
        font: &FontCandidate,
        color: &str,
    ) -> Result<()> {
        let family = font.family().unwrap_or("sans-serif");
        self.svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}" font-family="{family}" xml:space="preserve">{text}</text>"#,
            x = x,
            y = y + font.baseline_offset(),
            size = font.size(),
            color = escape_xml(color),
            family = escape_xml(family),
            text = escape_xml(line)
        ));
        Ok(())
    }
}

pub fn render_svg_bytes(svg: &str, output_mime: &str, font_data: Option<&[u8]>) -> Result<Vec<u8>> {
    let format = image_format_from_mime(output_mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", output_mime))?;
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let image = match format {
        image::ImageFormat::Jpeg => {
            image::DynamicImage::ImageRgb8(image::DynamicImage::ImageRgba8(image).to_rgb8())
        }
        _ => image::DynamicImage::ImageRgba8(image),
    };
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image
        .write_to(&mut cursor, format)
        .with_context(|| "failed to encode image from SVG")?;
    Ok(bytes)
}

fn image_format_from_mime(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/jpeg" => Some(image::ImageFormat::Jpeg),
        "image/jpg" => Some(image::ImageFormat::Jpeg),
        "image/bmp" => Some(image::ImageFormat::Bmp),
        "image/tiff" => Some(image::ImageFormat::Tiff),
        _ => None,
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::Quad;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Erase(AxisBox),
        Text(f32, f32, String, u32),
    }

    struct RecordingCanvas {
        width: u32,
        height: u32,
        ops: Vec<Op>,
        fail_draw: bool,
    }

    impl RecordingCanvas {
        fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                ops: Vec::new(),
                fail_draw: false,
            }
        }
    }

    impl Canvas for RecordingCanvas {
        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn erase_rect(&mut self, rect: &AxisBox, _fill: &str, _stroke: Option<&str>) -> Result<()> {
            self.ops.push(Op::Erase(*rect));
            Ok(())
        }

        fn draw_text(
            &mut self,
            x: f32,
            y: f32,
            line: &str,
            font: &FontCandidate,
            _color: &str,
        ) -> Result<()> {
            if self.fail_draw {
                return Err(anyhow!("canvas is read-only"));
            }
            self.ops.push(Op::Text(x, y, line.to_string(), font.size()));
            Ok(())
        }
    }

    fn block(points: &[(f32, f32)], text: &str) -> TextBlock {
        TextBlock::new(
            Ok(Quad {
                points: points.to_vec(),
            }),
            text,
        )
    }

    fn rect_block(x1: f32, y1: f32, x2: f32, y2: f32, text: &str) -> TextBlock {
        block(&[(x1, y1), (x2, y1), (x2, y2), (x1, y2)], text)
    }

    #[test]
    fn draws_block_after_erasing() {
        let metrics = MetricsProvider::builtin(1.2);
        let style = OverlayStyle::default();
        let renderer = OverlayRenderer::new(&metrics, &style);
        let mut canvas = RecordingCanvas::new(400, 200);
        let report = renderer
            .render(&mut canvas, &[rect_block(0.0, 0.0, 200.0, 50.0, "Hello world")])
            .expect("render");
        assert_eq!(report.drawn(), 1);
        assert!(matches!(canvas.ops[0], Op::Erase(_)));
        match &canvas.ops[1] {
            Op::Text(_, _, line, size) => {
                assert_eq!(line, "Hello world");
                assert_eq!(*size, 34);
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn zero_width_box_is_skipped_without_drawing() {
        let metrics = MetricsProvider::builtin(1.2);
        let style = OverlayStyle::default();
        let renderer = OverlayRenderer::new(&metrics, &style);
        let mut canvas = RecordingCanvas::new(400, 200);
        let report = renderer
            .render(&mut canvas, &[rect_block(10.0, 10.0, 10.0, 50.0, "text")])
            .expect("render");
        assert!(canvas.ops.is_empty());
        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert!(matches!(skipped[0].1, BlockError::InvalidBox(_)));
    }

    #[test]
    fn unreadable_region_is_skipped() {
        let metrics = MetricsProvider::builtin(1.2);
        let style = OverlayStyle::default();
        let renderer = OverlayRenderer::new(&metrics, &style);
        let mut canvas = RecordingCanvas::new(100, 100);
        let blocks = [TextBlock::new(
            Err(BlockError::InvalidBox("bad".to_string())),
            "x",
        )];
        let report = renderer.render(&mut canvas, &blocks).expect("render");
        assert_eq!(report.skipped().count(), 1);
        assert!(canvas.ops.is_empty());
    }

    #[test]
    fn too_small_box_is_erased_and_left_blank() {
        let metrics = MetricsProvider::builtin(1.2);
        let style = OverlayStyle::default();
        let renderer = OverlayRenderer::new(&metrics, &style);
        let mut canvas = RecordingCanvas::new(400, 200);
        let report = renderer
            .render(&mut canvas, &[rect_block(0.0, 0.0, 100.0, 8.0, "hello")])
            .expect("render");
        assert_eq!(canvas.ops.len(), 1);
        assert!(matches!(canvas.ops[0], Op::Erase(_)));
        let skipped: Vec<_> = report.skipped().collect();
        assert!(matches!(skipped[0].1, BlockError::NoLayoutFound(_)));
    }

    #[test]
    fn empty_text_draws_one_blank_line() {
        let metrics = MetricsProvider::builtin(1.2);
        let style = OverlayStyle::default();
        let renderer = OverlayRenderer::new(&metrics, &style);
        let mut canvas = RecordingCanvas::new(400, 200);
        let report = renderer
            .render(&mut canvas, &[rect_block(0.0, 0.0, 120.0, 60.0, "")])
            .expect("render");
        assert_eq!(report.drawn(), 1);
        assert!(matches!(&canvas.ops[1], Op::Text(_, _, line, _) if line == " "));
    }

    #[test]
    fn bad_block_does_not_stop_later_blocks() {
        let metrics = MetricsProvider::builtin(1.2);
        let style = OverlayStyle::default();
        let renderer = OverlayRenderer::new(&metrics, &style);
        let mut canvas = RecordingCanvas::new(400, 200);
        let blocks = [
            rect_block(10.0, 10.0, 10.0, 50.0, "zero"),
            rect_block(0.0, 100.0, 200.0, 150.0, "after"),
        ];
        let report = renderer.render(&mut canvas, &blocks).expect("render");
        assert_eq!(report.drawn(), 1);
        assert_eq!(report.skipped().next().map(|(index, _)| index), Some(0));
    }

    #[test]
    fn canvas_failure_names_block_and_stage() {
        let metrics = MetricsProvider::builtin(1.2);
        let style = OverlayStyle::default();
        let renderer = OverlayRenderer::new(&metrics, &style);
        let mut canvas = RecordingCanvas::new(400, 200);
        canvas.fail_draw = true;
        let err = renderer
            .render(&mut canvas, &[rect_block(0.0, 0.0, 200.0, 50.0, "Hello")])
            .unwrap_err();
        assert_eq!(err.to_string(), "block 1: draw line 1");
    }

    #[test]
    fn parallel_planning_matches_serial_order() {
        let metrics = MetricsProvider::builtin(1.2);
        let style = OverlayStyle::default();
        let blocks: Vec<TextBlock> = (0..9)
            .map(|i| {
                let y = (i * 20) as f32;
                rect_block(0.0, y, 60.0 + i as f32 * 15.0, y + 18.0, "some words to wrap")
            })
            .collect();
        let mut serial = RecordingCanvas::new(400, 200);
        let mut parallel = RecordingCanvas::new(400, 200);
        OverlayRenderer::new(&metrics, &style)
            .render(&mut serial, &blocks)
            .expect("serial");
        OverlayRenderer::new(&metrics, &style)
            .with_workers(4)
            .render(&mut parallel, &blocks)
            .expect("parallel");
        assert_eq!(serial.ops, parallel.ops);
    }

    #[test]
    fn svg_canvas_output_is_repeatable() {
        let metrics = MetricsProvider::builtin(1.2);
        let style = OverlayStyle {
            stroke_color: Some("#d3d3d3".to_string()),
            ..OverlayStyle::default()
        };
        let blocks = [
            rect_block(0.0, 0.0, 200.0, 50.0, "Fish & <chips>"),
            rect_block(20.0, 60.0, 180.0, 140.0, "second block of text"),
        ];
        let paint = || {
            let mut canvas = SvgCanvas::new(b"png", "image/png", 200, 150);
            OverlayRenderer::new(&metrics, &style)
                .render(&mut canvas, &blocks)
                .expect("render");
            canvas.finish()
        };
        let first = paint();
        assert_eq!(first, paint());
        assert!(first.contains("Fish &amp; &lt;chips&gt;"));
        assert!(first.contains(r##"stroke="#d3d3d3""##));
        assert!(first.ends_with("</svg>"));
    }

    #[test]
    fn rasterises_svg_to_png() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="4"><rect x="0" y="0" width="8" height="4" fill="#ff0000"/></svg>"##;
        let bytes = render_svg_bytes(svg, "image/png", None).expect("png");
        let decoded = image::load_from_memory(&bytes).expect("decode").to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.get_pixel(2, 2).0, [255, 0, 0, 255]);
    }

    #[test]
    fn rejects_unknown_output_mime() {
        let err = render_svg_bytes("<svg/>", "image/x-unknown", None).unwrap_err();
        assert!(err.to_string().contains("unsupported output image mime"));
    }
}
