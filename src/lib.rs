use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

pub mod data;
pub mod error;
pub mod logging;
pub mod overlay;
pub mod settings;
mod test_util;
pub mod translator;

pub use error::{BlockError, WrapFailure};
pub use overlay::{
    AxisBox, Canvas, MetricsProvider, MetricsSource, OverlayRenderer, OverlayStyle, Quad,
    RenderReport, SvgCanvas, TextBlock,
};
pub use translator::{DictionaryTranslator, IdentityTranslator, Translator};

use overlay::RegionDetector;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub image: PathBuf,
    pub regions: PathBuf,
    pub output: Option<PathBuf>,
    pub output_mime: Option<String>,
    pub dictionary: Option<PathBuf>,
    pub font: Option<PathBuf>,
    pub settings_path: Option<String>,
    pub svg: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output: PathBuf,
    pub blocks: usize,
    pub translation_errors: usize,
    pub report: RenderReport,
}

pub fn run(config: Config) -> Result<RunSummary> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    if let Some(font) = &config.font {
        settings.font_path = Some(font.to_string_lossy().to_string());
    }

    let image = data::load_image(&config.image)?;
    let regions = overlay::RegionFile::new(&config.regions).detect()?;
    info!(
        "detected {} text block(s) in {} ({}x{})",
        regions.len(),
        image.name.as_deref().unwrap_or("image"),
        image.width,
        image.height
    );

    let dictionary = config
        .dictionary
        .clone()
        .or_else(|| settings.dictionary_path.as_ref().map(PathBuf::from));
    let translator: Box<dyn Translator> = match dictionary {
        Some(path) => {
            let dictionary = DictionaryTranslator::load(&path)?;
            if dictionary.is_empty() {
                warn!("dictionary {} has no entries", path.display());
            } else {
                info!(
                    "loaded {} dictionary entries from {}",
                    dictionary.len(),
                    path.display()
                );
            }
            Box::new(dictionary)
        }
        None => Box::new(IdentityTranslator),
    };
    let started = Instant::now();
    let translated = translator::translate_regions(regions, translator.as_ref());
    info!(
        "translation complete in {:.2} seconds",
        started.elapsed().as_secs_f32()
    );

    let metrics = MetricsProvider::new(
        MetricsSource::resolve(
            settings.font_path.as_deref().map(Path::new),
            settings.font_family.as_deref(),
        ),
        settings.line_spacing,
    );

    let started = Instant::now();
    let (svg, report) = overlay_image(&image, &translated.blocks, &settings, &metrics)?;
    info!(
        "rendering complete in {:.2} seconds",
        started.elapsed().as_secs_f32()
    );

    let output_mime = if config.svg {
        data::SVG_MIME.to_string()
    } else {
        data::resolve_output_mime(config.output_mime.as_deref(), config.output.as_deref())?
    };
    let output = config
        .output
        .clone()
        .unwrap_or_else(|| data::default_output_path(&config.image, &output_mime));
    let bytes = if output_mime == data::SVG_MIME {
        svg.into_bytes()
    } else {
        overlay::render_svg_bytes(&svg, &output_mime, metrics.source().font_data())?
    };
    std::fs::write(&output, bytes)
        .with_context(|| format!("failed to write output: {}", output.display()))?;

    Ok(RunSummary {
        output,
        blocks: translated.blocks.len(),
        translation_errors: translated.errors,
        report,
    })
}

/// Erases every block's box on a copy of `image` and typesets its text.
/// Returns the SVG document and what happened to each block.
pub fn overlay_image(
    image: &data::ImageSource,
    blocks: &[TextBlock],
    settings: &settings::Settings,
    metrics: &MetricsProvider,
) -> Result<(String, RenderReport)> {
    let style = settings.overlay_style();
    let renderer = OverlayRenderer::new(metrics, &style).with_workers(settings.layout_workers());
    let mut canvas = SvgCanvas::new(&image.bytes, &image.mime, image.width, image.height);
    let report = renderer.render(&mut canvas, blocks)?;
    Ok((canvas.finish(), report))
}

pub fn format_summary(summary: &RunSummary) -> String {
    let report = &summary.report;
    let skipped: Vec<_> = report.skipped().collect();
    let mut lines = vec![
        format!("output: {}", summary.output.display()),
        format!(
            "blocks: {} drawn ({} truncated), {} skipped of {}",
            report.drawn(),
            report.truncated(),
            skipped.len(),
            summary.blocks
        ),
    ];
    for (index, reason) in skipped {
        lines.push(format!("skipped block {}: {}", index + 1, reason));
    }
    if summary.translation_errors > 0 {
        lines.push(format!(
            "translation errors: {} (original text kept)",
            summary.translation_errors
        ));
    }
    lines.join("\n")
}
