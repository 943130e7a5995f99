use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "image-translate-overlay",
    version,
    about = "Replace detected text regions in an image with translated text"
)]
struct Cli {
    /// Source image (png, jpeg, ...)
    #[arg(short = 'i', long = "image")]
    image: PathBuf,

    /// JSON file with detected regions: [{"points": [[x, y], ...], "text": "..."}]
    #[arg(short = 'r', long = "regions")]
    regions: PathBuf,

    /// Output file (default: translated_<name>.<ext> next to the image)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Output encoding: png, jpeg, svg, bmp, tiff (default: from --output, else jpeg)
    #[arg(short = 'M', long = "output-mime")]
    output_mime: Option<String>,

    /// TOML dictionary with an [entries] table used as translator
    #[arg(short = 'd', long = "dictionary")]
    dictionary: Option<PathBuf>,

    /// Font file used for metrics and drawing (overrides settings)
    #[arg(short = 'f', long = "font")]
    font: Option<PathBuf>,

    /// Write the SVG overlay document instead of a raster image
    #[arg(long = "svg")]
    svg: bool,

    /// Read extra settings from a local TOML file
    #[arg(long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    image_translate_overlay::logging::init(cli.verbose)?;

    let summary = image_translate_overlay::run(image_translate_overlay::Config {
        image: cli.image,
        regions: cli.regions,
        output: cli.output,
        output_mime: cli.output_mime,
        dictionary: cli.dictionary,
        font: cli.font,
        settings_path: cli.read_settings,
        svg: cli.svg,
    })?;

    println!("{}", image_translate_overlay::format_summary(&summary));
    Ok(())
}
