use anyhow::{Context, Result, anyhow};
use image::GenericImageView;
use std::path::{Path, PathBuf};

pub const PNG_MIME: &str = "image/png";
pub const JPEG_MIME: &str = "image/jpeg";
pub const SVG_MIME: &str = "image/svg+xml";

/// A decoded-once source image: original bytes plus what the overlay needs.
#[derive(Debug, Clone)]
pub struct ImageSource {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub name: Option<String>,
}

pub fn load_image(path: &Path) -> Result<ImageSource> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read image: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .map(|value| value.to_string());
    load_image_from_bytes(bytes, name.as_deref(), Some(path))
}

pub fn load_image_from_bytes(
    bytes: Vec<u8>,
    name: Option<&str>,
    path: Option<&Path>,
) -> Result<ImageSource> {
    let mime = detect_image_mime(&bytes, path)?;
    let image =
        image::load_from_memory(&bytes).with_context(|| "failed to decode image for overlay")?;
    let (width, height) = image.dimensions();
    Ok(ImageSource {
        bytes,
        mime,
        width,
        height,
        name: name.map(|value| value.to_string()),
    })
}

fn detect_image_mime(bytes: &[u8], path: Option<&Path>) -> Result<String> {
    if let Some(detected) = sniff_image_mime(bytes) {
        return Ok(detected.to_string());
    }
    if let Some(mime) = extension_lower(path)
        .as_deref()
        .and_then(mime_from_extension)
    {
        return Ok(mime.to_string());
    }
    Err(anyhow!(
        "unable to detect image type for '{}'",
        path.map(|value| value.display().to_string())
            .unwrap_or_else(|| "input".to_string())
    ))
}

fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    let detected = kind.mime_type();
    if detected.starts_with("image/") {
        Some(detected)
    } else {
        None
    }
}

/// Picks the output encoding: explicit hint, then the output extension, then
/// JPEG.
pub fn resolve_output_mime(hint: Option<&str>, output_path: Option<&Path>) -> Result<String> {
    if let Some(raw) = hint.map(str::trim).filter(|value| !value.is_empty()) {
        let lower = raw.to_lowercase();
        return match lower.as_str() {
            "png" | PNG_MIME => Ok(PNG_MIME.to_string()),
            "jpg" | "jpeg" | JPEG_MIME | "image/jpg" => Ok(JPEG_MIME.to_string()),
            "svg" | SVG_MIME => Ok(SVG_MIME.to_string()),
            "bmp" | "image/bmp" => Ok("image/bmp".to_string()),
            "tiff" | "tif" | "image/tiff" => Ok("image/tiff".to_string()),
            _ => Err(anyhow!(
                "unsupported --output-mime '{}' (expected png, jpeg, svg, bmp, tiff)",
                raw
            )),
        };
    }
    if let Some(mime) = extension_lower(output_path)
        .as_deref()
        .and_then(mime_from_extension)
    {
        return Ok(mime.to_string());
    }
    Ok(JPEG_MIME.to_string())
}

/// `translated_<stem>.<ext>` next to the input image.
pub fn default_output_path(input: &Path, mime: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let ext = extension_from_mime(mime).unwrap_or("jpg");
    input.with_file_name(format!("translated_{}.{}", stem, ext))
}

fn extension_lower(path: Option<&Path>) -> Option<String> {
    path.and_then(|path| path.extension())
        .and_then(|value| value.to_str())
        .map(|value| value.to_lowercase())
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some(PNG_MIME),
        "jpg" | "jpeg" => Some(JPEG_MIME),
        "svg" => Some(SVG_MIME),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tiff" | "tif" => Some("image/tiff"),
        _ => None,
    }
}

pub fn extension_from_mime(mime: &str) -> Option<&'static str> {
    match mime {
        PNG_MIME => Some("png"),
        JPEG_MIME | "image/jpg" => Some("jpg"),
        SVG_MIME => Some("svg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/bmp" => Some("bmp"),
        "image/tiff" => Some("tiff"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn loads_png_dimensions_and_mime() {
        let source = load_image_from_bytes(png_bytes(12, 7), Some("a.png"), None).expect("load");
        assert_eq!(source.mime, PNG_MIME);
        assert_eq!((source.width, source.height), (12, 7));
        assert_eq!(source.name.as_deref(), Some("a.png"));
    }

    #[test]
    fn rejects_non_image_bytes() {
        assert!(load_image_from_bytes(b"plain text".to_vec(), None, None).is_err());
    }

    #[test]
    fn output_mime_prefers_hint_then_extension() {
        assert_eq!(
            resolve_output_mime(Some("PNG"), Some(Path::new("out.jpg"))).expect("mime"),
            PNG_MIME
        );
        assert_eq!(
            resolve_output_mime(None, Some(Path::new("out.svg"))).expect("mime"),
            SVG_MIME
        );
        assert_eq!(resolve_output_mime(None, None).expect("mime"), JPEG_MIME);
        assert!(resolve_output_mime(Some("pdf"), None).is_err());
    }

    #[test]
    fn default_output_sits_next_to_input() {
        let path = default_output_path(Path::new("/tmp/shots/menu.png"), JPEG_MIME);
        assert_eq!(path, PathBuf::from("/tmp/shots/translated_menu.jpg"));
    }
}
