use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

const FALLBACK_FAMILIES: &[&str] = &["DejaVu Sans", "Noto Sans", "Arial", "sans-serif"];

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    advances: Arc<HashMap<char, u16>>,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn advance_units(&self, text: &str) -> u32 {
        text.chars()
            .filter(|ch| *ch != '\n')
            .fold(0u32, |total, ch| {
                let advance = if ch == ' ' {
                    self.space_advance
                } else {
                    self.advances
                        .get(&ch)
                        .copied()
                        .unwrap_or(self.space_advance)
                };
                total.saturating_add(advance as u32)
            })
    }
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("units_per_em", &self.units_per_em)
            .field("face_index", &self.face_index)
            .field("glyphs", &self.advances.len())
            .finish()
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

/// Where glyph metrics come from for one run.
#[derive(Debug, Clone)]
pub enum MetricsSource {
    Font(FontMetrics),
    /// Per-character width classes, used when no font could be loaded.
    Builtin,
}

impl MetricsSource {
    /// Resolves the configured font, degrading to [`MetricsSource::Builtin`].
    ///
    /// Warns at most once; call it once per run, outside the per-block path.
    pub fn resolve(font_path: Option<&Path>, font_family: Option<&str>) -> Self {
        Self::resolve_with(font_path, font_family, FALLBACK_FAMILIES)
    }

    fn resolve_with(
        font_path: Option<&Path>,
        font_family: Option<&str>,
        fallback: &[&str],
    ) -> Self {
        let path_error = match font_path.map(load_font_metrics) {
            Some(Ok(metrics)) => return Self::from_font(metrics),
            Some(Err(err)) => Some(err),
            None => None,
        };

        match load_system_font(font_family, fallback) {
            Ok(metrics) => {
                if let Some(err) = path_error {
                    warn!(
                        "{:#}; using system font {}",
                        err,
                        metrics.family().unwrap_or("(unnamed face)")
                    );
                }
                Self::from_font(metrics)
            }
            Err(err) => {
                let err = match path_error {
                    Some(path_err) => path_err.context(err.to_string()),
                    None => err,
                };
                warn!("font unavailable ({:#}); using built-in metrics", err);
                MetricsSource::Builtin
            }
        }
    }

    fn from_font(metrics: FontMetrics) -> Self {
        debug!(
            "overlay font: {}",
            metrics.family().unwrap_or("(unnamed face)")
        );
        MetricsSource::Font(metrics)
    }

    pub fn family(&self) -> Option<&str> {
        match self {
            MetricsSource::Font(metrics) => metrics.family(),
            MetricsSource::Builtin => None,
        }
    }

    pub fn font_data(&self) -> Option<&[u8]> {
        match self {
            MetricsSource::Font(metrics) => Some(metrics.data()),
            MetricsSource::Builtin => None,
        }
    }
}

/// Metrics of the typeface at one pixel size.
#[derive(Debug)]
pub struct FontCandidate {
    size: u32,
    ascent: f32,
    descent: f32,
    line_height: f32,
    source: Arc<MetricsSource>,
}

impl FontCandidate {
    fn new(source: Arc<MetricsSource>, size: u32, line_spacing: f32) -> Self {
        let px = size as f32;
        let (ascent, descent) = match source.as_ref() {
            MetricsSource::Font(metrics) => {
                let scale = px / metrics.units_per_em.max(1) as f32;
                (
                    metrics.ascender as f32 * scale,
                    -(metrics.descender as f32) * scale,
                )
            }
            MetricsSource::Builtin => (px * 0.8, px * 0.2),
        };
        let line_height = (ascent + descent).max(px * 0.5) * line_spacing;
        Self {
            size,
            ascent,
            descent,
            line_height,
            source,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    /// Distance from the top of a line box to the glyph baseline.
    pub fn baseline_offset(&self) -> f32 {
        let leading = (self.line_height - (self.ascent + self.descent)).max(0.0);
        leading / 2.0 + self.ascent
    }

    pub fn family(&self) -> Option<&str> {
        self.source.family()
    }

    pub fn measure(&self, text: &str) -> f32 {
        let px = self.size as f32;
        match self.source.as_ref() {
            MetricsSource::Font(metrics) => {
                let units = metrics.units_per_em.max(1) as f32;
                metrics.advance_units(text) as f32 * (px / units)
            }
            MetricsSource::Builtin => estimate_text_width_units(text) * px,
        }
    }
}

/// Size-keyed cache of [`FontCandidate`]s, owned by one processing run.
#[derive(Debug)]
pub struct MetricsProvider {
    source: Arc<MetricsSource>,
    line_spacing: f32,
    cache: Mutex<HashMap<u32, Arc<FontCandidate>>>,
}

impl MetricsProvider {
    pub fn new(source: MetricsSource, line_spacing: f32) -> Self {
        Self {
            source: Arc::new(source),
            line_spacing,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn builtin(line_spacing: f32) -> Self {
        Self::new(MetricsSource::Builtin, line_spacing)
    }

    pub fn source(&self) -> &MetricsSource {
        self.source.as_ref()
    }

    pub fn candidate(&self, size: u32) -> Arc<FontCandidate> {
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache
            .entry(size)
            .or_insert_with(|| {
                Arc::new(FontCandidate::new(
                    self.source.clone(),
                    size,
                    self.line_spacing,
                ))
            })
            .clone()
    }

    pub fn measure(&self, text: &str, size: u32) -> f32 {
        self.candidate(size).measure(text)
    }

    pub fn line_height(&self, size: u32) -> f32 {
        self.candidate(size).line_height()
    }

    #[cfg(test)]
    fn cached_sizes(&self) -> usize {
        self.cache
            .lock()
            .map(|cache| cache.len())
            .unwrap_or_default()
    }
}

fn load_system_font(font_family: Option<&str>, fallback: &[&str]) -> Result<FontMetrics> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = font_family {
        match load_font_metrics_from_family(&db, family) {
            Ok(metrics) => return Ok(metrics),
            Err(err) => debug!("{:#}", err),
        }
    }

    for candidate in fallback {
        if let Ok(metrics) = load_font_metrics_from_family(&db, candidate) {
            return Ok(metrics);
        }
    }

    Err(anyhow!("no fallback fonts found"))
}

fn estimate_char_units_for_width(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xAC00..=0xD7AF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units_for_width).sum()
}

fn load_font_metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    let mut chosen = None;
    for index in 0..count {
        let Ok(face) = Face::parse(data, index) else {
            continue;
        };
        let family = extract_family_name(&face);
        let preferred = matches!(
            (preferred_family, &family),
            (Some(wanted), Some(found)) if found.eq_ignore_ascii_case(wanted)
        );
        if preferred || chosen.is_none() {
            chosen = Some((index, face, family));
        }
        if preferred {
            break;
        }
    }
    let (face_index, face, family) =
        chosen.ok_or_else(|| anyhow!("failed to parse font data"))?;

    let units_per_em = face.units_per_em().max(1);
    let space_advance = face
        .glyph_index(' ')
        .and_then(|id| face.glyph_hor_advance(id))
        .unwrap_or(units_per_em / 2);
    Ok(FontMetrics {
        data: Arc::new(data.to_vec()),
        units_per_em,
        space_advance,
        ascender: face.ascender(),
        descender: face.descender(),
        advances: Arc::new(collect_advances(&face)),
        family,
        face_index,
    })
}

/// Horizontal advance of every mapped codepoint, read once from the face.
fn collect_advances(face: &Face<'_>) -> HashMap<char, u16> {
    let mut advances = HashMap::new();
    let Some(cmap) = face.tables().cmap else {
        return advances;
    };
    for subtable in cmap.subtables {
        if !subtable.is_unicode() {
            continue;
        }
        subtable.codepoints(|code| {
            let Some(ch) = char::from_u32(code) else {
                return;
            };
            if advances.contains_key(&ch) {
                return;
            }
            if let Some(advance) = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
            {
                advances.insert(ch, advance);
            }
        });
    }
    advances
}

fn load_font_metrics_from_family(db: &fontdb::Database, family: &str) -> Result<FontMetrics> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    load_font_metrics_from_data(&data, Some(family))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
