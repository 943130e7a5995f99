use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::overlay::{DetectedRegion, TextBlock};

/// Maps detected source text to replacement text.
pub trait Translator {
    fn translate(&self, text: &str) -> Result<String>;
}

/// Keeps the source text. Useful for re-typesetting without translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Exact-match lookup table loaded from TOML:
///
/// ```toml
/// [entries]
/// "नमस्ते" = "Hola"
/// ```
#[derive(Debug, Clone, Default)]
pub struct DictionaryTranslator {
    entries: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct DictionaryFile {
    #[serde(default)]
    entries: HashMap<String, String>,
}

impl DictionaryTranslator {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dictionary: {}", path.display()))?;
        let parsed: DictionaryFile = toml::from_str(&content)
            .with_context(|| format!("failed to parse dictionary: {}", path.display()))?;
        Ok(Self::new(parsed.entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Translator for DictionaryTranslator {
    fn translate(&self, text: &str) -> Result<String> {
        self.entries
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow!("no dictionary entry for '{}'", text))
    }
}

#[derive(Debug, Clone)]
pub struct TranslatedBlocks {
    pub blocks: Vec<TextBlock>,
    pub errors: usize,
}

/// Builds one [`TextBlock`] per region. A failed translation keeps the source
/// text; an empty result is drawn as a single space.
pub fn translate_regions<T: Translator + ?Sized>(
    regions: Vec<DetectedRegion>,
    translator: &T,
) -> TranslatedBlocks {
    let mut errors = 0;
    let mut blocks = Vec::with_capacity(regions.len());
    for (idx, region) in regions.into_iter().enumerate() {
        let cleaned = region.text.trim();
        let text = if cleaned.is_empty() {
            String::new()
        } else {
            match translator.translate(cleaned) {
                Ok(translated) => translated,
                Err(err) => {
                    errors += 1;
                    debug!("block {}: translation failed: {:#}", idx + 1, err);
                    region.text.clone()
                }
            }
        };
        blocks.push(TextBlock::new(region.quad, text));
    }
    if errors > 0 {
        warn!(
            "encountered {} error(s) during translation; original text kept for those blocks",
            errors
        );
    }
    TranslatedBlocks { blocks, errors }
}
