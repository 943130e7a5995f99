use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::overlay::{OverlayStyle, SizeRange};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub font_path: Option<String>,
    pub font_family: Option<String>,
    pub text_color: String,
    pub fill_color: String,
    pub stroke_color: Option<String>,
    pub sizes: SizeRange,
    pub line_spacing: f32,
    pub overflow_tolerance: f32,
    pub workers: usize,
    pub dictionary_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font_path: None,
            font_family: None,
            text_color: "#000000".to_string(),
            fill_color: "#ffffff".to_string(),
            stroke_color: Some("#d3d3d3".to_string()),
            sizes: SizeRange::default(),
            line_spacing: 1.2,
            overflow_tolerance: 5.0,
            workers: 1,
            dictionary_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    overlay: Option<OverlaySettings>,
    translation: Option<TranslationSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    font_path: Option<String>,
    font_family: Option<String>,
    text_color: Option<String>,
    fill_color: Option<String>,
    stroke_color: Option<String>,
    size_max: Option<u32>,
    size_min: Option<u32>,
    size_step: Option<u32>,
    line_spacing: Option<f32>,
    overflow_tolerance: Option<f32>,
    workers: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    dictionary: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            text_color: self.text_color.clone(),
            fill_color: self.fill_color.clone(),
            stroke_color: self.stroke_color.clone(),
            sizes: self.sizes,
            overflow_tolerance: self.overflow_tolerance,
        }
    }

    /// Layout threads; `0` in the settings means one per CPU.
    pub fn layout_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(overlay) = incoming.overlay {
            if let Some(path) = overlay.font_path {
                if !path.trim().is_empty() {
                    self.font_path = Some(path);
                }
            }
            if let Some(family) = overlay.font_family {
                if !family.trim().is_empty() {
                    self.font_family = Some(family);
                }
            }
            if let Some(color) = overlay.text_color {
                if !color.trim().is_empty() {
                    self.text_color = color;
                }
            }
            if let Some(color) = overlay.fill_color {
                if !color.trim().is_empty() {
                    self.fill_color = color;
                }
            }
            if let Some(color) = overlay.stroke_color {
                // An explicit empty value turns the outline off.
                self.stroke_color = if color.trim().is_empty() {
                    None
                } else {
                    Some(color)
                };
            }

            let mut sizes = self.sizes;
            if let Some(max) = overlay.size_max {
                sizes.max = max;
            }
            if let Some(min) = overlay.size_min {
                sizes.min = min;
            }
            if let Some(step) = overlay.size_step {
                sizes.step = step;
            }
            if sizes.min > 0 && sizes.step > 0 && sizes.max >= sizes.min {
                self.sizes = sizes;
            }

            if let Some(spacing) = overlay.line_spacing {
                if spacing > 0.0 {
                    self.line_spacing = spacing;
                }
            }
            if let Some(tolerance) = overlay.overflow_tolerance {
                if tolerance >= 0.0 {
                    self.overflow_tolerance = tolerance;
                }
            }
            if let Some(workers) = overlay.workers {
                self.workers = workers;
            }
        }
        if let Some(translation) = incoming.translation {
            if let Some(path) = translation.dictionary {
                if !path.trim().is_empty() {
                    self.dictionary_path = Some(path);
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".image-translate-overlay"))
        }
    })
}
