//! The built-in font formats and the toolchain that converts between them.
//!
//! The conversions themselves (outlines to an svg font, svg font to TrueType,
//! TrueType to the web containers) are provided by a [`FontToolchain`]. This
//! module only wires them into a [`Registry`]:
//!
//! ```text
//! svg ──▶ ttf ─┬─▶ woff
//!              ├─▶ woff2
//!              └─▶ eot
//! ```

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, bail};
use camino::Utf8PathBuf;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::engine::{Artifact, Descriptor, Registry};
use crate::error::ConfigError;
use crate::options::ResolvedOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Format {
    Svg,
    Ttf,
    Woff,
    Woff2,
    Eot,
}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Svg,
        Format::Ttf,
        Format::Woff,
        Format::Woff2,
        Format::Eot,
    ];

    /// File extension and registry name.
    pub fn name(self) -> &'static str {
        match self {
            Format::Svg => "svg",
            Format::Ttf => "ttf",
            Format::Woff => "woff",
            Format::Woff2 => "woff2",
            Format::Eot => "eot",
        }
    }

    pub fn dependencies(self) -> &'static [Format] {
        match self {
            Format::Svg => &[],
            Format::Ttf => &[Format::Svg],
            Format::Woff | Format::Woff2 | Format::Eot => &[Format::Ttf],
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| ConfigError::UnknownFormat(s.to_string()))
    }
}

impl Serialize for Format {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Format {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// A single icon as handed to [`FontToolchain::svg_font`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    pub name: String,
    pub path: Utf8PathBuf,
    /// Raw svg document of the icon.
    pub contents: String,
    /// The codepoint character followed by the ligature (the icon name).
    pub unicode: Vec<String>,
}

/// Settings for the svg font, with `formatOptions.svg` merged on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSettings {
    pub font_name: String,
    #[serde(default)]
    pub font_height: Option<f64>,
    #[serde(default)]
    pub descent: Option<f64>,
    #[serde(default)]
    pub normalize: bool,
    #[serde(default)]
    pub round: Option<f64>,
    /// Toolchain specific settings with no dedicated field.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl FontSettings {
    pub fn from_options(options: &ResolvedOptions) -> anyhow::Result<Self> {
        let mut settings = serde_json::json!({
            "fontName": options.font_name,
            "fontHeight": options.font_height,
            "descent": options.descent,
            "normalize": options.normalize,
            "round": options.round,
        });

        if let (Some(base), Value::Object(overlay)) =
            (settings.as_object_mut(), options.format_options(Format::Svg))
        {
            for (key, value) in overlay {
                base.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(settings).context("invalid svg format options")
    }
}

/// The font conversion backend.
///
/// Each method receives the options configured for its target format under
/// `formatOptions` (or `Value::Null`).
pub trait FontToolchain: Send + Sync {
    /// Combine the icons into a single svg font document.
    fn svg_font(&self, settings: &FontSettings, glyphs: &[Glyph]) -> anyhow::Result<String>;

    fn svg_to_ttf(&self, svg: &str, options: &Value) -> anyhow::Result<Vec<u8>>;

    fn ttf_to_woff(&self, ttf: &[u8], options: &Value) -> anyhow::Result<Vec<u8>>;

    fn ttf_to_woff2(&self, ttf: &[u8], options: &Value) -> anyhow::Result<Vec<u8>>;

    fn ttf_to_eot(&self, ttf: &[u8], options: &Value) -> anyhow::Result<Vec<u8>>;
}

/// Reads every source icon and attaches its name and codepoint.
pub fn glyphs(options: &ResolvedOptions) -> anyhow::Result<Vec<Glyph>> {
    options
        .files
        .iter()
        .zip(&options.names)
        .map(|(path, name)| {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("couldn't read icon {path}"))?;

            let codepoint = options
                .codepoints
                .get(name)
                .copied()
                .and_then(char::from_u32)
                .with_context(|| format!("icon '{name}' has no codepoint"))?;

            Ok(Glyph {
                name: name.clone(),
                path: path.clone(),
                contents,
                unicode: vec![codepoint.to_string(), name.clone()],
            })
        })
        .collect()
}

fn generate(
    format: Format,
    toolchain: &dyn FontToolchain,
    options: &ResolvedOptions,
    dependencies: &[Artifact],
) -> anyhow::Result<Artifact> {
    let format_options = options.format_options(format);

    match format {
        Format::Svg => {
            let settings = FontSettings::from_options(options)?;
            let glyphs = glyphs(options)?;
            toolchain.svg_font(&settings, &glyphs).map(Artifact::from)
        }
        Format::Ttf => {
            let svg = single(dependencies, Format::Svg)?
                .as_str()
                .context("svg font is not valid UTF-8 text")?;
            toolchain.svg_to_ttf(svg, format_options).map(Artifact::from)
        }
        Format::Woff => {
            let ttf = single(dependencies, Format::Ttf)?;
            toolchain.ttf_to_woff(ttf.as_bytes(), format_options).map(Artifact::from)
        }
        Format::Woff2 => {
            let ttf = single(dependencies, Format::Ttf)?;
            toolchain.ttf_to_woff2(ttf.as_bytes(), format_options).map(Artifact::from)
        }
        Format::Eot => {
            let ttf = single(dependencies, Format::Ttf)?;
            toolchain.ttf_to_eot(ttf.as_bytes(), format_options).map(Artifact::from)
        }
    }
}

fn single(dependencies: &[Artifact], expected: Format) -> anyhow::Result<&Artifact> {
    match dependencies {
        [artifact] => Ok(artifact),
        _ => bail!("expected the {expected} font as the only dependency"),
    }
}

/// A registry holding every [`Format`], each generator delegating to
/// `toolchain`.
pub fn default_registry(toolchain: Arc<dyn FontToolchain>) -> Registry<Format, ResolvedOptions> {
    let mut registry = Registry::new();

    for format in Format::ALL {
        let toolchain = toolchain.clone();
        registry.insert(
            format,
            Descriptor::new(
                format.dependencies().iter().copied(),
                move |options: &ResolvedOptions, dependencies: &[Artifact]| {
                    generate(format, toolchain.as_ref(), options, dependencies)
                },
            ),
        );
    }

    registry
}
