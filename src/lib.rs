#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

pub mod codepoints;
pub mod engine;
mod error;
pub mod format;
pub mod options;
mod output;
pub mod render;
mod utils;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use camino::Utf8PathBuf;

pub use crate::engine::{
    Artifact, Descriptor, Diagnostics, Fonts, FormatKey, Registry, execute,
    execute_with_diagnostics,
};
pub use crate::error::*;
pub use crate::format::{FontSettings, FontToolchain, Format, Glyph, default_registry};
pub use crate::options::{BundledTemplate, ResolvedOptions, TemplateSource, WebfontOptions};
pub use crate::render::FontUrls;
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;

/// Resolve `options`, generate every requested font through `toolchain` and,
/// unless `writeFiles` is off, write fonts, stylesheet and preview to disk.
pub fn generate(
    options: WebfontOptions,
    toolchain: Arc<dyn FontToolchain>,
) -> Result<Bundle, WebfontError> {
    let registry = default_registry(toolchain);
    generate_with_registry(options, &registry)
}

/// Like [`generate`], with a caller provided registry.
pub fn generate_with_registry(
    options: WebfontOptions,
    registry: &Registry<Format, ResolvedOptions>,
) -> Result<Bundle, WebfontError> {
    let s = Instant::now();
    let options = Arc::new(options.resolve()?);

    let (fonts, diagnostics) =
        execute_with_diagnostics(options.types.iter().copied(), options.as_ref(), registry)?;

    tracing::info!(
        "Generated {} font formats for {} icons {}",
        fonts.len(),
        options.names.len(),
        crate::utils::as_overhead(s)
    );

    let bundle = Bundle {
        fonts,
        options,
        diagnostics,
    };

    if bundle.options.write_files {
        bundle.write()?;
    }

    Ok(bundle)
}

/// The generated fonts together with the options they were built from.
#[derive(Debug)]
pub struct Bundle {
    fonts: Fonts<Format>,
    options: Arc<ResolvedOptions>,
    diagnostics: Diagnostics<Format>,
}

impl Bundle {
    pub fn fonts(&self) -> &Fonts<Format> {
        &self.fonts
    }

    pub fn get(&self, format: Format) -> Option<&Artifact> {
        self.fonts.get(&format)
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    /// Final codepoint of every icon.
    pub fn codepoints(&self) -> &BTreeMap<String, u32> {
        &self.options.codepoints
    }

    pub fn diagnostics(&self) -> &Diagnostics<Format> {
        &self.diagnostics
    }

    /// Render the stylesheet. Pass `urls` to point the `@font-face` rule at
    /// custom font locations, otherwise hashed default URLs are used.
    pub fn css(&self, urls: Option<&FontUrls>) -> Result<String, RenderError> {
        render::render_css(&self.options, urls)
    }

    pub fn html(&self) -> Result<String, RenderError> {
        render::render_html(&self.options)
    }

    /// Write every font to `<dest>/<fontName>.<type>`, followed by the
    /// stylesheet and HTML preview when enabled. Returns the written paths.
    pub fn write(&self) -> Result<Vec<Utf8PathBuf>, WebfontError> {
        let s = Instant::now();
        let mut written = Vec::new();

        for (&format, artifact) in self.fonts.iter() {
            let path = self.options.font_path(format);
            crate::output::write_file(&path, artifact)
                .map_err(|err| WebfontError::Write(path.clone(), err))?;
            written.push(path);
        }

        if self.options.css {
            let css = self.css(None)?;
            let path = self.options.css_dest.clone();
            crate::output::write_file(&path, css)
                .map_err(|err| WebfontError::Write(path.clone(), err))?;
            written.push(path);
        }

        if self.options.html {
            let html = self.html()?;
            let path = self.options.html_dest.clone();
            crate::output::write_file(&path, html)
                .map_err(|err| WebfontError::Write(path.clone(), err))?;
            written.push(path);
        }

        tracing::info!(
            "Wrote {} files to {} {}",
            written.len(),
            self.options.dest,
            crate::utils::as_overhead(s)
        );

        Ok(written)
    }
}
