//! User facing options and their resolution into a frozen build snapshot.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codepoints::{self, DEFAULT_START_CODEPOINT};
use crate::error::ValidationError;
use crate::format::Format;

pub const DEFAULT_FONT_NAME: &str = "iconfont";
pub const DEFAULT_TYPES: [Format; 3] = [Format::Eot, Format::Woff, Format::Woff2];
pub const DEFAULT_ORDER: [Format; 5] = [
    Format::Eot,
    Format::Woff2,
    Format::Woff,
    Format::Ttf,
    Format::Svg,
];

static NULL: Value = Value::Null;

/// Maps a source file to an icon name.
#[derive(Clone)]
pub struct Rename(Arc<dyn Fn(&Utf8Path) -> String + Send + Sync>);

impl Rename {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Utf8Path) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    fn apply(&self, path: &Utf8Path) -> String {
        (self.0)(path)
    }
}

impl Debug for Rename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rename(*)")
    }
}

/// Default icon name: the file name without its extension.
fn file_stem(path: &Utf8Path) -> String {
    path.file_stem().unwrap_or(path.as_str()).to_string()
}

/// Either one of the bundled templates or a template file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateSource {
    Bundled(BundledTemplate),
    File(Utf8PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundledTemplate {
    Css,
    Scss,
    Html,
}

/// Options as supplied by the user, typically deserialized from JSON.
///
/// Only `files` and `dest` are required, everything else has a default that
/// is filled in by [`WebfontOptions::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebfontOptions {
    /// Icon files. Entries containing glob metacharacters are expanded.
    pub files: Option<Vec<String>>,
    /// Directory for the generated fonts.
    pub dest: Option<Utf8PathBuf>,
    pub font_name: Option<String>,
    pub css: Option<bool>,
    pub css_dest: Option<Utf8PathBuf>,
    pub css_template: Option<TemplateSource>,
    /// Base URL of the fonts in the generated stylesheet.
    pub css_fonts_url: Option<String>,
    /// Deprecated alias of `css_fonts_url`.
    pub css_fonts_path: Option<String>,
    pub html: Option<bool>,
    pub html_dest: Option<Utf8PathBuf>,
    pub html_template: Option<TemplateSource>,
    /// Formats to generate.
    pub types: Option<Vec<Format>>,
    /// Order of the formats in the stylesheet `src` list.
    pub order: Option<Vec<Format>>,
    /// Explicit codepoints by icon name.
    pub codepoints: BTreeMap<String, u32>,
    pub start_codepoint: Option<u32>,
    pub font_height: Option<f64>,
    pub descent: Option<f64>,
    pub normalize: Option<bool>,
    pub round: Option<f64>,
    /// Per format options handed to the toolchain untouched.
    pub format_options: BTreeMap<Format, Value>,
    /// Extra variables for the templates.
    pub template_options: serde_json::Map<String, Value>,
    pub write_files: Option<bool>,
    #[serde(skip)]
    pub rename: Option<Rename>,
}

impl WebfontOptions {
    pub fn new(
        files: impl IntoIterator<Item = impl Into<String>>,
        dest: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            files: Some(files.into_iter().map(Into::into).collect()),
            dest: Some(dest.into()),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_rename<F>(mut self, f: F) -> Self
    where
        F: Fn(&Utf8Path) -> String + Send + Sync + 'static,
    {
        self.rename = Some(Rename::new(f));
        self
    }

    /// Maps deprecated options onto their replacements.
    fn apply_deprecations(mut self) -> Self {
        if let Some(path) = self.css_fonts_path.take() {
            tracing::warn!("Option \"cssFontsPath\" is deprecated. Use \"cssFontsUrl\" instead.");
            self.css_fonts_url = Some(path);
        }

        if let Some(value) = self.template_options.get("baseClass") {
            tracing::warn!(
                "Using deprecated templateOptions \"baseClass\". Use \"baseSelector\" instead."
            );
            let class = match value {
                Value::String(class) => class.clone(),
                other => other.to_string(),
            };
            self.template_options
                .insert("baseSelector".into(), Value::String(format!(".{class}")));
        }

        self
    }

    /// Validates the options, fills in defaults, names the icons and assigns
    /// their codepoints.
    pub fn resolve(self) -> Result<ResolvedOptions, ValidationError> {
        let options = self.apply_deprecations();

        let dest = options.dest.ok_or(ValidationError::MissingDest)?;
        let patterns = options.files.ok_or(ValidationError::MissingFiles)?;
        if patterns.is_empty() {
            return Err(ValidationError::EmptyFiles);
        }

        let files = expand_files(&patterns)?;
        if files.is_empty() {
            return Err(ValidationError::EmptyFiles);
        }

        let names: Vec<String> = match &options.rename {
            Some(rename) => files.iter().map(|file| rename.apply(file)).collect(),
            None => files.iter().map(|file| file_stem(file)).collect(),
        };

        let mut seen = HashSet::new();
        if let Some(duplicate) = names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(ValidationError::DuplicateName(duplicate.clone()));
        }

        let start_codepoint = options.start_codepoint.unwrap_or(DEFAULT_START_CODEPOINT);
        let codepoints = codepoints::assign(&names, &options.codepoints, start_codepoint)?;

        let mut template_options = serde_json::Map::new();
        template_options.insert("baseSelector".into(), ".icon".into());
        template_options.insert("classPrefix".into(), "icon-".into());
        template_options.extend(options.template_options);

        let font_name = options
            .font_name
            .unwrap_or_else(|| DEFAULT_FONT_NAME.to_string());

        let css_dest = options
            .css_dest
            .unwrap_or_else(|| dest.join(format!("{font_name}.css")));
        let html_dest = options
            .html_dest
            .unwrap_or_else(|| dest.join(format!("{font_name}.html")));

        let mut types = Vec::new();
        for format in options.types.unwrap_or_else(|| DEFAULT_TYPES.to_vec()) {
            if !types.contains(&format) {
                types.push(format);
            }
        }

        let resolved = ResolvedOptions {
            files,
            names,
            codepoints,
            dest,
            font_name,
            css: options.css.unwrap_or(true),
            css_dest,
            css_template: options
                .css_template
                .unwrap_or(TemplateSource::Bundled(BundledTemplate::Css)),
            css_fonts_url: options.css_fonts_url,
            html: options.html.unwrap_or(false),
            html_dest,
            html_template: options
                .html_template
                .unwrap_or(TemplateSource::Bundled(BundledTemplate::Html)),
            types,
            order: options.order.unwrap_or_else(|| DEFAULT_ORDER.to_vec()),
            start_codepoint,
            font_height: options.font_height,
            descent: options.descent,
            normalize: options.normalize.unwrap_or(true),
            round: options.round,
            format_options: options.format_options,
            template_options,
            write_files: options.write_files.unwrap_or(true),
        };

        tracing::debug!(
            icons = resolved.files.len(),
            font = %resolved.font_name,
            "resolved options"
        );

        Ok(resolved)
    }
}

fn expand_files(patterns: &[String]) -> Result<Vec<Utf8PathBuf>, ValidationError> {
    let mut files = Vec::new();

    for pattern in patterns {
        // An existing file wins over a pattern, `[` is valid in file names.
        if !pattern.contains(['*', '?', '[']) || Utf8Path::new(pattern).is_file() {
            files.push(Utf8PathBuf::from(pattern));
            continue;
        }

        let entries =
            glob::glob(pattern).map_err(|err| ValidationError::GlobPattern(err.to_string()))?;

        for entry in entries {
            match entry.map(Utf8PathBuf::try_from) {
                Ok(Ok(path)) => files.push(path),
                Ok(Err(err)) => tracing::warn!("skipping non UTF-8 path {:?}", err.as_path()),
                Err(err) => tracing::warn!("skipping unreadable path: {err}"),
            }
        }
    }

    let mut seen = HashSet::new();
    files.retain(|file| seen.insert(file.clone()));

    Ok(files)
}

/// The frozen option snapshot every generator reads from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOptions {
    pub files: Vec<Utf8PathBuf>,
    /// Icon names, parallel to `files`.
    pub names: Vec<String>,
    pub codepoints: BTreeMap<String, u32>,
    pub dest: Utf8PathBuf,
    pub font_name: String,
    pub css: bool,
    pub css_dest: Utf8PathBuf,
    pub css_template: TemplateSource,
    pub css_fonts_url: Option<String>,
    pub html: bool,
    pub html_dest: Utf8PathBuf,
    pub html_template: TemplateSource,
    pub types: Vec<Format>,
    pub order: Vec<Format>,
    pub start_codepoint: u32,
    pub font_height: Option<f64>,
    pub descent: Option<f64>,
    pub normalize: bool,
    pub round: Option<f64>,
    pub format_options: BTreeMap<Format, Value>,
    pub template_options: serde_json::Map<String, Value>,
    pub write_files: bool,
}

impl ResolvedOptions {
    /// The `formatOptions` entry for `format`, or `null`.
    pub fn format_options(&self, format: Format) -> &Value {
        self.format_options.get(&format).unwrap_or(&NULL)
    }

    /// Where the artifact of `format` is written.
    pub fn font_path(&self, format: Format) -> Utf8PathBuf {
        self.dest.join(format!("{}.{}", self.font_name, format))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A throwaway directory under the system temp dir.
    pub(crate) struct Scratch {
        root: Utf8PathBuf,
    }

    impl Scratch {
        pub fn new(name: &str) -> Self {
            let root = Utf8PathBuf::try_from(std::env::temp_dir())
                .unwrap()
                .join(format!("webglyph-{name}-{}", std::process::id()));
            let _ = std::fs::remove_dir_all(&root);
            std::fs::create_dir_all(&root).unwrap();
            Self { root }
        }

        pub fn path(&self, rel: &str) -> Utf8PathBuf {
            self.root.join(rel)
        }

        /// Writes a small square icon and returns its path.
        pub fn icon(&self, rel: &str) -> Utf8PathBuf {
            let path = self.path(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(
                &path,
                r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path d="M4 4h16v16H4z"/></svg>"#,
            )
            .unwrap();
            path
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    #[test]
    fn test_defaults() {
        let options = WebfontOptions::new(["icons/add.svg", "icons/close.svg"], "dist")
            .resolve()
            .unwrap();

        assert_eq!(options.font_name, "iconfont");
        assert_eq!(options.names, vec!["add", "close"]);
        assert_eq!(options.types, DEFAULT_TYPES.to_vec());
        assert_eq!(options.order, DEFAULT_ORDER.to_vec());
        assert_eq!(options.css_dest, Utf8PathBuf::from("dist/iconfont.css"));
        assert_eq!(options.html_dest, Utf8PathBuf::from("dist/iconfont.html"));
        assert!(options.css);
        assert!(!options.html);
        assert!(options.normalize);
        assert!(options.write_files);
        assert_eq!(options.codepoints["add"], 0xF101);
        assert_eq!(options.codepoints["close"], 0xF102);
        assert_eq!(options.template_options["baseSelector"], ".icon");
        assert_eq!(options.template_options["classPrefix"], "icon-");
        assert_eq!(options.font_path(Format::Woff2), Utf8PathBuf::from("dist/iconfont.woff2"));
    }

    #[test]
    fn test_missing_dest() {
        let options = WebfontOptions {
            files: Some(vec!["add.svg".into()]),
            ..Default::default()
        };
        assert_eq!(options.resolve().unwrap_err(), ValidationError::MissingDest);
    }

    #[test]
    fn test_missing_and_empty_files() {
        let options = WebfontOptions {
            dest: Some("dist".into()),
            ..Default::default()
        };
        assert_eq!(options.resolve().unwrap_err(), ValidationError::MissingFiles);

        let options = WebfontOptions::new(Vec::<String>::new(), "dist");
        assert_eq!(options.resolve().unwrap_err(), ValidationError::EmptyFiles);
    }

    #[test]
    fn test_duplicate_names() {
        let options = WebfontOptions::new(["a/add.svg", "b/add.svg"], "dist");
        assert_eq!(
            options.resolve().unwrap_err(),
            ValidationError::DuplicateName("add".into())
        );
    }

    #[test]
    fn test_custom_rename() {
        let options = WebfontOptions::new(["icons/add.svg"], "dist")
            .with_rename(|path| format!("ui-{}", path.file_stem().unwrap()))
            .resolve()
            .unwrap();

        assert_eq!(options.names, vec!["ui-add"]);
        assert!(options.codepoints.contains_key("ui-add"));
    }

    #[test]
    fn test_deprecated_options() {
        let mut options = WebfontOptions::new(["add.svg"], "dist");
        options.css_fonts_path = Some("/fonts".into());
        options
            .template_options
            .insert("baseClass".into(), Value::String("glyph".into()));

        let options = options.resolve().unwrap();

        assert_eq!(options.css_fonts_url.as_deref(), Some("/fonts"));
        assert_eq!(options.template_options["baseSelector"], ".glyph");
    }

    #[test]
    fn test_from_json() {
        let options = WebfontOptions::from_json(
            r#"{
                "files": ["add.svg"],
                "dest": "out",
                "fontName": "glyphs",
                "types": ["woff2", "svg", "woff2"],
                "codepoints": { "add": 57345 },
                "cssTemplate": "scss",
                "htmlTemplate": "templates/preview.html",
                "formatOptions": { "ttf": { "ts": 0 } }
            }"#,
        )
        .unwrap()
        .resolve()
        .unwrap();

        assert_eq!(options.font_name, "glyphs");
        assert_eq!(options.types, vec![Format::Woff2, Format::Svg]);
        assert_eq!(options.codepoints["add"], 0xE001);
        assert_eq!(options.css_template, TemplateSource::Bundled(BundledTemplate::Scss));
        assert_eq!(
            options.html_template,
            TemplateSource::File("templates/preview.html".into())
        );
        assert_eq!(options.format_options(Format::Ttf)["ts"], 0);
        assert_eq!(options.format_options(Format::Woff), &Value::Null);
        assert_eq!(options.css_dest, Utf8PathBuf::from("out/glyphs.css"));
    }

    #[test]
    fn test_glob_files() {
        let scratch = Scratch::new("options-glob");
        scratch.icon("icons/b.svg");
        scratch.icon("icons/a.svg");
        scratch.icon("icons/readme.txt");

        let pattern = scratch.path("icons/*.svg");
        let options = WebfontOptions::new([pattern.as_str()], scratch.path("dist"))
            .resolve()
            .unwrap();

        assert_eq!(options.names, vec!["a", "b"]);
    }

    #[test]
    fn test_literal_path_with_brackets() {
        let scratch = Scratch::new("options-brackets");
        let add = scratch.icon("icons/[old]/add.svg");

        let options = WebfontOptions::new([add.as_str()], scratch.path("dist"))
            .resolve()
            .unwrap();

        assert_eq!(options.files, vec![add]);
        assert_eq!(options.names, vec!["add"]);
    }

    #[test]
    fn test_glob_without_matches() {
        let scratch = Scratch::new("options-glob-empty");
        let pattern = scratch.path("*.svg");

        let err = WebfontOptions::new([pattern.as_str()], scratch.path("dist"))
            .resolve()
            .unwrap_err();

        assert_eq!(err, ValidationError::EmptyFiles);
    }
}
