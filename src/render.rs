//! Stylesheet and HTML preview rendering.
//!
//! Both are plain `minijinja` templates filled from the resolved options. The
//! stylesheet references every generated font through a URL carrying a
//! content hash, so browsers pick up new glyphs after a rebuild.

use std::borrow::Cow;
use std::collections::BTreeMap;

use minijinja::{AutoEscape, Environment};
use serde_json::Value;

use crate::error::RenderError;
use crate::format::Format;
use crate::options::{BundledTemplate, ResolvedOptions, TemplateSource};
use crate::output::relative_path;

const TEMPLATE_CSS: &str = include_str!("../templates/css.jinja");
const TEMPLATE_SCSS: &str = include_str!("../templates/scss.jinja");
const TEMPLATE_HTML: &str = include_str!("../templates/html.jinja");

/// Font URLs by format, as used in the stylesheet `src` list.
pub type FontUrls = BTreeMap<Format, String>;

/// Hash over the contents of every icon and the options themselves.
pub(crate) fn calc_hash(options: &ResolvedOptions) -> Result<String, RenderError> {
    let mut hasher = blake3::Hasher::new();

    for file in &options.files {
        let contents =
            std::fs::read(file).map_err(|err| RenderError::Icon(file.clone(), err))?;
        hasher.update(&contents);
    }

    hasher.update(serde_json::to_string(options)?.as_bytes());

    Ok(hasher.finalize().to_hex().to_string())
}

/// Joins `base` and `path` with exactly one slash between them.
fn url_join(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

/// `<fontName>.<type>?<hash>`, prefixed with `cssFontsUrl` when set.
pub fn make_urls(options: &ResolvedOptions) -> Result<FontUrls, RenderError> {
    let hash = calc_hash(options)?;
    let base = options
        .css_fonts_url
        .as_deref()
        .map(|url| url.replace('\\', "/"))
        .filter(|url| !url.is_empty());

    Ok(options
        .types
        .iter()
        .map(|&format| {
            let file = format!("{}.{}?{}", options.font_name, format, hash);
            let url = match &base {
                Some(base) => url_join(base, &file),
                None => file,
            };
            (format, url)
        })
        .collect())
}

fn src_entry(format: Format, url: &str, font_name: &str) -> String {
    match format {
        Format::Eot => format!(r#"url("{url}?#iefix") format("embedded-opentype")"#),
        Format::Woff2 => format!(r#"url("{url}") format("woff2")"#),
        Format::Woff => format!(r#"url("{url}") format("woff")"#),
        Format::Ttf => format!(r#"url("{url}") format("truetype")"#),
        Format::Svg => format!(r#"url("{url}#{font_name}") format("svg")"#),
    }
}

/// The `src` descriptor of the `@font-face` rule, following `order` and
/// limited to the generated `types`.
pub(crate) fn make_src(options: &ResolvedOptions, urls: &FontUrls) -> String {
    options
        .order
        .iter()
        .filter(|format| options.types.contains(format))
        .filter_map(|&format| {
            urls.get(&format)
                .map(|url| src_entry(format, url, &options.font_name))
        })
        .collect::<Vec<_>>()
        .join(",\n")
}

fn load_template(source: &TemplateSource) -> Result<(String, Cow<'static, str>), RenderError> {
    Ok(match source {
        TemplateSource::Bundled(BundledTemplate::Css) => ("css".into(), TEMPLATE_CSS.into()),
        TemplateSource::Bundled(BundledTemplate::Scss) => ("scss".into(), TEMPLATE_SCSS.into()),
        TemplateSource::Bundled(BundledTemplate::Html) => ("html".into(), TEMPLATE_HTML.into()),
        TemplateSource::File(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|err| RenderError::Template(path.clone(), err))?;
            (path.to_string(), text.into())
        }
    })
}

/// Drops the first period, turning a selector like `.icon` into a class name.
fn remove_periods(selector: String) -> String {
    selector.replacen('.', "", 1)
}

fn render(
    source: &TemplateSource,
    escape: AutoEscape,
    context: serde_json::Map<String, Value>,
) -> Result<String, RenderError> {
    let (name, text) = load_template(source)?;

    let mut env = Environment::new();
    env.set_auto_escape_callback(move |_| escape.clone());
    env.add_filter("remove_periods", remove_periods);
    env.add_template(&name, &text)?;

    Ok(env.get_template(&name)?.render(context)?)
}

fn template_context(options: &ResolvedOptions) -> serde_json::Map<String, Value> {
    let mut context = serde_json::Map::new();
    context.insert("fontName".into(), options.font_name.clone().into());
    context
}

/// Renders the stylesheet. Without `urls`, they are computed by [`make_urls`].
pub fn render_css(
    options: &ResolvedOptions,
    urls: Option<&FontUrls>,
) -> Result<String, RenderError> {
    let computed;
    let urls = match urls {
        Some(urls) => urls,
        None => {
            computed = make_urls(options)?;
            &computed
        }
    };

    let codepoints: serde_json::Map<String, Value> = options
        .codepoints
        .iter()
        .map(|(name, codepoint)| (name.clone(), Value::String(format!("{codepoint:x}"))))
        .collect();

    let mut context = template_context(options);
    context.insert("src".into(), make_src(options, urls).into());
    context.insert("codepoints".into(), Value::Object(codepoints));
    context.extend(options.template_options.clone());

    render(&options.css_template, AutoEscape::None, context)
}

/// Renders the HTML preview page with the default stylesheet embedded. Font
/// URLs in the embedded styles are relative to the HTML file.
pub fn render_html(options: &ResolvedOptions) -> Result<String, RenderError> {
    let html_dir = options.html_dest.parent().unwrap_or(camino::Utf8Path::new(""));

    let mut css_options = options.clone();
    css_options.css_fonts_url = Some(relative_path(html_dir, &options.dest).into_string());
    css_options.css_template = TemplateSource::Bundled(BundledTemplate::Css);

    let styles = render_css(&css_options, None)?;

    let mut context = template_context(options);
    context.insert("names".into(), options.names.clone().into());
    context.insert("styles".into(), styles.into());
    context.extend(options.template_options.clone());

    render(&options.html_template, AutoEscape::Html, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::WebfontOptions;
    use crate::options::tests::Scratch;

    fn resolved(scratch: &Scratch, configure: impl FnOnce(&mut WebfontOptions)) -> ResolvedOptions {
        let add = scratch.icon("icons/add.svg");
        let close = scratch.icon("icons/close.svg");
        let mut options = WebfontOptions::new([add.as_str(), close.as_str()], scratch.path("dist"));
        configure(&mut options);
        options.resolve().unwrap()
    }

    #[test]
    fn test_url_join() {
        assert_eq!(url_join("/fonts/", "a.woff"), "/fonts/a.woff");
        assert_eq!(url_join("https://cdn.example.com", "a.woff"), "https://cdn.example.com/a.woff");
    }

    #[test]
    fn test_remove_periods() {
        assert_eq!(remove_periods(".icon".into()), "icon");
        assert_eq!(remove_periods("a.b.c".into()), "ab.c");
    }

    #[test]
    fn test_hash_changes_with_icons() {
        let scratch = Scratch::new("render-hash");
        let options = resolved(&scratch, |_| {});

        let before = calc_hash(&options).unwrap();
        assert_eq!(before, calc_hash(&options).unwrap());

        std::fs::write(&options.files[0], "<svg/>").unwrap();
        assert_ne!(before, calc_hash(&options).unwrap());
    }

    #[test]
    fn test_urls_use_base_url() {
        let scratch = Scratch::new("render-urls");
        let options = resolved(&scratch, |o| o.css_fonts_url = Some("static\\fonts\\".into()));

        let urls = make_urls(&options).unwrap();
        let hash = calc_hash(&options).unwrap();

        assert_eq!(urls.len(), 3);
        assert_eq!(urls[&Format::Woff], format!("static/fonts/iconfont.woff?{hash}"));
    }

    #[test]
    fn test_src_follows_order() {
        let scratch = Scratch::new("render-src");
        let options = resolved(&scratch, |o| {
            o.types = Some(vec![Format::Svg, Format::Woff, Format::Eot]);
        });

        let urls = FontUrls::from([
            (Format::Svg, "f.svg".to_string()),
            (Format::Woff, "f.woff".to_string()),
            (Format::Eot, "f.eot".to_string()),
        ]);

        assert_eq!(
            make_src(&options, &urls),
            [
                r#"url("f.eot?#iefix") format("embedded-opentype")"#,
                r#"url("f.woff") format("woff")"#,
                r#"url("f.svg#iconfont") format("svg")"#,
            ]
            .join(",\n")
        );
    }

    #[test]
    fn test_render_css() {
        let scratch = Scratch::new("render-css");
        let options = resolved(&scratch, |o| {
            o.codepoints.insert("close".into(), 0xE00A);
        });

        let urls = FontUrls::from([
            (Format::Eot, "x.eot".to_string()),
            (Format::Woff, "x.woff".to_string()),
            (Format::Woff2, "x.woff2".to_string()),
        ]);
        let css = render_css(&options, Some(&urls)).unwrap();

        assert!(css.contains(r#"font-family: "iconfont";"#));
        assert!(css.contains(r#"url("x.woff2") format("woff2")"#));
        assert!(css.contains(".icon:before {"));
        assert!(css.contains(".icon-add:before {\n\tcontent: \"\\f101\";"));
        assert!(css.contains(".icon-close:before {\n\tcontent: \"\\e00a\";"));
    }

    #[test]
    fn test_render_scss_template() {
        let scratch = Scratch::new("render-scss");
        let options = resolved(&scratch, |o| {
            o.css_template = Some(TemplateSource::Bundled(BundledTemplate::Scss));
        });

        let scss = render_css(&options, None).unwrap();

        assert!(scss.contains("$iconfont-font: \"iconfont\";"));
        assert!(scss.contains("map-get($iconfont-map, \"add\")"));
    }

    #[test]
    fn test_render_custom_template() {
        let scratch = Scratch::new("render-custom");
        let template = scratch.path("custom.css");
        std::fs::write(&template, "{{ fontName }}|{{ classPrefix }}|{{ accent }}").unwrap();

        let options = resolved(&scratch, |o| {
            o.css_template = Some(TemplateSource::File(template.clone()));
            o.template_options.insert("accent".into(), "red".into());
        });

        assert_eq!(render_css(&options, None).unwrap(), "iconfont|icon-|red");
    }

    #[test]
    fn test_missing_template() {
        let scratch = Scratch::new("render-missing");
        let options = resolved(&scratch, |o| {
            o.css_template = Some(TemplateSource::File(scratch.path("nope.css")));
        });

        assert!(matches!(render_css(&options, None), Err(RenderError::Template(..))));
    }

    #[test]
    fn test_render_html() {
        let scratch = Scratch::new("render-html");
        let options = resolved(&scratch, |o| {
            o.html_dest = Some(scratch.path("preview/index.html"));
            o.template_options.insert("baseSelector".into(), ".glyph".into());
        });

        let html = render_html(&options).unwrap();

        assert!(html.contains("<title>iconfont</title>"));
        assert!(html.contains(r#"<i class="glyph icon-add"></i>"#));
        assert!(html.contains(r#"<span class="label">close</span>"#));
        // Embedded styles point from preview/ back into dist/.
        assert!(html.contains(r#"url("../dist/iconfont.woff?"#));
    }
}
