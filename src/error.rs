use camino::Utf8PathBuf;
use thiserror::Error;

/// The task graph could not be planned. Raised before any generator runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown format '{0}' requested")]
    UnknownFormat(String),

    #[error("Format '{dependent}' depends on unknown format '{name}'")]
    UnknownDependency { name: String, dependent: String },

    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

/// A single generator failed. Carries the name of the failing format.
#[derive(Debug, Error)]
#[error("Format '{format}':\n{source}")]
pub struct GenerationError {
    pub format: String,
    #[source]
    pub source: anyhow::Error,
}

impl GenerationError {
    pub(crate) fn new(format: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            format: format.into(),
            source,
        }
    }
}

/// Failure of a single call to [`execute`](crate::engine::execute).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid task graph.\n{0}")]
    Config(#[from] ConfigError),

    #[error("Error while generating fonts.\n{0}")]
    Generation(#[from] GenerationError),
}

impl BuildError {
    /// Name of the format whose generator failed, if any.
    pub fn failed_format(&self) -> Option<&str> {
        match self {
            BuildError::Generation(e) => Some(&e.format),
            BuildError::Config(_) => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("\"options.dest\" is undefined.")]
    MissingDest,

    #[error("\"options.files\" is undefined.")]
    MissingFiles,

    #[error("\"options.files\" is empty.")]
    EmptyFiles,

    #[error("Icon name '{0}' is used by more than one file")]
    DuplicateName(String),

    #[error("Codepoint {value:#x} assigned to '{name}' is not a valid glyph codepoint")]
    InvalidCodepoint { name: String, value: u32 },

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Couldn't read template {0}.\n{1}")]
    Template(Utf8PathBuf, std::io::Error),

    #[error("Couldn't read icon {0}.\n{1}")]
    Icon(Utf8PathBuf, std::io::Error),

    #[error(transparent)]
    Jinja(#[from] minijinja::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Umbrella error returned by [`generate`](crate::generate).
#[derive(Debug, Error)]
pub enum WebfontError {
    #[error("Invalid options.\n{0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Error while rendering templates.\n{0}")]
    Render(#[from] RenderError),

    #[error("Couldn't write {0}.\n{1}")]
    Write(Utf8PathBuf, std::io::Error),

    #[error("Couldn't parse options.\n{0}")]
    Options(#[from] serde_json::Error),

    #[cfg(feature = "logging")]
    #[error("Couldn't install the tracing subscriber.\n{0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}
