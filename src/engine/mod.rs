//! The format task graph.
//!
//! A [`Registry`] maps format names to [`Descriptor`]s: an ordered list of
//! prerequisite formats plus a generator callback. [`execute`] takes a set of
//! requested names, plans the smallest graph that produces them and runs it on
//! the rayon pool.
//!
//! ## Memoization
//!
//! Planning creates tasks on demand. When a format is first needed its
//! dependencies are planned (in declared order), then a single node is added
//! to the graph and cached by name. Every later request for the same name,
//! whether from the caller or from another descriptor, reuses that node. A
//! diamond such as `woff -> ttf -> svg <- ttf <- eot` therefore runs `svg` and
//! `ttf` exactly once, and both `woff` and `eot` read the same [`Artifact`].
//!
//! ## Keys
//!
//! The graph is generic over its key type. The built-in font formats use the
//! [`Format`](crate::Format) enum, but anything implementing [`FormatKey`]
//! works, so registries can also be keyed by plain strings.

mod diagnostics;
mod plan;
mod runner;

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::Arc;

use tracing::Level;

use crate::error::BuildError;

pub use diagnostics::{Diagnostics, TaskExecution};

/// Anything that can name a node in the format graph.
pub trait FormatKey: Clone + Eq + Hash + Ord + Debug + Display + Send + Sync + 'static {}

impl<T> FormatKey for T where T: Clone + Eq + Hash + Ord + Debug + Display + Send + Sync + 'static {}

/// The output of a single generator. Cheap to clone, the payload is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// Text content (UTF-8).
    Utf8(Arc<str>),
    /// Binary content (raw bytes).
    Binary(Arc<[u8]>),
}

impl Artifact {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Artifact::Utf8(text) => Some(text),
            Artifact::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Artifact::Utf8(text) => text.as_bytes(),
            Artifact::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AsRef<[u8]> for Artifact {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<String> for Artifact {
    fn from(value: String) -> Self {
        Artifact::Utf8(value.into())
    }
}

impl From<&str> for Artifact {
    fn from(value: &str) -> Self {
        Artifact::Utf8(value.into())
    }
}

impl From<Vec<u8>> for Artifact {
    fn from(value: Vec<u8>) -> Self {
        Artifact::Binary(value.into())
    }
}

/// Generator callback. Receives the shared build options and the artifacts of
/// its dependencies, in the order the descriptor declares them.
pub type GenerateFn<O> = Arc<dyn Fn(&O, &[Artifact]) -> anyhow::Result<Artifact> + Send + Sync>;

/// A single entry of the [`Registry`].
pub struct Descriptor<K, O> {
    pub(crate) dependencies: Vec<K>,
    pub(crate) generate: GenerateFn<O>,
}

impl<K, O> Descriptor<K, O> {
    pub fn new<F>(dependencies: impl IntoIterator<Item = K>, generate: F) -> Self
    where
        F: Fn(&O, &[Artifact]) -> anyhow::Result<Artifact> + Send + Sync + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().collect(),
            generate: Arc::new(generate),
        }
    }

    pub fn dependencies(&self) -> &[K] {
        &self.dependencies
    }
}

impl<K: Clone, O> Clone for Descriptor<K, O> {
    fn clone(&self) -> Self {
        Self {
            dependencies: self.dependencies.clone(),
            generate: self.generate.clone(),
        }
    }
}

impl<K: Debug, O> Debug for Descriptor<K, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Descriptor")
            .field("dependencies", &self.dependencies)
            .field("generate", &"Fn(*)")
            .finish()
    }
}

/// The set of known formats. Configuration, not build state: a registry is
/// only ever read by [`execute`].
pub struct Registry<K, O> {
    descriptors: HashMap<K, Descriptor<K, O>>,
}

impl<K: FormatKey, O> Registry<K, O> {
    pub fn new() -> Self {
        Self {
            descriptors: HashMap::new(),
        }
    }

    /// Add a format, replacing any previous descriptor with the same name.
    pub fn register<F>(mut self, name: K, dependencies: impl IntoIterator<Item = K>, generate: F) -> Self
    where
        F: Fn(&O, &[Artifact]) -> anyhow::Result<Artifact> + Send + Sync + 'static,
    {
        self.insert(name, Descriptor::new(dependencies, generate));
        self
    }

    pub fn insert(&mut self, name: K, descriptor: Descriptor<K, O>) -> Option<Descriptor<K, O>> {
        self.descriptors.insert(name, descriptor)
    }

    pub fn get(&self, name: &K) -> Option<&Descriptor<K, O>> {
        self.descriptors.get(name)
    }

    pub fn contains(&self, name: &K) -> bool {
        self.descriptors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &K> {
        self.descriptors.keys()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl<K: FormatKey, O> Default for Registry<K, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: FormatKey, O> Debug for Registry<K, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sorted: BTreeMap<_, _> = self.descriptors.iter().collect();
        f.debug_map().entries(sorted).finish()
    }
}

/// The artifacts of a build, one per requested format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fonts<K: Ord> {
    artifacts: BTreeMap<K, Artifact>,
}

impl<K: Ord> Fonts<K> {
    pub fn get(&self, name: &K) -> Option<&Artifact> {
        self.artifacts.get(name)
    }

    pub fn contains(&self, name: &K) -> bool {
        self.artifacts.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.artifacts.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Artifact)> {
        self.artifacts.iter()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<K, Artifact> {
        self.artifacts
    }
}

impl<K: Ord> IntoIterator for Fonts<K> {
    type Item = (K, Artifact);
    type IntoIter = std::collections::btree_map::IntoIter<K, Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.into_iter()
    }
}

/// Generate every requested format.
///
/// The returned [`Fonts`] holds exactly the requested names; formats that are
/// only needed as intermediates are computed but dropped. Unknown names and
/// dependency cycles are reported before any generator runs. The first
/// generator failure aborts the build, and nothing that depends on the failed
/// format is started.
pub fn execute<K, O>(
    requested: impl IntoIterator<Item = K>,
    options: &O,
    registry: &Registry<K, O>,
) -> Result<Fonts<K>, BuildError>
where
    K: FormatKey,
    O: Sync,
{
    execute_with_diagnostics(requested, options, registry).map(|(fonts, _)| fonts)
}

/// Same as [`execute`], additionally returning per-task timings.
pub fn execute_with_diagnostics<K, O>(
    requested: impl IntoIterator<Item = K>,
    options: &O,
    registry: &Registry<K, O>,
) -> Result<(Fonts<K>, Diagnostics<K>), BuildError>
where
    K: FormatKey,
    O: Sync,
{
    let span = tracing::span!(Level::INFO, "execute");
    let _enter = span.enter();

    let plan = plan::Plan::new(requested, registry)?;
    let (mut cache, diagnostics) = runner::run_tasks_parallel(&plan, options)?;

    let artifacts = plan
        .requested()
        .iter()
        .filter_map(|(name, index)| cache.remove(index).map(|artifact| (name.clone(), artifact)))
        .collect();

    Ok((Fonts { artifacts }, diagnostics))
}
