use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Instant;

use petgraph::graph::NodeIndex;
use tracing::{Level, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::engine::plan::Plan;
use crate::engine::{Artifact, Diagnostics, FormatKey, TaskExecution};
use crate::error::GenerationError;

/// Shared state of a single graph run. Every field is indexed by
/// `NodeIndex::index()`.
struct Run<'a, 'r, K, O>
where
    K: FormatKey,
{
    plan: &'a Plan<'r, K, O>,
    options: &'a O,
    dependents: Vec<Vec<NodeIndex>>,
    /// Unfinished dependencies per node.
    pending: Vec<AtomicUsize>,
    artifacts: Vec<OnceLock<Artifact>>,
    failure: OnceLock<GenerationError>,
    execution_times: Mutex<HashMap<K, TaskExecution>>,
    root_span: Span,
}

/// This function executes the format graph using the rayon thread pool. It
/// performs a parallel topological sort of the graph, where generators are
/// executed as soon as their dependencies are met.
///
/// The algorithm works as follows:
/// 1. Every node starts with a count of its unfinished dependencies.
/// 2. Nodes with a count of zero are spawned onto the scope.
/// 3. When a generator completes, its artifact is stored and the counts of
///    all nodes depending on it are decremented by the finishing task.
/// 4. The task that brings a count to zero spawns that node.
/// 5. The first failure is recorded and nothing new starts. Generators
///    already in flight finish and are discarded.
///
/// No thread ever blocks waiting for results, so the run also makes progress
/// when called from inside a rayon worker.
pub(crate) fn run_tasks_parallel<K, O>(
    plan: &Plan<'_, K, O>,
    options: &O,
) -> Result<(HashMap<NodeIndex, Artifact>, Diagnostics<K>), GenerationError>
where
    K: FormatKey,
    O: Sync,
{
    let graph = &plan.graph;
    let total_tasks = graph.node_count();

    if total_tasks == 0 {
        return Ok((HashMap::new(), Diagnostics::default()));
    }

    let root_span = tracing::span!(Level::INFO, "generating_fonts");
    root_span.pb_set_length(total_tasks as u64);
    root_span.pb_set_style(&crate::utils::STYLE_BUILD);
    root_span.pb_set_message("Generating fonts...");
    let _enter = root_span.enter();

    let run = Run::new(plan, options, root_span.clone());

    // Roots are picked before anything runs, finishing tasks lower the
    // counts of later nodes concurrently.
    let roots: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|index| run.pending[index.index()].load(Ordering::Acquire) == 0)
        .collect();

    rayon::in_place_scope(|s| {
        for index in roots {
            run.spawn(s, index);
        }
    });

    let Run {
        artifacts,
        failure,
        execution_times,
        ..
    } = run;

    if let Some(err) = failure.into_inner() {
        return Err(err);
    }

    let cache: HashMap<NodeIndex, Artifact> = artifacts
        .into_iter()
        .enumerate()
        .filter_map(|(i, artifact)| Some((NodeIndex::new(i), artifact.into_inner()?)))
        .collect();

    let execution_times = execution_times
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);

    tracing::info!(formats = cache.len(), "font generation complete");
    Ok((cache, Diagnostics { execution_times }))
}

impl<'a, 'r, K, O> Run<'a, 'r, K, O>
where
    K: FormatKey,
    O: Sync,
{
    fn new(plan: &'a Plan<'r, K, O>, options: &'a O, root_span: Span) -> Self {
        let graph = &plan.graph;

        // Build a map from a dependency to the nodes that depend on it.
        let mut dependents = vec![Vec::new(); graph.node_count()];
        for edge in graph.raw_edges() {
            dependents[edge.source().index()].push(edge.target());
        }

        let pending = graph
            .node_indices()
            .map(|i| {
                AtomicUsize::new(
                    graph
                        .neighbors_directed(i, petgraph::Direction::Incoming)
                        .count(),
                )
            })
            .collect();

        Self {
            plan,
            options,
            dependents,
            pending,
            artifacts: (0..graph.node_count()).map(|_| OnceLock::new()).collect(),
            failure: OnceLock::new(),
            execution_times: Mutex::new(HashMap::new()),
            root_span,
        }
    }

    fn failed(&self) -> bool {
        self.failure.get().is_some()
    }

    fn spawn<'s>(&'s self, scope: &rayon::Scope<'s>, index: NodeIndex) {
        scope.spawn(move |scope| {
            if self.failed() {
                return;
            }

            if let Err(err) = self.generate(index) {
                let _ = self.failure.set(err);
                return;
            }

            for &dependent in &self.dependents[index.index()] {
                // The last dependency to finish hands the node over.
                if self.pending[dependent.index()].fetch_sub(1, Ordering::AcqRel) == 1
                    && !self.failed()
                {
                    self.spawn(scope, dependent);
                }
            }
        });
    }

    fn generate(&self, index: NodeIndex) -> Result<(), GenerationError> {
        let node = &self.plan.graph[index];

        // Artifacts are reference counted, cloning only bumps the count.
        let dependencies = node
            .dependencies
            .iter()
            .map(|dep| {
                self.artifacts[dep.index()].get().cloned().ok_or_else(|| {
                    GenerationError::new(
                        node.name.to_string(),
                        anyhow::anyhow!(
                            "dependency `{}` produced no artifact",
                            self.plan.graph[*dep].name
                        ),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let span =
            tracing::span!(parent: &self.root_span, Level::INFO, "task", name = %node.name);
        span.pb_set_style(&crate::utils::STYLE_TASK);
        span.pb_set_message(&format!("Generating {}", node.name));
        let _enter = span.enter();

        let start = Instant::now();

        // A panicking generator only owns its dependency clones, the shared
        // options are read-only.
        let output = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (node.descriptor.generate)(self.options, &dependencies)
        })) {
            Ok(result) => result,
            Err(panic) => {
                let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                    format!("Generator panicked: {s}")
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    format!("Generator panicked: {s}")
                } else {
                    String::from("Generator panicked with unknown payload")
                };

                Err(anyhow::anyhow!(msg))
            }
        };

        let duration = start.elapsed();

        let artifact = output.map_err(|err| {
            tracing::error!(format = %node.name, "generator failed");
            GenerationError::new(node.name.to_string(), err)
        })?;

        tracing::debug!(format = %node.name, bytes = artifact.len(), ?duration, "generated");

        self.execution_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node.name.clone(), TaskExecution { start, duration });

        // Set once: every node is spawned by exactly one finishing dependency.
        let _ = self.artifacts[index.index()].set(artifact);
        self.root_span.pb_inc(1);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Registry;

    fn registry() -> Registry<&'static str, ()> {
        Registry::new()
            .register("svg", [], |_, _| Ok(Artifact::from("svg")))
            .register("ttf", ["svg"], |_, deps| Ok(deps[0].clone()))
    }

    #[test]
    fn test_generate_without_dependency_artifact_is_an_error() {
        let registry = registry();
        let plan = Plan::new(["ttf"], &registry).unwrap();
        let run = Run::new(&plan, &(), Span::none());

        let (_, ttf) = plan.requested()[0];
        let err = run.generate(ttf).unwrap_err();

        assert_eq!(err.format, "ttf");
        assert_eq!(err.source.to_string(), "dependency `svg` produced no artifact");
    }

    #[test]
    fn test_run_records_artifacts_and_times() {
        let registry = registry();
        let plan = Plan::new(["ttf"], &registry).unwrap();

        let (cache, diagnostics) = run_tasks_parallel(&plan, &()).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache[&plan.requested()[0].1].as_str(), Some("svg"));
        assert_eq!(diagnostics.execution_times.len(), 2);
    }
}
