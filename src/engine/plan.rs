use std::collections::HashMap;

use petgraph::Graph;
use petgraph::graph::NodeIndex;

use crate::engine::{Descriptor, FormatKey, Registry};
use crate::error::ConfigError;

/// A single planned generator invocation.
pub(crate) struct Node<'r, K, O> {
    pub name: K,
    pub descriptor: &'r Descriptor<K, O>,
    /// Dependency nodes in the order the descriptor declares them.
    pub dependencies: Vec<NodeIndex>,
}

/// The task graph of one build.
///
/// Holds only the requested formats and their transitive dependencies, with
/// exactly one node per format name.
pub(crate) struct Plan<'r, K, O> {
    pub graph: Graph<Node<'r, K, O>, ()>,
    tasks: HashMap<K, NodeIndex>,
    requested: Vec<(K, NodeIndex)>,
}

impl<'r, K, O> Plan<'r, K, O>
where
    K: FormatKey,
{
    pub fn new(
        requested: impl IntoIterator<Item = K>,
        registry: &'r Registry<K, O>,
    ) -> Result<Self, ConfigError> {
        let mut plan = Plan {
            graph: Graph::new(),
            tasks: HashMap::new(),
            requested: Vec::new(),
        };

        let mut stack = Vec::new();

        for name in requested {
            let index = plan.task(&name, registry, &mut stack)?;

            if !plan.requested.iter().any(|(seen, _)| seen == &name) {
                plan.requested.push((name, index));
            }
        }

        // The recursive walk already rejects cycles, toposort double checks
        // the finished graph.
        if let Err(cycle) = petgraph::algo::toposort(&plan.graph, None) {
            let name = plan.graph[cycle.node_id()].name.to_string();
            return Err(ConfigError::Cycle(vec![name]));
        }

        tracing::debug!(
            tasks = plan.graph.node_count(),
            requested = plan.requested.len(),
            "planned format graph"
        );

        Ok(plan)
    }

    /// Returns the node for `name`, creating it and its dependencies on first
    /// use. `stack` holds the chain of formats currently being planned.
    fn task(
        &mut self,
        name: &K,
        registry: &'r Registry<K, O>,
        stack: &mut Vec<K>,
    ) -> Result<NodeIndex, ConfigError> {
        if let Some(&index) = self.tasks.get(name) {
            return Ok(index);
        }

        if let Some(start) = stack.iter().position(|k| k == name) {
            let mut path: Vec<String> = stack[start..].iter().map(ToString::to_string).collect();
            path.push(name.to_string());
            return Err(ConfigError::Cycle(path));
        }

        let Some(descriptor) = registry.get(name) else {
            return Err(match stack.last() {
                Some(dependent) => ConfigError::UnknownDependency {
                    name: name.to_string(),
                    dependent: dependent.to_string(),
                },
                None => ConfigError::UnknownFormat(name.to_string()),
            });
        };

        stack.push(name.clone());
        let dependencies = descriptor
            .dependencies
            .iter()
            .map(|dependency| self.task(dependency, registry, stack))
            .collect::<Result<Vec<_>, _>>()?;
        stack.pop();

        let index = self.graph.add_node(Node {
            name: name.clone(),
            descriptor,
            dependencies: dependencies.clone(),
        });

        for dependency in dependencies {
            self.graph.add_edge(dependency, index, ());
        }

        self.tasks.insert(name.clone(), index);

        Ok(index)
    }

    pub fn requested(&self) -> &[(K, NodeIndex)] {
        &self.requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Artifact;

    fn noop(_: &(), _: &[Artifact]) -> anyhow::Result<Artifact> {
        Ok(Artifact::from(""))
    }

    #[test]
    fn test_plan_contains_only_closure() {
        let registry: Registry<&str, ()> = Registry::new()
            .register("svg", [], noop)
            .register("ttf", ["svg"], noop)
            .register("woff", ["ttf"], noop)
            .register("eot", ["ttf"], noop)
            .register("unused", [], noop);

        let plan = Plan::new(["woff", "eot"], &registry).unwrap();

        let mut names: Vec<_> = plan.graph.node_weights().map(|node| node.name).collect();
        names.sort();
        assert_eq!(names, vec!["eot", "svg", "ttf", "woff"]);
        assert_eq!(plan.graph.edge_count(), 3);
    }

    #[test]
    fn test_plan_keeps_declared_dependency_order() {
        let registry: Registry<&str, ()> = Registry::new()
            .register("b", [], noop)
            .register("a", [], noop)
            .register("joined", ["b", "a"], noop);

        let plan = Plan::new(["joined"], &registry).unwrap();

        let (_, index) = plan.requested()[0];
        let deps: Vec<_> = plan.graph[index]
            .dependencies
            .iter()
            .map(|&dep| plan.graph[dep].name)
            .collect();
        assert_eq!(deps, vec!["b", "a"]);
    }

    #[test]
    fn test_plan_reports_unknown_dependency() {
        let registry: Registry<&str, ()> = Registry::new().register("ttf", ["svg"], noop);

        let err = Plan::new(["ttf"], &registry).err().unwrap();

        assert_eq!(
            err,
            ConfigError::UnknownDependency {
                name: "svg".into(),
                dependent: "ttf".into(),
            }
        );
    }

    #[test]
    fn test_plan_reports_cycle_path() {
        let registry: Registry<&str, ()> = Registry::new()
            .register("a", ["b"], noop)
            .register("b", ["c"], noop)
            .register("c", ["a"], noop);

        let err = Plan::new(["a"], &registry).err().unwrap();

        assert_eq!(
            err,
            ConfigError::Cycle(vec!["a".into(), "b".into(), "c".into(), "a".into()])
        );
    }

    #[test]
    fn test_plan_rejects_self_dependency() {
        let registry: Registry<&str, ()> = Registry::new().register("a", ["a"], noop);

        let err = Plan::new(["a"], &registry).err().unwrap();

        assert_eq!(err, ConfigError::Cycle(vec!["a".into(), "a".into()]));
    }
}
