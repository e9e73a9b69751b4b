use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::workspace::WorkspaceInfo;

#[derive(Debug, Error)]
pub enum Error {
    #[error("dependency cycle(s) detected: {}", format_cycles(.0))]
    Cycle(Vec<Vec<String>>),
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| {
            let mut path = cycle.clone();
            if let Some(first) = path.first().cloned() {
                path.push(first);
            }
            path.join(" -> ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Forward (`dependencies`) and reverse (`dependents`) adjacency for the
/// workspace-internal dependency relation. Built with `petgraph` the way
/// the teacher's `package_graph::builder` builds its workspace graph, minus
/// the lockfile/typestate machinery this system has no use for.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph from a workspace: for every package P and every
    /// name N in its dependencies/devDependencies, an edge P->N is added
    /// only if N is itself a workspace member. External dependency names
    /// are dropped entirely.
    pub fn build(workspace: &WorkspaceInfo) -> Self {
        Self::from_names_and_deps(workspace.packages.iter().map(|pkg| {
            let deps = pkg
                .dependencies
                .iter()
                .chain(pkg.dev_dependencies.iter())
                .cloned()
                .collect::<HashSet<_>>();
            (pkg.name.clone(), deps)
        }))
    }

    /// Builds the graph directly from `(name, declared_dependency_names)`
    /// pairs, filtering out any dependency name that isn't also one of the
    /// supplied package names. Exposed separately from `build` so the
    /// graph's invariants can be property-tested without a full
    /// `WorkspaceInfo`.
    pub fn from_names_and_deps<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, HashSet<String>)>,
    {
        let entries: Vec<_> = entries.into_iter().collect();
        let known_names: HashSet<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();

        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for (name, _) in &entries {
            let idx = graph.add_node(name.clone());
            nodes.insert(name.clone(), idx);
        }
        for (name, deps) in &entries {
            let from = nodes[name];
            for dep in deps {
                if known_names.contains(dep.as_str()) {
                    graph.add_edge(from, nodes[dep], ());
                }
            }
        }

        Self { graph, nodes }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn dependencies(&self, name: &str) -> HashSet<String> {
        let Some(&idx) = self.nodes.get(name) else {
            return HashSet::new();
        };
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    pub fn dependents(&self, name: &str) -> HashSet<String> {
        let Some(&idx) = self.nodes.get(name) else {
            return HashSet::new();
        };
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    pub fn roots(&self) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|name| self.dependencies(name).is_empty())
            .cloned()
            .collect()
    }

    pub fn leaves(&self) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|name| self.dependents(name).is_empty())
            .cloned()
            .collect()
    }

    pub fn package_names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Kahn's algorithm starting from packages with no outgoing edges
    /// (dependencies), so every package appears after all its workspace
    /// dependencies. On a cycle, returns `Error::Cycle` with every cycle
    /// found via DFS over the remaining unemitted nodes.
    pub fn topo_sort(&self) -> Result<Vec<String>, Error> {
        let mut remaining_out_degree: HashMap<String, usize> = self
            .nodes
            .keys()
            .map(|name| (name.clone(), self.dependencies(name).len()))
            .collect();

        let mut queue: VecDeque<String> = remaining_out_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(name, _)| name.clone())
            .collect();
        let mut queue_vec: Vec<String> = queue.iter().cloned().collect();
        queue_vec.sort();
        queue = queue_vec.into_iter().collect();

        let mut emitted = Vec::new();
        let mut emitted_set = HashSet::new();

        while let Some(name) = queue.pop_front() {
            emitted.push(name.clone());
            emitted_set.insert(name.clone());

            let mut newly_ready: Vec<String> = Vec::new();
            for dependent in self.dependents(&name) {
                let entry = remaining_out_degree.get_mut(&dependent).unwrap();
                *entry -= 1;
                if *entry == 0 {
                    newly_ready.push(dependent);
                }
            }
            newly_ready.sort();
            for name in newly_ready {
                queue.push_back(name);
            }
        }

        if emitted.len() == self.nodes.len() {
            return Ok(emitted);
        }

        let unresolved: HashSet<String> = self
            .nodes
            .keys()
            .filter(|n| !emitted_set.contains(*n))
            .cloned()
            .collect();
        Err(Error::Cycle(self.find_cycles(&unresolved)))
    }

    /// DFS over `candidates`, reporting each cycle encountered as the
    /// concrete list of names forming it (first-encountered traversal).
    fn find_cycles(&self, candidates: &HashSet<String>) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();

        let mut sorted_candidates: Vec<&String> = candidates.iter().collect();
        sorted_candidates.sort();

        for start in sorted_candidates {
            if visited.contains(start) {
                continue;
            }
            let mut stack: Vec<String> = vec![start.clone()];
            let mut on_stack_index: HashMap<String, usize> = HashMap::new();
            on_stack_index.insert(start.clone(), 0);

            'walk: loop {
                let current = stack.last().unwrap().clone();
                visited.insert(current.clone());

                let mut next_deps: Vec<String> = self
                    .dependencies(&current)
                    .into_iter()
                    .filter(|d| candidates.contains(d))
                    .collect();
                next_deps.sort();

                for dep in next_deps {
                    if let Some(&cycle_start) = on_stack_index.get(&dep) {
                        cycles.push(stack[cycle_start..].to_vec());
                        continue;
                    }
                    if !visited.contains(&dep) {
                        stack.push(dep.clone());
                        on_stack_index.insert(dep, stack.len() - 1);
                        continue 'walk;
                    }
                }

                let finished = stack.pop().unwrap();
                on_stack_index.remove(&finished);
                if stack.is_empty() {
                    break;
                }
            }
        }
        cycles
    }

    /// Derives batches from the topological order: a package enters batch
    /// *k* as soon as all of its workspace dependencies have been placed in
    /// batches `0..k`, which is the lowest such *k*. Within a batch, the
    /// topological order's relative ordering is preserved.
    pub fn batches(&self) -> Result<Vec<Vec<String>>, Error> {
        let order = self.topo_sort()?;
        let mut batch_of: HashMap<String, usize> = HashMap::new();

        for name in &order {
            let deps = self.dependencies(name);
            let batch = deps
                .iter()
                .map(|d| batch_of.get(d).copied().unwrap_or(0) + 1)
                .max()
                .unwrap_or(0);
            batch_of.insert(name.clone(), batch);
        }

        let num_batches = batch_of.values().copied().max().map_or(0, |m| m + 1);
        let mut batches = vec![Vec::new(); num_batches];
        for name in &order {
            batches[batch_of[name]].push(name.clone());
        }
        Ok(batches)
    }

    /// The closure of `targets` under *dependencies*: `targets` plus,
    /// recursively, every workspace dependency reached. Idempotent:
    /// closing twice equals closing once, since the result is already
    /// closed under the relation.
    pub fn filter_with_closure(&self, targets: &[String]) -> HashSet<String> {
        let mut closure: HashSet<String> = targets.iter().cloned().collect();
        let mut frontier: Vec<String> = targets.to_vec();

        while let Some(name) = frontier.pop() {
            for dep in self.dependencies(&name) {
                if closure.insert(dep.clone()) {
                    frontier.push(dep);
                }
            }
        }
        closure
    }

    /// Restricts this graph to `names`, preserving only edges between
    /// retained nodes.
    pub fn subgraph(&self, names: &HashSet<String>) -> Self {
        Self::from_names_and_deps(names.iter().map(|name| {
            let deps = self
                .dependencies(name)
                .into_iter()
                .filter(|d| names.contains(d))
                .collect();
            (name.clone(), deps)
        }))
    }
}
