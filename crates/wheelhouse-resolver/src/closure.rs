//! Transitive closure of propagated dependencies over a resolved set.

use std::collections::HashMap;
use std::collections::VecDeque;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use wheelhouse_core::PackageName;
use wheelhouse_util::errors::{WheelhouseError, WheelhouseResult};

use crate::overlay::ResolvedSet;

/// The set of packages reachable from a group of roots, with the
/// dependency graph walked to find them.
///
/// Names are recorded in discovery order (roots first, then breadth-first
/// levels), which is deterministic for a given resolved set and root list.
#[derive(Debug)]
pub struct Closure {
    names: Vec<PackageName>,
    graph: DiGraph<PackageName, ()>,
    index: HashMap<PackageName, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl Closure {
    /// Reachable names in discovery order.
    pub fn names(&self) -> &[PackageName] {
        &self.names
    }

    pub fn contains(&self, name: &PackageName) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The chain of requesters from a root down to `target`, if `target`
    /// is in the closure. Answers "why is this package installed".
    pub fn requester_path(&self, target: &PackageName) -> Option<Vec<PackageName>> {
        let target_idx = *self.index.get(target)?;
        for &root in &self.roots {
            let mut path = Vec::new();
            let mut visited = vec![false; self.graph.node_count()];
            if self.dfs_path(root, target_idx, &mut path, &mut visited) {
                return Some(path.iter().map(|&idx| self.graph[idx].clone()).collect());
            }
        }
        None
    }

    fn dfs_path(
        &self,
        current: NodeIndex,
        target: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut [bool],
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if visited[current.index()] {
            path.pop();
            return false;
        }
        visited[current.index()] = true;
        for edge in self.graph.edges(current) {
            if self.dfs_path(edge.target(), target, path, visited) {
                return true;
            }
        }
        path.pop();
        false
    }
}

/// Compute the closure of `roots` over the propagated-dependency edges of
/// `resolved`.
///
/// Shared diamond dependencies are visited once; cycles terminate via the
/// visited set. Any name not present in `resolved` is a
/// [`MissingDependency`](WheelhouseError::MissingDependency) naming both
/// the package and its requester; `origin` is reported as the requester
/// of the roots themselves.
pub fn closure(
    resolved: &ResolvedSet,
    roots: &[PackageName],
    origin: &str,
) -> WheelhouseResult<Closure> {
    let mut graph: DiGraph<PackageName, ()> = DiGraph::new();
    let mut index: HashMap<PackageName, NodeIndex> = HashMap::new();
    let mut names: Vec<PackageName> = Vec::new();
    let mut root_indices: Vec<NodeIndex> = Vec::new();

    let mut queue: VecDeque<(PackageName, Option<NodeIndex>)> = VecDeque::new();
    for root in roots {
        queue.push_back((root.clone(), None));
    }

    while let Some((name, requester)) = queue.pop_front() {
        let def = resolved.get(&name).ok_or_else(|| {
            let requested_by = match requester {
                Some(idx) => graph[idx].to_string(),
                None => origin.to_string(),
            };
            WheelhouseError::MissingDependency {
                name: name.to_string(),
                requested_by,
            }
        })?;

        let (idx, first_visit) = match index.get(&name) {
            Some(&idx) => (idx, false),
            None => {
                let idx = graph.add_node(name.clone());
                index.insert(name.clone(), idx);
                names.push(name.clone());
                (idx, true)
            }
        };

        match requester {
            Some(from) => {
                if !graph.edges(from).any(|e| e.target() == idx) {
                    graph.add_edge(from, idx, ());
                }
            }
            None => {
                if !root_indices.contains(&idx) {
                    root_indices.push(idx);
                }
            }
        }

        // Revisiting a name is a no-op beyond recording the edge.
        if !first_visit {
            continue;
        }

        for dep in &def.propagated {
            queue.push_back((dep.clone(), Some(idx)));
        }
    }

    tracing::debug!(roots = roots.len(), reachable = names.len(), "closure computed");
    Ok(Closure {
        names,
        graph,
        index,
        roots: root_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wheelhouse_core::{PackageDefinition, PackageSource};

    fn name(s: &str) -> PackageName {
        PackageName::new(s)
    }

    fn set(entries: &[(&str, &[&str])]) -> ResolvedSet {
        entries
            .iter()
            .map(|(n, deps)| {
                let mut def = PackageDefinition::new(name(n), "1.0", PackageSource::default());
                def.propagated = deps.iter().map(|d| name(d)).collect();
                (name(n), def)
            })
            .collect()
    }

    #[test]
    fn reaches_transitive_dependencies() {
        let resolved = set(&[("a", &["b"]), ("b", &["c"]), ("c", &[]), ("unrelated", &[])]);
        let c = closure(&resolved, &[name("a")], "demo").unwrap();
        assert_eq!(c.names(), &[name("a"), name("b"), name("c")]);
        assert!(!c.contains(&name("unrelated")));
    }

    #[test]
    fn cycle_terminates_and_visits_once() {
        let resolved = set(&[("a", &["b"]), ("b", &["a"])]);
        let c = closure(&resolved, &[name("a")], "demo").unwrap();
        assert_eq!(c.names(), &[name("a"), name("b")]);
    }

    #[test]
    fn diamond_visits_shared_dep_once() {
        let resolved = set(&[("a", &["b", "c"]), ("b", &["d"]), ("c", &["d"]), ("d", &[])]);
        let c = closure(&resolved, &[name("a")], "demo").unwrap();
        assert_eq!(c.len(), 4);
        assert_eq!(c.names().iter().filter(|n| **n == name("d")).count(), 1);
    }

    #[test]
    fn missing_root_names_origin() {
        let resolved = set(&[("a", &[])]);
        let err = closure(&resolved, &[name("ghost")], "demo-project").unwrap_err();
        match err {
            WheelhouseError::MissingDependency { name, requested_by } => {
                assert_eq!(name, "ghost");
                assert_eq!(requested_by, "demo-project");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_edge_names_requester() {
        let resolved = set(&[("a", &["b"]), ("b", &["ghost"])]);
        let err = closure(&resolved, &[name("a")], "demo").unwrap_err();
        match err {
            WheelhouseError::MissingDependency { name, requested_by } => {
                assert_eq!(name, "ghost");
                assert_eq!(requested_by, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn idempotent_over_closed_set() {
        let resolved = set(&[("a", &["b"]), ("b", &[])]);
        let first = closure(&resolved, &[name("a")], "demo").unwrap();
        let again = closure(&resolved, first.names(), "demo").unwrap();
        let mut a: Vec<_> = first.names().to_vec();
        let mut b: Vec<_> = again.names().to_vec();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn monotonic_in_roots() {
        let resolved = set(&[("a", &["b"]), ("b", &[]), ("x", &[])]);
        let small = closure(&resolved, &[name("a")], "demo").unwrap();
        let large = closure(&resolved, &[name("a"), name("x")], "demo").unwrap();
        for n in small.names() {
            assert!(large.contains(n));
        }
    }

    #[test]
    fn requester_path() {
        let resolved = set(&[("a", &["b"]), ("b", &["c"]), ("c", &[])]);
        let c = closure(&resolved, &[name("a")], "demo").unwrap();
        let path = c.requester_path(&name("c")).unwrap();
        assert_eq!(path, vec![name("a"), name("b"), name("c")]);
        assert!(c.requester_path(&name("zzz")).is_none());
    }

    #[test]
    fn duplicate_roots_collapse() {
        let resolved = set(&[("a", &[])]);
        let c = closure(&resolved, &[name("a"), name("a")], "demo").unwrap();
        assert_eq!(c.len(), 1);
    }
}
