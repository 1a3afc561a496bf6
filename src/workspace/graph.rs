//! Document dependency graph.
//!
//! An edge `a -> b` means linking `a` may read the exports of `b`.

use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::base::DocumentId;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    dependencies: FxHashMap<DocumentId, IndexSet<DocumentId>>,
    dependents: FxHashMap<DocumentId, IndexSet<DocumentId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the outgoing edges of `document`. Returns whether they changed.
    pub fn set_dependencies(
        &mut self,
        document: DocumentId,
        dependencies: impl IntoIterator<Item = DocumentId>,
    ) -> bool {
        let new: IndexSet<DocumentId> = dependencies
            .into_iter()
            .filter(|&dependency| dependency != document)
            .collect();
        let old = self.dependencies.remove(&document).unwrap_or_default();
        let changed = old != new;
        for dependency in &old {
            if let Some(dependents) = self.dependents.get_mut(dependency) {
                dependents.shift_remove(&document);
            }
        }
        for &dependency in &new {
            self.dependents.entry(dependency).or_default().insert(document);
        }
        if !new.is_empty() {
            self.dependencies.insert(document, new);
        }
        changed
    }

    /// Adds a single edge.
    pub fn add_dependency(&mut self, document: DocumentId, dependency: DocumentId) {
        if document == dependency {
            return;
        }
        self.dependencies.entry(document).or_default().insert(dependency);
        self.dependents.entry(dependency).or_default().insert(document);
    }

    /// Drops every edge touching `document`.
    pub fn remove(&mut self, document: DocumentId) {
        self.set_dependencies(document, std::iter::empty());
        if let Some(dependents) = self.dependents.remove(&document) {
            for dependent in dependents {
                if let Some(dependencies) = self.dependencies.get_mut(&dependent) {
                    dependencies.shift_remove(&document);
                }
            }
        }
    }

    pub fn dependencies(&self, document: DocumentId) -> impl Iterator<Item = DocumentId> + '_ {
        self.dependencies.get(&document).into_iter().flatten().copied()
    }

    pub fn dependents(&self, document: DocumentId) -> impl Iterator<Item = DocumentId> + '_ {
        self.dependents.get(&document).into_iter().flatten().copied()
    }

    /// Everything `roots` depend on, directly or not, excluding the roots.
    pub fn transitive_dependencies(&self, roots: &[DocumentId]) -> Vec<DocumentId> {
        self.reach(roots, |document| self.dependencies(document).collect())
    }

    /// Everything depending on `roots`, directly or not, excluding the roots.
    pub fn transitive_dependents(&self, roots: &[DocumentId]) -> Vec<DocumentId> {
        self.reach(roots, |document| self.dependents(document).collect())
    }

    fn reach(
        &self,
        roots: &[DocumentId],
        next: impl Fn(DocumentId) -> Vec<DocumentId>,
    ) -> Vec<DocumentId> {
        let mut seen: FxHashSet<DocumentId> = roots.iter().copied().collect();
        let mut stack = roots.to_vec();
        let mut out = Vec::new();
        while let Some(document) = stack.pop() {
            for neighbour in next(document) {
                if seen.insert(neighbour) {
                    out.push(neighbour);
                    stack.push(neighbour);
                }
            }
        }
        out
    }

    /// Groups `documents` into dependency ranks.
    ///
    /// Every document comes after the documents it depends on, except
    /// inside a cycle, whose members share a rank. Within a rank the input
    /// order is kept. Edges to documents outside the input are ignored.
    pub fn ranks(&self, documents: &[DocumentId]) -> Vec<Vec<DocumentId>> {
        let position: FxHashMap<DocumentId, usize> = documents
            .iter()
            .enumerate()
            .map(|(index, &document)| (document, index))
            .collect();
        let edges: Vec<Vec<usize>> = documents
            .iter()
            .map(|&document| {
                self.dependencies(document)
                    .filter_map(|dependency| position.get(&dependency).copied())
                    .collect()
            })
            .collect();

        let components = strongly_connected(&edges);
        let mut component_of = vec![0; documents.len()];
        for (component, members) in components.iter().enumerate() {
            for &member in members {
                component_of[member] = component;
            }
        }

        // Components come out of Tarjan dependencies-first, so one pass
        // assigns every component its longest-path rank.
        let mut rank = vec![0usize; components.len()];
        for (component, members) in components.iter().enumerate() {
            let deepest = members
                .iter()
                .flat_map(|&member| edges[member].iter())
                .map(|&dependency| component_of[dependency])
                .filter(|&other| other != component)
                .map(|other| rank[other] + 1)
                .max()
                .unwrap_or(0);
            rank[component] = deepest;
        }

        let depth = rank.iter().copied().max().map_or(0, |max| max + 1);
        let mut ranks = vec![Vec::new(); depth];
        for (index, &document) in documents.iter().enumerate() {
            ranks[rank[component_of[index]]].push(document);
        }
        ranks
    }

    /// [`DependencyGraph::ranks`], flattened.
    pub fn order(&self, documents: &[DocumentId]) -> Vec<DocumentId> {
        self.ranks(documents).into_iter().flatten().collect()
    }
}

/// Tarjan's algorithm, iterative. Components are returned in reverse
/// topological order of the condensation: a component appears after every
/// component it has edges to.
fn strongly_connected(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;
    let count = edges.len();
    let mut index = vec![UNVISITED; count];
    let mut low = vec![0; count];
    let mut on_stack = vec![false; count];
    let mut stack = Vec::new();
    let mut components = Vec::new();
    let mut next_index = 0;

    for start in 0..count {
        if index[start] != UNVISITED {
            continue;
        }
        // (node, next edge to explore)
        let mut calls = vec![(start, 0usize)];
        index[start] = next_index;
        low[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;

        while let Some(top) = calls.len().checked_sub(1) {
            let (node, edge) = calls[top];
            if let Some(&target) = edges[node].get(edge) {
                calls[top].1 += 1;
                if index[target] == UNVISITED {
                    index[target] = next_index;
                    low[target] = next_index;
                    next_index += 1;
                    stack.push(target);
                    on_stack[target] = true;
                    calls.push((target, 0));
                } else if on_stack[target] {
                    low[node] = low[node].min(index[target]);
                }
                continue;
            }
            calls.pop();
            if let Some(&(parent, _)) = calls.last() {
                low[parent] = low[parent].min(low[node]);
            }
            if low[node] == index[node] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }
    components
}
