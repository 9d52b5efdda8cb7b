//! Dependency graph between deployment targets.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::DeployError;

/// Targets and the targets they depend on, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<(String, Vec<String>)>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` with its dependencies.
    pub fn add(&mut self, name: impl Into<String>, dependencies: impl IntoIterator<Item = impl Into<String>>) {
        self.nodes.push((
            name.into(),
            dependencies.into_iter().map(Into::into).collect(),
        ));
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|(n, _)| n == name)
    }

    /// Check that every dependency names a declared target.
    pub fn validate(&self) -> Result<(), DeployError> {
        for (target, dependencies) in &self.nodes {
            if let Some(dependency) = dependencies.iter().find(|d| self.position(d).is_none()) {
                return Err(DeployError::UnknownDependency {
                    target: target.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        Ok(())
    }

    /// Order the targets so that every target comes after its dependencies.
    ///
    /// With `selected`, only those targets and their transitive dependencies are returned.
    /// Ties keep declaration order, so the result is deterministic.
    pub fn resolve(&self, selected: Option<&[String]>) -> Result<Vec<String>, DeployError> {
        self.validate()?;

        let included: HashSet<usize> = match selected {
            Some(names) => {
                let mut included = HashSet::new();
                let mut stack = Vec::new();
                for name in names {
                    let index = self.position(name).ok_or_else(|| DeployError::UnknownDependency {
                        target: "selection".to_string(),
                        dependency: name.clone(),
                    })?;
                    stack.push(index);
                }
                while let Some(index) = stack.pop() {
                    if included.insert(index) {
                        stack.extend(self.dependency_indices(index));
                    }
                }
                included
            }
            None => (0..self.nodes.len()).collect(),
        };

        let mut indegree: HashMap<usize, usize> = included
            .iter()
            .map(|&index| (index, self.dependency_indices(index).count()))
            .collect();

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(index, _)| *index)
            .collect();
        let mut order = Vec::with_capacity(included.len());

        while let Some(index) = ready.pop_first() {
            order.push(index);
            for dependent in included.iter().copied() {
                let depends = self.dependency_indices(dependent).filter(|d| *d == index).count();
                if depends == 0 {
                    continue;
                }
                if let Some(degree) = indegree.get_mut(&dependent) {
                    *degree -= depends;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() < included.len() {
            return Err(DeployError::DependencyCycle(self.find_cycle(&included)));
        }

        Ok(order.into_iter().map(|i| self.nodes[i].0.clone()).collect())
    }

    fn dependency_indices(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes[index]
            .1
            .iter()
            .filter_map(|dependency| self.position(dependency))
    }

    /// A cycle among `included`, as a closed path of names.
    fn find_cycle(&self, included: &HashSet<usize>) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut candidates: Vec<usize> = included.iter().copied().collect();
        candidates.sort_unstable();

        for start in candidates {
            let mut path = Vec::new();
            if let Some(cycle) = self.walk(start, included, &mut visited, &mut path) {
                return cycle.into_iter().map(|i| self.nodes[i].0.clone()).collect();
            }
        }
        Vec::new()
    }

    fn walk(
        &self,
        index: usize,
        included: &HashSet<usize>,
        visited: &mut HashSet<usize>,
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        if let Some(start) = path.iter().position(|i| *i == index) {
            let mut cycle = path[start..].to_vec();
            cycle.push(index);
            return Some(cycle);
        }
        if !visited.insert(index) {
            return None;
        }

        path.push(index);
        for dependency in self.dependency_indices(index).filter(|d| included.contains(d)) {
            if let Some(cycle) = self.walk(dependency, included, visited, path) {
                return Some(cycle);
            }
        }
        path.pop();
        None
    }
}
