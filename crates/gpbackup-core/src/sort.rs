//! Dependency ordering for catalog objects.

use crate::{catalog::UniqueId, Error, Result};
use std::collections::{HashMap, VecDeque};

/// An object that takes part in dependency ordering.
pub trait Sortable {
    /// Display name used in diagnostics.
    fn fqn(&self) -> String;

    fn unique_id(&self) -> UniqueId;

    /// Objects that must be created before this one.
    fn depends_upon(&self) -> &[UniqueId];
}

/// Orders `items` so that every object comes after the objects it depends
/// upon.
///
/// Ties are broken by input order: objects with no unmet dependencies are
/// emitted in the order they were supplied, and objects that become ready
/// at the same time keep their relative input order.
pub fn topological_sort<T: Sortable>(items: Vec<T>) -> Result<Vec<T>> {
    let position: HashMap<UniqueId, usize> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.unique_id(), i))
        .collect();

    let mut indegree = vec![0usize; items.len()];
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; items.len()];

    for (i, item) in items.iter().enumerate() {
        let mut seen = Vec::with_capacity(item.depends_upon().len());
        for dep in item.depends_upon() {
            let Some(&j) = position.get(dep) else {
                return Err(Error::dangling_dependency(item.fqn(), dep.to_string()));
            };
            if j == i || seen.contains(&j) {
                continue;
            }
            seen.push(j);
            indegree[i] += 1;
            dependents[j].push(i);
        }
    }

    let mut queue: VecDeque<usize> = (0..items.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(items.len());

    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &dependent in &dependents[i] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if order.len() < items.len() {
        let residual: Vec<usize> = (0..items.len()).filter(|&i| indegree[i] > 0).collect();
        log_residual(&items, &residual, &position);
        return Err(Error::dependency_cycle(format!(
            "{} objects could not be ordered because of a dependency cycle",
            residual.len()
        )));
    }

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}

fn log_residual<T: Sortable>(items: &[T], residual: &[usize], position: &HashMap<UniqueId, usize>) {
    for &i in residual {
        let item = &items[i];
        let mut message = format!("Object: {} {}\nDependencies:", item.fqn(), item.unique_id());
        for dep in item.depends_upon() {
            if let Some(&j) = position.get(dep) {
                message.push_str(&format!("\n\t{}", items[j].fqn()));
            }
        }
        tracing::error!("{message}");
    }
}
