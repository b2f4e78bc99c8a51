use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::PlanError;

use super::graph::TaskGraph;

/// Dispatch order derived once per plan.
///
/// Both views are pure functions of the graph and hold arena indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Linear order used by the sequential strategy.
    pub order: Vec<usize>,
    /// Dependency levels used by the parallel and adaptive strategies.
    pub levels: Vec<Vec<usize>>,
}

impl Schedule {
    pub fn compute(graph: &TaskGraph) -> Result<Self, PlanError> {
        let order = topological_order(graph)?;
        let levels = dependency_levels(graph, &order);
        Ok(Self { order, levels })
    }

    /// Levels as task ids, for reporting.
    pub fn level_ids(&self, graph: &TaskGraph) -> Vec<Vec<String>> {
        self.levels.iter().map(|level| graph.ids(level)).collect()
    }

    pub fn order_ids(&self, graph: &TaskGraph) -> Vec<String> {
        graph.ids(&self.order)
    }
}

/// Topological sort using Kahn's algorithm
///
/// The ready set is a min-heap on declaration index, so whenever several
/// tasks are free the earliest-declared one goes first.
///
/// # Algorithm
///
/// 1. Calculate in-degree for all nodes
/// 2. Push all nodes with in-degree 0
/// 3. Pop the smallest, append it, decrement its dependents
/// 4. Repeat until the heap is empty
///
/// Leftover nodes mean the validator let a cycle through, which is an engine
/// defect rather than a user error.
///
/// # Time Complexity
///
/// O((V + E) log V) where V = number of tasks, E = number of dependencies
pub fn topological_order(graph: &TaskGraph) -> Result<Vec<usize>, PlanError> {
    let n = graph.len();
    let mut in_degree: Vec<usize> = (0..n).map(|i| graph.dependencies(i).len()).collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(n);

    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &dependent in graph.dependents(node) {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() != n {
        let stuck: Vec<String> = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| graph.id(i).to_string())
            .collect();
        return Err(PlanError::SchedulerInvariant(format!(
            "topological sort consumed {} of {} tasks; unresolved: {}",
            order.len(),
            n,
            stuck.join(", ")
        )));
    }

    Ok(order)
}

/// Group tasks by longest dependency chain.
///
/// level(t) = 0 without dependencies, otherwise 1 + max(level(dep)). `order`
/// must be a topological order of `graph`. Within a level tasks keep
/// declaration order.
pub fn dependency_levels(graph: &TaskGraph, order: &[usize]) -> Vec<Vec<usize>> {
    let mut level_of = vec![0usize; graph.len()];
    let mut depth = 0;

    for &node in order {
        let level = graph
            .dependencies(node)
            .iter()
            .map(|&dep| level_of[dep] + 1)
            .max()
            .unwrap_or(0);
        level_of[node] = level;
        depth = depth.max(level + 1);
    }

    let mut levels = vec![Vec::new(); depth];
    for (node, &level) in level_of.iter().enumerate() {
        levels[level].push(node);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::graph::GraphLimits;
    use crate::executor::types::Task;

    fn graph(spec: &[(&str, &[&str])]) -> TaskGraph {
        let tasks = spec
            .iter()
            .map(|(id, deps)| {
                deps.iter()
                    .fold(Task::new(*id, *id), |task, dep| task.depends_on(*dep))
            })
            .collect();
        TaskGraph::build(
            tasks,
            GraphLimits {
                max_depth: 3,
                max_subtasks: 8,
            },
        )
        .unwrap()
    }

    #[test]
    fn fan_out_keeps_declaration_order() {
        let g = graph(&[("a", &[]), ("b", &["a"]), ("c", &["a"])]);
        let schedule = Schedule::compute(&g).unwrap();
        assert_eq!(schedule.order_ids(&g), vec!["a", "b", "c"]);
        assert_eq!(
            schedule.level_ids(&g),
            vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]]
        );
    }

    #[test]
    fn level_is_longest_chain() {
        // d depends on a directly and on c through b, so it lands at level 3.
        let g = graph(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["b"]),
            ("d", &["a", "c"]),
            ("e", &[]),
        ]);
        let schedule = Schedule::compute(&g).unwrap();
        assert_eq!(
            schedule.level_ids(&g),
            vec![
                vec!["a".to_string(), "e".to_string()],
                vec!["b".to_string()],
                vec!["c".to_string()],
                vec!["d".to_string()],
            ]
        );
    }

    #[test]
    fn later_declared_root_waits_its_turn() {
        let g = graph(&[("late", &["root"]), ("root", &[]), ("free", &[])]);
        let order = topological_order(&g).unwrap();
        assert_eq!(g.ids(&order), vec!["root", "late", "free"]);
    }

    #[test]
    fn empty_graph_has_no_levels() {
        let g = graph(&[]);
        let schedule = Schedule::compute(&g).unwrap();
        assert!(schedule.order.is_empty());
        assert!(schedule.levels.is_empty());
    }
}
