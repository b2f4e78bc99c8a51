use std::collections::HashMap;

use crate::error::ValidationError;

use super::types::Task;

/// Structural limits enforced while a graph is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphLimits {
    pub max_depth: usize,
    pub max_subtasks: usize,
}

/// Task dependency graph (DAG) stored as an arena.
///
/// Tasks live in declaration order; edges are integer indices into that
/// vector, so the graph has no pointer cycles even while it is being checked
/// for dependency cycles. A `TaskGraph` only exists once validation passed.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<Task>,

    /// task id -> arena index
    index: HashMap<String, usize>,

    /// dependencies[i]: tasks that i waits for
    dependencies: Vec<Vec<usize>>,

    /// dependents[i]: tasks waiting for i
    dependents: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    OnPath,
    Done,
}

impl TaskGraph {
    /// Construct and validate a task graph from a task list.
    ///
    /// Checks, in order: ids are non-empty and unique, every dependency
    /// resolves and is not the task itself, subtask fan-out and nesting depth
    /// stay within `limits` (recursively), and the graph is acyclic.
    pub fn build(tasks: Vec<Task>, limits: GraphLimits) -> Result<Self, ValidationError> {
        Self::build_at_depth(tasks, limits, 0)
    }

    fn build_at_depth(
        tasks: Vec<Task>,
        limits: GraphLimits,
        depth: usize,
    ) -> Result<Self, ValidationError> {
        let mut index = HashMap::with_capacity(tasks.len());

        for (i, task) in tasks.iter().enumerate() {
            if task.id.trim().is_empty() {
                return Err(ValidationError::EmptyTaskId);
            }
            if index.insert(task.id.clone(), i).is_some() {
                return Err(ValidationError::DuplicateTaskId(task.id.clone()));
            }
        }

        let mut dependencies = vec![Vec::new(); tasks.len()];
        let mut dependents = vec![Vec::new(); tasks.len()];

        for (i, task) in tasks.iter().enumerate() {
            for dep in &task.dependencies {
                if dep == &task.id {
                    return Err(ValidationError::SelfDependency(task.id.clone()));
                }
                let Some(&d) = index.get(dep) else {
                    return Err(ValidationError::DependencyNotFound {
                        task_id: task.id.clone(),
                        missing_dep: dep.clone(),
                    });
                };
                // Repeated declarations of the same edge collapse into one.
                if !dependencies[i].contains(&d) {
                    dependencies[i].push(d);
                    dependents[d].push(i);
                }
            }
        }

        for task in &tasks {
            check_subtasks(task, limits, depth)?;
        }

        let graph = Self {
            tasks,
            index,
            dependencies,
            dependents,
        };

        if let Some(cycle) = graph.detect_cycle() {
            return Err(ValidationError::CircularDependency { cycle });
        }

        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, idx: usize) -> &Task {
        &self.tasks[idx]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index_of(id).map(|i| &self.tasks[i])
    }

    pub fn dependencies(&self, idx: usize) -> &[usize] {
        &self.dependencies[idx]
    }

    pub fn dependents(&self, idx: usize) -> &[usize] {
        &self.dependents[idx]
    }

    pub fn id(&self, idx: usize) -> &str {
        &self.tasks[idx].id
    }

    /// Map arena indices back to task ids.
    pub fn ids(&self, indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| self.tasks[i].id.clone()).collect()
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    /// Detect circular dependencies using DFS along dependent edges.
    ///
    /// Roots are tried in declaration order, so the reported cycle starts at
    /// its earliest-declared member and follows execution direction.
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut state = vec![Visit::New; self.tasks.len()];
        // (node, index of the next dependent to visit); doubles as the DFS path.
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for start in 0..self.tasks.len() {
            if state[start] != Visit::New {
                continue;
            }
            state[start] = Visit::OnPath;
            stack.push((start, 0));

            while let Some(frame) = stack.last_mut() {
                let (node, cursor) = *frame;
                let Some(&next) = self.dependents[node].get(cursor) else {
                    state[node] = Visit::Done;
                    stack.pop();
                    continue;
                };
                frame.1 += 1;

                match state[next] {
                    Visit::OnPath => {
                        let pos = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                        let cycle: Vec<usize> = stack[pos..].iter().map(|&(n, _)| n).collect();
                        return Some(self.ids(&cycle));
                    }
                    Visit::New => {
                        state[next] = Visit::OnPath;
                        stack.push((next, 0));
                    }
                    Visit::Done => {}
                }
            }
        }

        None
    }
}

fn check_subtasks(task: &Task, limits: GraphLimits, depth: usize) -> Result<(), ValidationError> {
    if task.subtasks.is_empty() {
        return Ok(());
    }
    if task.subtasks.len() > limits.max_subtasks {
        return Err(ValidationError::TooManySubtasks {
            task_id: task.id.clone(),
            count: task.subtasks.len(),
            max_subtasks: limits.max_subtasks,
        });
    }
    let child_depth = depth + 1;
    if child_depth > limits.max_depth {
        return Err(ValidationError::DepthExceeded {
            task_id: task.id.clone(),
            depth: child_depth,
            max_depth: limits.max_depth,
        });
    }
    // Subtask ids are scoped to their parent, so they form a graph of their own.
    TaskGraph::build_at_depth(task.subtasks.clone(), limits, child_depth).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: GraphLimits = GraphLimits {
        max_depth: 2,
        max_subtasks: 3,
    };

    fn t(id: &str, deps: &[&str]) -> Task {
        deps.iter()
            .fold(Task::new(id, id), |task, dep| task.depends_on(*dep))
    }

    #[test]
    fn builds_edges_both_ways() {
        let graph = TaskGraph::build(vec![t("a", &[]), t("b", &["a"]), t("c", &["a", "b"])], LIMITS)
            .unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.dependencies(2), &[0, 1]);
        assert_eq!(graph.dependents(0), &[1, 2]);
        assert_eq!(graph.index_of("b"), Some(1));
    }

    #[test]
    fn collapses_repeated_dependency() {
        let graph = TaskGraph::build(vec![t("a", &[]), t("b", &["a", "a"])], LIMITS).unwrap();
        assert_eq!(graph.dependencies(1), &[0]);
        assert_eq!(graph.dependents(0), &[1]);
    }

    #[test]
    fn rejects_missing_dependency() {
        let err = TaskGraph::build(vec![t("a", &["ghost"])], LIMITS).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DependencyNotFound {
                task_id: "a".into(),
                missing_dep: "ghost".into()
            }
        );
    }

    #[test]
    fn rejects_self_dependency() {
        let err = TaskGraph::build(vec![t("a", &["a"])], LIMITS).unwrap_err();
        assert_eq!(err, ValidationError::SelfDependency("a".into()));
        assert_eq!(err.cycle_members(), Some(&["a".to_string()][..]));
    }

    #[test]
    fn rejects_duplicate_and_empty_ids() {
        assert_eq!(
            TaskGraph::build(vec![t("a", &[]), t("a", &[])], LIMITS).unwrap_err(),
            ValidationError::DuplicateTaskId("a".into())
        );
        assert_eq!(
            TaskGraph::build(vec![t(" ", &[])], LIMITS).unwrap_err(),
            ValidationError::EmptyTaskId
        );
    }

    #[test]
    fn reports_cycle_members_in_execution_order() {
        // a -> b -> c -> a, declared with each task depending on its predecessor.
        let err = TaskGraph::build(vec![t("a", &["c"]), t("b", &["a"]), t("c", &["b"])], LIMITS)
            .unwrap_err();
        assert_eq!(
            err.cycle_members(),
            Some(&["a".to_string(), "b".to_string(), "c".to_string()][..])
        );
    }

    #[test]
    fn cycle_behind_acyclic_prefix_is_found() {
        let err = TaskGraph::build(
            vec![t("root", &[]), t("x", &["root", "y"]), t("y", &["x"])],
            LIMITS,
        )
        .unwrap_err();
        let mut members = err.cycle_members().unwrap().to_vec();
        members.sort();
        assert_eq!(members, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn long_dependency_chain_validates() {
        let n = 150_000;
        let tasks: Vec<Task> = (0..n)
            .map(|i| {
                let task = Task::new(format!("t{i}"), "link");
                if i == 0 {
                    task
                } else {
                    task.depends_on(format!("t{}", i - 1))
                }
            })
            .collect();

        let graph = TaskGraph::build(tasks, LIMITS).unwrap();
        assert_eq!(graph.len(), n);
        assert_eq!(graph.dependents(0), &[1]);
    }

    #[test]
    fn long_chain_closing_into_cycle_is_reported() {
        let n = 120_000;
        let tasks: Vec<Task> = (0..n)
            .map(|i| {
                let prev = if i == 0 { n - 1 } else { i - 1 };
                Task::new(format!("t{i}"), "link").depends_on(format!("t{prev}"))
            })
            .collect();

        let err = TaskGraph::build(tasks, LIMITS).unwrap_err();
        let members = err.cycle_members().unwrap();
        assert_eq!(members.len(), n);
        assert_eq!(members[0], "t0");
        assert_eq!(members[n - 1], format!("t{}", n - 1));
    }

    #[test]
    fn enforces_subtask_fan_out() {
        let mut parent = Task::new("p", "parent");
        for i in 0..4 {
            parent = parent.with_subtask(Task::new(format!("s{i}"), "child"));
        }
        let err = TaskGraph::build(vec![parent], LIMITS).unwrap_err();
        assert!(matches!(err, ValidationError::TooManySubtasks { count: 4, .. }));
    }

    #[test]
    fn enforces_subtask_depth() {
        let leaf = Task::new("l3", "too deep");
        let l2 = Task::new("l2", "level two").with_subtask(leaf);
        let l1 = Task::new("l1", "level one").with_subtask(l2);
        let root = Task::new("root", "root").with_subtask(l1);

        let err = TaskGraph::build(vec![root], LIMITS).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DepthExceeded {
                task_id: "l2".into(),
                depth: 3,
                max_depth: 2
            }
        );
    }

    #[test]
    fn validates_nested_subtask_graphs() {
        let parent = Task::new("p", "parent")
            .with_subtask(Task::new("x", "x").depends_on("missing"));
        let err = TaskGraph::build(vec![parent], LIMITS).unwrap_err();
        assert!(matches!(err, ValidationError::DependencyNotFound { .. }));
    }
}
