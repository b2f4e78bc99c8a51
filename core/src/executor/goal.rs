use regex::Regex;

use super::types::{GoalState, MatchMode, SuccessCondition, TaskResult};

/// Outcome of one goal check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GoalEvaluation {
    pub satisfied: bool,
    /// Name of the condition that matched (for `All`, the last one checked).
    pub matched_condition: Option<String>,
}

/// Test accumulated results against the goal's success conditions.
///
/// Pure: reads the goal and the results, mutates nothing. A goal with no
/// conditions is never satisfied.
pub fn evaluate(goal: &GoalState, results: &[TaskResult]) -> GoalEvaluation {
    if goal.conditions.is_empty() {
        return GoalEvaluation::default();
    }

    match goal.match_mode {
        MatchMode::Any => goal
            .conditions
            .iter()
            .find(|c| is_met(&c.condition, results))
            .map(|c| GoalEvaluation {
                satisfied: true,
                matched_condition: Some(c.name.clone()),
            })
            .unwrap_or_default(),
        MatchMode::All => {
            if goal.conditions.iter().all(|c| is_met(&c.condition, results)) {
                GoalEvaluation {
                    satisfied: true,
                    matched_condition: goal.conditions.last().map(|c| c.name.clone()),
                }
            } else {
                GoalEvaluation::default()
            }
        }
    }
}

/// Whether a single condition holds for the given results.
pub fn is_met(condition: &SuccessCondition, results: &[TaskResult]) -> bool {
    let succeeded = |id: &str| results.iter().any(|r| r.success && r.task_id == id);

    match condition {
        SuccessCondition::TaskSucceeded { task } => succeeded(task),
        SuccessCondition::AllSucceeded { tasks } => {
            !tasks.is_empty() && tasks.iter().all(|t| succeeded(t))
        }
        SuccessCondition::MinSucceeded { count } => {
            results.iter().filter(|r| r.success).count() >= *count
        }
        SuccessCondition::OutputContains { task, needle } => results
            .iter()
            .any(|r| r.success && &r.task_id == task && r.output.contains(needle.as_str())),
        SuccessCondition::OutputMatches {
            task,
            pattern,
            compiled,
        } => {
            let fresh;
            let re = match compiled {
                Some(re) => re,
                // Only conditions that never went through a plan build land
                // here; a bad pattern never matches.
                None => match Regex::new(pattern) {
                    Ok(re) => {
                        fresh = re;
                        &fresh
                    }
                    Err(_) => return false,
                },
            };
            results
                .iter()
                .filter(|r| r.success)
                .filter(|r| task.as_deref().map_or(true, |t| r.task_id == t))
                .any(|r| re.is_match(&r.output))
        }
        SuccessCondition::Custom(f) => f.call(results),
    }
}
