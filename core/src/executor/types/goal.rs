use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::result::TaskResult;
use crate::error::ValidationError;

/// Programmatic predicate over accumulated task results.
#[derive(Clone)]
pub struct ConditionFn(Arc<dyn Fn(&[TaskResult]) -> bool + Send + Sync>);

impl ConditionFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[TaskResult]) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, results: &[TaskResult]) -> bool {
        (self.0)(results)
    }
}

impl fmt::Debug for ConditionFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConditionFn(..)")
    }
}

/// A single success criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuccessCondition {
    /// The named task finished successfully.
    TaskSucceeded { task: String },
    /// Every listed task finished successfully.
    AllSucceeded { tasks: Vec<String> },
    /// At least `count` tasks finished successfully.
    MinSucceeded { count: usize },
    /// The named task succeeded and its output contains `needle`.
    OutputContains { task: String, needle: String },
    /// Some successful output (of `task`, or of any task) matches `pattern`.
    OutputMatches {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task: Option<String>,
        pattern: String,
        /// Filled in once when the owning plan is built.
        #[serde(skip)]
        compiled: Option<Regex>,
    },
    #[serde(skip)]
    Custom(ConditionFn),
}

impl SuccessCondition {
    pub fn output_matches(task: Option<String>, pattern: impl Into<String>) -> Self {
        Self::OutputMatches {
            task,
            pattern: pattern.into(),
            compiled: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalCondition {
    pub name: String,
    pub condition: SuccessCondition,
}

/// How multiple conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Satisfied when any condition holds.
    #[default]
    Any,
    /// Satisfied when every condition holds.
    All,
}

/// Success criteria a plan is working toward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalState {
    #[serde(default)]
    pub match_mode: MatchMode,

    #[serde(default)]
    pub conditions: Vec<GoalCondition>,

    #[serde(default)]
    pub satisfied: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_condition: Option<String>,
}

impl GoalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            match_mode: MatchMode::All,
            ..Self::default()
        }
    }

    pub fn with_condition(mut self, name: impl Into<String>, condition: SuccessCondition) -> Self {
        self.conditions.push(GoalCondition {
            name: name.into(),
            condition,
        });
        self
    }

    /// A goal without conditions can never be satisfied; goal checks are skipped.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        for cond in &self.conditions {
            check_name(cond)?;
            if let SuccessCondition::OutputMatches {
                pattern,
                compiled: None,
                ..
            } = &cond.condition
            {
                compile_pattern(&cond.name, pattern)?;
            }
        }
        Ok(())
    }

    /// Validate and compile every `output_matches` pattern in place.
    pub(crate) fn compile(&mut self) -> Result<(), ValidationError> {
        for cond in &mut self.conditions {
            check_name(cond)?;
            if let SuccessCondition::OutputMatches {
                pattern, compiled, ..
            } = &mut cond.condition
            {
                *compiled = Some(compile_pattern(&cond.name, pattern)?);
            }
        }
        Ok(())
    }
}

fn check_name(cond: &GoalCondition) -> Result<(), ValidationError> {
    if cond.name.trim().is_empty() {
        return Err(ValidationError::InvalidCondition {
            name: cond.name.clone(),
            reason: "condition name must not be empty".to_string(),
        });
    }
    Ok(())
}

fn compile_pattern(name: &str, pattern: &str) -> Result<Regex, ValidationError> {
    Regex::new(pattern).map_err(|e| ValidationError::InvalidCondition {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_conditions() {
        let raw = r#"{
            "match_mode": "all",
            "conditions": [
                {"name": "built", "condition": {"type": "task_succeeded", "task": "build"}},
                {"name": "green", "condition": {"type": "output_matches", "pattern": "ok$"}}
            ]
        }"#;
        let goal: GoalState = serde_json::from_str(raw).unwrap();
        assert_eq!(goal.match_mode, MatchMode::All);
        assert_eq!(goal.conditions.len(), 2);
        assert!(matches!(
            goal.conditions[1].condition,
            SuccessCondition::OutputMatches { task: None, .. }
        ));
        assert!(!goal.satisfied);
    }

    #[test]
    fn rejects_bad_regex() {
        let goal = GoalState::new().with_condition(
            "broken",
            SuccessCondition::output_matches(None, "(unclosed"),
        );
        assert!(matches!(
            goal.validate(),
            Err(ValidationError::InvalidCondition { .. })
        ));
        let mut goal = goal;
        assert!(goal.compile().is_err());
    }

    #[test]
    fn compile_caches_patterns() {
        let mut goal = GoalState::new()
            .with_condition("done", SuccessCondition::TaskSucceeded { task: "a".into() })
            .with_condition("rows", SuccessCondition::output_matches(None, r"rows=\d+"));
        goal.compile().unwrap();

        match &goal.conditions[1].condition {
            SuccessCondition::OutputMatches {
                compiled: Some(re), ..
            } => assert!(re.is_match("rows=12")),
            other => panic!("pattern not compiled: {other:?}"),
        }
        assert!(goal.validate().is_ok());
    }
}
