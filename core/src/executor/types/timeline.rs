use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskSkipped,
    GoalChecked,
    StrategySwitched,
}

impl TimelineEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskStarted => "task_started",
            Self::TaskCompleted => "task_completed",
            Self::TaskFailed => "task_failed",
            Self::TaskSkipped => "task_skipped",
            Self::GoalChecked => "goal_checked",
            Self::StrategySwitched => "strategy_switched",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: TimelineEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TimelineEvent {
    pub fn new(
        kind: TimelineEventKind,
        task_id: Option<&str>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            task_id: task_id.map(str::to_string),
            payload,
        }
    }
}

/// Append-only log of what happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TimelineEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn of_kind(&self, kind: TimelineEventKind) -> impl Iterator<Item = &TimelineEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// Ids of tasks in the order they were started.
    pub fn start_order(&self) -> Vec<&str> {
        self.of_kind(TimelineEventKind::TaskStarted)
            .filter_map(|e| e.task_id.as_deref())
            .collect()
    }
}
