//! Build steps: parsed actions annotated with processing status.

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionKind};

/// Identifier for one step, unique within a session.
pub type StepId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub title: String,
    pub description: String,
    pub kind: ActionKind,
    pub path: Option<String>,
    pub payload: String,
    pub sequence_index: usize,
    pub status: StepStatus,
}

impl Step {
    /// Wraps an action into a `pending` step.
    #[must_use]
    pub fn pending(id: StepId, action: Action) -> Self {
        let title = match (action.kind, action.path.as_deref()) {
            (ActionKind::CreateFile, Some(path)) => format!("Create {path}"),
            (ActionKind::CreateFolder, Some(path)) => format!("Create folder {path}"),
            _ => "Run command".to_string(),
        };
        let description = match action.kind {
            ActionKind::RunCommand => action.payload.clone(),
            ActionKind::CreateFile | ActionKind::CreateFolder => String::new(),
        };

        Self {
            id,
            title,
            description,
            kind: action.kind,
            path: action.path,
            payload: action.payload,
            sequence_index: action.sequence_index,
            status: StepStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// Builds `pending` steps for one parse pass.
///
/// Ids are `base_id + sequence_index`, so re-parsing a longer prefix of the
/// same document yields the same id for the same action.
pub fn pending_steps(base_id: StepId, actions: Vec<Action>) -> Vec<Step> {
    actions
        .into_iter()
        .map(|action| {
            let id = base_id + action.sequence_index as StepId;
            Step::pending(id, action)
        })
        .collect()
}

/// Marks every step whose id is listed as `completed`.
pub fn mark_completed(steps: &mut [Step], ids: &[StepId]) {
    for step in steps.iter_mut() {
        if ids.contains(&step.id) {
            step.status = StepStatus::Completed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_follow_action_kind() {
        let file = Step::pending(1, Action::create_file(0, "src/App.tsx", "x"));
        let shell = Step::pending(2, Action::run_command(1, "npm install"));

        assert_eq!(file.title, "Create src/App.tsx");
        assert_eq!(shell.title, "Run command");
        assert_eq!(shell.description, "npm install");
        assert!(file.is_pending());
    }

    #[test]
    fn pending_step_ids_are_offset_by_sequence_index() {
        let steps = pending_steps(
            10,
            vec![
                Action::create_file(0, "a.ts", ""),
                Action::run_command(1, "ls"),
            ],
        );

        assert_eq!(steps.iter().map(|step| step.id).collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn mark_completed_only_touches_listed_ids() {
        let mut steps = pending_steps(
            0,
            vec![Action::create_file(0, "a.ts", ""), Action::create_file(1, "b.ts", "")],
        );

        mark_completed(&mut steps, &[1]);

        assert_eq!(steps[0].status, StepStatus::Pending);
        assert_eq!(steps[1].status, StepStatus::Completed);
    }
}
