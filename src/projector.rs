//! Folds pending build steps into the virtual file tree.

use crate::action::ActionKind;
use crate::step::{Step, StepId};
use crate::tree::FileTree;

/// Result of one fold: the updated tree and the ids that were consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub tree: FileTree,
    /// Ids the caller must mark `completed`, in application order.
    pub completed: Vec<StepId>,
}

/// Applies every `pending` step to `tree`.
///
/// Steps are applied in ascending `sequence_index`; the sort is stable so a
/// later entry with an equal index wins. Shell steps leave the tree untouched
/// but are still reported as completed. A file or folder step that would
/// clash with an existing node of the other kind stays pending and the tree
/// keeps the existing node. Steps that are not pending are ignored, which
/// keeps repeated folds over the same list idempotent.
pub fn apply_pending_steps(mut tree: FileTree, steps: &[Step]) -> Projection {
    let mut pending: Vec<&Step> = steps.iter().filter(|step| step.is_pending()).collect();
    if pending.is_empty() {
        return Projection {
            tree,
            completed: Vec::new(),
        };
    }
    pending.sort_by_key(|step| step.sequence_index);

    let mut completed = Vec::with_capacity(pending.len());
    for step in pending {
        let applied = match step.path.as_deref() {
            _ if !step.kind.is_tree_mutation() => true,
            Some(path) if step.kind == ActionKind::CreateFile => {
                tree.write_file(path, &step.payload)
            }
            Some(path) => tree.create_folder(path),
            None => false,
        };

        if applied {
            completed.push(step.id);
        } else {
            tracing::debug!(step = step.id, "step could not be applied; leaving it pending");
        }
    }

    tracing::debug!(
        completed = completed.len(),
        files = tree.file_count(),
        "folded pending steps"
    );

    Projection { tree, completed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::step::{mark_completed, pending_steps};

    #[test]
    fn empty_pending_set_is_a_noop() {
        let mut tree = FileTree::new();
        tree.write_file("index.html", "<html>");

        let mut steps = pending_steps(0, vec![Action::create_file(0, "a.ts", "a")]);
        mark_completed(&mut steps, &[0]);

        let projection = apply_pending_steps(tree.clone(), &steps);
        assert_eq!(projection.tree, tree);
        assert!(projection.completed.is_empty());
    }

    #[test]
    fn shell_steps_complete_without_touching_the_tree() {
        let steps = pending_steps(0, vec![Action::run_command(0, "npm install")]);
        let projection = apply_pending_steps(FileTree::new(), &steps);

        assert!(projection.tree.is_empty());
        assert_eq!(projection.completed, vec![0]);
    }

    #[test]
    fn steps_are_applied_in_sequence_order() {
        let steps = pending_steps(
            0,
            vec![
                Action::create_file(1, "a.ts", "second"),
                Action::create_file(0, "a.ts", "first"),
            ],
        );

        let projection = apply_pending_steps(FileTree::new(), &steps);
        assert_eq!(projection.tree.file_content("a.ts"), Some("second"));
        assert_eq!(projection.completed, vec![0, 1]);
    }

    #[test]
    fn file_step_onto_a_folder_leaves_its_subtree_in_place() {
        let steps = pending_steps(
            0,
            vec![
                Action::create_file(0, "src/App.tsx", "app"),
                Action::create_file(1, "src/main.tsx", "main"),
                Action::create_file(2, "src", "oops"),
            ],
        );

        let projection = apply_pending_steps(FileTree::new(), &steps);

        let paths: Vec<&str> = projection
            .tree
            .files()
            .into_iter()
            .map(|node| node.path.as_str())
            .collect();
        assert_eq!(paths, vec!["src/App.tsx", "src/main.tsx"]);
        assert!(projection.tree.find("src").is_some_and(|node| node.is_folder()));
        assert_eq!(projection.completed, vec![0, 1]);
    }

    #[test]
    fn folder_step_through_a_file_stays_pending() {
        let steps = pending_steps(
            0,
            vec![
                Action::create_file(0, "README", "docs"),
                Action::create_folder(1, "README/assets"),
            ],
        );

        let projection = apply_pending_steps(FileTree::new(), &steps);

        assert_eq!(projection.tree.file_content("README"), Some("docs"));
        assert!(projection.tree.find("README/assets").is_none());
        assert_eq!(projection.completed, vec![0]);
    }
}
