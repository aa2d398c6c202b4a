//! Artifact markup parser.
//!
//! Model responses embed a pseudo-XML document describing the project:
//!
//! ```text
//! <boltArtifact id="todo-app" title="Todo App">
//!   <boltAction type="file" filePath="src/App.tsx">...contents...</boltAction>
//!   <boltAction type="shell">npm run dev</boltAction>
//! </boltArtifact>
//! ```
//!
//! Parsing is a pure function of the accumulated text. Callers re-run it on
//! every growing prefix of a streaming response: only action blocks whose
//! closing tag has arrived are returned, always in document order, and an
//! unterminated trailing block is silently left out. Malformed or unknown
//! blocks are skipped; parsing never fails.

mod fence;
mod preview;

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::action::{Action, ActionKind};
use crate::tree::normalize_path;

pub use fence::strip_code_fence;
pub use preview::{streaming_file_preview, FilePreview};

pub const ARTIFACT_TAG: &str = "boltArtifact";
pub const ACTION_TAG: &str = "boltAction";

const ACTION_CLOSE: &str = "</boltAction>";

/// Parsed view of a (possibly partial) markup document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactDocument {
    /// `id` attribute of the first artifact block.
    pub id: Option<String>,
    /// `title` attribute of the first artifact block. Display label only.
    pub title: Option<String>,
    /// Fully closed actions in document order.
    pub actions: Vec<Action>,
}

/// Returns every fully closed action in `text`, in document order.
pub fn parse_actions(text: &str) -> Vec<Action> {
    parse_artifact(text).actions
}

/// Parses artifact labels and fully closed actions out of `text`.
pub fn parse_artifact(text: &str) -> ArtifactDocument {
    scan(text).document
}

/// Action block whose closing tag has not arrived yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpenAction {
    pub attributes: HashMap<String, String>,
    pub body: String,
}

#[derive(Debug, Default)]
pub(crate) struct Scan {
    pub document: ArtifactDocument,
    pub open_action: Option<OpenAction>,
}

pub(crate) fn scan(text: &str) -> Scan {
    let mut result = Scan::default();
    let mut cursor = 0;
    let mut in_artifact = false;
    let mut next_index = 0;

    while let Some(captures) = tag_regex().captures(&text[cursor..]) {
        let Some(whole) = captures.get(0) else {
            break;
        };
        let tag_end = cursor + whole.end();
        let closing = captures.get(1).is_some_and(|m| !m.as_str().is_empty());
        let name = captures.get(2).map_or("", |m| m.as_str());
        let raw_attributes = captures.get(3).map_or("", |m| m.as_str());

        match (name, closing) {
            (ARTIFACT_TAG, true) => {
                in_artifact = false;
                cursor = tag_end;
            }
            (ARTIFACT_TAG, false) => {
                in_artifact = true;
                let attributes = parse_attributes(raw_attributes);
                let document = &mut result.document;
                if document.id.is_none() && document.title.is_none() {
                    document.id = attributes.get("id").cloned();
                    document.title = attributes.get("title").cloned();
                }
                cursor = tag_end;
            }
            (_, true) => {
                // Stray action close outside a block.
                cursor = tag_end;
            }
            (_, false) => {
                let attributes = parse_attributes(raw_attributes);
                let self_closing = raw_attributes.trim_end().ends_with('/');

                let body = if self_closing {
                    cursor = tag_end;
                    ""
                } else {
                    let Some(close_offset) = text[tag_end..].find(ACTION_CLOSE) else {
                        if in_artifact {
                            result.open_action = Some(OpenAction {
                                attributes,
                                body: text[tag_end..].to_string(),
                            });
                        }
                        break;
                    };
                    cursor = tag_end + close_offset + ACTION_CLOSE.len();
                    &text[tag_end..tag_end + close_offset]
                };

                if !in_artifact {
                    tracing::debug!("skipping action block outside of an artifact");
                    continue;
                }

                if let Some(action) = build_action(next_index, &attributes, body) {
                    next_index += 1;
                    result.document.actions.push(action);
                }
            }
        }
    }

    result
}

fn build_action(
    sequence_index: usize,
    attributes: &HashMap<String, String>,
    body: &str,
) -> Option<Action> {
    let Some(kind) = attributes
        .get("type")
        .and_then(|value| ActionKind::from_markup_type(value))
    else {
        tracing::debug!(kind = ?attributes.get("type"), "skipping action with unknown type");
        return None;
    };

    match kind {
        ActionKind::RunCommand => Some(Action::run_command(sequence_index, body.trim())),
        ActionKind::CreateFile | ActionKind::CreateFolder => {
            let path = attributes
                .get("filePath")
                .map(|value| normalize_path(value))
                .filter(|value| !value.is_empty());
            let Some(path) = path else {
                tracing::debug!(?kind, "skipping action without filePath");
                return None;
            };

            Some(if kind == ActionKind::CreateFile {
                Action::create_file(sequence_index, path, strip_code_fence(body))
            } else {
                Action::create_folder(sequence_index, path)
            })
        }
    }
}

pub(crate) fn parse_attributes(raw: &str) -> HashMap<String, String> {
    attribute_regex()
        .captures_iter(raw)
        .filter_map(|captures| {
            let name = captures.get(1)?.as_str().to_string();
            let value = captures.get(2).or_else(|| captures.get(3))?.as_str();
            Some((name, value.to_string()))
        })
        .collect()
}

fn tag_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"<(/?)(boltArtifact|boltAction)\b([^>]*)>").expect("tag regex must compile")
    })
}

fn attribute_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("attribute regex must compile")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_accept_both_quote_styles_in_any_order() {
        let attributes = parse_attributes(r#" filePath='src/a.ts' type="file" "#);
        assert_eq!(attributes.get("type").map(String::as_str), Some("file"));
        assert_eq!(attributes.get("filePath").map(String::as_str), Some("src/a.ts"));
    }

    #[test]
    fn artifact_labels_come_from_the_first_artifact() {
        let document = parse_artifact(concat!(
            r#"<boltArtifact id="first" title="First">"#,
            "</boltArtifact>",
            r#"<boltArtifact id="second" title="Second"></boltArtifact>"#,
        ));

        assert_eq!(document.id.as_deref(), Some("first"));
        assert_eq!(document.title.as_deref(), Some("First"));
        assert!(document.actions.is_empty());
    }

    #[test]
    fn truncated_opening_tag_is_ignored() {
        let document = parse_artifact(r#"<boltArtifact id="x" title="X"><boltAction type="fi"#);
        assert!(document.actions.is_empty());
        assert_eq!(document.title.as_deref(), Some("X"));
    }

    #[test]
    fn self_closing_folder_action_needs_no_close_tag() {
        let actions = parse_actions(concat!(
            r#"<boltArtifact id="x" title="X">"#,
            r#"<boltAction type="folder" filePath="public/assets" />"#,
        ));
        assert_eq!(actions, vec![Action::create_folder(0, "public/assets")]);
    }
}
