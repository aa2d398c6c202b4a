use crate::action::ActionKind;
use crate::tree::normalize_path;

use super::fence::strip_open_fence;
use super::scan;

/// File currently being generated in a streaming response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePreview {
    pub path: String,
    /// Content received so far, with an opening fence line removed.
    pub content: String,
}

/// Returns the path and partial content of the trailing unterminated file
/// action, if the stream is currently inside one.
pub fn streaming_file_preview(text: &str) -> Option<FilePreview> {
    let open = scan(text).open_action?;

    let kind = open
        .attributes
        .get("type")
        .and_then(|value| ActionKind::from_markup_type(value))?;
    if kind != ActionKind::CreateFile {
        return None;
    }

    let path = normalize_path(open.attributes.get("filePath")?);
    if path.is_empty() {
        return None;
    }

    Some(FilePreview {
        path,
        content: strip_open_fence(&open.body).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAD: &str = r#"<boltArtifact id="app" title="App">"#;

    #[test]
    fn reports_partial_file_content() {
        let text = format!(
            "{HEAD}<boltAction type=\"file\" filePath=\"/src/main.ts\">\n```ts\nconsole.log("
        );

        assert_eq!(
            streaming_file_preview(&text),
            Some(FilePreview {
                path: "src/main.ts".to_string(),
                content: "console.log(".to_string(),
            })
        );
    }

    #[test]
    fn closed_actions_have_no_preview() {
        let text =
            format!("{HEAD}<boltAction type=\"file\" filePath=\"a.ts\">x</boltAction>");
        assert_eq!(streaming_file_preview(&text), None);
    }

    #[test]
    fn shell_actions_have_no_preview() {
        let text = format!("{HEAD}<boltAction type=\"shell\">npm i");
        assert_eq!(streaming_file_preview(&text), None);
    }

    #[test]
    fn open_action_outside_artifact_has_no_preview() {
        let text = "<boltAction type=\"file\" filePath=\"a.ts\">partial";
        assert_eq!(streaming_file_preview(text), None);
    }
}
