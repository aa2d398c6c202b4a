#![allow(dead_code)]

use build_agent::session::{RequestId, SessionHost, SessionNotice};
use build_provider::{ChatMessage, RunId, TemplateSelection};

pub const ARTIFACT_OPEN: &str = r#"<boltArtifact id="todo-app" title="Todo App">"#;
pub const ARTIFACT_CLOSE: &str = "</boltArtifact>";

pub fn file_action(path: &str, content: &str) -> String {
    format!(r#"<boltAction type="file" filePath="{path}">{content}</boltAction>"#)
}

pub fn shell_action(command: &str) -> String {
    format!(r#"<boltAction type="shell">{command}</boltAction>"#)
}

pub fn react_selection() -> TemplateSelection {
    TemplateSelection {
        prompts: vec!["Use React with Vite.".to_string()],
        ui_prompts: vec![format!(
            "{ARTIFACT_OPEN}{}{}{ARTIFACT_CLOSE}",
            file_action("package.json", r#"{"name":"todo"}"#),
            file_action("index.html", "<div id=\"root\"></div>"),
        )],
    }
}

/// Records every host call and hands out ids from one counter.
#[derive(Default)]
pub struct HostSpy {
    pub next_id: u64,
    pub templates: Vec<String>,
    pub streams: Vec<Vec<ChatMessage>>,
    pub cancelled: Vec<u64>,
    pub notices: Vec<SessionNotice>,
    pub fail_streams: Option<String>,
}

impl HostSpy {
    pub fn last_id(&self) -> u64 {
        self.next_id
    }
}

impl SessionHost for HostSpy {
    fn request_template(&mut self, prompt: String) -> Result<RequestId, String> {
        self.next_id += 1;
        self.templates.push(prompt);
        Ok(self.next_id)
    }

    fn start_stream(&mut self, messages: Vec<ChatMessage>) -> Result<RunId, String> {
        if let Some(error) = &self.fail_streams {
            return Err(error.clone());
        }
        self.next_id += 1;
        self.streams.push(messages);
        Ok(self.next_id)
    }

    fn cancel(&mut self, id: u64) {
        self.cancelled.push(id);
    }

    fn notify(&mut self, notice: SessionNotice) {
        self.notices.push(notice);
    }
}
