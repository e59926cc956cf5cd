/// Body text surface the session reads requests from.
pub trait Editor {
    fn set_value(&mut self, text: &str);
    fn value(&self) -> &str;
    /// Normalizes the buffer and returns the text to send.
    fn format(&mut self) -> String;
}

/// Plain text buffer that pretty-prints JSON on `format`.
#[derive(Debug, Default, Clone)]
pub struct BodyEditor {
    text: String,
    error: Option<String>,
}

impl BodyEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse error from the last `format` call, if it failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn insert_char(&mut self, c: char) {
        self.text.push(c);
    }

    pub fn insert_newline(&mut self) {
        self.text.push('\n');
    }

    pub fn backspace(&mut self) {
        self.text.pop();
    }
}

impl Editor for BodyEditor {
    fn set_value(&mut self, text: &str) {
        self.text = text.to_string();
        self.error = None;
    }

    fn value(&self) -> &str {
        &self.text
    }

    fn format(&mut self) -> String {
        if self.text.trim().is_empty() {
            self.error = None;
            return self.text.clone();
        }

        match pretty_json(&self.text) {
            Ok(formatted) => {
                self.text = formatted;
                self.error = None;
            }
            Err(err) => {
                tracing::debug!("body is not valid JSON, sending as typed: {err}");
                self.error = Some(err.to_string());
            }
        }
        self.text.clone()
    }
}

fn pretty_json(text: &str) -> Result<String, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    serde_json::to_string_pretty(&value)
}
