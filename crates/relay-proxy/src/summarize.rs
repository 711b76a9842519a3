use relay_protocol::Arg;
use serde_json::Value;

pub const DEFAULT_SUMMARY_LIMIT: usize = 256;

/// Renders call arguments and results for log lines.
pub trait Summarize: Send + Sync {
    fn summarize_args(&self, args: &[Arg]) -> String;
    fn summarize_value(&self, value: &Value) -> String;
}

/// Caps every rendered argument or result at `limit` characters.
#[derive(Clone, Debug)]
pub struct TruncatingSummarizer {
    limit: usize,
}

impl TruncatingSummarizer {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    fn summarize_arg(&self, arg: &Arg) -> String {
        match arg {
            Arg::Null => "null".to_string(),
            Arg::Text(text) => format!("\"{}\"", self.truncate(text)),
            Arg::Value(value) => self.summarize_value(value),
            Arg::Message(message) => match message.text() {
                Some(text) => format!("Message(text=\"{}\")", self.truncate(&text)),
                None => "Message(text=null)".to_string(),
            },
        }
    }

    fn truncate(&self, text: &str) -> String {
        let total = text.chars().count();
        if total <= self.limit {
            return text.to_string();
        }
        let kept: String = text.chars().take(self.limit).collect();
        format!("{kept}...({total} chars)")
    }
}

impl Default for TruncatingSummarizer {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_LIMIT)
    }
}

impl Summarize for TruncatingSummarizer {
    fn summarize_args(&self, args: &[Arg]) -> String {
        let parts = args
            .iter()
            .map(|arg| self.summarize_arg(arg))
            .collect::<Vec<_>>();
        format!("[{}]", parts.join(", "))
    }

    fn summarize_value(&self, value: &Value) -> String {
        match value {
            Value::String(text) => format!("\"{}\"", self.truncate(text)),
            other => self.truncate(&other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_text_is_cut_on_char_boundaries() {
        let summarizer = TruncatingSummarizer::new(3);
        assert_eq!(
            summarizer.summarize_args(&[Arg::from("héllo"), Arg::Null]),
            "[\"hél...(5 chars)\", null]"
        );
    }

    #[test]
    fn values_render_compactly() {
        let summarizer = TruncatingSummarizer::default();
        assert_eq!(summarizer.summarize_value(&Value::Null), "null");
        assert_eq!(
            summarizer.summarize_value(&serde_json::json!({"ok": true})),
            "{\"ok\":true}"
        );
        assert_eq!(summarizer.summarize_args(&[]), "[]");
    }
}
