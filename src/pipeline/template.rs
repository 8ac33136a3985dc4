// ABOUTME: `${key}` placeholder templates used in stage arguments.
// ABOUTME: Parsed at load time; rendered against a resolved PipelineConfig.

use crate::resolve::{ConfigError, PipelineConfig};
use crate::types::ConfigKey;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Key(ConfigKey),
}

/// A string with zero or more `${key}` placeholders.
///
/// `$$` renders a literal `$`. Any other `$` is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unterminated placeholder in '{0}'")]
    Unterminated(String),

    #[error("invalid placeholder '${{{key}}}': {reason}")]
    InvalidKey { key: String, reason: String },
}

impl Template {
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut rest = input;

        while let Some(pos) = rest.find('$') {
            text.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(tail) = after.strip_prefix('$') {
                text.push('$');
                rest = tail;
            } else if let Some(body) = after.strip_prefix('{') {
                let end = body
                    .find('}')
                    .ok_or_else(|| TemplateError::Unterminated(input.to_string()))?;
                let name = &body[..end];
                let key = ConfigKey::new(name).map_err(|e| TemplateError::InvalidKey {
                    key: name.to_string(),
                    reason: e.to_string(),
                })?;
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Key(key));
                rest = &body[end + 1..];
            } else {
                text.push('$');
                rest = after;
            }
        }

        text.push_str(rest);
        if !text.is_empty() || segments.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Self { segments })
    }

    /// Keys referenced by placeholders, in order of appearance.
    pub fn keys(&self) -> impl Iterator<Item = &ConfigKey> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Key(key) => Some(key),
            Segment::Text(_) => None,
        })
    }

    pub fn render(&self, config: &PipelineConfig) -> Result<String, ConfigError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Key(key) => out.push_str(config.require(key)?),
            }
        }
        Ok(out)
    }
}
