use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A model-issued request to invoke a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl ToolUse {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// Result payload of a tool invocation: a string, or any structured value
/// (typically an array of content blocks).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Structured(Value),
}

impl Default for ToolResultContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl ToolResultContent {
    /// Flattens the payload into a string: text is passed through, anything
    /// structured is serialized as JSON.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

impl From<String> for ToolResultContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ToolResultContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_use_id: String,
    #[serde(default)]
    pub content: ToolResultContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    pub fn new(tool_use_id: impl Into<String>, content: impl Into<ToolResultContent>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: None,
        }
    }
}

/// A tool definition offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

impl Tool {
    pub fn new(name: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoiceMode {
    Auto,
    Any,
    None,
}

/// Tool-choice policy. Accepted both in the bare string form (`"auto"`) and
/// the object form (`{"type": "tool", "name": "..."}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(ToolChoiceMode),
    Spec(ToolChoiceSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoiceSpec {
    Auto,
    Any,
    None,
    Tool { name: String },
}

impl ToolChoice {
    pub fn tool(name: impl Into<String>) -> Self {
        Self::Spec(ToolChoiceSpec::Tool { name: name.into() })
    }

    /// Normalizes both wire forms: returns the mode, or `None` when a
    /// specific tool is named.
    pub fn mode(&self) -> Option<ToolChoiceMode> {
        match self {
            Self::Mode(mode) => Some(*mode),
            Self::Spec(ToolChoiceSpec::Auto) => Some(ToolChoiceMode::Auto),
            Self::Spec(ToolChoiceSpec::Any) => Some(ToolChoiceMode::Any),
            Self::Spec(ToolChoiceSpec::None) => Some(ToolChoiceMode::None),
            Self::Spec(ToolChoiceSpec::Tool { .. }) => None,
        }
    }

    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::Spec(ToolChoiceSpec::Tool { name }) => Some(name),
            _ => None,
        }
    }
}
