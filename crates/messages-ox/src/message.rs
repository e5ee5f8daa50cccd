use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::tool::{ToolResult, ToolUse};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
}

impl ImageSource {
    pub fn base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Base64 {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Renders the source as a `data:` URI.
    pub fn to_data_uri(&self) -> String {
        match self {
            Self::Base64 { media_type, data } => format!("data:{media_type};base64,{data}"),
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64 { media_type, data } => {
                let preview: String = data.chars().take(20).collect();
                if preview.len() < data.len() {
                    write!(f, "Base64 ({media_type}, {preview}...)")
                } else {
                    write!(f, "Base64 ({media_type}, {preview})")
                }
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Image {
    pub source: ImageSource,
}

impl Image {
    pub fn new(source: ImageSource) -> Self {
        Self { source }
    }

    pub fn from_base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::new(ImageSource::base64(media_type, data))
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Text {
    pub text: String,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<String> for Text {
    fn from(text: String) -> Self {
        Self { text }
    }
}

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_owned(),
        }
    }
}

/// One typed unit of message content.
///
/// Unknown `type` tags fail to deserialize; callers surface that as an
/// invalid request instead of dropping the block.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text(Text),
    Image(Image),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(Text::new(text))
    }

    pub fn image(source: ImageSource) -> Self {
        Self::Image(Image::new(source))
    }

    pub fn as_text(&self) -> Option<&Text> {
        if let Self::Text(v) = self { Some(v) } else { None }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        if let Self::ToolUse(v) = self { Some(v) } else { None }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        if let Self::ToolResult(v) = self { Some(v) } else { None }
    }
}

impl From<Text> for Content {
    fn from(text: Text) -> Self {
        Self::Text(text)
    }
}

impl From<Image> for Content {
    fn from(image: Image) -> Self {
        Self::Image(image)
    }
}

impl From<ToolUse> for Content {
    fn from(tool_use: ToolUse) -> Self {
        Self::ToolUse(tool_use)
    }
}

impl From<ToolResult> for Content {
    fn from(tool_result: ToolResult) -> Self {
        Self::ToolResult(tool_result)
    }
}

/// Message content as sent on the wire: a bare string or a block list.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum StringOrContents {
    String(String),
    Contents(Vec<Content>),
}

impl StringOrContents {
    /// Returns the content as a block list, wrapping a bare string in a
    /// single text block. An empty string yields no blocks.
    pub fn into_contents(self) -> Vec<Content> {
        match self {
            Self::String(s) if s.is_empty() => Vec::new(),
            Self::String(s) => vec![Content::text(s)],
            Self::Contents(contents) => contents,
        }
    }
}

impl From<String> for StringOrContents {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for StringOrContents {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<Vec<Content>> for StringOrContents {
    fn from(value: Vec<Content>) -> Self {
        Self::Contents(value)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: StringOrContents,
}

impl Message {
    pub fn new(role: Role, content: impl Into<StringOrContents>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<StringOrContents>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<StringOrContents>) -> Self {
        Self::new(Role::Assistant, content)
    }
}
