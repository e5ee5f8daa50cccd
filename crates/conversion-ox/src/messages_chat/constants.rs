/// Constants for Messages <-> Chat conversions

// Envelope
pub const MESSAGE_TYPE: &str = "message";
pub const MESSAGE_ID_PREFIX: &str = "msg_";

// Stream errors
pub const STREAM_ERROR_TYPE: &str = "api_error";

// Keys that carry documentation or meta information only
pub const STRIPPED_SCHEMA_KEYS: [&str; 4] = ["$schema", "additionalProperties", "title", "examples"];

// Keys whose value is a map from names to schemas rather than a schema
pub const SCHEMA_MAP_KEYS: [&str; 4] = ["properties", "patternProperties", "$defs", "definitions"];
