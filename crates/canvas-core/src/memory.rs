use crate::error::CanvasError;
use html_escape::encode_text;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Number of characters of a memory value kept for display.
pub const VALUE_PREFIX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTier {
    Permanent,
    Task,
    Volatile,
}

impl MemoryTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryTier::Permanent => "permanent",
            MemoryTier::Task => "task",
            MemoryTier::Volatile => "volatile",
        }
    }

    fn header(&self) -> &'static str {
        match self {
            MemoryTier::Permanent => "### Permanent Memory\n---\n",
            MemoryTier::Task => "### Task Memory\n---\n",
            MemoryTier::Volatile => "### Volatile Memory\n---\n",
        }
    }
}

impl fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryTier {
    type Err = CanvasError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "permanent" => Ok(MemoryTier::Permanent),
            "task" => Ok(MemoryTier::Task),
            "volatile" => Ok(MemoryTier::Volatile),
            other => Err(CanvasError::InvalidTier(other.to_string())),
        }
    }
}

/// Key/value pairs of one tier as delivered by a full snapshot report.
pub type MemoryMap = BTreeMap<String, String>;

/// Validates a snapshot memory payload.
///
/// `null` and `{}` both mean "nothing to apply" and yield `None`.
pub fn parse_memory_map(
    tier: MemoryTier,
    payload: &Value,
) -> Result<Option<MemoryMap>, CanvasError> {
    let object = match payload {
        Value::Null => return Ok(None),
        Value::Object(object) => object,
        other => {
            return Err(CanvasError::MalformedMemoryMap {
                tier: tier.to_string(),
                reason: format!("expected an object, got {}", json_kind(other)),
            })
        }
    };
    if object.is_empty() {
        return Ok(None);
    }
    let mut map = MemoryMap::new();
    for (key, value) in object {
        let Some(text) = value.as_str() else {
            return Err(CanvasError::MalformedMemoryMap {
                tier: tier.to_string(),
                reason: format!("value for '{key}' is {}, not a string", json_kind(value)),
            });
        };
        map.insert(key.clone(), text.to_string());
    }
    Ok(Some(map))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn value_prefix(value: &str) -> &str {
    match value.char_indices().nth(VALUE_PREFIX_CHARS) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

/// Three append-only markdown logs, one per tier.
///
/// Keys and values are HTML-escaped after the display cut.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    permanent: String,
    task: String,
    volatile: String,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self {
            permanent: MemoryTier::Permanent.header().to_string(),
            task: MemoryTier::Task.header().to_string(),
            volatile: MemoryTier::Volatile.header().to_string(),
        }
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn blob_mut(&mut self, tier: MemoryTier) -> &mut String {
        match tier {
            MemoryTier::Permanent => &mut self.permanent,
            MemoryTier::Task => &mut self.task,
            MemoryTier::Volatile => &mut self.volatile,
        }
    }

    pub fn write(&mut self, tier: MemoryTier, stamp: &str, key: &str, value: &str) {
        let entry = format!(
            "- **{stamp} [{}]**: {}...\n",
            encode_text(key),
            encode_text(value_prefix(value))
        );
        self.blob_mut(tier).push_str(&entry);
    }

    /// Rebuilds a tier from scratch: header plus one line per entry, in key order.
    pub fn replace_tier(&mut self, tier: MemoryTier, entries: &MemoryMap) {
        let mut blob = tier.header().to_string();
        for (key, value) in entries {
            blob.push_str(&format!(
                "- **[{}]**: {}...\n",
                encode_text(key),
                encode_text(value_prefix(value))
            ));
        }
        *self.blob_mut(tier) = blob;
    }

    pub fn render(&self, tier: MemoryTier) -> &str {
        match tier {
            MemoryTier::Permanent => &self.permanent,
            MemoryTier::Task => &self.task,
            MemoryTier::Volatile => &self.volatile,
        }
    }
}
