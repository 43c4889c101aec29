//! Facts handed from the pipeline to later consumers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key of the stack pointer register datum.
pub const STACK_POINTER: &str = "STACK_POINTER";

/// A small structured value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InterPassDatum {
    /// A physical register, by register file name and index.
    #[serde(rename_all = "kebab-case")]
    Register { register_file: String, index: u32 },
    Integer { value: i64 },
    Text { value: String },
}

impl InterPassDatum {
    pub fn register(register_file: impl Into<String>, index: u32) -> Self {
        InterPassDatum::Register {
            register_file: register_file.into(),
            index,
        }
    }

    /// `(register file, index)` if this is a register datum.
    pub fn as_register(&self) -> Option<(&str, u32)> {
        match self {
            InterPassDatum::Register {
                register_file,
                index,
            } => Some((register_file.as_str(), *index)),
            _ => None,
        }
    }
}

/// String-keyed store living as long as the caller keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterPassData {
    data: BTreeMap<String, InterPassDatum>,
}

impl InterPassData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a datum, replacing any previous value under the key.
    pub fn set_datum(&mut self, key: impl Into<String>, datum: InterPassDatum) {
        self.data.insert(key.into(), datum);
    }

    pub fn datum(&self, key: &str) -> Option<&InterPassDatum> {
        self.data.get(key)
    }

    pub fn has_datum(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn remove_datum(&mut self, key: &str) -> Option<InterPassDatum> {
        self.data.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The stack pointer recorded by the last successful compilation.
    pub fn stack_pointer(&self) -> Option<(&str, u32)> {
        self.datum(STACK_POINTER).and_then(InterPassDatum::as_register)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
