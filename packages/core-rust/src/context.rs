use std::collections::BTreeMap;
use std::time::SystemTime;

/// Descriptive information about the running process.
/// Published by status endpoints and shared through references.
#[derive(Debug, Clone)]
pub struct ContextInfo {
    /// Logical name of the process or container.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Unique identifier of this instance.
    pub context_id: String,
    /// When the process started.
    pub start_time: SystemTime,
    /// Free-form properties exposed on status pages.
    pub properties: BTreeMap<String, String>,
}

impl ContextInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            context_id: context_id.into(),
            start_time: SystemTime::now(),
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
