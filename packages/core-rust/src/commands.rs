//! Named operations and the ordered sets that group them.
//!
//! A [`CommandSet`] is a tagged registry: an ordered list of
//! `{name, schema, handler}` records looked up by exact name. Transport
//! layers iterate it to publish routes, and in-process callers use
//! [`CommandSet::execute`] directly.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ApplicationError;
use crate::schema::ObjectSchema;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Named arguments passed to a command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds parameters from a JSON value. `Null` yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns a bad request error for values that are not objects.
    pub fn from_json(correlation_id: Option<&str>, value: Value) -> Result<Self, ApplicationError> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Object(map) => Ok(Self(map)),
            other => Err(ApplicationError::bad_request(
                correlation_id,
                "EXPECTED_JSON_OBJECT",
                format!("Expected a JSON object with parameters but found {other}"),
            )),
        }
    }

    /// Serializes `value` into the parameter `key`.
    ///
    /// # Errors
    ///
    /// Returns an invocation error if `value` cannot be represented as JSON.
    pub fn with<T: Serialize>(mut self, key: &str, value: T) -> Result<Self, ApplicationError> {
        let value = serde_json::to_value(value).map_err(|e| {
            ApplicationError::invocation(None, "SERIALIZATION_FAILED", e.to_string())
        })?;
        self.0.insert(key.to_string(), value);
        Ok(self)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Deserializes the parameter `key`. Missing and null values yield `None`.
    ///
    /// # Errors
    ///
    /// Returns a bad request error when the value has the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ApplicationError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                ApplicationError::bad_request(None, "INVALID_PARAMETER", e.to_string())
                    .with_details("parameter", key)
            }),
        }
    }

    /// Like [`Parameters::get_as`] but treats a missing value as an error.
    ///
    /// # Errors
    ///
    /// Returns `MISSING_PARAMETER` when absent or `INVALID_PARAMETER` when malformed.
    pub fn get_required_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, ApplicationError> {
        self.get_as(key)?.ok_or_else(|| {
            ApplicationError::bad_request(
                None,
                "MISSING_PARAMETER",
                format!("Parameter {key} is required"),
            )
            .with_details("parameter", key)
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Boxed future returned by command handlers.
pub type CommandFuture = BoxFuture<'static, Result<Value, ApplicationError>>;

/// Handler invoked with the caller's correlation id and parameters.
pub type CommandHandler = Arc<dyn Fn(Option<String>, Parameters) -> CommandFuture + Send + Sync>;

/// A named operation with an optional parameter schema.
#[derive(Clone)]
pub struct Command {
    name: String,
    schema: Option<ObjectSchema>,
    handler: CommandHandler,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Command {
    pub fn new<F, Fut>(name: impl Into<String>, schema: Option<ObjectSchema>, handler: F) -> Self
    where
        F: Fn(Option<String>, Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApplicationError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            schema,
            handler: Arc::new(move |cid, params| -> CommandFuture {
                Box::pin(handler(cid, params))
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn schema(&self) -> Option<&ObjectSchema> {
        self.schema.as_ref()
    }

    /// Validates `params` against the schema, then runs the handler.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_DATA` on validation failure, or the handler's error.
    pub async fn execute(
        &self,
        correlation_id: Option<&str>,
        params: Parameters,
    ) -> Result<Value, ApplicationError> {
        if let Some(schema) = &self.schema {
            schema.validate_and_throw(correlation_id, &Value::Object(params.0.clone()))?;
        }
        (self.handler)(correlation_id.map(str::to_string), params)
            .await
            .map_err(|e| e.with_correlation_id(correlation_id))
    }
}

// ---------------------------------------------------------------------------
// CommandSet
// ---------------------------------------------------------------------------

/// Ordered collection of commands, unique by name.
#[derive(Debug, Clone, Default)]
pub struct CommandSet {
    commands: Vec<Command>,
    index: HashMap<String, usize>,
}

impl CommandSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    ///
    /// # Errors
    ///
    /// Returns `DUPLICATE_COMMAND` when a command with the same name exists.
    pub fn add_command(&mut self, command: Command) -> Result<(), ApplicationError> {
        if self.index.contains_key(command.name()) {
            return Err(ApplicationError::configuration(
                None,
                "DUPLICATE_COMMAND",
                format!("Command {} is already registered", command.name()),
            )
            .with_details("command", command.name()));
        }
        self.index.insert(command.name().to_string(), self.commands.len());
        self.commands.push(command);
        Ok(())
    }

    /// Appends every command of `other`, keeping its order.
    ///
    /// # Errors
    ///
    /// Returns `DUPLICATE_COMMAND` on the first name clash.
    pub fn add_command_set(&mut self, other: &CommandSet) -> Result<(), ApplicationError> {
        for command in &other.commands {
            self.add_command(command.clone())?;
        }
        Ok(())
    }

    /// Commands in insertion order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn find_command(&self, name: &str) -> Option<&Command> {
        self.index.get(name).map(|&i| &self.commands[i])
    }

    /// Finds a command by name and executes it.
    ///
    /// # Errors
    ///
    /// Returns `CMD_NOT_FOUND` for unknown names, or the command's error.
    pub async fn execute(
        &self,
        correlation_id: Option<&str>,
        name: &str,
        params: Parameters,
    ) -> Result<Value, ApplicationError> {
        let Some(command) = self.find_command(name) else {
            return Err(ApplicationError::bad_request(
                correlation_id,
                "CMD_NOT_FOUND",
                format!("Requested command does not exist: {name}"),
            )
            .with_details("command", name));
        };
        command.execute(correlation_id, params).await
    }
}

/// Business component that publishes its operations as a command set.
pub trait Commandable: Send + Sync {
    fn command_set(&self) -> Arc<CommandSet>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
