//! In-memory `Dummy` entity service used by tests and the demo server.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use switchyard_core::{
    ApplicationError, Command, CommandSet, Commandable, DataPage, FilterParams, ObjectSchema,
    PagingParams, Parameters, TypeCode,
};
use uuid::Uuid;

const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubDummy {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dummy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub array: Vec<SubDummy>,
}

impl Dummy {
    #[must_use]
    pub fn new(key: &str, content: &str) -> Self {
        Self {
            id: None,
            key: key.to_string(),
            content: Some(content.to_string()),
            flag: None,
            array: Vec::new(),
        }
    }
}

#[must_use]
pub fn sub_dummy_schema() -> ObjectSchema {
    ObjectSchema::new()
        .with_required_property("key", TypeCode::String)
        .with_optional_property("content", TypeCode::String)
}

#[must_use]
pub fn dummy_schema() -> ObjectSchema {
    ObjectSchema::new()
        .with_optional_property("id", TypeCode::String)
        .with_required_property("key", TypeCode::String)
        .with_optional_property("content", TypeCode::String)
        .with_optional_property("flag", TypeCode::Boolean)
        .with_nested("array", TypeCode::Array, false, sub_dummy_schema())
}

// ---------------------------------------------------------------------------
// DummyController
// ---------------------------------------------------------------------------

/// Thread-safe in-memory store of [`Dummy`] entities.
pub struct DummyController {
    entities: RwLock<Vec<Dummy>>,
    commands: Arc<CommandSet>,
}

impl DummyController {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            entities: RwLock::new(Vec::new()),
            commands: Arc::new(dummy_command_set(weak)),
        })
    }

    /// Entities matching `filter.key`, windowed by `paging` (at most 100).
    #[must_use]
    pub fn get_page_by_filter(
        &self,
        _correlation_id: Option<&str>,
        filter: &FilterParams,
        paging: &PagingParams,
    ) -> DataPage<Dummy> {
        let key = filter.get("key");
        let entities = self.entities.read();
        let matching = entities
            .iter()
            .filter(|entity| key.is_none_or(|key| entity.key == key));

        let total = paging
            .total
            .then(|| u64::try_from(matching.clone().count()).unwrap_or(u64::MAX));
        let skip = usize::try_from(paging.skip_or(0)).unwrap_or(usize::MAX);
        let take = usize::try_from(paging.take_or(MAX_PAGE_SIZE)).unwrap_or(usize::MAX);
        DataPage::new(matching.skip(skip).take(take).cloned().collect(), total)
    }

    #[must_use]
    pub fn get_one_by_id(&self, _correlation_id: Option<&str>, id: &str) -> Option<Dummy> {
        self.entities
            .read()
            .iter()
            .find(|entity| entity.id.as_deref() == Some(id))
            .cloned()
    }

    /// Stores `entity`, assigning a fresh id when it has none.
    #[must_use]
    pub fn create(&self, _correlation_id: Option<&str>, mut entity: Dummy) -> Dummy {
        if entity.id.is_none() {
            entity.id = Some(Uuid::new_v4().simple().to_string());
        }
        self.entities.write().push(entity.clone());
        entity
    }

    /// Replaces the entity with the same id. `None` when there is none.
    #[must_use]
    pub fn update(&self, _correlation_id: Option<&str>, entity: Dummy) -> Option<Dummy> {
        let mut entities = self.entities.write();
        let existing = entities
            .iter_mut()
            .find(|existing| entity.id.is_some() && existing.id == entity.id)?;
        *existing = entity.clone();
        Some(entity)
    }

    #[must_use]
    pub fn delete_by_id(&self, _correlation_id: Option<&str>, id: &str) -> Option<Dummy> {
        let mut entities = self.entities.write();
        let index = entities
            .iter()
            .position(|entity| entity.id.as_deref() == Some(id))?;
        Some(entities.remove(index))
    }

    #[must_use]
    pub fn check_correlation_id(&self, correlation_id: Option<&str>) -> Option<String> {
        correlation_id.map(str::to_string)
    }

    /// Always fails with `TEST_ERROR`.
    ///
    /// # Errors
    ///
    /// Always returns a not-found error.
    pub fn raise_exception(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        Err(ApplicationError::not_found(
            correlation_id,
            "TEST_ERROR",
            "Dummy error in controller!",
        ))
    }

    #[must_use]
    pub fn ping(&self) -> bool {
        true
    }
}

impl Commandable for DummyController {
    fn command_set(&self) -> Arc<CommandSet> {
        Arc::clone(&self.commands)
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn upgrade(controller: &Weak<DummyController>) -> Result<Arc<DummyController>, ApplicationError> {
    controller.upgrade().ok_or_else(|| {
        ApplicationError::invalid_state(None, "NO_CONTROLLER", "Dummy controller was dropped")
    })
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ApplicationError> {
    serde_json::to_value(value).map_err(|e| {
        ApplicationError::invocation(None, "SERIALIZATION_FAILED", "Failed to serialize result")
            .with_cause(e)
    })
}

/// Builds a command whose handler runs synchronously against the controller.
fn controller_command<F>(
    controller: &Weak<DummyController>,
    name: &str,
    schema: Option<ObjectSchema>,
    handler: F,
) -> Command
where
    F: Fn(&DummyController, Option<&str>, Parameters) -> Result<Value, ApplicationError>
        + Send
        + Sync
        + 'static,
{
    let controller = controller.clone();
    let handler = Arc::new(handler);
    Command::new(name, schema, move |correlation_id: Option<String>, params| {
        let controller = controller.clone();
        let handler = Arc::clone(&handler);
        async move {
            let controller = upgrade(&controller)?;
            handler(&controller, correlation_id.as_deref(), params)
        }
    })
}

fn dummy_command_set(controller: &Weak<DummyController>) -> CommandSet {
    let id_schema = || ObjectSchema::new().with_required_property("dummy_id", TypeCode::String);
    let dummy_param_schema = || ObjectSchema::new().with_nested("dummy", TypeCode::Object, true, dummy_schema());

    let commands = vec![
        controller_command(
            controller,
            "get_dummies",
            Some(
                ObjectSchema::new()
                    .with_optional_property("filter", TypeCode::Object)
                    .with_optional_property("paging", TypeCode::Object),
            ),
            |c, cid, params| {
                let filter: FilterParams = params.get_as("filter")?.unwrap_or_default();
                let paging: PagingParams = params.get_as("paging")?.unwrap_or_default();
                to_value(c.get_page_by_filter(cid, &filter, &paging))
            },
        ),
        controller_command(controller, "get_dummy_by_id", Some(id_schema()), |c, cid, params| {
            let id: String = params.get_required_as("dummy_id")?;
            to_value(c.get_one_by_id(cid, &id))
        }),
        controller_command(controller, "create_dummy", Some(dummy_param_schema()), |c, cid, params| {
            let dummy: Dummy = params.get_required_as("dummy")?;
            to_value(c.create(cid, dummy))
        }),
        controller_command(controller, "update_dummy", Some(dummy_param_schema()), |c, cid, params| {
            let dummy: Dummy = params.get_required_as("dummy")?;
            to_value(c.update(cid, dummy))
        }),
        controller_command(controller, "delete_dummy", Some(id_schema()), |c, cid, params| {
            let id: String = params.get_required_as("dummy_id")?;
            to_value(c.delete_by_id(cid, &id))
        }),
        controller_command(controller, "check_correlation_id", Some(ObjectSchema::new()), |c, cid, _| {
            Ok(json!({"correlation_id": c.check_correlation_id(cid)}))
        }),
        controller_command(controller, "create_dummy_without_validation", None, |_, _, _| {
            Ok(Value::Null)
        }),
        controller_command(controller, "raise_commandset_error", Some(dummy_param_schema()), |_, _, _| {
            Err(anyhow::anyhow!("Dummy error in commandset!").into())
        }),
        controller_command(controller, "raise_exception", Some(ObjectSchema::new()), |c, cid, _| {
            c.raise_exception(cid)?;
            Ok(Value::Null)
        }),
        controller_command(controller, "ping_dummy", None, |c, _, _| Ok(json!(c.ping()))),
    ];

    let mut set = CommandSet::new();
    for command in commands {
        // Names above are distinct.
        let _ = set.add_command(command);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crud_on_controller() {
        let controller = DummyController::new();
        let created = controller.create(None, Dummy::new("Key 1", "Content 1"));
        let id = created.id.clone().unwrap();

        assert_eq!(controller.get_one_by_id(None, &id), Some(created.clone()));

        let mut changed = created.clone();
        changed.content = Some("Updated".into());
        assert_eq!(controller.update(None, changed.clone()), Some(changed));

        assert!(controller.delete_by_id(None, &id).is_some());
        assert!(controller.get_one_by_id(None, &id).is_none());
        assert!(controller.delete_by_id(None, &id).is_none());
    }

    #[test]
    fn paging_and_filtering() {
        let controller = DummyController::new();
        for i in 0..5 {
            let key = if i % 2 == 0 { "even" } else { "odd" };
            let _ = controller.create(None, Dummy::new(key, &i.to_string()));
        }

        let page = controller.get_page_by_filter(
            None,
            &FilterParams::new().with("key", "even"),
            &PagingParams::new(Some(1), Some(1), true),
        );
        assert_eq!(page.total, Some(3));
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].content.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn command_set_dispatches_to_controller() {
        let controller = DummyController::new();
        let commands = controller.command_set();
        assert_eq!(commands.commands().len(), 10);

        let params = Parameters::from_json(None, json!({"dummy": {"key": "k", "content": "c"}})).unwrap();
        let created = commands.execute(Some("c1"), "create_dummy", params).await.unwrap();
        assert_eq!(created["key"], "k");

        let err = commands
            .execute(Some("c2"), "raise_exception", Parameters::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, "TEST_ERROR");
        assert_eq!(err.status, 404);
        assert_eq!(err.correlation_id.as_deref(), Some("c2"));

        let err = commands
            .execute(None, "create_dummy", Parameters::from_json(None, json!({"dummy": {"content": "x"}})).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code, "INVALID_DATA");
    }

    #[tokio::test]
    async fn commandset_error_is_unknown() {
        let controller = DummyController::new();
        let params = Parameters::from_json(None, json!({"dummy": {"key": "k"}})).unwrap();
        let err = controller
            .command_set()
            .execute(None, "raise_commandset_error", params)
            .await
            .unwrap_err();
        assert_eq!(err.code, "UNKNOWN");
        assert_eq!(err.status, 500);
    }
}
