use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::errors::ApplicationError;

/// Well-known reference names.
pub const ENDPOINT: &str = "endpoint";
pub const CONTROLLER: &str = "controller";
pub const DISCOVERY: &str = "discovery";
pub const COUNTERS: &str = "counters";
pub const TRACER: &str = "tracer";
pub const CONTEXT_INFO: &str = "context-info";

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Locator for collaborating components.
///
/// Components are stored as `Arc<T>` keyed by `(name, TypeId::of::<T>())`,
/// so trait objects (`Arc<dyn Discovery>`) and concrete types can share a
/// name without clashing. Lookup must use the same `T` the component was
/// put with.
#[derive(Default)]
pub struct References {
    entries: DashMap<(String, TypeId), Arc<dyn Any + Send + Sync>>,
    /// Names in first-registration order, for listing.
    order: RwLock<Vec<String>>,
}

impl References {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `component` under `name`, replacing an earlier one of the same type.
    pub fn put<T>(&self, name: &str, component: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.entries
            .insert((name.to_string(), TypeId::of::<T>()), Arc::new(component));
        let mut order = self.order.write();
        if !order.iter().any(|n| n == name) {
            order.push(name.to_string());
        }
    }

    #[must_use]
    pub fn get_optional<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.entries
            .get(&(name.to_string(), TypeId::of::<T>()))
            .and_then(|entry| entry.value().downcast_ref::<Arc<T>>().cloned())
    }

    /// Like [`References::get_optional`] but a missing component is an error.
    ///
    /// # Errors
    ///
    /// Returns `REF_NOT_FOUND` when nothing of type `T` is stored under `name`.
    pub fn get_required<T>(&self, name: &str) -> Result<Arc<T>, ApplicationError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_optional(name).ok_or_else(|| {
            ApplicationError::configuration(
                None,
                "REF_NOT_FOUND",
                format!("Failed to obtain reference to {name}"),
            )
            .with_details("reference", name)
        })
    }

    /// Removes every component stored under `name`.
    pub fn remove(&self, name: &str) {
        self.entries.retain(|(n, _), _| n != name);
        self.order.write().retain(|n| n != name);
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }
}
