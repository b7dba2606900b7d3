use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use crate::{
    error::{OrbError, OrbResult},
    reference::ObjectReference,
};

/// Directory mapping names to object references.
pub trait NamingContext {
    fn resolve(&self, name: &str) -> OrbResult<ObjectReference>;

    /// Binds `name` to `reference`, replacing any previous binding.
    fn rebind(&self, name: &str, reference: ObjectReference) -> OrbResult<()>;
}

/// Naming context living in the current process.
#[derive(Debug, Default)]
pub struct InMemoryNamingContext {
    bindings: Mutex<HashMap<String, ObjectReference>>,
}

impl InMemoryNamingContext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NamingContext for InMemoryNamingContext {
    fn resolve(&self, name: &str) -> OrbResult<ObjectReference> {
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| OrbError::PreconditionNotMet(format!("no object bound to {name}")))
    }

    fn rebind(&self, name: &str, reference: ObjectReference) -> OrbResult<()> {
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), reference);
        Ok(())
    }
}
