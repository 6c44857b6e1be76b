use crate::core::error::DependencyGraphError;
use crate::function::definition::{FunctionDefinition, FunctionId};
use std::collections::HashMap;
use std::sync::Arc;

/// The catalog of functions available to a resolver, kept in registration
/// order.
#[derive(Debug, Clone, Default)]
pub struct FunctionRepository {
    functions: Vec<Arc<dyn FunctionDefinition>>,
    by_id: HashMap<FunctionId, usize>,
}

impl FunctionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function. Ids must be unique, since nodes are
    /// deduplicated by function id.
    pub fn add_function(
        &mut self,
        function: impl FunctionDefinition + 'static,
    ) -> Result<(), DependencyGraphError> {
        self.add_shared(Arc::new(function))
    }

    pub fn add_shared(
        &mut self,
        function: Arc<dyn FunctionDefinition>,
    ) -> Result<(), DependencyGraphError> {
        let id = function.id().clone();
        if self.by_id.contains_key(&id) {
            return Err(DependencyGraphError::InvalidArgument(format!(
                "function {} is already registered",
                id
            )));
        }
        self.by_id.insert(id, self.functions.len());
        self.functions.push(function);
        Ok(())
    }

    pub fn get(&self, id: &FunctionId) -> Option<&Arc<dyn FunctionDefinition>> {
        self.by_id.get(id).map(|&i| &self.functions[i])
    }

    pub fn functions(&self) -> &[Arc<dyn FunctionDefinition>] {
        &self.functions
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
