//! Component registry
//!
//! A static table from [`ComponentType`] to the [`ComponentHandler`] that
//! validates and stores that kind of component. It is built once at startup
//! and shared by the parser, the reconciliation engine and the services.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::component::{Component, ComponentType};
use super::components;
use super::error::{EditorError, EditorResult, FieldError};
use crate::db::UnitOfWork;

/// Storage and validation for one component type
#[async_trait]
pub trait ComponentHandler: Send + Sync {
    fn component_type(&self) -> ComponentType;

    /// Validate an embedded payload, collecting every field error
    fn validate(&self, values: &Value) -> Result<Component, Vec<FieldError>>;

    /// Insert a new component row (and its sub-items), returning its id
    async fn create(&self, uow: &mut UnitOfWork, component: &Component) -> EditorResult<i64>;

    /// Overwrite an existing component row and converge its sub-items
    async fn update(&self, uow: &mut UnitOfWork, id: i64, component: &Component) -> EditorResult<()>;

    async fn load(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Component>>;

    async fn exists(&self, uow: &mut UnitOfWork, id: i64) -> Result<bool> {
        components::row_exists(uow, self.component_type().table(), id).await
    }

    /// Delete the component row; stored files are scheduled on the unit of work
    async fn delete(&self, uow: &mut UnitOfWork, id: i64) -> Result<()> {
        components::delete_row(uow, self.component_type().table(), id).await
    }
}

pub struct ComponentRegistry {
    handlers: HashMap<ComponentType, Arc<dyn ComponentHandler>>,
}

impl ComponentRegistry {
    /// Registry with every built-in component type
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for handler in components::builtin_handlers() {
            registry.register(handler);
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn ComponentHandler>) {
        self.handlers.insert(handler.component_type(), handler);
    }

    pub fn get(&self, component_type: ComponentType) -> EditorResult<&Arc<dyn ComponentHandler>> {
        self.handlers
            .get(&component_type)
            .ok_or_else(|| EditorError::UnknownComponentType(component_type.tag().to_string()))
    }

    /// Resolve a type tag to its handler
    pub fn lookup(&self, tag: &str) -> EditorResult<&Arc<dyn ComponentHandler>> {
        self.get(tag.parse()?)
    }

    pub fn contains(&self, component_type: ComponentType) -> bool {
        self.handlers.contains_key(&component_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
