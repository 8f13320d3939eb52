//! Matching component handler, backed by the graph synchronizer

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::mismatch;
use crate::db::UnitOfWork;
use crate::editor::component::{Component, ComponentType};
use crate::editor::error::{EditorResult, FieldError};
use crate::editor::matching;
use crate::editor::registry::ComponentHandler;

pub struct MatchingHandler;

#[async_trait]
impl ComponentHandler for MatchingHandler {
    fn component_type(&self) -> ComponentType {
        ComponentType::Matching
    }

    fn validate(&self, values: &Value) -> Result<Component, Vec<FieldError>> {
        matching::validate_payload(values).map(Component::Matching)
    }

    async fn create(&self, uow: &mut UnitOfWork, component: &Component) -> EditorResult<i64> {
        let Component::Matching(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        // A new component has no elements yet; ids and images copied from elsewhere are dropped
        let mut fresh = c.clone();
        for element in &mut fresh.elements {
            element.id = None;
            element.image_file = None;
        }

        let id = matching::insert_component(uow, &fresh.title).await?;
        matching::sync_graph(uow, id, &fresh).await?;
        Ok(id)
    }

    async fn update(&self, uow: &mut UnitOfWork, id: i64, component: &Component) -> EditorResult<()> {
        let Component::Matching(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        matching::update_title(uow, id, &c.title).await?;
        matching::sync_graph(uow, id, c).await?;
        Ok(())
    }

    async fn load(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Component>> {
        Ok(matching::load_graph(uow, id).await?.map(Component::Matching))
    }

    async fn delete(&self, uow: &mut UnitOfWork, id: i64) -> Result<()> {
        matching::delete_graph(uow, id).await
    }
}
