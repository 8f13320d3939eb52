//! Reconciliation engine
//!
//! Converges a page's elements and their components to a submitted content
//! tree. All writes go through the caller's [`UnitOfWork`]; the caller
//! commits only when [`Reconciler::reconcile`] returns `Ok`, so a failure at
//! any block leaves the page exactly as it was.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};

use super::component::ComponentType;
use super::error::{BlockError, EditorError, EditorResult, FieldError};
use super::parser::{self, BlockAction, EditorDocument, ParsedBlock};
use super::registry::ComponentRegistry;
use crate::db::repositories::page_element;
use crate::db::UnitOfWork;
use crate::models::{ElementSlot, PageElement};

/// Row counts of one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub components_created: usize,
    pub components_updated: usize,
    pub elements_created: usize,
    pub elements_updated: usize,
    pub elements_deleted: usize,
    pub orphans_deleted: usize,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Elements of the page after the publish, in order
    pub elements: Vec<PageElement>,
    /// Content rewritten with element ids and persisted representations
    pub content: Value,
    pub stats: ReconcileStats,
}

impl Reconciliation {
    pub fn content_string(&self) -> String {
        self.content.to_string()
    }
}

pub struct Reconciler<'a> {
    registry: &'a ComponentRegistry,
    /// Stored files blocks may point at
    files: HashSet<String>,
}

/// Fold a handler failure into the block's validation error
fn block_failure(block: &ParsedBlock, err: EditorError) -> EditorError {
    if let EditorError::Internal(_) = err {
        return err;
    }
    EditorError::validation(vec![BlockError {
        block_index: block.index,
        block_id: block.block_id.clone(),
        component_type: Some(block.component_type.tag().to_string()),
        message: err.to_string(),
        errors: err.field_errors(),
    }])
}

impl<'a> Reconciler<'a> {
    pub fn new(registry: &'a ComponentRegistry) -> Self {
        Self {
            registry,
            files: HashSet::new(),
        }
    }

    /// Allow blocks to point at these stored files, normally the keys of the
    /// post's attachments. A component may always keep the files it holds.
    pub fn with_files(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.files.extend(keys);
        self
    }

    async fn check_files(&self, uow: &mut UnitOfWork, blocks: &[ParsedBlock]) -> EditorResult<()> {
        let mut errors = Vec::new();
        for block in blocks {
            let (component, held) = match &block.action {
                BlockAction::ReuseStatic(_) => continue,
                BlockAction::CreateNew(component) => (component, Vec::new()),
                BlockAction::UpdateExisting(id, component) => {
                    let held: Vec<String> = self
                        .registry
                        .get(block.component_type)?
                        .load(uow, *id)
                        .await?
                        .map(|c| c.file_refs().into_iter().map(|(_, key)| key.to_string()).collect())
                        .unwrap_or_default();
                    (component, held)
                }
            };

            let field_errors: Vec<FieldError> = component
                .file_refs()
                .into_iter()
                .filter(|(_, key)| !self.files.contains(*key) && !held.iter().any(|h| h.as_str() == *key))
                .map(|(field, key)| {
                    FieldError::new(field, format!("File is not an attachment of this post: {}", key))
                })
                .collect();
            if !field_errors.is_empty() {
                let tag = block.component_type.tag();
                errors.push(BlockError {
                    block_index: block.index,
                    block_id: block.block_id.clone(),
                    component_type: Some(tag.to_string()),
                    message: format!("Invalid {} payload", tag),
                    errors: field_errors,
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(EditorError::validation(errors))
        }
    }

    /// Publish `raw_content` onto page `page_id`.
    ///
    /// `previous_content` is the content stored by the last publish; it lets
    /// blocks without an `element_id` find the element they produced before.
    pub async fn reconcile(
        &self,
        uow: &mut UnitOfWork,
        page_id: i64,
        raw_content: &str,
        previous_content: Option<&str>,
    ) -> EditorResult<Reconciliation> {
        let mut document = EditorDocument::parse(raw_content)?;
        let previous_ids = previous_content
            .and_then(|content| EditorDocument::parse(content).ok())
            .map(|doc| doc.element_ids_by_block())
            .unwrap_or_default();

        let current = page_element::list_for_page(uow, page_id).await?;
        let blocks =
            parser::resolve_blocks(self.registry, uow, &document, &current, &previous_ids).await?;
        self.check_files(uow, &blocks).await?;

        let current_by_id: HashMap<i64, &PageElement> = current.iter().map(|e| (e.id, e)).collect();
        let mut stats = ReconcileStats::default();
        let mut claimed = HashSet::new();
        let mut orphan_candidates = BTreeSet::new();
        let mut rewrites = Vec::with_capacity(blocks.len());

        page_element::park_orders(uow, page_id).await?;

        for (position, block) in blocks.iter().enumerate() {
            let handler = self.registry.get(block.component_type)?;
            let component_id = match &block.action {
                BlockAction::ReuseStatic(id) => *id,
                BlockAction::CreateNew(component) => {
                    let id = handler
                        .create(uow, component)
                        .await
                        .map_err(|e| block_failure(block, e))?;
                    stats.components_created += 1;
                    id
                }
                BlockAction::UpdateExisting(id, component) => {
                    handler
                        .update(uow, *id, component)
                        .await
                        .map_err(|e| block_failure(block, e))?;
                    stats.components_updated += 1;
                    *id
                }
            };

            let slot = ElementSlot {
                order: position as i32 + 1,
                component_type: block.component_type.tag().to_string(),
                component_id,
                owns_component: block.owns_component(),
            };

            let existing = block.element_id.and_then(|id| current_by_id.get(&id).copied());
            let element_id = match existing {
                Some(element) => {
                    if element.owns_component
                        && element.component_ref() != (slot.component_type.as_str(), component_id)
                    {
                        orphan_candidates.insert((element.component_type.clone(), element.component_id));
                    }
                    page_element::update(uow, element.id, &slot).await?;
                    stats.elements_updated += 1;
                    element.id
                }
                None => {
                    let id = page_element::insert(uow, page_id, &slot).await?;
                    stats.elements_created += 1;
                    id
                }
            };
            claimed.insert(element_id);

            let values = if block.owns_component() {
                handler
                    .load(uow, component_id)
                    .await?
                    .map(|component| component.represent(component_id))
            } else {
                None
            };
            rewrites.push((element_id, values));
        }

        for element in current.iter().filter(|e| !claimed.contains(&e.id)) {
            page_element::delete(uow, element.id).await?;
            stats.elements_deleted += 1;
            if element.owns_component {
                orphan_candidates.insert((element.component_type.clone(), element.component_id));
            }
        }

        for (tag, component_id) in orphan_candidates {
            if page_element::count_references(uow, &tag, component_id).await? > 0 {
                continue;
            }
            let component_type: ComponentType = match tag.parse() {
                Ok(component_type) => component_type,
                Err(_) => {
                    tracing::warn!(tag = %tag, component_id, "Skipping orphan of unknown component type");
                    continue;
                }
            };
            self.registry.get(component_type)?.delete(uow, component_id).await?;
            stats.orphans_deleted += 1;
        }

        if let Some(blocks) = document.blocks_mut() {
            for (block, (element_id, values)) in blocks.iter_mut().zip(rewrites) {
                let Value::Object(block) = block else { continue };
                let data = block
                    .entry("data")
                    .or_insert_with(|| Value::Object(Map::new()));
                if !data.is_object() {
                    *data = Value::Object(Map::new());
                }
                if let Value::Object(data) = data {
                    data.insert("element_id".to_string(), Value::from(element_id));
                    if let Some(values) = values {
                        data.insert("values".to_string(), values);
                    }
                }
            }
        }

        let elements = page_element::list_for_page(uow, page_id).await?;
        tracing::info!(
            page_id,
            created = stats.components_created,
            updated = stats.components_updated,
            deleted = stats.elements_deleted,
            orphans = stats.orphans_deleted,
            "Page content reconciled"
        );

        Ok(Reconciliation {
            elements,
            content: document.into_value(),
            stats,
        })
    }
}
