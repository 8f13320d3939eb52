//! Content tree parser
//!
//! Turns the editor's block document into an ordered list of
//! [`ParsedBlock`]s. Shape errors of the document itself fail fast; problems
//! with individual blocks are collected so the caller can report all of them
//! at once.
//!
//! ```json
//! {"time": 1700000000, "blocks": [
//!   {"id": "b1", "type": "text-pro", "data": {"values": {"title": "A", "text": "hi"}}},
//!   {"id": "b2", "type": "question", "data": {"static": true, "obj": {"id": 4}}}
//! ]}
//! ```

use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use super::component::{Component, ComponentType};
use super::error::{BlockError, EditorError, EditorResult, FieldError};
use super::registry::ComponentRegistry;
use crate::db::UnitOfWork;
use crate::models::PageElement;

/// A parsed editor document, kept as JSON so unknown keys survive a rewrite
#[derive(Debug, Clone, PartialEq)]
pub struct EditorDocument {
    root: Map<String, Value>,
}

impl EditorDocument {
    /// Parse the raw content, checking only the top-level shape
    pub fn parse(raw: &str) -> EditorResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| EditorError::Structural(format!("Content is not valid JSON: {}", e)))?;
        let Value::Object(root) = value else {
            return Err(EditorError::Structural("Content must be a JSON object".to_string()));
        };
        match root.get("blocks") {
            None => return Err(EditorError::Structural("`blocks` is required".to_string())),
            Some(Value::Array(blocks)) => {
                if let Some(idx) = blocks.iter().position(|b| !b.is_object()) {
                    return Err(EditorError::Structural(format!("Block {} is not an object", idx)));
                }
            }
            Some(_) => return Err(EditorError::Structural("`blocks` must be an array".to_string())),
        }
        Ok(Self { root })
    }

    pub fn blocks(&self) -> &[Value] {
        match self.root.get("blocks") {
            Some(Value::Array(blocks)) => blocks,
            _ => &[],
        }
    }

    pub fn blocks_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self.root.get_mut("blocks") {
            Some(Value::Array(blocks)) => Some(blocks),
            _ => None,
        }
    }

    /// Element ids recorded in this document, keyed by client block id
    pub fn element_ids_by_block(&self) -> HashMap<String, i64> {
        self.blocks()
            .iter()
            .filter_map(|block| {
                let block_id = block_id(block)?;
                let element_id = block.get("data").and_then(|d| d.get("element_id")).and_then(as_id)?;
                Some((block_id, element_id))
            })
            .collect()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    pub fn to_json_string(&self) -> String {
        Value::Object(self.root.clone()).to_string()
    }
}

/// What the reconciliation engine has to do for a block's component
#[derive(Debug, Clone, PartialEq)]
pub enum BlockAction {
    /// Point at an existing component without touching it
    ReuseStatic(i64),
    CreateNew(Component),
    /// Overwrite the component owned by the block's element
    UpdateExisting(i64, Component),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBlock {
    pub index: usize,
    pub block_id: Option<String>,
    pub component_type: ComponentType,
    pub action: BlockAction,
    /// Current page element this block correlates to, if any
    pub element_id: Option<i64>,
}

impl ParsedBlock {
    pub fn owns_component(&self) -> bool {
        !matches!(self.action, BlockAction::ReuseStatic(_))
    }
}

fn block_id(block: &Value) -> Option<String> {
    match block.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read an integer id from a number or numeric string
fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_flag_set(data: &Map<String, Value>, key: &str) -> bool {
    matches!(data.get(key), Some(Value::Bool(true)))
}

struct BlockErrors {
    index: usize,
    block_id: Option<String>,
    component_type: Option<String>,
}

impl BlockErrors {
    fn error(&self, message: impl Into<String>, errors: Vec<FieldError>) -> BlockError {
        BlockError {
            block_index: self.index,
            block_id: self.block_id.clone(),
            component_type: self.component_type.clone(),
            message: message.into(),
            errors,
        }
    }
}

/// Resolve every block of the document against the registry and the page's
/// current elements.
///
/// `previous_ids` maps client block ids to the element ids recorded by the
/// last publish; it fills in `element_id` for blocks that do not carry one.
pub async fn resolve_blocks(
    registry: &ComponentRegistry,
    uow: &mut UnitOfWork,
    document: &EditorDocument,
    current: &[PageElement],
    previous_ids: &HashMap<String, i64>,
) -> EditorResult<Vec<ParsedBlock>> {
    let current: HashMap<i64, &PageElement> = current.iter().map(|e| (e.id, e)).collect();
    let mut claimed = HashSet::new();
    let mut parsed = Vec::new();
    let mut errors = Vec::new();

    for (index, block) in document.blocks().iter().enumerate() {
        let block_id = block_id(block);
        let mut ctx = BlockErrors {
            index,
            block_id: block_id.clone(),
            component_type: None,
        };

        let Some(tag) = block.get("type").and_then(Value::as_str) else {
            errors.push(ctx.error("Block type is required", Vec::new()));
            continue;
        };
        ctx.component_type = Some(tag.to_string());

        let handler = match registry.lookup(tag) {
            Ok(handler) => handler,
            Err(e) => {
                errors.push(ctx.error(e.to_string(), Vec::new()));
                continue;
            }
        };
        let component_type = handler.component_type();

        let empty = Map::new();
        let data = match block.get("data") {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(data)) => data,
            Some(_) => {
                errors.push(ctx.error("Block data must be an object", Vec::new()));
                continue;
            }
        };

        let element_id = match data.get("element_id") {
            None | Some(Value::Null) => block_id.as_ref().and_then(|id| previous_ids.get(id)).copied(),
            Some(value) => match as_id(value) {
                Some(id) => Some(id),
                None => {
                    errors.push(ctx.error(
                        "Invalid element id",
                        vec![FieldError::new("element_id", "A valid integer is required")],
                    ));
                    continue;
                }
            },
        };
        // Unknown or already claimed elements are replaced by new rows
        let element = element_id
            .and_then(|id| current.get(&id).copied())
            .filter(|e| claimed.insert(e.id));

        let action = if is_flag_set(data, "static") || is_flag_set(data, "staticNotEditable") {
            let Some(id) = data.get("obj").and_then(|obj| match obj {
                Value::Object(obj) => obj.get("id").and_then(as_id),
                other => as_id(other),
            }) else {
                errors.push(ctx.error(
                    "Static block requires an object reference",
                    vec![FieldError::new("obj.id", "This field is required")],
                ));
                continue;
            };
            if !handler.exists(uow, id).await? {
                errors.push(ctx.error(
                    format!("Component {} with id {} does not exist", component_type, id),
                    vec![FieldError::new("obj.id", format!("Unknown {} id: {}", component_type, id))],
                ));
                continue;
            }
            BlockAction::ReuseStatic(id)
        } else {
            let values = match (data.get("values"), data.get("obj")) {
                (Some(values @ Value::Object(_)), _) => values,
                (_, Some(obj @ Value::Object(_))) => obj,
                _ => {
                    errors.push(ctx.error(
                        "Block payload is required",
                        vec![FieldError::new("values", "This field is required")],
                    ));
                    continue;
                }
            };
            match handler.validate(values) {
                Ok(component) => match element {
                    Some(e) if e.owns_component && e.component_type == component_type.tag() => {
                        BlockAction::UpdateExisting(e.component_id, component)
                    }
                    _ => BlockAction::CreateNew(component),
                },
                Err(field_errors) => {
                    errors.push(ctx.error(format!("Invalid {} payload", component_type), field_errors));
                    continue;
                }
            }
        };

        parsed.push(ParsedBlock {
            index,
            block_id,
            component_type,
            action,
            element_id: element.map(|e| e.id),
        });
    }

    if errors.is_empty() {
        Ok(parsed)
    } else {
        Err(EditorError::validation(errors))
    }
}
