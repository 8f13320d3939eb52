//! Built-in component handlers
//!
//! One handler per component type plus the row helpers they share.

mod fill_text;
mod matching;
mod media;
mod put_in_order;
mod question;
mod text;

pub use fill_text::FillTextHandler;
pub use matching::MatchingHandler;
pub use media::{file_in_use, AudioHandler, ImageHandler, RecordAudioHandler, VideoHandler};
pub use put_in_order::PutInOrderHandler;
pub use question::QuestionHandler;
pub use text::{BlueCardHandler, TextHandler};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use super::component::{Component, ComponentType};
use super::error::{EditorError, FieldError};
use super::registry::ComponentHandler;
use crate::db::unit_of_work::{with_conn, UnitOfWork};

pub fn builtin_handlers() -> Vec<Arc<dyn ComponentHandler>> {
    vec![
        Arc::new(TextHandler),
        Arc::new(QuestionHandler),
        Arc::new(FillTextHandler),
        Arc::new(PutInOrderHandler),
        Arc::new(MatchingHandler),
        Arc::new(AudioHandler),
        Arc::new(ImageHandler),
        Arc::new(VideoHandler),
        Arc::new(RecordAudioHandler),
        Arc::new(BlueCardHandler),
    ]
}

/// Deserialize a payload object into `T`
pub(crate) fn parse_values<T: DeserializeOwned>(values: &Value) -> Result<T, Vec<FieldError>> {
    if !values.is_object() {
        return Err(vec![FieldError::new("values", "Expected an object")]);
    }
    serde_json::from_value(values.clone())
        .map_err(|e| vec![FieldError::new("values", e.to_string())])
}

pub(crate) fn require_text(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "This field may not be blank"));
    }
}

pub(crate) fn finish<T>(value: T, errors: Vec<FieldError>) -> Result<T, Vec<FieldError>> {
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(errors)
    }
}

pub(crate) fn mismatch(expected: ComponentType, got: &Component) -> EditorError {
    EditorError::Internal(anyhow::anyhow!(
        "{} handler received a {} payload",
        expected,
        got.component_type()
    ))
}

pub(crate) async fn row_exists(uow: &mut UnitOfWork, table: &str, id: i64) -> Result<bool> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", table);
    let count = with_conn!(uow, |conn| {
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_one(&mut *conn)
            .await
    })
    .with_context(|| format!("Failed to look up {} row", table))?;
    Ok(count > 0)
}

pub(crate) async fn delete_row(uow: &mut UnitOfWork, table: &str, id: i64) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?", table);
    with_conn!(uow, |conn| {
        sqlx::query(&sql).bind(id).execute(&mut *conn).await.map(|_| ())
    })
    .with_context(|| format!("Failed to delete {} row", table))
}

/// Ids of the sub-item rows of a component
pub(crate) async fn child_ids(uow: &mut UnitOfWork, table: &str, component_id: i64) -> Result<HashSet<i64>> {
    let sql = format!("SELECT id FROM {} WHERE component_id = ?", table);
    let ids = with_conn!(uow, |conn| {
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(component_id)
            .fetch_all(&mut *conn)
            .await
    })
    .with_context(|| format!("Failed to list {} rows", table))?;
    Ok(ids.into_iter().collect())
}

/// Delete the sub-item rows of a component that are not in `keep`
pub(crate) async fn delete_children_except(
    uow: &mut UnitOfWork,
    table: &str,
    component_id: i64,
    existing: &HashSet<i64>,
    keep: &HashSet<i64>,
) -> Result<usize> {
    let mut removed = 0;
    for id in existing.difference(keep) {
        let sql = format!("DELETE FROM {} WHERE id = ? AND component_id = ?", table);
        with_conn!(uow, |conn| {
            sqlx::query(&sql)
                .bind(*id)
                .bind(component_id)
                .execute(&mut *conn)
                .await
                .map(|_| ())
        })
        .with_context(|| format!("Failed to delete {} row", table))?;
        removed += 1;
    }
    Ok(removed)
}

/// Resolve which submitted sub-item ids can be updated in place.
///
/// Ids that do not belong to the component, or that repeat an earlier item,
/// are treated as new items.
pub(crate) fn claim_child_ids(submitted: &[Option<i64>], existing: &HashSet<i64>) -> Vec<Option<i64>> {
    let mut claimed = HashSet::new();
    submitted
        .iter()
        .map(|id| match id {
            Some(id) if existing.contains(id) && claimed.insert(*id) => Some(*id),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_child_ids_drops_foreign_and_repeated_ids() {
        let existing: HashSet<i64> = [1, 2].into_iter().collect();
        let claimed = claim_child_ids(&[Some(2), Some(9), None, Some(2), Some(1)], &existing);
        assert_eq!(claimed, vec![Some(2), None, None, None, Some(1)]);
    }

    #[test]
    fn test_parse_values_requires_object() {
        let err = parse_values::<crate::editor::component::TextComponent>(&Value::from(3)).unwrap_err();
        assert_eq!(err[0].field, "values");
    }
}
