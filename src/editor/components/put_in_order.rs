//! Put-in-order component: items the learner arranges

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;

use super::{child_ids, claim_child_ids, delete_children_except, finish, mismatch, parse_values, require_text};
use crate::db::unit_of_work::{with_conn, LastInsertId, UnitOfWork};
use crate::editor::component::{Component, ComponentType, OrderItem, PutInOrderComponent};
use crate::editor::error::{EditorResult, FieldError};
use crate::editor::registry::ComponentHandler;

const ITEMS_TABLE: &str = "put_in_order_elements";

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    text: String,
}

pub struct PutInOrderHandler;

impl PutInOrderHandler {
    async fn sync_items(&self, uow: &mut UnitOfWork, component_id: i64, items: &[OrderItem]) -> Result<()> {
        let existing = child_ids(uow, ITEMS_TABLE, component_id).await?;
        let submitted: Vec<Option<i64>> = items.iter().map(|i| i.id).collect();
        let claimed = claim_child_ids(&submitted, &existing);

        let mut keep = HashSet::new();
        for (position, (item, id)) in items.iter().zip(claimed).enumerate() {
            let order = position as i32 + 1;
            let id = match id {
                Some(id) => with_conn!(uow, |conn| {
                    sqlx::query("UPDATE put_in_order_elements SET text = ?, sort_order = ? WHERE id = ?")
                        .bind(&item.text)
                        .bind(order)
                        .bind(id)
                        .execute(&mut *conn)
                        .await
                        .map(|_| id)
                })
                .context("Failed to update order item")?,
                None => with_conn!(uow, |conn| {
                    sqlx::query("INSERT INTO put_in_order_elements (component_id, text, sort_order) VALUES (?, ?, ?)")
                        .bind(component_id)
                        .bind(&item.text)
                        .bind(order)
                        .execute(&mut *conn)
                        .await
                        .map(|r| r.last_id())
                })
                .context("Failed to create order item")?,
            };
            keep.insert(id);
        }

        delete_children_except(uow, ITEMS_TABLE, component_id, &existing, &keep).await?;
        Ok(())
    }
}

#[async_trait]
impl ComponentHandler for PutInOrderHandler {
    fn component_type(&self) -> ComponentType {
        ComponentType::PutInOrder
    }

    fn validate(&self, values: &Value) -> Result<Component, Vec<FieldError>> {
        let order: PutInOrderComponent = parse_values(values)?;
        let mut errors = Vec::new();
        if order.elements.len() < 2 {
            errors.push(FieldError::new("elements", "At least two elements are required"));
        }
        for (idx, item) in order.elements.iter().enumerate() {
            require_text(&mut errors, &format!("elements[{}].text", idx), &item.text);
        }
        finish(Component::PutInOrder(order), errors)
    }

    async fn create(&self, uow: &mut UnitOfWork, component: &Component) -> EditorResult<i64> {
        let Component::PutInOrder(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        let now = Utc::now();
        let id = with_conn!(uow, |conn| {
            sqlx::query("INSERT INTO put_in_order_components (title, created_at, updated_at) VALUES (?, ?, ?)")
                .bind(&c.title)
                .bind(now)
                .bind(now)
                .execute(&mut *conn)
                .await
                .map(|r| r.last_id())
        })
        .context("Failed to create put-in-order component")?;

        self.sync_items(uow, id, &c.elements).await?;
        Ok(id)
    }

    async fn update(&self, uow: &mut UnitOfWork, id: i64, component: &Component) -> EditorResult<()> {
        let Component::PutInOrder(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        let now = Utc::now();
        with_conn!(uow, |conn| {
            sqlx::query("UPDATE put_in_order_components SET title = ?, updated_at = ? WHERE id = ?")
                .bind(&c.title)
                .bind(now)
                .bind(id)
                .execute(&mut *conn)
                .await
                .map(|_| ())
        })
        .context("Failed to update put-in-order component")?;

        self.sync_items(uow, id, &c.elements).await?;
        Ok(())
    }

    async fn load(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Component>> {
        let title = with_conn!(uow, |conn| {
            sqlx::query_scalar::<_, String>("SELECT title FROM put_in_order_components WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
        })
        .context("Failed to load put-in-order component")?;
        let Some(title) = title else {
            return Ok(None);
        };

        let items = with_conn!(uow, |conn| {
            sqlx::query_as::<_, ItemRow>(
                "SELECT id, text FROM put_in_order_elements WHERE component_id = ? ORDER BY sort_order, id",
            )
            .bind(id)
            .fetch_all(&mut *conn)
            .await
        })
        .context("Failed to load order items")?;

        Ok(Some(Component::PutInOrder(PutInOrderComponent {
            title,
            elements: items
                .into_iter()
                .map(|r| OrderItem {
                    id: Some(r.id),
                    text: r.text,
                })
                .collect(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};
    use serde_json::json;

    #[tokio::test]
    async fn test_reordering_keeps_item_ids() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();

        let order = PutInOrderHandler
            .validate(&json!({"title": "Sort", "elements": [{"text": "a"}, {"text": "b"}]}))
            .unwrap();
        let id = PutInOrderHandler.create(&mut uow, &order).await.unwrap();
        let Some(Component::PutInOrder(loaded)) = PutInOrderHandler.load(&mut uow, id).await.unwrap() else {
            panic!("put-in-order not loaded");
        };
        let (a, b) = (loaded.elements[0].id.unwrap(), loaded.elements[1].id.unwrap());

        let swapped = PutInOrderHandler
            .validate(&json!({"title": "Sort", "elements": [{"id": b, "text": "b"}, {"id": a, "text": "a"}]}))
            .unwrap();
        PutInOrderHandler.update(&mut uow, id, &swapped).await.unwrap();

        let Some(Component::PutInOrder(loaded)) = PutInOrderHandler.load(&mut uow, id).await.unwrap() else {
            panic!("put-in-order not loaded");
        };
        let ids: Vec<i64> = loaded.elements.iter().filter_map(|e| e.id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn test_single_item_is_rejected() {
        let errors = PutInOrderHandler
            .validate(&json!({"elements": [{"text": "alone"}]}))
            .unwrap_err();
        assert_eq!(errors[0].field, "elements");
    }
}
