//! Text and blue card components

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::{finish, mismatch, parse_values, require_text};
use crate::db::unit_of_work::{with_conn, LastInsertId, UnitOfWork};
use crate::editor::component::{BlueCardComponent, Component, ComponentType, TextComponent};
use crate::editor::error::{EditorResult, FieldError};
use crate::editor::registry::ComponentHandler;

#[derive(sqlx::FromRow)]
struct TitledTextRow {
    title: String,
    text: String,
}

async fn insert_titled_text(uow: &mut UnitOfWork, table: &str, title: &str, text: &str) -> Result<i64> {
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO {} (title, text, created_at, updated_at) VALUES (?, ?, ?, ?)",
        table
    );
    with_conn!(uow, |conn| {
        sqlx::query(&sql)
            .bind(title)
            .bind(text)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map(|r| r.last_id())
    })
    .with_context(|| format!("Failed to insert into {}", table))
}

async fn update_titled_text(uow: &mut UnitOfWork, table: &str, id: i64, title: &str, text: &str) -> Result<()> {
    let now = Utc::now();
    let sql = format!("UPDATE {} SET title = ?, text = ?, updated_at = ? WHERE id = ?", table);
    with_conn!(uow, |conn| {
        sqlx::query(&sql)
            .bind(title)
            .bind(text)
            .bind(now)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    })
    .with_context(|| format!("Failed to update {}", table))
}

async fn load_titled_text(uow: &mut UnitOfWork, table: &str, id: i64) -> Result<Option<TitledTextRow>> {
    let sql = format!("SELECT title, text FROM {} WHERE id = ?", table);
    with_conn!(uow, |conn| {
        sqlx::query_as::<_, TitledTextRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    })
    .with_context(|| format!("Failed to load {} row", table))
}

/// Rich text block (`text-pro`)
pub struct TextHandler;

#[async_trait]
impl ComponentHandler for TextHandler {
    fn component_type(&self) -> ComponentType {
        ComponentType::Text
    }

    fn validate(&self, values: &Value) -> Result<Component, Vec<FieldError>> {
        let text: TextComponent = parse_values(values)?;
        let mut errors = Vec::new();
        require_text(&mut errors, "text", &text.text);
        finish(Component::Text(text), errors)
    }

    async fn create(&self, uow: &mut UnitOfWork, component: &Component) -> EditorResult<i64> {
        let Component::Text(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        Ok(insert_titled_text(uow, self.component_type().table(), &c.title, &c.text).await?)
    }

    async fn update(&self, uow: &mut UnitOfWork, id: i64, component: &Component) -> EditorResult<()> {
        let Component::Text(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        Ok(update_titled_text(uow, self.component_type().table(), id, &c.title, &c.text).await?)
    }

    async fn load(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Component>> {
        let row = load_titled_text(uow, self.component_type().table(), id).await?;
        Ok(row.map(|r| {
            Component::Text(TextComponent {
                title: r.title,
                text: r.text,
            })
        }))
    }
}

/// Highlighted note card
pub struct BlueCardHandler;

#[async_trait]
impl ComponentHandler for BlueCardHandler {
    fn component_type(&self) -> ComponentType {
        ComponentType::BlueCard
    }

    fn validate(&self, values: &Value) -> Result<Component, Vec<FieldError>> {
        let card: BlueCardComponent = parse_values(values)?;
        let mut errors = Vec::new();
        require_text(&mut errors, "text", &card.text);
        finish(Component::BlueCard(card), errors)
    }

    async fn create(&self, uow: &mut UnitOfWork, component: &Component) -> EditorResult<i64> {
        let Component::BlueCard(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        Ok(insert_titled_text(uow, self.component_type().table(), &c.title, &c.text).await?)
    }

    async fn update(&self, uow: &mut UnitOfWork, id: i64, component: &Component) -> EditorResult<()> {
        let Component::BlueCard(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        Ok(update_titled_text(uow, self.component_type().table(), id, &c.title, &c.text).await?)
    }

    async fn load(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Component>> {
        let row = load_titled_text(uow, self.component_type().table(), id).await?;
        Ok(row.map(|r| {
            Component::BlueCard(BlueCardComponent {
                title: r.title,
                text: r.text,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};
    use serde_json::json;

    #[test]
    fn test_text_requires_body() {
        let errors = TextHandler.validate(&json!({"title": "only a title"})).unwrap_err();
        assert_eq!(errors, vec![FieldError::new("text", "This field may not be blank")]);
    }

    #[test]
    fn test_wrong_field_type_is_reported() {
        let errors = TextHandler.validate(&json!({"text": 12})).unwrap_err();
        assert_eq!(errors[0].field, "values");
    }

    #[tokio::test]
    async fn test_text_create_update_load_delete() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();

        let component = TextHandler.validate(&json!({"title": "A", "text": "hi"})).unwrap();
        let id = TextHandler.create(&mut uow, &component).await.unwrap();
        assert!(TextHandler.exists(&mut uow, id).await.unwrap());

        let changed = TextHandler.validate(&json!({"title": "B", "text": "bye"})).unwrap();
        TextHandler.update(&mut uow, id, &changed).await.unwrap();
        assert_eq!(TextHandler.load(&mut uow, id).await.unwrap(), Some(changed));

        TextHandler.delete(&mut uow, id).await.unwrap();
        assert!(!TextHandler.exists(&mut uow, id).await.unwrap());
        assert!(TextHandler.load(&mut uow, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_handler_rejects_foreign_variant() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();

        let card = BlueCardHandler.validate(&json!({"text": "note"})).unwrap();
        assert!(TextHandler.create(&mut uow, &card).await.is_err());
        assert!(BlueCardHandler.create(&mut uow, &card).await.unwrap() > 0);
    }
}
