//! Fill-in-the-blank component: ordered lines with one gap each

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;

use super::{child_ids, claim_child_ids, delete_children_except, finish, mismatch, parse_values, require_text};
use crate::db::unit_of_work::{with_conn, LastInsertId, UnitOfWork};
use crate::editor::component::{Component, ComponentType, FillTextComponent, FillTextLine};
use crate::editor::error::{EditorResult, FieldError};
use crate::editor::registry::ComponentHandler;

const LINES_TABLE: &str = "fill_text_lines";

#[derive(sqlx::FromRow)]
struct HeaderRow {
    title: String,
    put_words: bool,
}

#[derive(sqlx::FromRow)]
struct LineRow {
    id: i64,
    text_before: String,
    answer: String,
    text_after: String,
}

pub struct FillTextHandler;

impl FillTextHandler {
    async fn sync_lines(&self, uow: &mut UnitOfWork, component_id: i64, lines: &[FillTextLine]) -> Result<()> {
        let existing = child_ids(uow, LINES_TABLE, component_id).await?;
        let submitted: Vec<Option<i64>> = lines.iter().map(|l| l.id).collect();
        let claimed = claim_child_ids(&submitted, &existing);

        let mut keep = HashSet::new();
        for (position, (line, id)) in lines.iter().zip(claimed).enumerate() {
            let order = position as i32 + 1;
            let id = match id {
                Some(id) => {
                    with_conn!(uow, |conn| {
                        sqlx::query(
                            "UPDATE fill_text_lines SET text_before = ?, answer = ?, text_after = ?, sort_order = ? WHERE id = ?",
                        )
                        .bind(&line.text_before)
                        .bind(&line.answer)
                        .bind(&line.text_after)
                        .bind(order)
                        .bind(id)
                        .execute(&mut *conn)
                        .await
                        .map(|_| id)
                    })
                    .context("Failed to update fill-text line")?
                }
                None => with_conn!(uow, |conn| {
                    sqlx::query(
                        "INSERT INTO fill_text_lines (component_id, text_before, answer, text_after, sort_order) VALUES (?, ?, ?, ?, ?)",
                    )
                    .bind(component_id)
                    .bind(&line.text_before)
                    .bind(&line.answer)
                    .bind(&line.text_after)
                    .bind(order)
                    .execute(&mut *conn)
                    .await
                    .map(|r| r.last_id())
                })
                .context("Failed to create fill-text line")?,
            };
            keep.insert(id);
        }

        delete_children_except(uow, LINES_TABLE, component_id, &existing, &keep).await?;
        Ok(())
    }
}

#[async_trait]
impl ComponentHandler for FillTextHandler {
    fn component_type(&self) -> ComponentType {
        ComponentType::FillText
    }

    fn validate(&self, values: &Value) -> Result<Component, Vec<FieldError>> {
        let fill: FillTextComponent = parse_values(values)?;
        let mut errors = Vec::new();
        if fill.lines.is_empty() {
            errors.push(FieldError::new("lines", "At least one line is required"));
        }
        for (idx, line) in fill.lines.iter().enumerate() {
            require_text(&mut errors, &format!("lines[{}].answer", idx), &line.answer);
        }
        finish(Component::FillText(fill), errors)
    }

    async fn create(&self, uow: &mut UnitOfWork, component: &Component) -> EditorResult<i64> {
        let Component::FillText(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        let now = Utc::now();
        let id = with_conn!(uow, |conn| {
            sqlx::query(
                "INSERT INTO fill_text_components (title, put_words, created_at, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&c.title)
            .bind(c.put_words)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map(|r| r.last_id())
        })
        .context("Failed to create fill-text component")?;

        self.sync_lines(uow, id, &c.lines).await?;
        Ok(id)
    }

    async fn update(&self, uow: &mut UnitOfWork, id: i64, component: &Component) -> EditorResult<()> {
        let Component::FillText(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        let now = Utc::now();
        with_conn!(uow, |conn| {
            sqlx::query("UPDATE fill_text_components SET title = ?, put_words = ?, updated_at = ? WHERE id = ?")
                .bind(&c.title)
                .bind(c.put_words)
                .bind(now)
                .bind(id)
                .execute(&mut *conn)
                .await
                .map(|_| ())
        })
        .context("Failed to update fill-text component")?;

        self.sync_lines(uow, id, &c.lines).await?;
        Ok(())
    }

    async fn load(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Component>> {
        let header = with_conn!(uow, |conn| {
            sqlx::query_as::<_, HeaderRow>("SELECT title, put_words FROM fill_text_components WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
        })
        .context("Failed to load fill-text component")?;
        let Some(header) = header else {
            return Ok(None);
        };

        let lines = with_conn!(uow, |conn| {
            sqlx::query_as::<_, LineRow>(
                "SELECT id, text_before, answer, text_after FROM fill_text_lines WHERE component_id = ? ORDER BY sort_order, id",
            )
            .bind(id)
            .fetch_all(&mut *conn)
            .await
        })
        .context("Failed to load fill-text lines")?;

        Ok(Some(Component::FillText(FillTextComponent {
            title: header.title,
            put_words: header.put_words,
            lines: lines
                .into_iter()
                .map(|r| FillTextLine {
                    id: Some(r.id),
                    text_before: r.text_before,
                    answer: r.answer,
                    text_after: r.text_after,
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

    #[test]
    fn test_lines_need_answers() {
        let errors = FillTextHandler
            .validate(&json!({"title": "Verbs", "lines": [{"text_before": "I", "answer": " "}]}))
            .unwrap_err();
        assert_eq!(errors, vec![FieldError::new("lines[0].answer", "This field may not be blank")]);

        let errors = FillTextHandler.validate(&json!({"title": "Empty"})).unwrap_err();
        assert_eq!(errors[0].field, "lines");
    }

    #[tokio::test]
    async fn test_lines_are_loaded_in_submitted_order() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();

        let fill = FillTextHandler
            .validate(&json!({
                "title": "Verbs",
                "put_words": true,
                "lines": [
                    {"text_before": "I", "answer": "am", "text_after": "here"},
                    {"text_before": "You", "answer": "are", "text_after": "there"}
                ]
            }))
            .unwrap();
        let id = FillTextHandler.create(&mut uow, &fill).await.unwrap();

        let Some(Component::FillText(loaded)) = FillTextHandler.load(&mut uow, id).await.unwrap() else {
            panic!("fill-text not loaded");
        };
        assert!(loaded.put_words);
        let answers: Vec<&str> = loaded.lines.iter().map(|l| l.answer.as_str()).collect();
        assert_eq!(answers, vec!["am", "are"]);
        assert!(loaded.lines.iter().all(|l| l.id.is_some()));
    }
}
