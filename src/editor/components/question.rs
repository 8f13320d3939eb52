//! Question component: a prompt with ordered answers

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;

use super::{child_ids, claim_child_ids, delete_children_except, finish, mismatch, parse_values, require_text};
use crate::db::unit_of_work::{with_conn, LastInsertId, UnitOfWork};
use crate::editor::component::{Answer, Component, ComponentType, QuestionComponent};
use crate::editor::error::{EditorResult, FieldError};
use crate::editor::registry::ComponentHandler;

const ANSWERS_TABLE: &str = "question_answers";

#[derive(sqlx::FromRow)]
struct AnswerRow {
    id: i64,
    text: String,
    is_correct: bool,
}

pub struct QuestionHandler;

impl QuestionHandler {
    async fn sync_answers(&self, uow: &mut UnitOfWork, component_id: i64, answers: &[Answer]) -> Result<()> {
        let existing = child_ids(uow, ANSWERS_TABLE, component_id).await?;
        let submitted: Vec<Option<i64>> = answers.iter().map(|a| a.id).collect();
        let claimed = claim_child_ids(&submitted, &existing);

        let mut keep = HashSet::new();
        for (position, (answer, id)) in answers.iter().zip(claimed).enumerate() {
            let order = position as i32 + 1;
            match id {
                Some(id) => {
                    with_conn!(uow, |conn| {
                        sqlx::query("UPDATE question_answers SET text = ?, is_correct = ?, sort_order = ? WHERE id = ?")
                            .bind(&answer.text)
                            .bind(answer.is_correct)
                            .bind(order)
                            .bind(id)
                            .execute(&mut *conn)
                            .await
                            .map(|_| ())
                    })
                    .context("Failed to update answer")?;
                    keep.insert(id);
                }
                None => {
                    let id = with_conn!(uow, |conn| {
                        sqlx::query(
                            "INSERT INTO question_answers (component_id, text, is_correct, sort_order) VALUES (?, ?, ?, ?)",
                        )
                        .bind(component_id)
                        .bind(&answer.text)
                        .bind(answer.is_correct)
                        .bind(order)
                        .execute(&mut *conn)
                        .await
                        .map(|r| r.last_id())
                    })
                    .context("Failed to create answer")?;
                    keep.insert(id);
                }
            }
        }

        delete_children_except(uow, ANSWERS_TABLE, component_id, &existing, &keep).await?;
        Ok(())
    }
}

#[async_trait]
impl ComponentHandler for QuestionHandler {
    fn component_type(&self) -> ComponentType {
        ComponentType::Question
    }

    fn validate(&self, values: &Value) -> Result<Component, Vec<FieldError>> {
        let question: QuestionComponent = parse_values(values)?;
        let mut errors = Vec::new();
        require_text(&mut errors, "text", &question.text);

        if question.answers.is_empty() {
            errors.push(FieldError::new("answers", "At least one answer is required"));
        } else if !question.answers.iter().any(|a| a.is_correct) {
            errors.push(FieldError::new("answers", "At least one answer must be correct"));
        }
        for (idx, answer) in question.answers.iter().enumerate() {
            require_text(&mut errors, &format!("answers[{}].text", idx), &answer.text);
        }

        finish(Component::Question(question), errors)
    }

    async fn create(&self, uow: &mut UnitOfWork, component: &Component) -> EditorResult<i64> {
        let Component::Question(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        let now = Utc::now();
        let id = with_conn!(uow, |conn| {
            sqlx::query("INSERT INTO question_components (text, created_at, updated_at) VALUES (?, ?, ?)")
                .bind(&c.text)
                .bind(now)
                .bind(now)
                .execute(&mut *conn)
                .await
                .map(|r| r.last_id())
        })
        .context("Failed to create question component")?;

        self.sync_answers(uow, id, &c.answers).await?;
        Ok(id)
    }

    async fn update(&self, uow: &mut UnitOfWork, id: i64, component: &Component) -> EditorResult<()> {
        let Component::Question(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        let now = Utc::now();
        with_conn!(uow, |conn| {
            sqlx::query("UPDATE question_components SET text = ?, updated_at = ? WHERE id = ?")
                .bind(&c.text)
                .bind(now)
                .bind(id)
                .execute(&mut *conn)
                .await
                .map(|_| ())
        })
        .context("Failed to update question component")?;

        self.sync_answers(uow, id, &c.answers).await?;
        Ok(())
    }

    async fn load(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Component>> {
        let text = with_conn!(uow, |conn| {
            sqlx::query_scalar::<_, String>("SELECT text FROM question_components WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
        })
        .context("Failed to load question component")?;
        let Some(text) = text else {
            return Ok(None);
        };

        let rows = with_conn!(uow, |conn| {
            sqlx::query_as::<_, AnswerRow>(
                "SELECT id, text, is_correct FROM question_answers WHERE component_id = ? ORDER BY sort_order, id",
            )
            .bind(id)
            .fetch_all(&mut *conn)
            .await
        })
        .context("Failed to load answers")?;

        Ok(Some(Component::Question(QuestionComponent {
            text,
            answers: rows
                .into_iter()
                .map(|r| Answer {
                    id: Some(r.id),
                    text: r.text,
                    is_correct: r.is_correct,
                })
                .collect(),
        })))
    }
}
