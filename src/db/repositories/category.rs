//! Category repository

use anyhow::{Context, Result};
use chrono::Utc;

use crate::db::unit_of_work::{with_conn, LastInsertId, UnitOfWork};
use crate::models::Category;

const CATEGORY_COLUMNS: &str = "id, title, term, description, created_at, updated_at";

pub async fn create(uow: &mut UnitOfWork, title: &str, description: &str) -> Result<Category> {
    let now = Utc::now();
    let id = with_conn!(uow, |conn| {
        sqlx::query("INSERT INTO categories (title, description, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(title)
            .bind(description)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map(|r| r.last_id())
    })
    .context("Failed to create category")?;

    get_by_id(uow, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Category not found after insert"))
}

pub async fn get_by_id(uow: &mut UnitOfWork, id: i64) -> Result<Option<Category>> {
    let sql = format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS);
    with_conn!(uow, |conn| {
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    })
    .context("Failed to get category")
}
