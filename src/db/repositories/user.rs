//! User repository

use anyhow::{Context, Result};
use chrono::Utc;

use crate::db::unit_of_work::{with_conn, LastInsertId, UnitOfWork};
use crate::models::User;

pub async fn create(uow: &mut UnitOfWork, username: &str, email: &str) -> Result<User> {
    let now = Utc::now();
    let id = with_conn!(uow, |conn| {
        sqlx::query("INSERT INTO users (username, email, created_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(email)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map(|r| r.last_id())
    })
    .context("Failed to create user")?;

    get_by_id(uow, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after insert"))
}

pub async fn get_by_id(uow: &mut UnitOfWork, id: i64) -> Result<Option<User>> {
    with_conn!(uow, |conn| {
        sqlx::query_as::<_, User>("SELECT id, username, email, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    })
    .context("Failed to get user")
}
