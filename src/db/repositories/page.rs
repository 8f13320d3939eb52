//! Page repository

use anyhow::{Context, Result};
use chrono::Utc;

use crate::db::unit_of_work::{with_conn, LastInsertId, UnitOfWork};
use crate::models::Page;

const PAGE_COLUMNS: &str = "id, title, sort_order, created_at, updated_at";

pub async fn create(uow: &mut UnitOfWork, title: &str) -> Result<Page> {
    let now = Utc::now();
    let id = with_conn!(uow, |conn| {
        sqlx::query("INSERT INTO pages (title, sort_order, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(title)
            .bind(0_i32)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map(|r| r.last_id())
    })
    .context("Failed to create page")?;

    get_by_id(uow, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Page not found after insert"))
}

pub async fn get_by_id(uow: &mut UnitOfWork, id: i64) -> Result<Option<Page>> {
    let sql = format!("SELECT {} FROM pages WHERE id = ?", PAGE_COLUMNS);
    with_conn!(uow, |conn| {
        sqlx::query_as::<_, Page>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    })
    .context("Failed to get page")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};

    #[tokio::test]
    async fn test_create_and_get_page() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();

        let page = create(&mut uow, "Lesson 1").await.unwrap();
        assert!(page.id > 0);
        assert_eq!(page.title, "Lesson 1");

        let found = get_by_id(&mut uow, page.id).await.unwrap().unwrap();
        assert_eq!(found, page);
        assert!(get_by_id(&mut uow, page.id + 1).await.unwrap().is_none());
    }
}
