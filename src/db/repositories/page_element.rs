//! Page element repository
//!
//! Rows binding a component to a page slot. Order values are unique per
//! page, so callers re-ordering a page first call [`park_orders`].

use anyhow::{Context, Result};
use chrono::Utc;

use crate::db::unit_of_work::{with_conn, LastInsertId, UnitOfWork};
use crate::models::{ElementSlot, PageElement};

const ELEMENT_COLUMNS: &str =
    "id, page_id, sort_order, component_type, component_id, owns_component, created_at, updated_at";

pub async fn list_for_page(uow: &mut UnitOfWork, page_id: i64) -> Result<Vec<PageElement>> {
    let sql = format!(
        "SELECT {} FROM page_elements WHERE page_id = ? ORDER BY sort_order, id",
        ELEMENT_COLUMNS
    );
    with_conn!(uow, |conn| {
        sqlx::query_as::<_, PageElement>(&sql)
            .bind(page_id)
            .fetch_all(&mut *conn)
            .await
    })
    .context("Failed to list page elements")
}

/// Move every order of the page out of the positive range.
pub async fn park_orders(uow: &mut UnitOfWork, page_id: i64) -> Result<()> {
    with_conn!(uow, |conn| {
        sqlx::query("UPDATE page_elements SET sort_order = -sort_order WHERE page_id = ? AND sort_order > 0")
            .bind(page_id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    })
    .context("Failed to park page element orders")
}

pub async fn insert(uow: &mut UnitOfWork, page_id: i64, slot: &ElementSlot) -> Result<i64> {
    let now = Utc::now();
    with_conn!(uow, |conn| {
        sqlx::query(
            "INSERT INTO page_elements (page_id, sort_order, component_type, component_id, owns_component, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(page_id)
        .bind(slot.order)
        .bind(&slot.component_type)
        .bind(slot.component_id)
        .bind(slot.owns_component)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map(|r| r.last_id())
    })
    .context("Failed to create page element")
}

pub async fn update(uow: &mut UnitOfWork, id: i64, slot: &ElementSlot) -> Result<()> {
    let now = Utc::now();
    with_conn!(uow, |conn| {
        sqlx::query(
            "UPDATE page_elements SET sort_order = ?, component_type = ?, component_id = ?, owns_component = ?, updated_at = ? WHERE id = ?",
        )
        .bind(slot.order)
        .bind(&slot.component_type)
        .bind(slot.component_id)
        .bind(slot.owns_component)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map(|_| ())
    })
    .context("Failed to update page element")
}

pub async fn delete(uow: &mut UnitOfWork, id: i64) -> Result<()> {
    with_conn!(uow, |conn| {
        sqlx::query("DELETE FROM page_elements WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    })
    .context("Failed to delete page element")
}

/// Number of elements, on any page, that point at the given component
pub async fn count_references(
    uow: &mut UnitOfWork,
    component_type: &str,
    component_id: i64,
) -> Result<i64> {
    with_conn!(uow, |conn| {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM page_elements WHERE component_type = ? AND component_id = ?",
        )
        .bind(component_type)
        .bind(component_id)
        .fetch_one(&mut *conn)
        .await
    })
    .context("Failed to count component references")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::page;
    use crate::db::{create_test_pool, migrations::run_migrations};

    fn slot(order: i32, component_id: i64) -> ElementSlot {
        ElementSlot {
            order,
            component_type: "text-pro".to_string(),
            component_id,
            owns_component: true,
        }
    }

    #[tokio::test]
    async fn test_reorder_after_parking() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let page = page::create(&mut uow, "p").await.unwrap();

        let a = insert(&mut uow, page.id, &slot(1, 10)).await.unwrap();
        let b = insert(&mut uow, page.id, &slot(2, 11)).await.unwrap();

        // Swapping orders in place would hit the unique constraint
        assert!(update(&mut uow, a, &slot(2, 10)).await.is_err());

        park_orders(&mut uow, page.id).await.unwrap();
        update(&mut uow, a, &slot(2, 10)).await.unwrap();
        update(&mut uow, b, &slot(1, 11)).await.unwrap();

        let elements = list_for_page(&mut uow, page.id).await.unwrap();
        let ids: Vec<i64> = elements.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![b, a]);
        assert_eq!(count_references(&mut uow, "text-pro", 10).await.unwrap(), 1);

        delete(&mut uow, a).await.unwrap();
        assert_eq!(count_references(&mut uow, "text-pro", 10).await.unwrap(), 0);
    }
}
