//! Attachment repository

use anyhow::{Context, Result};
use chrono::Utc;

use crate::db::unit_of_work::{with_conn, LastInsertId, UnitOfWork};
use crate::models::{Attachment, NewAttachment};

const ATTACHMENT_COLUMNS: &str = "id, name, extension, alt, url, size, file_type, file, storage_engine, \
    attachment_type, content_type, object_id, created_at, updated_at";

pub async fn create(uow: &mut UnitOfWork, attachment: &NewAttachment) -> Result<Attachment> {
    let now = Utc::now();
    let id = with_conn!(uow, |conn| {
        sqlx::query(
            "INSERT INTO attachments (name, extension, alt, url, size, file_type, file, storage_engine, \
             attachment_type, content_type, object_id, created_at, updated_at) \
             VALUES (?, ?, '', ?, ?, ?, ?, ?, 'file', ?, ?, ?, ?)",
        )
        .bind(&attachment.name)
        .bind(&attachment.extension)
        .bind(&attachment.url)
        .bind(attachment.size)
        .bind(&attachment.file_type)
        .bind(&attachment.file)
        .bind(&attachment.storage_engine)
        .bind(&attachment.content_type)
        .bind(attachment.object_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map(|r| r.last_id())
    })
    .context("Failed to create attachment")?;

    get_by_id(uow, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Attachment not found after insert"))
}

pub async fn get_by_id(uow: &mut UnitOfWork, id: i64) -> Result<Option<Attachment>> {
    let sql = format!("SELECT {} FROM attachments WHERE id = ?", ATTACHMENT_COLUMNS);
    with_conn!(uow, |conn| {
        sqlx::query_as::<_, Attachment>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    })
    .context("Failed to get attachment")
}

pub async fn list_for_owner(
    uow: &mut UnitOfWork,
    content_type: &str,
    object_id: i64,
) -> Result<Vec<Attachment>> {
    let sql = format!(
        "SELECT {} FROM attachments WHERE content_type = ? AND object_id = ? ORDER BY id",
        ATTACHMENT_COLUMNS
    );
    with_conn!(uow, |conn| {
        sqlx::query_as::<_, Attachment>(&sql)
            .bind(content_type)
            .bind(object_id)
            .fetch_all(&mut *conn)
            .await
    })
    .context("Failed to list attachments")
}

pub async fn delete(uow: &mut UnitOfWork, id: i64) -> Result<()> {
    with_conn!(uow, |conn| {
        sqlx::query("DELETE FROM attachments WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    })
    .context("Failed to delete attachment")
}
