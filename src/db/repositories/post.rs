//! Post repository
//!
//! Editor sessions and their `lesson-page-public` mirrors share the `posts`
//! table and differ by `post_type`.

use anyhow::{Context, Result};
use chrono::Utc;

use crate::db::unit_of_work::{with_conn, LastInsertId, UnitOfWork};
use crate::models::{NewPost, Post, PublicationStatus};

const POST_COLUMNS: &str = "id, title, slug, meta_title, author_id, category_id, content, \
    publication_status, post_type, content_type, object_id, created_at, updated_at";

pub async fn create(uow: &mut UnitOfWork, post: &NewPost) -> Result<Post> {
    let now = Utc::now();
    let id = with_conn!(uow, |conn| {
        sqlx::query(
            "INSERT INTO posts (title, slug, meta_title, author_id, category_id, content, publication_status, \
             post_type, content_type, object_id, created_at, updated_at) \
             VALUES (?, '', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&post.title)
        .bind(&post.title)
        .bind(post.author_id)
        .bind(post.category_id)
        .bind(&post.content)
        .bind(post.status.as_i32())
        .bind(&post.post_type)
        .bind(&post.content_type)
        .bind(post.object_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map(|r| r.last_id())
    })
    .context("Failed to create post")?;

    get_by_id(uow, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after insert"))
}

pub async fn get_by_id(uow: &mut UnitOfWork, id: i64) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    with_conn!(uow, |conn| {
        sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    })
    .context("Failed to get post")
}

/// Find the post of the given type that targets `(content_type, object_id)`
pub async fn find_by_target(
    uow: &mut UnitOfWork,
    post_type: &str,
    content_type: &str,
    object_id: i64,
) -> Result<Option<Post>> {
    let sql = format!(
        "SELECT {} FROM posts WHERE post_type = ? AND content_type = ? AND object_id = ? ORDER BY id LIMIT 1",
        POST_COLUMNS
    );
    with_conn!(uow, |conn| {
        sqlx::query_as::<_, Post>(&sql)
            .bind(post_type)
            .bind(content_type)
            .bind(object_id)
            .fetch_optional(&mut *conn)
            .await
    })
    .context("Failed to find post by target")
}

pub async fn update_content(uow: &mut UnitOfWork, id: i64, content: &str) -> Result<()> {
    let now = Utc::now();
    with_conn!(uow, |conn| {
        sqlx::query("UPDATE posts SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(now)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    })
    .context("Failed to update post content")
}

pub async fn update_status(uow: &mut UnitOfWork, id: i64, status: PublicationStatus) -> Result<()> {
    let now = Utc::now();
    with_conn!(uow, |conn| {
        sqlx::query("UPDATE posts SET publication_status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_i32())
            .bind(now)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    })
    .context("Failed to update post status")
}

/// Overwrite the publishable fields of a post with those of `source`
pub async fn update_published_fields(
    uow: &mut UnitOfWork,
    id: i64,
    source: &NewPost,
) -> Result<()> {
    let now = Utc::now();
    with_conn!(uow, |conn| {
        sqlx::query(
            "UPDATE posts SET title = ?, meta_title = ?, author_id = ?, category_id = ?, content = ?, \
             publication_status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&source.title)
        .bind(&source.title)
        .bind(source.author_id)
        .bind(source.category_id)
        .bind(&source.content)
        .bind(source.status.as_i32())
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map(|_| ())
    })
    .context("Failed to update post")
}

pub async fn delete(uow: &mut UnitOfWork, id: i64) -> Result<()> {
    with_conn!(uow, |conn| {
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    })
    .context("Failed to delete post")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{page, user};
    use crate::db::{create_test_pool, migrations::run_migrations};
    use crate::models::{EDITOR_POST_TYPE, PAGE_CONTENT_TYPE, PUBLIC_POST_TYPE};

    #[tokio::test]
    async fn test_create_find_and_update() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let author = user::create(&mut uow, "author", "a@example.com").await.unwrap();
        let page = page::create(&mut uow, "p").await.unwrap();

        let new_post = NewPost {
            title: "Draft".to_string(),
            author_id: author.id,
            category_id: None,
            content: "{}".to_string(),
            status: PublicationStatus::Draft,
            post_type: EDITOR_POST_TYPE.to_string(),
            content_type: Some(PAGE_CONTENT_TYPE.to_string()),
            object_id: Some(page.id),
        };
        let post = create(&mut uow, &new_post).await.unwrap();
        assert_eq!(post.target_page_id(), Some(page.id));
        assert!(!post.is_published());

        assert!(find_by_target(&mut uow, PUBLIC_POST_TYPE, PAGE_CONTENT_TYPE, page.id)
            .await
            .unwrap()
            .is_none());
        let found = find_by_target(&mut uow, EDITOR_POST_TYPE, PAGE_CONTENT_TYPE, page.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, post.id);

        update_content(&mut uow, post.id, r#"{"blocks":[]}"#).await.unwrap();
        update_status(&mut uow, post.id, PublicationStatus::Publish).await.unwrap();
        let post = get_by_id(&mut uow, post.id).await.unwrap().unwrap();
        assert_eq!(post.content, r#"{"blocks":[]}"#);
        assert!(post.is_published());

        delete(&mut uow, post.id).await.unwrap();
        assert!(get_by_id(&mut uow, post.id).await.unwrap().is_none());
    }
}
