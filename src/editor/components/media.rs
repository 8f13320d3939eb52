//! Audio, image, video and record-audio components
//!
//! Audio and image rows point at a file owned by a post attachment. The
//! attachment decides the file's lifetime, so replacing or deleting one of
//! these rows never touches storage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::{delete_row, finish, mismatch, parse_values, require_text};
use crate::db::unit_of_work::{with_conn, LastInsertId, UnitOfWork};
use crate::editor::component::{
    AudioComponent, Component, ComponentType, ImageComponent, RecordAudioComponent, VideoComponent,
};
use crate::editor::error::{EditorResult, FieldError};
use crate::editor::registry::ComponentHandler;

/// Two text columns plus an optional stored file
struct FileRowSpec {
    table: &'static str,
    label: &'static str,
    file: &'static str,
}

const AUDIO_ROW: FileRowSpec = FileRowSpec {
    table: "audio_components",
    label: "title",
    file: "audio",
};

const IMAGE_ROW: FileRowSpec = FileRowSpec {
    table: "image_components",
    label: "description",
    file: "image",
};

#[derive(sqlx::FromRow)]
struct FileRow {
    label: String,
    file: Option<String>,
}

impl FileRowSpec {
    async fn insert(&self, uow: &mut UnitOfWork, label: &str, file: Option<&str>) -> Result<i64> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO {} ({}, {}, created_at, updated_at) VALUES (?, ?, ?, ?)",
            self.table, self.label, self.file
        );
        with_conn!(uow, |conn| {
            sqlx::query(&sql)
                .bind(label)
                .bind(file)
                .bind(now)
                .bind(now)
                .execute(&mut *conn)
                .await
                .map(|r| r.last_id())
        })
        .with_context(|| format!("Failed to insert into {}", self.table))
    }

    async fn load(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<FileRow>> {
        let sql = format!(
            "SELECT {} AS label, {} AS file FROM {} WHERE id = ?",
            self.label, self.file, self.table
        );
        with_conn!(uow, |conn| {
            sqlx::query_as::<_, FileRow>(&sql)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
        })
        .with_context(|| format!("Failed to load {} row", self.table))
    }

    async fn update(&self, uow: &mut UnitOfWork, id: i64, label: &str, file: Option<&str>) -> Result<()> {
        let now = Utc::now();
        let sql = format!(
            "UPDATE {} SET {} = ?, {} = ?, updated_at = ? WHERE id = ?",
            self.table, self.label, self.file
        );
        with_conn!(uow, |conn| {
            sqlx::query(&sql)
                .bind(label)
                .bind(file)
                .bind(now)
                .bind(id)
                .execute(&mut *conn)
                .await
                .map(|_| ())
        })
        .with_context(|| format!("Failed to update {}", self.table))
    }

    async fn delete(&self, uow: &mut UnitOfWork, id: i64) -> Result<()> {
        delete_row(uow, self.table, id).await
    }

    async fn count_file_uses(&self, uow: &mut UnitOfWork, key: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?", self.table, self.file);
        with_conn!(uow, |conn| {
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(key)
                .fetch_one(&mut *conn)
                .await
        })
        .with_context(|| format!("Failed to count file uses in {}", self.table))
    }
}

/// Whether any audio or image component points at the stored file `key`
pub async fn file_in_use(uow: &mut UnitOfWork, key: &str) -> Result<bool> {
    for row in [&AUDIO_ROW, &IMAGE_ROW] {
        if row.count_file_uses(uow, key).await? > 0 {
            return Ok(true);
        }
    }
    Ok(false)
}

pub struct AudioHandler;

#[async_trait]
impl ComponentHandler for AudioHandler {
    fn component_type(&self) -> ComponentType {
        ComponentType::Audio
    }

    fn validate(&self, values: &Value) -> Result<Component, Vec<FieldError>> {
        let audio: AudioComponent = parse_values(values)?;
        let mut errors = Vec::new();
        require_text(&mut errors, "audio", audio.audio.as_deref().unwrap_or_default());
        finish(Component::Audio(audio), errors)
    }

    async fn create(&self, uow: &mut UnitOfWork, component: &Component) -> EditorResult<i64> {
        let Component::Audio(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        Ok(AUDIO_ROW.insert(uow, &c.title, c.audio.as_deref()).await?)
    }

    async fn update(&self, uow: &mut UnitOfWork, id: i64, component: &Component) -> EditorResult<()> {
        let Component::Audio(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        Ok(AUDIO_ROW.update(uow, id, &c.title, c.audio.as_deref()).await?)
    }

    async fn load(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Component>> {
        Ok(AUDIO_ROW.load(uow, id).await?.map(|r| {
            Component::Audio(AudioComponent {
                title: r.label,
                audio: r.file,
            })
        }))
    }

    async fn delete(&self, uow: &mut UnitOfWork, id: i64) -> Result<()> {
        AUDIO_ROW.delete(uow, id).await
    }
}

pub struct ImageHandler;

#[async_trait]
impl ComponentHandler for ImageHandler {
    fn component_type(&self) -> ComponentType {
        ComponentType::Image
    }

    fn validate(&self, values: &Value) -> Result<Component, Vec<FieldError>> {
        let image: ImageComponent = parse_values(values)?;
        let mut errors = Vec::new();
        require_text(&mut errors, "image", image.image.as_deref().unwrap_or_default());
        finish(Component::Image(image), errors)
    }

    async fn create(&self, uow: &mut UnitOfWork, component: &Component) -> EditorResult<i64> {
        let Component::Image(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        Ok(IMAGE_ROW.insert(uow, &c.description, c.image.as_deref()).await?)
    }

    async fn update(&self, uow: &mut UnitOfWork, id: i64, component: &Component) -> EditorResult<()> {
        let Component::Image(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        Ok(IMAGE_ROW.update(uow, id, &c.description, c.image.as_deref()).await?)
    }

    async fn load(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Component>> {
        Ok(IMAGE_ROW.load(uow, id).await?.map(|r| {
            Component::Image(ImageComponent {
                description: r.label,
                image: r.file,
            })
        }))
    }

    async fn delete(&self, uow: &mut UnitOfWork, id: i64) -> Result<()> {
        IMAGE_ROW.delete(uow, id).await
    }
}

#[derive(sqlx::FromRow)]
struct VideoRow {
    description: String,
    video_url: String,
}

/// Embedded video, referenced by URL
pub struct VideoHandler;

#[async_trait]
impl ComponentHandler for VideoHandler {
    fn component_type(&self) -> ComponentType {
        ComponentType::Video
    }

    fn validate(&self, values: &Value) -> Result<Component, Vec<FieldError>> {
        let video: VideoComponent = parse_values(values)?;
        let mut errors = Vec::new();
        let url = video.video_url.trim();
        if url.is_empty() {
            errors.push(FieldError::new("video_url", "This field may not be blank"));
        } else if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(FieldError::new("video_url", "Enter a valid URL"));
        }
        finish(Component::Video(video), errors)
    }

    async fn create(&self, uow: &mut UnitOfWork, component: &Component) -> EditorResult<i64> {
        let Component::Video(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        let now = Utc::now();
        let id = with_conn!(uow, |conn| {
            sqlx::query(
                "INSERT INTO video_components (description, video_url, created_at, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&c.description)
            .bind(&c.video_url)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map(|r| r.last_id())
        })
        .context("Failed to create video component")?;
        Ok(id)
    }

    async fn update(&self, uow: &mut UnitOfWork, id: i64, component: &Component) -> EditorResult<()> {
        let Component::Video(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        let now = Utc::now();
        with_conn!(uow, |conn| {
            sqlx::query("UPDATE video_components SET description = ?, video_url = ?, updated_at = ? WHERE id = ?")
                .bind(&c.description)
                .bind(&c.video_url)
                .bind(now)
                .bind(id)
                .execute(&mut *conn)
                .await
                .map(|_| ())
        })
        .context("Failed to update video component")?;
        Ok(())
    }

    async fn load(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Component>> {
        let row = with_conn!(uow, |conn| {
            sqlx::query_as::<_, VideoRow>("SELECT description, video_url FROM video_components WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
        })
        .context("Failed to load video component")?;
        Ok(row.map(|r| {
            Component::Video(VideoComponent {
                description: r.description,
                video_url: r.video_url,
            })
        }))
    }
}

#[derive(sqlx::FromRow)]
struct RecordAudioRow {
    title: String,
    description: String,
}

/// Prompt asking the learner to record an answer
pub struct RecordAudioHandler;

#[async_trait]
impl ComponentHandler for RecordAudioHandler {
    fn component_type(&self) -> ComponentType {
        ComponentType::RecordAudio
    }

    fn validate(&self, values: &Value) -> Result<Component, Vec<FieldError>> {
        let record: RecordAudioComponent = parse_values(values)?;
        let mut errors = Vec::new();
        require_text(&mut errors, "title", &record.title);
        finish(Component::RecordAudio(record), errors)
    }

    async fn create(&self, uow: &mut UnitOfWork, component: &Component) -> EditorResult<i64> {
        let Component::RecordAudio(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        let now = Utc::now();
        let id = with_conn!(uow, |conn| {
            sqlx::query(
                "INSERT INTO record_audio_components (title, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&c.title)
            .bind(&c.description)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map(|r| r.last_id())
        })
        .context("Failed to create record-audio component")?;
        Ok(id)
    }

    async fn update(&self, uow: &mut UnitOfWork, id: i64, component: &Component) -> EditorResult<()> {
        let Component::RecordAudio(c) = component else {
            return Err(mismatch(self.component_type(), component));
        };
        let now = Utc::now();
        with_conn!(uow, |conn| {
            sqlx::query("UPDATE record_audio_components SET title = ?, description = ?, updated_at = ? WHERE id = ?")
                .bind(&c.title)
                .bind(&c.description)
                .bind(now)
                .bind(id)
                .execute(&mut *conn)
                .await
                .map(|_| ())
        })
        .context("Failed to update record-audio component")?;
        Ok(())
    }

    async fn load(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Component>> {
        let row = with_conn!(uow, |conn| {
            sqlx::query_as::<_, RecordAudioRow>("SELECT title, description FROM record_audio_components WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
        })
        .context("Failed to load record-audio component")?;
        Ok(row.map(|r| {
            Component::RecordAudio(RecordAudioComponent {
                title: r.title,
                description: r.description,
            })
        }))
    }
}
