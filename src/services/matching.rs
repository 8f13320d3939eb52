//! Matching component service
//!
//! Standalone CRUD for matching components, outside of page publishing, plus
//! image control for single elements.

use serde_json::Value;
use std::sync::Arc;

use super::{check_upload, commit_and_clean, UploadedFile};
use crate::config::StorageConfig;
use crate::db::repositories::page_element;
use crate::db::{DynDatabasePool, UnitOfWork};
use crate::editor::{matching, ComponentHandler, ComponentRegistry, ComponentType, EditorError, EditorResult};
use crate::storage::{delete_quietly, DynFileStorage};

const MATCHING_FOLDER: &str = "matching";

/// What to do with an element's image
#[derive(Debug, Clone)]
pub enum ImageAction {
    Upload(UploadedFile),
    Remove,
}

pub struct MatchingService {
    pool: DynDatabasePool,
    registry: Arc<ComponentRegistry>,
    storage: DynFileStorage,
    storage_config: Arc<StorageConfig>,
}

fn not_found(id: i64) -> EditorError {
    EditorError::NotFound(format!("Matching component not found: {}", id))
}

impl MatchingService {
    pub fn new(
        pool: DynDatabasePool,
        registry: Arc<ComponentRegistry>,
        storage: DynFileStorage,
        storage_config: Arc<StorageConfig>,
    ) -> Self {
        Self {
            pool,
            registry,
            storage,
            storage_config,
        }
    }

    fn handler(&self) -> EditorResult<&Arc<dyn ComponentHandler>> {
        self.registry.get(ComponentType::Matching)
    }

    async fn represent(&self, uow: &mut UnitOfWork, id: i64) -> EditorResult<Value> {
        let component = self.handler()?.load(uow, id).await?.ok_or_else(|| not_found(id))?;
        Ok(component.represent_with_urls(id, self.storage.as_ref()))
    }

    pub async fn list(&self) -> EditorResult<Vec<Value>> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let mut items = Vec::new();
        for id in matching::list_ids(&mut uow).await? {
            items.push(self.represent(&mut uow, id).await?);
        }
        Ok(items)
    }

    pub async fn get(&self, id: i64) -> EditorResult<Value> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        self.represent(&mut uow, id).await
    }

    pub async fn create(&self, values: &Value) -> EditorResult<Value> {
        let handler = self.handler()?;
        let component = handler
            .validate(values)
            .map_err(|errors| EditorError::constraint("Invalid matching payload", errors))?;

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let id = handler.create(&mut uow, &component).await?;
        let created = self.represent(&mut uow, id).await?;
        commit_and_clean(uow, self.storage.as_ref()).await?;

        tracing::info!(component_id = id, "Matching component created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, values: &Value) -> EditorResult<Value> {
        let handler = self.handler()?;
        let component = handler
            .validate(values)
            .map_err(|errors| EditorError::constraint("Invalid matching payload", errors))?;

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        if !handler.exists(&mut uow, id).await? {
            return Err(not_found(id));
        }
        handler.update(&mut uow, id, &component).await?;
        let updated = self.represent(&mut uow, id).await?;
        commit_and_clean(uow, self.storage.as_ref()).await?;
        Ok(updated)
    }

    /// Delete a component that no page element uses
    pub async fn delete(&self, id: i64) -> EditorResult<()> {
        let handler = self.handler()?;
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        if !handler.exists(&mut uow, id).await? {
            return Err(not_found(id));
        }
        let references =
            page_element::count_references(&mut uow, ComponentType::Matching.tag(), id).await?;
        if references > 0 {
            return Err(EditorError::Precondition(format!(
                "Matching component {} is used by {} page element(s)",
                id, references
            )));
        }
        handler.delete(&mut uow, id).await?;
        commit_and_clean(uow, self.storage.as_ref()).await
    }

    /// Upload or remove the image of one element
    pub async fn file_control(&self, id: i64, element_id: i64, action: ImageAction) -> EditorResult<Value> {
        let stored = match &action {
            ImageAction::Upload(file) => {
                check_upload(&self.storage_config, file)?;
                Some(
                    self.storage
                        .store(MATCHING_FOLDER, &file.name, &file.content_type, &file.data)
                        .await?,
                )
            }
            ImageAction::Remove => None,
        };
        let new_key = stored.as_ref().map(|s| s.key.clone());

        let result: EditorResult<Value> = async {
            let mut uow = UnitOfWork::begin(&self.pool).await?;
            if !self.handler()?.exists(&mut uow, id).await? {
                return Err(not_found(id));
            }
            matching::replace_element_image(&mut uow, id, element_id, new_key.as_deref()).await?;
            let updated = self.represent(&mut uow, id).await?;
            commit_and_clean(uow, self.storage.as_ref()).await?;
            Ok::<_, EditorError>(updated)
        }
        .await;

        if result.is_err() {
            if let Some(key) = new_key {
                delete_quietly(self.storage.as_ref(), &[key]).await;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::db::repositories::page;
    use crate::db::create_test_pool;
    use crate::models::ElementSlot;
    use crate::storage::LocalFileStorage;
    use serde_json::json;
    use tempfile::TempDir;

    async fn service() -> (MatchingService, DynDatabasePool, TempDir) {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            path: dir.path().to_path_buf(),
            ..StorageConfig::default()
        };
        let service = MatchingService::new(
            pool.clone(),
            Arc::new(ComponentRegistry::new()),
            Arc::new(LocalFileStorage::from_config(&config)),
            Arc::new(config),
        );
        (service, pool, dir)
    }

    fn pairs() -> Value {
        json!({
            "title": "Animals",
            "elements": [{"uid": "e1", "text": "cat"}, {"uid": "e2", "text": "chat"}],
            "couples": [{"first_element": "e1", "second_element": "e2"}]
        })
    }

    fn image() -> ImageAction {
        ImageAction::Upload(UploadedFile {
            name: "cat.png".to_string(),
            content_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        })
    }

    #[tokio::test]
    async fn test_crud() {
        let (service, _pool, _dir) = service().await;
        let created = service.create(&pairs()).await.unwrap();
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["elements"].as_array().unwrap().len(), 2);

        let mut changed = created.clone();
        changed["title"] = json!("Renamed");
        let updated = service.update(id, &changed).await.unwrap();
        assert_eq!(updated["title"], "Renamed");
        assert_eq!(updated["elements"], created["elements"]);

        assert_eq!(service.list().await.unwrap().len(), 1);
        service.delete(id).await.unwrap();
        assert!(matches!(service.get(id).await, Err(EditorError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejected_update_keeps_graph() {
        let (service, _pool, _dir) = service().await;
        let created = service.create(&pairs()).await.unwrap();
        let id = created["id"].as_i64().unwrap();

        let mut invalid = created.clone();
        let first = created["elements"][0]["uid"].clone();
        invalid["couples"] = json!([
            {"first_element": first, "second_element": created["elements"][1]["uid"]},
            {"first_element": first, "second_element": created["elements"][1]["uid"]}
        ]);
        let err = service.update(id, &invalid).await.unwrap_err();
        let messages: Vec<String> = err.field_errors().into_iter().map(|e| e.message).collect();
        assert!(messages
            .iter()
            .any(|m| m.contains("first_element") && m.contains(first.as_str().unwrap())));

        assert_eq!(service.get(id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_delete_refuses_component_in_use() {
        let (service, pool, _dir) = service().await;
        let created = service.create(&pairs()).await.unwrap();
        let id = created["id"].as_i64().unwrap();

        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let lesson = page::create(&mut uow, "Lesson").await.unwrap();
        page_element::insert(
            &mut uow,
            lesson.id,
            &ElementSlot {
                order: 1,
                component_type: "matching".to_string(),
                component_id: id,
                owns_component: false,
            },
        )
        .await
        .unwrap();
        uow.commit().await.unwrap();

        assert!(matches!(service.delete(id).await, Err(EditorError::Precondition(_))));
    }

    #[tokio::test]
    async fn test_file_control_replaces_and_removes_image() {
        let (service, _pool, dir) = service().await;
        let created = service.create(&pairs()).await.unwrap();
        let id = created["id"].as_i64().unwrap();
        let element_id = created["elements"][0]["id"].as_i64().unwrap();

        let first = service.file_control(id, element_id, image()).await.unwrap();
        let first_key = first["elements"][0]["image_file"].as_str().unwrap().to_string();
        assert!(dir.path().join(&first_key).exists());
        assert_eq!(first["elements"][0]["image_url"], format!("/media/{}", first_key));

        // Resubmitting the rendered component keeps the uploaded image
        let resubmitted = service.update(id, &first).await.unwrap();
        assert_eq!(resubmitted["elements"][0]["image_file"], first_key.as_str());

        let second = service.file_control(id, element_id, image()).await.unwrap();
        let second_key = second["elements"][0]["image_file"].as_str().unwrap().to_string();
        assert_ne!(first_key, second_key);
        assert!(!dir.path().join(&first_key).exists());

        let cleared = service.file_control(id, element_id, ImageAction::Remove).await.unwrap();
        assert!(cleared["elements"][0]["image_file"].is_null());
        assert!(!dir.path().join(&second_key).exists());

        // Unknown element: the uploaded file is discarded
        assert!(matches!(
            service.file_control(id, 9999, image()).await,
            Err(EditorError::NotFound(_))
        ));
        let leftovers = std::fs::read_dir(dir.path().join(MATCHING_FOLDER)).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
