//! Editor service
//!
//! Implements the actions of the lesson page editor:
//! - Create an editor post for a lesson page
//! - Load and save the draft content
//! - Build and publish: reconcile the page and update the public mirror
//! - Load component data, attachments and the target page
//! - Upload/remove attachments and destroy unpublished editor posts

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{check_upload, commit_and_clean, UploadedFile};
use crate::config::StorageConfig;
use crate::db::repositories::{attachment, category, page, page_element, post, user};
use crate::db::{DynDatabasePool, UnitOfWork};
use crate::editor::components::file_in_use;
use crate::editor::{ComponentRegistry, EditorError, EditorResult, FieldError, Reconciler};
use crate::models::{
    Attachment, CreateEditorPostInput, NewAttachment, NewPost, Page, PageElement, Post,
    PostInstance, PublicationStatus, EDITOR_POST_TYPE, PAGE_CONTENT_TYPE, POST_CONTENT_TYPE,
    PUBLIC_POST_TYPE,
};
use crate::storage::{delete_quietly, DynFileStorage};

const EMPTY_CONTENT: &str = r#"{"blocks":[]}"#;
const ATTACHMENT_FOLDER: &str = "attachments";

#[derive(Debug, Clone, Deserialize)]
pub struct PostIdInput {
    pub post_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveContentInput {
    pub post_id: i64,
    /// Content tree, either as a JSON string or inline
    pub content: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishInput {
    pub post_id: i64,
    pub content: Value,
    #[serde(default)]
    pub publication_status: Option<PublicationStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectDataInput {
    pub post_id: i64,
    #[serde(default)]
    pub items: Vec<ObjectRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub component_type: String,
    pub object_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentData {
    pub message: String,
    pub content: String,
    pub instance: PostInstance,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishData {
    pub message: String,
    pub instance: PostInstance,
    pub elements: Vec<Value>,
    pub content: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectData {
    pub component_type: String,
    pub object_id: i64,
    /// `null` when the component no longer exists
    pub component_data: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonPageData {
    #[serde(flatten)]
    pub page: Page,
    pub elements: Vec<Value>,
}

/// Normalize submitted content to the string stored on the post
fn content_text(content: &Value) -> EditorResult<String> {
    match content {
        Value::String(raw) => {
            serde_json::from_str::<Value>(raw)
                .map_err(|e| EditorError::Structural(format!("Content is not valid JSON: {}", e)))?;
            Ok(raw.clone())
        }
        Value::Object(_) => Ok(content.to_string()),
        _ => Err(EditorError::Structural("Content must be a JSON object".to_string())),
    }
}

/// The editor post `post_id`; public mirrors and other post types are refused
async fn get_post(uow: &mut UnitOfWork, post_id: i64) -> EditorResult<Post> {
    let found = post::get_by_id(uow, post_id)
        .await?
        .ok_or_else(|| EditorError::NotFound("`post_id` is invalid".to_string()))?;
    if found.post_type != EDITOR_POST_TYPE {
        return Err(EditorError::NotFound(
            "`post_id` does not refer to a valid post for the editor".to_string(),
        ));
    }
    Ok(found)
}

/// Storage keys of the files attached to the post
async fn attachment_keys(uow: &mut UnitOfWork, post_id: i64) -> EditorResult<Vec<String>> {
    Ok(attachment::list_for_owner(uow, POST_CONTENT_TYPE, post_id)
        .await?
        .into_iter()
        .filter_map(|a| a.file)
        .collect())
}

/// Page the post edits, which must exist
async fn target_page(uow: &mut UnitOfWork, post: &Post) -> EditorResult<Page> {
    let page_id = post.target_page_id().ok_or_else(|| {
        EditorError::Precondition("Post is not connected to a lesson page".to_string())
    })?;
    page::get_by_id(uow, page_id)
        .await?
        .ok_or_else(|| EditorError::Precondition("`object_id` is invalid".to_string()))
}

async fn build_instance(uow: &mut UnitOfWork, post: &Post) -> EditorResult<PostInstance> {
    let author = user::get_by_id(uow, post.author_id).await?;
    let category = match post.category_id {
        Some(id) => category::get_by_id(uow, id).await?,
        None => None,
    };
    Ok(PostInstance {
        id: post.id,
        title: post.title.clone(),
        meta_title: post.meta_title.clone(),
        author: author.as_ref().map(Into::into),
        category: category.as_ref().map(Into::into),
        publication_status: post.status(),
        content_type: post.content_type.clone(),
        object_id: post.object_id,
        created_at: post.created_at,
        updated_at: post.updated_at,
    })
}

pub struct EditorService {
    pool: DynDatabasePool,
    registry: Arc<ComponentRegistry>,
    storage: DynFileStorage,
    storage_config: Arc<StorageConfig>,
}

impl EditorService {
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

    /// Render an element with its component under the type's element field
    async fn element_view(&self, uow: &mut UnitOfWork, element: &PageElement) -> EditorResult<Value> {
        let mut view = json!({
            "id": element.id,
            "page_id": element.page_id,
            "order": element.order,
            "component_type": element.component_type,
            "component_id": element.component_id,
            "owns_component": element.owns_component,
        });
        let handler = self.registry.lookup(&element.component_type)?;
        let component = handler
            .load(uow, element.component_id)
            .await?
            .map(|c| c.represent_with_urls(element.component_id, self.storage.as_ref()))
            .unwrap_or(Value::Null);
        view[handler.component_type().element_field()] = component;
        Ok(view)
    }

    async fn element_views(&self, uow: &mut UnitOfWork, elements: &[PageElement]) -> EditorResult<Vec<Value>> {
        let mut views = Vec::with_capacity(elements.len());
        for element in elements {
            views.push(self.element_view(uow, element).await?);
        }
        Ok(views)
    }

    /// Create a new editor post, optionally bound to a lesson page
    pub async fn create_editor_post(
        &self,
        author_id: i64,
        input: CreateEditorPostInput,
    ) -> EditorResult<PostInstance> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(EditorError::constraint(
                "Invalid post",
                vec![FieldError::new("title", "This field may not be blank")],
            ));
        }

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        if let Some(page_id) = input.page_id {
            if page::get_by_id(&mut uow, page_id).await?.is_none() {
                return Err(EditorError::reference("Unknown lesson page", vec![format!("page:{}", page_id)]));
            }
        }
        if let Some(category_id) = input.category_id {
            if category::get_by_id(&mut uow, category_id).await?.is_none() {
                return Err(EditorError::reference(
                    "Unknown category",
                    vec![format!("category:{}", category_id)],
                ));
            }
        }

        let created = post::create(
            &mut uow,
            &NewPost {
                title: title.to_string(),
                author_id,
                category_id: input.category_id,
                content: EMPTY_CONTENT.to_string(),
                status: PublicationStatus::Draft,
                post_type: EDITOR_POST_TYPE.to_string(),
                content_type: input.page_id.map(|_| PAGE_CONTENT_TYPE.to_string()),
                object_id: input.page_id,
            },
        )
        .await?;
        let instance = build_instance(&mut uow, &created).await?;
        uow.commit().await?;

        tracing::info!(post_id = created.id, author_id, "Editor post created");
        Ok(instance)
    }

    pub async fn load_content(&self, post_id: i64) -> EditorResult<ContentData> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let post = get_post(&mut uow, post_id).await?;
        let instance = build_instance(&mut uow, &post).await?;
        Ok(ContentData {
            message: "Content loaded".to_string(),
            content: post.content,
            instance,
        })
    }

    /// Store the draft content verbatim
    pub async fn save_content(&self, input: SaveContentInput) -> EditorResult<ContentData> {
        let content = content_text(&input.content)?;
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        get_post(&mut uow, input.post_id).await?;
        post::update_content(&mut uow, input.post_id, &content).await?;
        let post = get_post(&mut uow, input.post_id).await?;
        let instance = build_instance(&mut uow, &post).await?;
        uow.commit().await?;

        Ok(ContentData {
            message: "Content saved".to_string(),
            content: post.content,
            instance,
        })
    }

    /// The lesson page behind the post, with its current elements
    pub async fn load_demo_lesson_data(&self, post_id: i64) -> EditorResult<LessonPageData> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let post = get_post(&mut uow, post_id).await?;
        let page = target_page(&mut uow, &post).await?;
        let elements = page_element::list_for_page(&mut uow, page.id).await?;
        let elements = self.element_views(&mut uow, &elements).await?;
        Ok(LessonPageData { page, elements })
    }

    /// Reconcile the post's page with `content` and publish it.
    ///
    /// Everything happens in one unit of work: the page elements, their
    /// components, the rewritten editor content and the public mirror are
    /// committed together or not at all.
    pub async fn build_and_publish(&self, input: PublishInput) -> EditorResult<PublishData> {
        let raw = content_text(&input.content)?;
        let status = input.publication_status.unwrap_or(PublicationStatus::Publish);

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let editor_post = get_post(&mut uow, input.post_id).await?;
        let page = target_page(&mut uow, &editor_post).await?;

        let mirror =
            post::find_by_target(&mut uow, PUBLIC_POST_TYPE, PAGE_CONTENT_TYPE, page.id).await?;
        let previous = mirror
            .as_ref()
            .map(|m| m.content.as_str())
            .unwrap_or(editor_post.content.as_str());

        let files = attachment_keys(&mut uow, editor_post.id).await?;
        let outcome = Reconciler::new(&self.registry)
            .with_files(files)
            .reconcile(&mut uow, page.id, &raw, Some(previous))
            .await?;
        let content = outcome.content_string();

        post::update_content(&mut uow, editor_post.id, &content).await?;
        post::update_status(&mut uow, editor_post.id, status).await?;

        let published = NewPost {
            title: editor_post.title.clone(),
            author_id: editor_post.author_id,
            category_id: editor_post.category_id,
            content: content.clone(),
            status,
            post_type: PUBLIC_POST_TYPE.to_string(),
            content_type: Some(PAGE_CONTENT_TYPE.to_string()),
            object_id: Some(page.id),
        };
        match &mirror {
            Some(mirror) => post::update_published_fields(&mut uow, mirror.id, &published).await?,
            None => {
                post::create(&mut uow, &published).await?;
            }
        }

        let editor_post = get_post(&mut uow, editor_post.id).await?;
        let instance = build_instance(&mut uow, &editor_post).await?;
        let elements = self.element_views(&mut uow, &outcome.elements).await?;
        commit_and_clean(uow, self.storage.as_ref()).await?;

        tracing::info!(
            post_id = editor_post.id,
            page_id = page.id,
            status = %status,
            elements = elements.len(),
            "Lesson page published"
        );
        Ok(PublishData {
            message: "Content published".to_string(),
            instance,
            elements,
            content: outcome.content,
        })
    }

    /// Current data of the components referenced by the editor
    pub async fn load_content_obj_data(&self, input: ObjectDataInput) -> EditorResult<Vec<ObjectData>> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        get_post(&mut uow, input.post_id).await?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in input.items {
            let handler = self.registry.lookup(&item.component_type)?;
            let component_data = handler
                .load(&mut uow, item.object_id)
                .await?
                .map(|c| c.represent_with_urls(item.object_id, self.storage.as_ref()))
                .unwrap_or(Value::Null);
            items.push(ObjectData {
                component_type: item.component_type,
                object_id: item.object_id,
                component_data,
            });
        }
        Ok(items)
    }

    pub async fn load_attachments_media(&self, post_id: i64) -> EditorResult<Vec<Attachment>> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        get_post(&mut uow, post_id).await?;
        Ok(attachment::list_for_owner(&mut uow, POST_CONTENT_TYPE, post_id).await?)
    }

    /// Store a file and attach it to the post.
    ///
    /// The file is written before the unit of work begins and deleted again
    /// if the attachment row can not be committed.
    pub async fn upload_attachment(&self, post_id: i64, file: UploadedFile) -> EditorResult<Attachment> {
        check_upload(&self.storage_config, &file)?;
        {
            let mut uow = UnitOfWork::begin(&self.pool).await?;
            get_post(&mut uow, post_id).await?;
        }

        let stored = self
            .storage
            .store(ATTACHMENT_FOLDER, &file.name, &file.content_type, &file.data)
            .await?;

        let result: EditorResult<Attachment> = async {
            let mut uow = UnitOfWork::begin(&self.pool).await?;
            get_post(&mut uow, post_id).await?;
            let created = attachment::create(
                &mut uow,
                &NewAttachment {
                    name: stored.name.clone(),
                    extension: stored.extension.clone(),
                    url: stored.url.clone(),
                    size: stored.size as i64,
                    file_type: file.content_type.clone(),
                    file: Some(stored.key.clone()),
                    storage_engine: self.storage.engine().to_string(),
                    content_type: Some(POST_CONTENT_TYPE.to_string()),
                    object_id: Some(post_id),
                },
            )
            .await?;
            uow.commit().await?;
            Ok::<_, EditorError>(created)
        }
        .await;

        match result {
            Ok(created) => {
                tracing::info!(post_id, attachment_id = created.id, key = %stored.key, "Attachment uploaded");
                Ok(created)
            }
            Err(e) => {
                delete_quietly(self.storage.as_ref(), &[stored.key]).await;
                Err(e)
            }
        }
    }

    pub async fn remove_attachment(&self, post_id: i64, attachment_id: i64) -> EditorResult<Attachment> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        get_post(&mut uow, post_id).await?;

        let found = attachment::get_by_id(&mut uow, attachment_id)
            .await?
            .filter(|a| a.content_type.as_deref() == Some(POST_CONTENT_TYPE) && a.object_id == Some(post_id))
            .ok_or_else(|| EditorError::NotFound("`attachment_id` is invalid".to_string()))?;

        if let Some(key) = &found.file {
            if file_in_use(&mut uow, key).await? {
                return Err(EditorError::Precondition(
                    "Attachment is used by a lesson page component".to_string(),
                ));
            }
            uow.schedule_file_deletion(key.clone());
        }
        attachment::delete(&mut uow, found.id).await?;
        commit_and_clean(uow, self.storage.as_ref()).await?;
        Ok(found)
    }

    /// Delete an unpublished editor post owned by `user_id`
    pub async fn destroy_post_editor(&self, post_id: i64, user_id: i64) -> EditorResult<()> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let editor_post = get_post(&mut uow, post_id).await?;
        if editor_post.is_published() {
            return Err(EditorError::Precondition(
                "A published post can not be destroyed".to_string(),
            ));
        }
        if editor_post.author_id != user_id {
            return Err(EditorError::Forbidden(
                "Only the author can destroy this post".to_string(),
            ));
        }

        for owned in attachment::list_for_owner(&mut uow, POST_CONTENT_TYPE, post_id).await? {
            if let Some(key) = &owned.file {
                // Published components may still show the file
                if file_in_use(&mut uow, key).await? {
                    tracing::debug!(post_id, key = %key, "Keeping attachment file used by a component");
                } else {
                    uow.schedule_file_deletion(key.clone());
                }
            }
            attachment::delete(&mut uow, owned.id).await?;
        }

        if let Some(page_id) = editor_post.target_page_id() {
            if let Some(mirror) =
                post::find_by_target(&mut uow, PUBLIC_POST_TYPE, PAGE_CONTENT_TYPE, page_id).await?
            {
                post::update_status(&mut uow, mirror.id, PublicationStatus::Draft).await?;
            }
        }

        post::delete(&mut uow, post_id).await?;
        commit_and_clean(uow, self.storage.as_ref()).await?;

        tracing::info!(post_id, user_id, "Editor post destroyed");
        Ok(())
    }
}
