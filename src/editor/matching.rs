//! Matching-graph synchronizer
//!
//! A matching component is a bipartite graph: elements (text and/or image)
//! joined pairwise by couples. Clients address elements by a `uid` tag, so a
//! payload can describe new elements and the couples between them in one
//! go. Persisted elements are rendered back with `uid = "elem{id}"`.
//!
//! Graph rules, checked before any write:
//! - every element uid is present and unique
//! - couples only reference uids of the payload, never the same uid twice
//! - a uid is `first_element` of at most one couple and `second_element`
//!   of at most one couple, and never appears in both positions
//! - every element is used by at least one couple

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::component::{MatchingComponent, MatchingCouple, MatchingElement};
use super::components::parse_values;
use super::error::{EditorError, EditorResult, FieldError};
use crate::db::unit_of_work::{with_conn, LastInsertId, UnitOfWork};

/// Client tag of a persisted element
pub fn uid_for(element_id: i64) -> String {
    format!("elem{}", element_id)
}

fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// Parse and check a matching payload
pub fn validate_payload(values: &Value) -> Result<MatchingComponent, Vec<FieldError>> {
    let component: MatchingComponent = parse_values(values)?;
    let errors = check_graph(&component);
    if errors.is_empty() {
        Ok(component)
    } else {
        Err(errors)
    }
}

/// Every rule violation of the payload, in a stable order
pub fn check_graph(component: &MatchingComponent) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let mut uids = HashSet::new();
    let mut duplicate_uids = BTreeSet::new();
    let mut ids = HashSet::new();
    let mut duplicate_ids = BTreeSet::new();
    for (idx, element) in component.elements.iter().enumerate() {
        if element.uid.trim().is_empty() {
            errors.push(FieldError::new(format!("elements[{}].uid", idx), "uid is required"));
        } else if !uids.insert(element.uid.as_str()) {
            duplicate_uids.insert(element.uid.clone());
        }
        if let Some(id) = element.id {
            if !ids.insert(id) {
                duplicate_ids.insert(id.to_string());
            }
        }
    }
    if !duplicate_uids.is_empty() {
        errors.push(FieldError::new(
            "elements",
            format!("Duplicate uid: {}", join_tags(&duplicate_uids)),
        ));
    }
    if !duplicate_ids.is_empty() {
        errors.push(FieldError::new(
            "elements",
            format!("Duplicate element id: {}", join_tags(&duplicate_ids)),
        ));
    }

    if component.couples.is_empty() {
        errors.push(FieldError::new("couples", "At least one couple is required"));
    }

    let mut first_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut second_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut used = HashSet::new();
    for (idx, couple) in component.couples.iter().enumerate() {
        for tag in [&couple.first_element, &couple.second_element] {
            if !uids.contains(tag.as_str()) {
                errors.push(FieldError::new(
                    format!("couples[{}]", idx),
                    format!("Couple references unknown uid: {}", tag),
                ));
            }
        }
        if couple.first_element == couple.second_element {
            errors.push(FieldError::new(
                format!("couples[{}]", idx),
                format!("Element can not be coupled with itself: {}", couple.first_element),
            ));
        }
        *first_counts.entry(couple.first_element.as_str()).or_default() += 1;
        *second_counts.entry(couple.second_element.as_str()).or_default() += 1;
        used.insert(couple.first_element.as_str());
        used.insert(couple.second_element.as_str());
    }

    let repeated = |counts: &BTreeMap<&str, usize>| -> BTreeSet<String> {
        counts
            .iter()
            .filter(|(_, n)| **n > 1)
            .map(|(tag, _)| tag.to_string())
            .collect()
    };
    let repeated_first = repeated(&first_counts);
    if !repeated_first.is_empty() {
        errors.push(FieldError::new(
            "couples",
            format!(
                "Elements used as first_element in more than one couple: {}",
                join_tags(&repeated_first)
            ),
        ));
    }
    let repeated_second = repeated(&second_counts);
    if !repeated_second.is_empty() {
        errors.push(FieldError::new(
            "couples",
            format!(
                "Elements used as second_element in more than one couple: {}",
                join_tags(&repeated_second)
            ),
        ));
    }

    let both: BTreeSet<String> = first_counts
        .keys()
        .filter(|tag| second_counts.contains_key(*tag))
        .map(|tag| tag.to_string())
        .collect();
    if !both.is_empty() {
        errors.push(FieldError::new(
            "couples",
            format!("Elements appear in both positions: {}", join_tags(&both)),
        ));
    }

    let unused: BTreeSet<String> = component
        .elements
        .iter()
        .filter(|e| !e.uid.trim().is_empty() && !used.contains(e.uid.as_str()))
        .map(|e| e.uid.clone())
        .collect();
    if !unused.is_empty() {
        errors.push(FieldError::new(
            "elements",
            format!("Elements not used in any couple: {}", join_tags(&unused)),
        ));
    }

    errors
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ElementRow {
    id: i64,
    text: String,
    image: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct CoupleRow {
    id: i64,
    first_element_id: i64,
    second_element_id: i64,
}

/// Counts of rows touched by one synchronization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphChanges {
    pub elements_created: usize,
    pub elements_updated: usize,
    pub elements_deleted: usize,
    pub couples_created: usize,
    pub couples_deleted: usize,
}

async fn load_elements(uow: &mut UnitOfWork, component_id: i64) -> Result<Vec<ElementRow>> {
    with_conn!(uow, |conn| {
        sqlx::query_as::<_, ElementRow>(
            "SELECT id, text, image FROM matching_elements WHERE component_id = ? ORDER BY id",
        )
        .bind(component_id)
        .fetch_all(&mut *conn)
        .await
    })
    .context("Failed to load matching elements")
}

async fn load_couples(uow: &mut UnitOfWork, component_id: i64) -> Result<Vec<CoupleRow>> {
    with_conn!(uow, |conn| {
        sqlx::query_as::<_, CoupleRow>(
            "SELECT id, first_element_id, second_element_id FROM matching_couples WHERE component_id = ? ORDER BY id",
        )
        .bind(component_id)
        .fetch_all(&mut *conn)
        .await
    })
    .context("Failed to load matching couples")
}

async fn delete_element(uow: &mut UnitOfWork, element: &ElementRow) -> Result<()> {
    if let Some(image) = &element.image {
        uow.schedule_file_deletion(image.clone());
    }
    with_conn!(uow, |conn| {
        sqlx::query("DELETE FROM matching_couples WHERE first_element_id = ? OR second_element_id = ?")
            .bind(element.id)
            .bind(element.id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    })
    .context("Failed to delete couples of matching element")?;
    with_conn!(uow, |conn| {
        sqlx::query("DELETE FROM matching_elements WHERE id = ?")
            .bind(element.id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    })
    .context("Failed to delete matching element")
}

fn non_empty(file: Option<&str>) -> Option<String> {
    file.filter(|f| !f.is_empty()).map(str::to_string)
}

/// Converge the persisted graph of `component_id` to `payload`.
///
/// The payload must already satisfy [`check_graph`]. Element ids that do not
/// belong to the component, and image keys an element does not already hold,
/// are rejected before anything is written.
pub async fn sync_graph(
    uow: &mut UnitOfWork,
    component_id: i64,
    payload: &MatchingComponent,
) -> EditorResult<GraphChanges> {
    let existing: HashMap<i64, ElementRow> = load_elements(uow, component_id)
        .await?
        .into_iter()
        .map(|e| (e.id, e))
        .collect();

    let foreign: Vec<String> = payload
        .elements
        .iter()
        .filter_map(|e| e.id.filter(|id| !existing.contains_key(id)).map(|id| format!("{} (id {})", e.uid, id)))
        .collect();
    if !foreign.is_empty() {
        return Err(EditorError::reference(
            "Matching elements do not belong to this component",
            foreign,
        ));
    }

    // Images are owned by their element and only arrive through file upload
    let foreign_images: Vec<FieldError> = payload
        .elements
        .iter()
        .enumerate()
        .filter_map(|(idx, e)| {
            let file = non_empty(e.image_file.as_deref())?;
            let held = e.id.and_then(|id| existing.get(&id)).and_then(|row| row.image.as_ref());
            (held != Some(&file)).then(|| {
                FieldError::new(
                    format!("elements[{}].image_file", idx),
                    "Images can only be set by uploading a file",
                )
            })
        })
        .collect();
    if !foreign_images.is_empty() {
        return Err(EditorError::constraint("Invalid matching images", foreign_images));
    }

    let mut changes = GraphChanges::default();
    let mut uid_to_id: HashMap<&str, i64> = HashMap::new();
    let mut keep = HashSet::new();

    for element in &payload.elements {
        let id = match element.id.and_then(|id| existing.get(&id)) {
            Some(current) => {
                let image = match element.image_file.as_deref() {
                    None => current.image.clone(),
                    Some(file) => non_empty(Some(file)),
                };
                if let Some(previous) = &current.image {
                    if image.as_ref() != Some(previous) {
                        uow.schedule_file_deletion(previous.clone());
                    }
                }
                with_conn!(uow, |conn| {
                    sqlx::query("UPDATE matching_elements SET text = ?, image = ? WHERE id = ?")
                        .bind(&element.text)
                        .bind(&image)
                        .bind(current.id)
                        .execute(&mut *conn)
                        .await
                        .map(|_| ())
                })
                .context("Failed to update matching element")?;
                changes.elements_updated += 1;
                current.id
            }
            None => {
                let image = non_empty(element.image_file.as_deref());
                let id = with_conn!(uow, |conn| {
                    sqlx::query("INSERT INTO matching_elements (component_id, text, image) VALUES (?, ?, ?)")
                        .bind(component_id)
                        .bind(&element.text)
                        .bind(&image)
                        .execute(&mut *conn)
                        .await
                        .map(|r| r.last_id())
                })
                .context("Failed to create matching element")?;
                changes.elements_created += 1;
                id
            }
        };
        uid_to_id.insert(element.uid.as_str(), id);
        keep.insert(id);
    }

    for element in existing.values().filter(|e| !keep.contains(&e.id)) {
        delete_element(uow, element).await?;
        changes.elements_deleted += 1;
    }

    let mut desired = HashSet::new();
    for couple in &payload.couples {
        match (
            uid_to_id.get(couple.first_element.as_str()),
            uid_to_id.get(couple.second_element.as_str()),
        ) {
            (Some(first), Some(second)) => {
                desired.insert((*first, *second));
            }
            _ => {
                return Err(EditorError::reference(
                    "Couple references unknown uid",
                    vec![couple.first_element.clone(), couple.second_element.clone()],
                ))
            }
        }
    }

    let mut present = HashSet::new();
    for couple in load_couples(uow, component_id).await? {
        let pair = (couple.first_element_id, couple.second_element_id);
        if desired.contains(&pair) && present.insert(pair) {
            continue;
        }
        with_conn!(uow, |conn| {
            sqlx::query("DELETE FROM matching_couples WHERE id = ?")
                .bind(couple.id)
                .execute(&mut *conn)
                .await
                .map(|_| ())
        })
        .context("Failed to delete matching couple")?;
        changes.couples_deleted += 1;
    }

    let mut missing: Vec<(i64, i64)> = desired.difference(&present).copied().collect();
    missing.sort_unstable();
    for (first, second) in missing {
        with_conn!(uow, |conn| {
            sqlx::query(
                "INSERT INTO matching_couples (component_id, first_element_id, second_element_id) VALUES (?, ?, ?)",
            )
            .bind(component_id)
            .bind(first)
            .bind(second)
            .execute(&mut *conn)
            .await
            .map(|_| ())
        })
        .context("Failed to create matching couple")?;
        changes.couples_created += 1;
    }

    tracing::debug!(component_id, ?changes, "Matching graph synchronized");
    Ok(changes)
}

pub async fn insert_component(uow: &mut UnitOfWork, title: &str) -> Result<i64> {
    let now = Utc::now();
    with_conn!(uow, |conn| {
        sqlx::query("INSERT INTO matching_components (title, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(title)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map(|r| r.last_id())
    })
    .context("Failed to create matching component")
}

pub async fn update_title(uow: &mut UnitOfWork, id: i64, title: &str) -> Result<()> {
    let now = Utc::now();
    with_conn!(uow, |conn| {
        sqlx::query("UPDATE matching_components SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(now)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    })
    .context("Failed to update matching component")
}

/// Load a persisted graph in payload form
pub async fn load_graph(uow: &mut UnitOfWork, id: i64) -> Result<Option<MatchingComponent>> {
    let title = with_conn!(uow, |conn| {
        sqlx::query_scalar::<_, String>("SELECT title FROM matching_components WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    })
    .context("Failed to load matching component")?;
    let Some(title) = title else {
        return Ok(None);
    };

    let elements = load_elements(uow, id).await?;
    let couples = load_couples(uow, id).await?;

    Ok(Some(MatchingComponent {
        title,
        elements: elements
            .into_iter()
            .map(|e| MatchingElement {
                uid: uid_for(e.id),
                id: Some(e.id),
                text: e.text,
                image_file: e.image,
            })
            .collect(),
        couples: couples
            .into_iter()
            .map(|c| MatchingCouple {
                first_element: uid_for(c.first_element_id),
                second_element: uid_for(c.second_element_id),
            })
            .collect(),
    }))
}

/// Delete a matching component with its whole graph
pub async fn delete_graph(uow: &mut UnitOfWork, id: i64) -> Result<()> {
    for element in load_elements(uow, id).await? {
        delete_element(uow, &element).await?;
    }
    with_conn!(uow, |conn| {
        sqlx::query("DELETE FROM matching_components WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    })
    .context("Failed to delete matching component")
}

/// Ids of every matching component, newest first
pub async fn list_ids(uow: &mut UnitOfWork) -> Result<Vec<i64>> {
    with_conn!(uow, |conn| {
        sqlx::query_scalar::<_, i64>("SELECT id FROM matching_components ORDER BY id DESC")
            .fetch_all(&mut *conn)
            .await
    })
    .context("Failed to list matching components")
}

/// Set or clear the image of one element, returning the previous file.
///
/// The element must belong to the component and already be part of a couple.
pub async fn replace_element_image(
    uow: &mut UnitOfWork,
    component_id: i64,
    element_id: i64,
    image: Option<&str>,
) -> EditorResult<Option<String>> {
    let element = load_elements(uow, component_id)
        .await?
        .into_iter()
        .find(|e| e.id == element_id)
        .ok_or_else(|| {
            EditorError::NotFound(format!("Matching element {} not found in component {}", element_id, component_id))
        })?;

    let in_couple = load_couples(uow, component_id)
        .await?
        .iter()
        .any(|c| c.first_element_id == element_id || c.second_element_id == element_id);
    if !in_couple {
        return Err(EditorError::Precondition(format!(
            "Element {} is not used in any couple",
            uid_for(element_id)
        )));
    }

    if let Some(previous) = &element.image {
        uow.schedule_file_deletion(previous.clone());
    }
    let image = non_empty(image);
    with_conn!(uow, |conn| {
        sqlx::query("UPDATE matching_elements SET image = ? WHERE id = ?")
            .bind(&image)
            .bind(element_id)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    })
    .context("Failed to update matching element image")?;

    Ok(element.image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations, DynDatabasePool};
    use serde_json::json;

    async fn setup() -> DynDatabasePool {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn messages(errors: &[FieldError]) -> Vec<String> {
        errors.iter().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn test_first_position_reuse_names_the_tag() {
        let errors = validate_payload(&json!({
            "elements": [
                {"uid": "X", "text": "x"},
                {"uid": "a", "text": "a"},
                {"uid": "b", "text": "b"}
            ],
            "couples": [
                {"first_element": "X", "second_element": "a"},
                {"first_element": "X", "second_element": "b"}
            ]
        }))
        .unwrap_err();
        assert_eq!(
            messages(&errors),
            vec!["Elements used as first_element in more than one couple: X".to_string()]
        );
    }

    #[test]
    fn test_rule_violations_accumulate() {
        let errors = validate_payload(&json!({
            "elements": [
                {"uid": "a", "text": "a"},
                {"uid": "a", "text": "dup"},
                {"uid": "b", "text": "b"},
                {"uid": "c", "text": "c"},
                {"uid": "d", "text": "d"}
            ],
            "couples": [
                {"first_element": "a", "second_element": "b"},
                {"first_element": "b", "second_element": "ghost"},
                {"first_element": "c", "second_element": "c"}
            ]
        }))
        .unwrap_err();
        let messages = messages(&errors);
        assert!(messages.contains(&"Duplicate uid: a".to_string()));
        assert!(messages.contains(&"Couple references unknown uid: ghost".to_string()));
        assert!(messages.contains(&"Element can not be coupled with itself: c".to_string()));
        assert!(messages.contains(&"Elements appear in both positions: b, c".to_string()));
        assert!(messages.contains(&"Elements not used in any couple: d".to_string()));
    }

    #[test]
    fn test_bare_uids_are_enough() {
        let component = validate_payload(&json!({
            "elements": [{"uid": "e1"}, {"uid": "e2"}],
            "couples": [{"first_element": "e1", "second_element": "e2"}]
        }))
        .unwrap();
        assert_eq!(component.elements.len(), 2);
        assert!(component.elements.iter().all(|e| e.text.is_empty() && e.image_file.is_none()));
    }

    #[tokio::test]
    async fn test_sync_creates_then_rejects_empty_couples() {
        let pool = setup().await;
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let id = insert_component(&mut uow, "Pairs").await.unwrap();

        let payload = validate_payload(&json!({
            "title": "Pairs",
            "elements": [{"uid": "e1", "text": "one"}, {"uid": "e2", "text": "two"}],
            "couples": [{"first_element": "e1", "second_element": "e2"}]
        }))
        .unwrap();
        let changes = sync_graph(&mut uow, id, &payload).await.unwrap();
        assert_eq!(changes.elements_created, 2);
        assert_eq!(changes.couples_created, 1);

        let loaded = load_graph(&mut uow, id).await.unwrap().unwrap();
        assert_eq!(loaded.elements.len(), 1 + 1);
        assert_eq!(loaded.couples.len(), 1);
        assert_eq!(loaded.couples[0].first_element, uid_for(loaded.elements[0].id.unwrap()));

        let mut resubmitted = serde_json::to_value(&loaded).unwrap();
        resubmitted["couples"] = json!([]);
        let errors = validate_payload(&resubmitted).unwrap_err();
        let unused = errors
            .iter()
            .find(|e| e.message.starts_with("Elements not used"))
            .unwrap();
        for element in &loaded.elements {
            assert!(unused.message.contains(&element.uid));
        }
    }

    #[tokio::test]
    async fn test_sync_reconciles_couples_and_drops_missing_elements() {
        let pool = setup().await;
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let id = insert_component(&mut uow, "Pairs").await.unwrap();

        let payload = validate_payload(&json!({
            "elements": [
                {"uid": "a", "text": "a"},
                {"uid": "b", "text": "b"},
                {"uid": "c", "text": "c"},
                {"uid": "d", "text": "d"}
            ],
            "couples": [
                {"first_element": "a", "second_element": "b"},
                {"first_element": "c", "second_element": "d"}
            ]
        }))
        .unwrap();
        sync_graph(&mut uow, id, &payload).await.unwrap();
        let loaded = load_graph(&mut uow, id).await.unwrap().unwrap();
        let [a, b, c, _d] = [0, 1, 2, 3].map(|i| loaded.elements[i].clone());
        replace_element_image(&mut uow, id, a.id.unwrap(), Some("matching/a.png"))
            .await
            .unwrap();

        // Keep a, b, c; drop d and a's image; couple a-c instead of c-d
        let payload = validate_payload(&json!({
            "elements": [
                {"uid": a.uid, "id": a.id, "text": "a", "image_file": ""},
                {"uid": b.uid, "id": b.id, "text": "b"},
                {"uid": c.uid, "id": c.id, "text": "c"}
            ],
            "couples": [
                {"first_element": a.uid, "second_element": b.uid},
                {"first_element": c.uid, "second_element": a.uid}
            ]
        }))
        .unwrap_err();
        // a appears first and second
        assert!(messages(&payload).iter().any(|m| m.contains("both positions")));

        let payload = validate_payload(&json!({
            "elements": [
                {"uid": a.uid, "id": a.id, "text": "a", "image_file": ""},
                {"uid": b.uid, "id": b.id, "text": "b"},
                {"uid": c.uid, "id": c.id, "text": "c"},
                {"uid": "new", "text": "n"}
            ],
            "couples": [
                {"first_element": a.uid, "second_element": b.uid},
                {"first_element": c.uid, "second_element": "new"}
            ]
        }))
        .unwrap();
        let changes = sync_graph(&mut uow, id, &payload).await.unwrap();
        assert_eq!(changes.elements_updated, 3);
        assert_eq!(changes.elements_created, 1);
        assert_eq!(changes.elements_deleted, 1);
        // a-b kept, c-d removed by element deletion, c-new inserted
        assert_eq!(changes.couples_created, 1);
        assert_eq!(uow.scheduled_file_deletions(), &["matching/a.png".to_string()]);

        let loaded = load_graph(&mut uow, id).await.unwrap().unwrap();
        assert_eq!(loaded.elements.len(), 4);
        assert_eq!(loaded.couples.len(), 2);
        assert!(loaded.elements.iter().all(|e| e.image_file.is_none()));
    }

    #[tokio::test]
    async fn test_foreign_element_id_is_rejected() {
        let pool = setup().await;
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let first = insert_component(&mut uow, "one").await.unwrap();
        let second = insert_component(&mut uow, "two").await.unwrap();

        let payload = validate_payload(&json!({
            "elements": [{"uid": "a", "text": "a"}, {"uid": "b", "text": "b"}],
            "couples": [{"first_element": "a", "second_element": "b"}]
        }))
        .unwrap();
        sync_graph(&mut uow, first, &payload).await.unwrap();
        let foreign_id = load_graph(&mut uow, first).await.unwrap().unwrap().elements[0].id;

        let payload = validate_payload(&json!({
            "elements": [{"uid": "a", "id": foreign_id, "text": "a"}, {"uid": "b", "text": "b"}],
            "couples": [{"first_element": "a", "second_element": "b"}]
        }))
        .unwrap();
        let err = sync_graph(&mut uow, second, &payload).await.unwrap_err();
        assert!(matches!(err, EditorError::Reference { .. }));
    }

    #[tokio::test]
    async fn test_replace_image_requires_coupled_element() {
        let pool = setup().await;
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let id = insert_component(&mut uow, "Pairs").await.unwrap();
        let payload = validate_payload(&json!({
            "elements": [{"uid": "a", "text": "a"}, {"uid": "b", "text": "b"}],
            "couples": [{"first_element": "a", "second_element": "b"}]
        }))
        .unwrap();
        sync_graph(&mut uow, id, &payload).await.unwrap();
        let element_id = load_graph(&mut uow, id).await.unwrap().unwrap().elements[0].id.unwrap();

        let previous = replace_element_image(&mut uow, id, element_id, Some("matching/new.png"))
            .await
            .unwrap();
        assert!(previous.is_none());
        let previous = replace_element_image(&mut uow, id, element_id, None).await.unwrap();
        assert_eq!(previous.as_deref(), Some("matching/new.png"));
        assert_eq!(uow.scheduled_file_deletions(), &["matching/new.png".to_string()]);

        assert!(matches!(
            replace_element_image(&mut uow, id, element_id + 100, None).await,
            Err(EditorError::NotFound(_))
        ));

        delete_graph(&mut uow, id).await.unwrap();
        assert!(load_graph(&mut uow, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_payload_can_not_claim_image_keys() {
        let pool = setup().await;
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let id = insert_component(&mut uow, "Pairs").await.unwrap();

        let claimed = validate_payload(&json!({
            "elements": [
                {"uid": "a", "text": "a", "image_file": "attachments/someone-else.png"},
                {"uid": "b", "text": "b"}
            ],
            "couples": [{"first_element": "a", "second_element": "b"}]
        }))
        .unwrap();
        let err = sync_graph(&mut uow, id, &claimed).await.unwrap_err();
        assert!(matches!(&err, EditorError::Constraint { errors, .. } if errors[0].field == "elements[0].image_file"));
        assert!(load_graph(&mut uow, id).await.unwrap().unwrap().elements.is_empty());

        let plain = validate_payload(&json!({
            "elements": [{"uid": "a", "text": "a"}, {"uid": "b", "text": "b"}],
            "couples": [{"first_element": "a", "second_element": "b"}]
        }))
        .unwrap();
        sync_graph(&mut uow, id, &plain).await.unwrap();
        let a = load_graph(&mut uow, id).await.unwrap().unwrap().elements[0].clone();
        replace_element_image(&mut uow, id, a.id.unwrap(), Some("matching/a.png"))
            .await
            .unwrap();

        // Resubmitting the held key is fine, swapping it for another is not
        let loaded = load_graph(&mut uow, id).await.unwrap().unwrap();
        sync_graph(&mut uow, id, &loaded).await.unwrap();
        let mut swapped = loaded.clone();
        swapped.elements[0].image_file = Some("attachments/other.png".to_string());
        assert!(sync_graph(&mut uow, id, &swapped).await.is_err());

        let reloaded = load_graph(&mut uow, id).await.unwrap().unwrap();
        assert_eq!(reloaded.elements[0].image_file.as_deref(), Some("matching/a.png"));
        assert!(uow.scheduled_file_deletions().is_empty());
    }
}
