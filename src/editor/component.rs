//! Component types and payloads
//!
//! [`Component`] is a tagged union over every component kind a page element
//! can point at. Each variant's payload doubles as the JSON representation
//! exchanged with the editor front end.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::error::EditorError;
use crate::storage::FileStorage;

/// Registry tag of a component kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    #[serde(rename = "text-pro")]
    Text,
    #[serde(rename = "question")]
    Question,
    #[serde(rename = "fill-text")]
    FillText,
    #[serde(rename = "order")]
    PutInOrder,
    #[serde(rename = "matching")]
    Matching,
    #[serde(rename = "audio")]
    Audio,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "video")]
    Video,
    #[serde(rename = "record-audio")]
    RecordAudio,
    #[serde(rename = "bluecard")]
    BlueCard,
}

impl ComponentType {
    pub const ALL: [ComponentType; 10] = [
        Self::Text,
        Self::Question,
        Self::FillText,
        Self::PutInOrder,
        Self::Matching,
        Self::Audio,
        Self::Image,
        Self::Video,
        Self::RecordAudio,
        Self::BlueCard,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Text => "text-pro",
            Self::Question => "question",
            Self::FillText => "fill-text",
            Self::PutInOrder => "order",
            Self::Matching => "matching",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Video => "video",
            Self::RecordAudio => "record-audio",
            Self::BlueCard => "bluecard",
        }
    }

    /// Field name under which a rendered element carries its component
    pub fn element_field(self) -> &'static str {
        match self {
            Self::Text => "text_component",
            Self::Question => "question_component",
            Self::FillText => "fill_text_component",
            Self::PutInOrder => "put_in_order_component",
            Self::Matching => "matching_component",
            Self::Audio => "audio_component",
            Self::Image => "image_component",
            Self::Video => "video_component",
            Self::RecordAudio => "record_audio_component",
            Self::BlueCard => "blue_card_component",
        }
    }

    /// Table holding the component rows
    pub fn table(self) -> &'static str {
        match self {
            Self::Text => "text_components",
            Self::Question => "question_components",
            Self::FillText => "fill_text_components",
            Self::PutInOrder => "put_in_order_components",
            Self::Matching => "matching_components",
            Self::Audio => "audio_components",
            Self::Image => "image_components",
            Self::Video => "video_components",
            Self::RecordAudio => "record_audio_components",
            Self::BlueCard => "blue_card_components",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ComponentType {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.tag() == s)
            .ok_or_else(|| EditorError::UnknownComponentType(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextComponent {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionComponent {
    pub text: String,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Answer {
    #[serde(alias = "item_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillTextComponent {
    pub title: String,
    pub put_words: bool,
    pub lines: Vec<FillTextLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillTextLine {
    #[serde(alias = "item_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub text_before: String,
    pub answer: String,
    pub text_after: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PutInOrderComponent {
    pub title: String,
    pub elements: Vec<OrderItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderItem {
    #[serde(alias = "item_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingComponent {
    pub title: String,
    pub elements: Vec<MatchingElement>,
    pub couples: Vec<MatchingCouple>,
}

/// Matching element, addressed by the client through `uid`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingElement {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub text: String,
    pub image_file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingCouple {
    pub first_element: String,
    pub second_element: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioComponent {
    pub title: String,
    pub audio: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageComponent {
    pub description: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoComponent {
    pub description: String,
    pub video_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordAudioComponent {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueCardComponent {
    pub title: String,
    pub text: String,
}

/// A validated component payload
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Text(TextComponent),
    Question(QuestionComponent),
    FillText(FillTextComponent),
    PutInOrder(PutInOrderComponent),
    Matching(MatchingComponent),
    Audio(AudioComponent),
    Image(ImageComponent),
    Video(VideoComponent),
    RecordAudio(RecordAudioComponent),
    BlueCard(BlueCardComponent),
}

impl Component {
    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::Text(_) => ComponentType::Text,
            Self::Question(_) => ComponentType::Question,
            Self::FillText(_) => ComponentType::FillText,
            Self::PutInOrder(_) => ComponentType::PutInOrder,
            Self::Matching(_) => ComponentType::Matching,
            Self::Audio(_) => ComponentType::Audio,
            Self::Image(_) => ComponentType::Image,
            Self::Video(_) => ComponentType::Video,
            Self::RecordAudio(_) => ComponentType::RecordAudio,
            Self::BlueCard(_) => ComponentType::BlueCard,
        }
    }

    /// JSON representation of the payload, without the row id
    pub fn to_value(&self) -> Value {
        let value = match self {
            Self::Text(c) => serde_json::to_value(c),
            Self::Question(c) => serde_json::to_value(c),
            Self::FillText(c) => serde_json::to_value(c),
            Self::PutInOrder(c) => serde_json::to_value(c),
            Self::Matching(c) => serde_json::to_value(c),
            Self::Audio(c) => serde_json::to_value(c),
            Self::Image(c) => serde_json::to_value(c),
            Self::Video(c) => serde_json::to_value(c),
            Self::RecordAudio(c) => serde_json::to_value(c),
            Self::BlueCard(c) => serde_json::to_value(c),
        };
        value.unwrap_or_default()
    }

    /// Representation including the component's row id
    pub fn represent(&self, id: i64) -> Value {
        let mut value = self.to_value();
        if let Value::Object(map) = &mut value {
            map.insert("id".to_string(), Value::from(id));
        }
        value
    }

    /// Like [`Component::represent`], with a public URL next to every stored file
    pub fn represent_with_urls(&self, id: i64, storage: &dyn FileStorage) -> Value {
        let mut value = self.represent(id);
        match self {
            Self::Image(c) => insert_url(&mut value, "image_url", c.image.as_deref(), storage),
            Self::Audio(c) => insert_url(&mut value, "audio_url", c.audio.as_deref(), storage),
            Self::Matching(c) => {
                if let Some(elements) = value.get_mut("elements").and_then(Value::as_array_mut) {
                    for (rendered, element) in elements.iter_mut().zip(&c.elements) {
                        insert_url(rendered, "image_url", element.image_file.as_deref(), storage);
                    }
                }
            }
            _ => {}
        }
        value
    }

    /// Stored files the payload points at, as `(field, key)` pairs
    pub fn file_refs(&self) -> Vec<(&'static str, &str)> {
        let (field, key) = match self {
            Self::Image(c) => ("image", c.image.as_deref()),
            Self::Audio(c) => ("audio", c.audio.as_deref()),
            _ => return Vec::new(),
        };
        key.filter(|k| !k.is_empty())
            .map(|k| (field, k))
            .into_iter()
            .collect()
    }
}

fn insert_url(value: &mut Value, field: &str, key: Option<&str>, storage: &dyn FileStorage) {
    if let Value::Object(map) = value {
        let url = key
            .filter(|k| !k.is_empty())
            .map(|k| Value::String(storage.url(k)))
            .unwrap_or(Value::Null);
        map.insert(field.to_string(), url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip_through_from_str() {
        for t in ComponentType::ALL {
            assert_eq!(t.tag().parse::<ComponentType>().unwrap(), t);
            assert_eq!(serde_json::to_value(t).unwrap(), t.tag());
        }
        assert!(matches!(
            "paragraph".parse::<ComponentType>(),
            Err(EditorError::UnknownComponentType(tag)) if tag == "paragraph"
        ));
    }

    #[test]
    fn test_element_fields_are_distinct() {
        let mut fields: Vec<_> = ComponentType::ALL.iter().map(|t| t.element_field()).collect();
        fields.sort();
        fields.dedup();
        assert_eq!(fields.len(), ComponentType::ALL.len());
    }

    #[test]
    fn test_represent_adds_id() {
        let component = Component::Text(TextComponent {
            title: "A".to_string(),
            text: "hi".to_string(),
        });
        let value = component.represent(7);
        assert_eq!(value["id"], 7);
        assert_eq!(value["text"], "hi");
        assert_eq!(component.component_type(), ComponentType::Text);
    }

    #[test]
    fn test_urls_are_rendered_next_to_keys() {
        let storage = crate::storage::LocalFileStorage::new("/tmp/unused", "/media");
        let image = Component::Image(ImageComponent {
            description: "cat".to_string(),
            image: Some("attachments/cat.png".to_string()),
        });
        let value = image.represent_with_urls(3, &storage);
        assert_eq!(value["image"], "attachments/cat.png");
        assert_eq!(value["image_url"], "/media/attachments/cat.png");
        assert_eq!(image.file_refs(), vec![("image", "attachments/cat.png")]);

        let matching = Component::Matching(MatchingComponent {
            title: "Pairs".to_string(),
            elements: vec![
                MatchingElement {
                    uid: "a".to_string(),
                    image_file: Some("matching/a.png".to_string()),
                    ..MatchingElement::default()
                },
                MatchingElement {
                    uid: "b".to_string(),
                    ..MatchingElement::default()
                },
            ],
            couples: Vec::new(),
        });
        let value = matching.represent_with_urls(4, &storage);
        assert_eq!(value["elements"][0]["image_url"], "/media/matching/a.png");
        assert!(value["elements"][1]["image_url"].is_null());
        assert!(matching.file_refs().is_empty());
    }

    #[test]
    fn test_sub_item_id_accepts_item_id_alias() {
        let answer: Answer = serde_json::from_value(serde_json::json!({
            "item_id": 4, "text": "yes", "is_correct": true
        }))
        .unwrap();
        assert_eq!(answer.id, Some(4));
    }
}
