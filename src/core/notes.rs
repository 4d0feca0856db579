//! Note model and its JSON document form.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::registry::NoteWindow;
use crate::shared::error::AppResult;
use crate::shared::types::{NoteId, Position, Size};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Category properties used when neither the note's category nor the default
/// category defines one.
pub fn fallback_property(prop: &str) -> Option<Value> {
    match prop {
        "bgcolor_hsv" => Some(serde_json::json!([48.0 / 360.0, 1.0, 1.0])),
        "textcolor" => Some(serde_json::json!([32.0 / 255.0, 32.0 / 255.0, 32.0 / 255.0])),
        "font" => Some(Value::String(String::new())),
        "shadow" => Some(Value::from(60)),
        _ => None,
    }
}

// ============================================================================
// Document (on-disk form)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteDocument {
    #[serde(default)]
    pub notes: Vec<NoteRecord>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub categories: BTreeMap<String, Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteRecord {
    #[serde(default)]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<NoteProperties>,
    #[serde(default)]
    pub cat: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteProperties {
    #[serde(default, deserialize_with = "pair", skip_serializing_if = "Option::is_none")]
    pub position: Option<[i32; 2]>,
    #[serde(default, deserialize_with = "pair", skip_serializing_if = "Option::is_none")]
    pub size: Option<[i32; 2]>,
    #[serde(default)]
    pub locked: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Older files store coordinates as floats.
fn pair<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[i32; 2]>, D::Error> {
    let raw: Option<Vec<f64>> = Option::deserialize(d)?;
    Ok(raw.and_then(|v| match v.as_slice() {
        [a, b, ..] => Some([*a as i32, *b as i32]),
        _ => None,
    }))
}

// ============================================================================
// Note
// ============================================================================

#[derive(Debug)]
pub struct Note {
    pub id: NoteId,
    pub body: String,
    pub category: String,
    pub last_modified: NaiveDateTime,
    pub locked: bool,
    /// Last known position, from the saved file or the latest geometry sync.
    pub position: Option<Position>,
    /// Last known size.
    pub size: Option<Size>,
    pub extra: Map<String, Value>,
    /// GUI state; `None` until the note is first shown.
    pub window: Option<NoteWindow>,
}

impl Note {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            id: NoteId::generate(),
            body: String::new(),
            category: category.into(),
            last_modified: Local::now().naive_local(),
            locked: false,
            position: None,
            size: None,
            extra: Map::new(),
            window: None,
        }
    }

    fn from_record(record: NoteRecord) -> Self {
        let id = if record.uuid.is_empty() {
            NoteId::generate()
        } else {
            NoteId::from(record.uuid)
        };
        let last_modified = record
            .last_modified
            .as_deref()
            .and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok())
            .unwrap_or_else(|| Local::now().naive_local());

        let properties = record.properties.unwrap_or_default();

        Self {
            id,
            body: record.body.unwrap_or_default(),
            category: record.cat,
            last_modified,
            locked: properties.locked,
            position: properties.position.map(|[x, y]| Position::new(x, y)),
            size: properties.size.map(|[w, h]| Size::new(w, h)),
            extra: properties.extra,
            window: None,
        }
    }

    fn to_record(&self) -> NoteRecord {
        NoteRecord {
            uuid: self.id.to_string(),
            body: Some(self.body.clone()),
            last_modified: Some(self.last_modified.format(TIMESTAMP_FORMAT).to_string()),
            properties: Some(NoteProperties {
                position: self.position.map(|p| [p.x, p.y]),
                size: self.size.map(|s| [s.width, s.height]),
                locked: self.locked,
                extra: self.extra.clone(),
            }),
            cat: self.category.clone(),
        }
    }

    /// Take over whatever an imported record carries, keeping the identity
    /// and any live window.
    fn absorb_record(&mut self, record: NoteRecord) {
        if let Some(body) = record.body {
            self.body = body;
        }
        if let Some(properties) = record.properties {
            self.locked = properties.locked;
            self.position = properties.position.map(|[x, y]| Position::new(x, y));
            self.size = properties.size.map(|[w, h]| Size::new(w, h));
            self.extra = properties.extra;
        }
        self.category = record.cat;
    }

    pub fn update_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
        self.last_modified = Local::now().naive_local();
    }

    pub fn is_visible(&self) -> bool {
        self.window.as_ref().is_some_and(NoteWindow::is_live)
    }
}

// ============================================================================
// NoteSet
// ============================================================================

#[derive(Debug, Default)]
pub struct NoteSet {
    notes: Vec<Note>,
    pub properties: Map<String, Value>,
    pub categories: BTreeMap<String, Map<String, Value>>,
}

impl NoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(doc: NoteDocument) -> Self {
        Self {
            notes: doc.notes.into_iter().map(Note::from_record).collect(),
            properties: doc.properties,
            categories: doc.categories,
        }
    }

    pub fn to_document(&self) -> NoteDocument {
        NoteDocument {
            notes: self.notes.iter().map(Note::to_record).collect(),
            properties: self.properties.clone(),
            categories: self.categories.clone(),
        }
    }

    pub fn loads(raw: &str) -> AppResult<Self> {
        let doc: NoteDocument = serde_json::from_str(raw)?;
        Ok(Self::from_document(doc))
    }

    pub fn dumps(&self) -> AppResult<String> {
        Ok(serde_json::to_string(&self.to_document())?)
    }

    /// Add a note in the default category and return its id.
    pub fn create(&mut self) -> NoteId {
        let note = Note::new(self.default_category().unwrap_or_default());
        let id = note.id.clone();
        self.notes.push(note);
        id
    }

    pub fn insert(&mut self, note: Note) -> NoteId {
        let id = note.id.clone();
        self.notes.push(note);
        id
    }

    pub fn remove(&mut self, id: &NoteId) -> Option<Note> {
        let idx = self.notes.iter().position(|n| &n.id == id)?;
        Some(self.notes.remove(idx))
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| &n.id == id)
    }

    pub fn get_mut(&mut self, id: &NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| &n.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Note> {
        self.notes.iter_mut()
    }

    pub fn ids(&self) -> Vec<NoteId> {
        self.notes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn all_visible(&self) -> bool {
        self.properties
            .get("all_visible")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_all_visible(&mut self, visible: bool) {
        self.properties
            .insert("all_visible".to_string(), Value::Bool(visible));
    }

    pub fn default_category(&self) -> Option<String> {
        self.properties
            .get("default_cat")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }

    pub fn has_category(&self, cat: &str) -> bool {
        self.categories.contains_key(cat)
    }

    /// Look up a category property. An empty category means the default
    /// category; a missing category or property falls back to built-ins.
    pub fn category_property(&self, cat: &str, prop: &str) -> Option<Value> {
        let cat = if cat.is_empty() {
            self.default_category()
        } else {
            Some(cat.to_string())
        };

        cat.and_then(|c| self.categories.get(&c))
            .and_then(|props| props.get(prop).cloned())
            .or_else(|| fallback_property(prop))
    }

    /// Import another document: categories are merged, notes with a known
    /// uuid are updated in place and the rest appended.
    pub fn merge(&mut self, raw: &str) -> AppResult<usize> {
        let doc: NoteDocument = serde_json::from_str(raw)?;
        Ok(self.merge_document(doc))
    }

    pub fn merge_document(&mut self, doc: NoteDocument) -> usize {
        self.categories.extend(doc.categories);

        let mut added = 0;
        for record in doc.notes {
            let existing = (!record.uuid.is_empty())
                .then(|| NoteId::from(record.uuid.as_str()))
                .and_then(|id| self.get_mut(&id));
            match existing {
                Some(note) => note.absorb_record(record),
                None => {
                    self.notes.push(Note::from_record(record));
                    added += 1;
                }
            }
        }
        added
    }
}
