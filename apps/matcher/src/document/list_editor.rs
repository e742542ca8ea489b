//! Positional CRUD over repeated document sections.
//!
//! Items are addressed by index only. An index captured before a structural
//! edit (add/remove) may point at a different item afterwards; callers
//! serialize edits through one working copy at a time.

use serde::Deserialize;
use serde_json::Value;

use crate::document::EditError;

#[derive(Debug, Clone, PartialEq)]
pub struct ListEditor<T> {
    items: Vec<T>,
}

impl<T> ListEditor<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn add(&mut self, record: T) {
        self.items.push(record);
    }

    pub fn update(&mut self, index: usize, record: T) -> Result<(), EditError> {
        let len = self.items.len();
        let slot = self
            .items
            .get_mut(index)
            .ok_or(EditError::IndexOutOfRange { index, len })?;
        *slot = record;
        Ok(())
    }

    /// Removes the item at `index`, shifting later items down by one.
    pub fn remove(&mut self, index: usize) -> Result<T, EditError> {
        if index >= self.items.len() {
            return Err(EditError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl ListEditor<Value> {
    /// Starts from a section value; anything other than a list starts empty.
    pub fn from_section(section: Option<&Value>) -> Self {
        match section {
            Some(Value::Array(items)) => Self::new(items.clone()),
            _ => Self::new(Vec::new()),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Array(self.items)
    }
}

/// One list operation, as sent by a section editor.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ListEdit {
    /// Appends the record, or the section's default record when `None`.
    Add(Option<Value>),
    Update { index: usize, record: Value },
    Remove { index: usize },
}

impl ListEdit {
    pub fn apply_to(
        self,
        editor: &mut ListEditor<Value>,
        default_record: impl FnOnce() -> Value,
    ) -> Result<(), EditError> {
        match self {
            ListEdit::Add(record) => {
                editor.add(record.unwrap_or_else(default_record));
                Ok(())
            }
            ListEdit::Update { index, record } => editor.update(index, record),
            ListEdit::Remove { index } => editor.remove(index).map(|_| ()),
        }
    }
}
