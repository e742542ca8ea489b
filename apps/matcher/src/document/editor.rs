//! Working-copy editor for JD and CV documents.
//!
//! An editor owns a private clone of the canonical document. Edits never
//! reach the canonical model until the owner takes the result back with
//! `into_document`; dropping the editor cancels every edit it holds.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::document::list_editor::{ListEdit, ListEditor};
use crate::document::path_editor;
use crate::document::{DocumentModel, EditError, FieldPath};

/// Repeated sections of a CV and the blank record each one starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvSection {
    Experiences,
    Education,
    Projects,
    Skills,
}

impl CvSection {
    pub const ALL: [CvSection; 4] = [
        CvSection::Experiences,
        CvSection::Education,
        CvSection::Projects,
        CvSection::Skills,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CvSection::Experiences => "Experiences",
            CvSection::Education => "Education",
            CvSection::Projects => "Projects",
            CvSection::Skills => "Skills",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }

    pub fn default_record(self) -> Value {
        match self {
            CvSection::Experiences => json!({
                "jobTitle": "", "company": "", "location": "",
                "startDate": "", "endDate": "",
                "description": [], "technologiesUsed": []
            }),
            CvSection::Education => json!({
                "institution": "", "degree": "", "fieldOfStudy": "",
                "startDate": "", "endDate": "", "grade": "", "description": ""
            }),
            CvSection::Projects => json!({
                "projectName": "", "description": "", "technologiesUsed": [],
                "link": "", "startDate": "", "endDate": ""
            }),
            CvSection::Skills => json!({ "category": "", "skillName": "" }),
        }
    }
}

/// Blank record for a list at `path`: a CV section record, or an empty
/// string for plain string lists such as `keyResponsibilities`.
fn default_record_for(path: &FieldPath) -> Value {
    match path.segments() {
        [key] => CvSection::from_key(key)
            .map(CvSection::default_record)
            .unwrap_or_else(|| Value::String(String::new())),
        _ => Value::String(String::new()),
    }
}

/// A single edit addressed at a working copy.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DocumentEdit {
    Set { path: FieldPath, value: Value },
    List { path: FieldPath, edit: ListEdit },
}

#[derive(Debug, Clone)]
pub struct DocumentEditor {
    working: DocumentModel,
}

impl DocumentEditor {
    pub fn open(canonical: &DocumentModel) -> Self {
        Self {
            working: canonical.clone(),
        }
    }

    pub fn document(&self) -> &DocumentModel {
        &self.working
    }

    pub fn read(&self, path: &FieldPath) -> Option<&Value> {
        path_editor::read(&self.working, path)
    }

    pub fn set(&mut self, path: &FieldPath, value: Value) {
        self.working = path_editor::apply(&self.working, path, value);
    }

    /// Runs one list operation against the list at `path`.
    pub fn edit_list(&mut self, path: &FieldPath, edit: ListEdit) -> Result<(), EditError> {
        let mut list = ListEditor::from_section(self.read(path));
        edit.apply_to(&mut list, || default_record_for(path))?;
        self.set(path, list.into_value());
        Ok(())
    }

    pub fn add_record(&mut self, section: CvSection) {
        let path = FieldPath::from_key(section.key());
        let mut list = ListEditor::from_section(self.read(&path));
        list.add(section.default_record());
        self.set(&path, list.into_value());
    }

    pub fn apply(&mut self, edit: DocumentEdit) -> Result<(), EditError> {
        match edit {
            DocumentEdit::Set { path, value } => {
                self.set(&path, value);
                Ok(())
            }
            DocumentEdit::List { path, edit } => self.edit_list(&path, edit),
        }
    }

    pub fn into_document(self) -> DocumentModel {
        self.working
    }
}
