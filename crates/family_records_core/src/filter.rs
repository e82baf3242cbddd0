//! crates/family_records_core/src/filter.rs
//!
//! Document browsing filters for the member detail view.

use crate::domain::Document;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// All predicates are optional and combined with AND. Blank strings are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFilter {
    /// Case-insensitive substring searched across condition, file name and description.
    pub text: Option<String>,
    pub condition: Option<String>,
    pub mime_type: Option<String>,
    /// Inclusive lower bound on the upload date.
    pub uploaded_from: Option<NaiveDate>,
    /// Inclusive upper bound on the upload date.
    pub uploaded_to: Option<NaiveDate>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl DocumentFilter {
    pub fn matches(&self, document: &Document) -> bool {
        if let Some(text) = non_blank(&self.text) {
            let haystack = format!(
                "{} {} {}",
                document.condition,
                document.file_name,
                document.description.as_deref().unwrap_or_default()
            )
            .to_lowercase();
            if !haystack.contains(&text.to_lowercase()) {
                return false;
            }
        }

        if let Some(condition) = non_blank(&self.condition) {
            if document.condition != condition {
                return false;
            }
        }

        if let Some(mime_type) = non_blank(&self.mime_type) {
            if document.mime_type != mime_type {
                return false;
            }
        }

        let uploaded_on = document.created_at.date_naive();
        if self.uploaded_from.is_some_and(|from| uploaded_on < from) {
            return false;
        }
        if self.uploaded_to.is_some_and(|to| uploaded_on > to) {
            return false;
        }

        true
    }

    /// Keeps the documents that satisfy every predicate, preserving order.
    pub fn apply<'a>(&self, documents: &'a [Document]) -> Vec<&'a Document> {
        documents.iter().filter(|d| self.matches(d)).collect()
    }
}

/// Choices offered by the condition and MIME-type dropdowns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub conditions: Vec<String>,
    pub mime_types: Vec<String>,
}

impl FilterOptions {
    pub fn from_documents(documents: &[Document]) -> Self {
        let conditions: BTreeSet<&str> = documents.iter().map(|d| d.condition.as_str()).collect();
        let mime_types: BTreeSet<&str> = documents.iter().map(|d| d.mime_type.as_str()).collect();
        Self {
            conditions: conditions.into_iter().map(String::from).collect(),
            mime_types: mime_types.into_iter().map(String::from).collect(),
        }
    }
}
