//! Categorical label ↔ integer code registry.
//!
//! Codes are assigned by sorted lexical order of the distinct labels, so the
//! persisted form is just the sorted label list.

use serde::{Deserialize, Serialize};

use crate::error::{IbfError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    /// Column this encoder was fitted on, used in error messages.
    field: String,
    /// Distinct labels, sorted; index is the code.
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on every label observed for `field`.
    pub fn fit<I, S>(field: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(|s| s.as_ref().to_owned()).collect();
        classes.sort();
        classes.dedup();
        Self { field: field.to_owned(), classes }
    }

    /// Rebuild from a persisted class list, which must already be sorted and unique.
    pub fn from_classes(field: &str, classes: Vec<String>) -> Result<Self> {
        if classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(IbfError::Config(format!(
                "{field} encoder classes must be strictly sorted, got {classes:?}"
            )));
        }
        Ok(Self { field: field.to_owned(), classes })
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| IbfError::UnknownCategory {
                field: self.field.clone(),
                label: label.to_owned(),
            })
    }

    pub fn decode(&self, code: usize) -> Result<&str> {
        self.classes.get(code).map(String::as_str).ok_or_else(|| IbfError::CodeOutOfRange {
            field: self.field.clone(),
            code,
            len: self.classes.len(),
        })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.encode(label).is_ok()
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
