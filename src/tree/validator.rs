//! Field validators
//!
//! A validator is a capability attached to a field. Validation queries feed
//! it a fresh list of acceptable items; the field's `data_valid` flag is the
//! result of asking it about the current text.

/// Capability for checking a field's text
pub trait Validator: Send {
    /// Check a value
    fn validate(&self, text: &str) -> bool;

    /// Replace the list of acceptable values (from a validation query)
    fn set_validation_list(&mut self, items: Vec<String>);
}

/// Accepts values found in a list.
///
/// An empty list accepts anything unless `required` is set, in which case
/// the empty string is always rejected.
#[derive(Debug, Clone, Default)]
pub struct ListValidator {
    items: Vec<String>,
    required: bool,
    case_sensitive: bool,
}

impl ListValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<String>) -> Self {
        ListValidator {
            items,
            ..Self::default()
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }
}

impl Validator for ListValidator {
    fn validate(&self, text: &str) -> bool {
        if text.is_empty() {
            return !self.required;
        }
        if self.items.is_empty() {
            return true;
        }
        if self.case_sensitive {
            self.items.iter().any(|item| item == text)
        } else {
            self.items.iter().any(|item| item.eq_ignore_ascii_case(text))
        }
    }

    fn set_validation_list(&mut self, items: Vec<String>) {
        self.items = items;
    }
}
