//! Form field rendering helpers shared by the checkout and back-office forms.

use verdora_core::FieldErrors;

/// One input with its current value and inline error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    /// Input type: `text`, `email`, `tel`, `number`, `url` or `textarea`.
    pub kind: &'static str,
    pub value: String,
    pub error: Option<String>,
}

impl FieldView {
    #[must_use]
    pub fn new(
        name: &'static str,
        label: &'static str,
        kind: &'static str,
        value: impl Into<String>,
        errors: &FieldErrors,
    ) -> Self {
        Self {
            name,
            label,
            kind,
            value: value.into(),
            error: errors.get(name).map(str::to_owned),
        }
    }

    #[must_use]
    pub fn is_textarea(&self) -> bool {
        self.kind == "textarea"
    }
}

/// An option in a radio group or select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceView {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// A labelled select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectView {
    pub name: &'static str,
    pub label: &'static str,
    pub options: Vec<ChoiceView>,
}
