//! Core types for suggestion rows and source identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of the source that produced a suggestion row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId {
    /// Unique source name.
    pub name: String,
    /// Whether this source provides web search suggestions.
    pub is_web: bool,
}

impl SourceId {
    /// Identity of a non-web source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_web: false,
        }
    }

    /// Identity of a web suggestion source.
    pub fn web(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_web: true,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// What happens when a suggestion is clicked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntentPayload {
    /// Action name, e.g. `"search"` or `"view"`.
    pub action: String,
    /// Data URI the action applies to.
    pub data: Option<String>,
    /// Query passed along with the action.
    pub query: Option<String>,
    /// Opaque source-specific extra data.
    pub extra_data: Option<String>,
}

/// One candidate suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRow {
    /// The source that produced this row.
    pub source: SourceId,
    /// Corpus the row was delivered through, if known.
    #[serde(default)]
    pub corpus: Option<String>,
    /// Primary display text.
    pub text1: String,
    /// Secondary display text.
    #[serde(default)]
    pub text2: Option<String>,
    /// Secondary display text shown as a URL.
    #[serde(default)]
    pub text2_url: Option<String>,
    /// Left icon reference.
    #[serde(default)]
    pub icon1: Option<String>,
    /// Right icon reference.
    #[serde(default)]
    pub icon2: Option<String>,
    /// Action payload.
    #[serde(default)]
    pub intent: IntentPayload,
    /// Stable id used to refresh this row when it is shown as a shortcut.
    #[serde(default)]
    pub shortcut_id: Option<String>,
    /// Whether this row came from click history rather than a live query.
    #[serde(default)]
    pub is_shortcut: bool,
}

impl SuggestionRow {
    /// Creates a row with the given primary text and a default search intent.
    pub fn new(source: SourceId, text1: impl Into<String>) -> Self {
        let text1 = text1.into();
        Self {
            source,
            corpus: None,
            intent: IntentPayload {
                action: "search".to_owned(),
                data: None,
                query: Some(text1.clone()),
                extra_data: None,
            },
            text1,
            text2: None,
            text2_url: None,
            icon1: None,
            icon2: None,
            shortcut_id: None,
            is_shortcut: false,
        }
    }

    /// Sets the secondary text.
    #[must_use]
    pub fn with_text2(mut self, text2: impl Into<String>) -> Self {
        self.text2 = Some(text2.into());
        self
    }

    /// Replaces the action payload.
    #[must_use]
    pub fn with_intent(mut self, intent: IntentPayload) -> Self {
        self.intent = intent;
        self
    }

    /// Sets the shortcut id.
    #[must_use]
    pub fn with_shortcut_id(mut self, id: impl Into<String>) -> Self {
        self.shortcut_id = Some(id.into());
        self
    }

    /// Structural identity of the row's destination, used for de-duplication
    /// when two rows lead to the same place.
    pub fn intent_key(&self) -> String {
        format!(
            "{}#{}#{}",
            self.intent.action,
            self.intent.data.as_deref().unwrap_or(""),
            self.intent.query.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_row_searches_for_its_text() {
        let row = SuggestionRow::new(SourceId::web("google"), "rust");
        assert_eq!(row.intent.action, "search");
        assert_eq!(row.intent.query.as_deref(), Some("rust"));
        assert!(!row.is_shortcut);
        assert!(row.corpus.is_none());
    }

    #[test]
    fn intent_key_ignores_display_text() {
        let a = SuggestionRow::new(SourceId::new("apps"), "Maps");
        let mut b = a.clone().with_text2("Navigation");
        b.text1 = "Google Maps".into();
        assert_ne!(a.text1, b.text1);
        assert_eq!(a.intent_key(), b.intent_key());
    }

    #[test]
    fn intent_key_distinguishes_data() {
        let a = SuggestionRow::new(SourceId::new("contacts"), "Ann").with_intent(IntentPayload {
            action: "view".into(),
            data: Some("contact/1".into()),
            ..Default::default()
        });
        let b = a.clone().with_intent(IntentPayload {
            action: "view".into(),
            data: Some("contact/2".into()),
            ..Default::default()
        });
        assert_ne!(a.intent_key(), b.intent_key());
    }

    #[test]
    fn source_id_display_and_web_flag() {
        assert_eq!(SourceId::web("google").to_string(), "google");
        assert!(SourceId::web("google").is_web);
        assert!(!SourceId::new("apps").is_web);
    }

    #[test]
    fn row_deserializes_with_missing_optionals() {
        let json = r#"{"source":{"name":"apps","is_web":false},"text1":"Clock"}"#;
        let row: SuggestionRow = serde_json::from_str(json).expect("deserialize");
        assert_eq!(row.text1, "Clock");
        assert!(row.shortcut_id.is_none());
        assert_eq!(row.intent, IntentPayload::default());
    }
}
