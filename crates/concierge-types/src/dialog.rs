//! Dialog definition types: locales, intents, version snapshots, and aliases.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DialogError;
use crate::resource::PropertyValue;
use crate::unit::UnitId;

/// Parent signature of the built-in fallback intent.
pub const FALLBACK_INTENT_SIGNATURE: &str = "AMAZON.FallbackIntent";

/// Parent signature of the built-in knowledge-QnA intent.
pub const QNA_INTENT_SIGNATURE: &str = "AMAZON.QnAIntent";

/// A plain-text message sent back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub plain_text: String,
}

impl Message {
    pub fn plain_text(text: impl Into<String>) -> Self {
        Self {
            plain_text: text.into(),
        }
    }
}

/// One recognized conversational goal.
///
/// Utterance-driven intents carry sample utterances; built-in intents carry a
/// `parent_signature` and no utterances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    #[serde(default)]
    pub sample_utterances: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_response: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Intent {
    /// An utterance-driven intent.
    pub fn with_utterances<I, S>(name: impl Into<String>, utterances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            sample_utterances: utterances.into_iter().map(Into::into).collect(),
            parent_signature: None,
            closing_response: None,
            description: None,
        }
    }

    /// A built-in intent named after its parent signature.
    pub fn builtin(signature: impl Into<String>) -> Self {
        let signature = signature.into();
        Self {
            name: signature.clone(),
            sample_utterances: BTreeSet::new(),
            parent_signature: Some(signature),
            closing_response: None,
            description: None,
        }
    }

    /// Close the conversation immediately with a static message.
    pub fn closing_with(mut self, message: Message) -> Self {
        self.closing_response = Some(message);
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_builtin(&self) -> bool {
        self.parent_signature.is_some()
    }
}

/// A language-scoped dialog definition.
///
/// Intent names are unique within a locale and the confidence threshold lies
/// in `[0, 1]`; both are checked on construction and on every insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locale {
    locale_id: String,
    confidence_threshold: f64,
    intents: Vec<Intent>,
}

impl Locale {
    pub fn new(locale_id: impl Into<String>, confidence_threshold: f64) -> Result<Self, DialogError> {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(DialogError::InvalidConfidenceThreshold(confidence_threshold));
        }
        Ok(Self {
            locale_id: locale_id.into(),
            confidence_threshold,
            intents: Vec::new(),
        })
    }

    pub fn add_intent(&mut self, intent: Intent) -> Result<(), DialogError> {
        if self.intent(&intent.name).is_some() {
            return Err(DialogError::DuplicateIntent {
                locale: self.locale_id.clone(),
                intent: intent.name,
            });
        }
        self.intents.push(intent);
        Ok(())
    }

    /// Builder-style [`Locale::add_intent`].
    pub fn with_intent(mut self, intent: Intent) -> Result<Self, DialogError> {
        self.add_intent(intent)?;
        Ok(self)
    }

    pub fn remove_intent(&mut self, name: &str) -> Option<Intent> {
        let idx = self.intents.iter().position(|i| i.name == name)?;
        Some(self.intents.remove(idx))
    }

    pub fn locale_id(&self) -> &str {
        &self.locale_id
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    pub fn intent(&self, name: &str) -> Option<&Intent> {
        self.intents.iter().find(|i| i.name == name)
    }

    /// True when the locale delegates to knowledge retrieval through the
    /// built-in QnA intent.
    pub fn supports_knowledge(&self) -> bool {
        self.intents
            .iter()
            .any(|i| i.parent_signature.as_deref() == Some(QNA_INTENT_SIGNATURE))
    }
}

/// Number of an immutable bot version (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionRef(pub u32);

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable snapshot of a locale, taken at build time.
///
/// The locale is deep-copied on creation; later edits to the draft never
/// reach an existing version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotVersion {
    pub version: VersionRef,
    pub locale: Locale,
    pub created_from: UnitId,
    pub created_at: DateTime<Utc>,
}

/// Knowledge retrieval wired into one alias locale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeAssociation {
    pub locale_id: String,
    /// Usually [`PropertyValue::Input`] bound to the knowledge unit's export.
    pub knowledge_base_id: PropertyValue,
}

/// One generation of a published alias.
///
/// Rebinding never mutates a generation; it produces the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotAlias {
    pub name: String,
    pub generation: u32,
    pub version: VersionRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_association: Option<KnowledgeAssociation>,
    pub bound_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_rejects_out_of_range_threshold() {
        assert!(Locale::new("en_US", 1.5).is_err());
        assert!(Locale::new("en_US", -0.1).is_err());
        assert!(Locale::new("en_US", 0.0).is_ok());
        assert!(Locale::new("en_US", 1.0).is_ok());
    }

    #[test]
    fn test_locale_rejects_duplicate_intent() {
        let mut locale = Locale::new("en_US", 0.4).unwrap();
        locale
            .add_intent(Intent::with_utterances("WelcomeIntent", ["Hi"]))
            .unwrap();
        let err = locale
            .add_intent(Intent::with_utterances("WelcomeIntent", ["Hello"]))
            .unwrap_err();
        assert!(err.to_string().contains("WelcomeIntent"));
        assert_eq!(locale.intents().len(), 1);
    }

    #[test]
    fn test_builtin_intent_has_signature_and_no_utterances() {
        let intent = Intent::builtin(FALLBACK_INTENT_SIGNATURE);
        assert_eq!(intent.name, FALLBACK_INTENT_SIGNATURE);
        assert!(intent.is_builtin());
        assert!(intent.sample_utterances.is_empty());
    }

    #[test]
    fn test_supports_knowledge_requires_qna_intent() {
        let locale = Locale::new("en_US", 0.4)
            .unwrap()
            .with_intent(Intent::builtin(FALLBACK_INTENT_SIGNATURE))
            .unwrap();
        assert!(!locale.supports_knowledge());

        let locale = locale.with_intent(Intent::builtin(QNA_INTENT_SIGNATURE)).unwrap();
        assert!(locale.supports_knowledge());
    }

    #[test]
    fn test_remove_intent() {
        let mut locale = Locale::new("en_US", 0.4)
            .unwrap()
            .with_intent(Intent::with_utterances("A", ["a"]))
            .unwrap();
        assert!(locale.remove_intent("A").is_some());
        assert!(locale.remove_intent("A").is_none());
        assert!(locale.intents().is_empty());
    }
}
