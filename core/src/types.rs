use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of a conversation, oldest first in any history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Embedding of the active question
pub type QueryVector = Vec<f32>;

/// Metadata stored alongside an indexed review
///
/// The three fields the pipeline renders are optional and parsed leniently:
/// numbers and strings are accepted for any of them, and a value of any other
/// type reads as absent. Anything else the index returns is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub stars: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}

/// A record returned by a nearest-neighbour search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedRecord {
    pub id: String,
    #[serde(rename = "score")]
    pub similarity_score: f32,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

impl RetrievedRecord {
    pub fn new(id: impl Into<String>, similarity_score: f32, metadata: RecordMetadata) -> Self {
        Self {
            id: id.into(),
            similarity_score,
            metadata,
        }
    }
}

/// Ordered prompt handed to the generation service.
///
/// `new` places the system instruction first, the prior turns in their
/// original order, and the synthesized user message last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    messages: Vec<ConversationMessage>,
}

impl ComposedPrompt {
    pub fn new(
        system: ConversationMessage,
        prior_turns: Vec<ConversationMessage>,
        synthesized: ConversationMessage,
    ) -> Self {
        let mut messages = Vec::with_capacity(prior_turns.len() + 2);
        messages.push(system);
        messages.extend(prior_turns);
        messages.push(synthesized);
        Self { messages }
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn system(&self) -> &ConversationMessage {
        &self.messages[0]
    }

    /// The context-augmented question
    pub fn synthesized(&self) -> &ConversationMessage {
        &self.messages[self.messages.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
