use rag_core::{ComposedPrompt, ConversationMessage, RagError, RagResult, Role};

/// Build the prompt sent to the generator.
///
/// The system instruction comes first, then every turn but the last, then
/// the last turn's text with `context` appended as a user message.
pub fn compose(
    system_prompt: &str,
    history: &[ConversationMessage],
    context: &str,
) -> RagResult<ComposedPrompt> {
    let (last, prior) = history
        .split_last()
        .ok_or_else(|| RagError::InvalidInput("conversation history is empty".to_string()))?;

    let synthesized = ConversationMessage::new(Role::User, format!("{}{}", last.content, context));

    Ok(ComposedPrompt::new(
        ConversationMessage::system(system_prompt),
        prior.to_vec(),
        synthesized,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_message() {
        let history = vec![ConversationMessage::user("Who teaches computer science well?")];
        let prompt = compose("sys", &history, "\n\nReturned Results:\nProfessor: Dr. Lee").unwrap();

        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt.system(), &ConversationMessage::system("sys"));
        assert_eq!(prompt.synthesized().role, Role::User);
        assert_eq!(
            prompt.synthesized().content,
            "Who teaches computer science well?\n\nReturned Results:\nProfessor: Dr. Lee"
        );
    }

    #[test]
    fn test_prior_turns_unchanged() {
        let history = vec![
            ConversationMessage::user("Hi"),
            ConversationMessage::assistant("Hello! How can I help?"),
            ConversationMessage::user("Any good physics professors?"),
        ];
        let prompt = compose("sys", &history, " ctx").unwrap();

        assert_eq!(prompt.len(), history.len() + 1);
        assert_eq!(&prompt.messages()[1..3], &history[..2]);
        assert_eq!(prompt.synthesized().content, "Any good physics professors? ctx");
        // The unaugmented question is superseded, not duplicated
        assert!(!prompt
            .messages()
            .iter()
            .any(|m| m.content == "Any good physics professors?"));
    }

    #[test]
    fn test_empty_context_leaves_question() {
        let history = vec![ConversationMessage::user("Who teaches CS?")];
        let prompt = compose("sys", &history, "").unwrap();
        assert_eq!(prompt.synthesized().content, "Who teaches CS?");
    }

    #[test]
    fn test_empty_history() {
        let result = compose("sys", &[], "context");
        assert!(matches!(result, Err(RagError::InvalidInput(_))));
    }
}
