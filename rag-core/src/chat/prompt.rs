//! Deterministic system-prompt construction
//!
//! Fuses the base directive, the retrieved context block, and the recent
//! conversation into the prompt handed to a worker. Assembly without
//! retrieved context is an error: the orchestrator must not consult the
//! LLM when retrieval came back empty.

use crate::error::{Error, Result};

/// Assemble the final system prompt.
///
/// # Errors
///
/// Returns `Error::BadRequest` when `retrieved_context` is `None`.
pub fn assemble(
    base_directive: &str,
    retrieved_context: Option<&str>,
    rendered_conversation: &str,
) -> Result<String> {
    let context = retrieved_context.ok_or_else(|| {
        Error::BadRequest("prompt assembly requires retrieved context".to_string())
    })?;

    let mut prompt = format!(
        "{base_directive}\n\
         === CONTEXT (Use ONLY this information) ===\n\
         {context}\n\
         === END OF CONTEXT ==="
    );

    if !rendered_conversation.is_empty() {
        prompt.push_str(&format!(
            "\n=== RECENT CONVERSATION ===\n{rendered_conversation}\n=== END OF CONVERSATION ==="
        ));
    }

    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::prompts;

    #[test]
    fn test_assemble_without_conversation() {
        let prompt = assemble(prompts::BASE_DIRECTIVE, Some("Roll 2d6."), "").unwrap();
        assert!(prompt.starts_with(prompts::BASE_DIRECTIVE));
        assert!(prompt.contains("=== CONTEXT (Use ONLY this information) ===\nRoll 2d6."));
        assert!(prompt.ends_with("=== END OF CONTEXT ==="));
        assert!(!prompt.contains("RECENT CONVERSATION"));
    }

    #[test]
    fn test_assemble_with_conversation() {
        let prompt = assemble(
            prompts::BASE_DIRECTIVE,
            Some("Roll 2d6."),
            "[user] How do I attack?",
        )
        .unwrap();
        assert!(prompt.contains("=== RECENT CONVERSATION ===\n[user] How do I attack?"));
        assert!(prompt.ends_with("=== END OF CONVERSATION ==="));
    }

    #[test]
    fn test_assemble_fails_without_context() {
        assert!(matches!(
            assemble(prompts::BASE_DIRECTIVE, None, ""),
            Err(Error::BadRequest(_))
        ));
    }
}
