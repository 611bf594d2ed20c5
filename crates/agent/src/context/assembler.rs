//! Context assembly: instructions, structured memory, recent turns and the
//! new input folded into one role-valid payload.
//!
//! The payload always has the same shape:
//!
//! 1. exactly one **system** entry: `[INSTRUCTIONS]`, then `[MEMORY]` (or the
//!    raw `[SUMMARY]` fallback when the stored memory does not parse)
//! 2. the recent turns, oldest first, with same-role neighbours merged
//! 3. the new input as the final **user** entry
//!
//! Assembly is deterministic: identical inputs always produce identical
//! outputs.

use parley_config::DEFAULT_SYSTEM_PROMPT;
use parley_core::memory::StructuredMemory;
use parley_core::message::{Role, Turn};
use parley_core::provider::ChatMessage;

/// Builds model payloads. Stateless apart from the fallback instructions.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    default_system_prompt: String,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl ContextAssembler {
    /// `default_system_prompt` is used whenever a conversation's own
    /// instructions are blank.
    pub fn new(default_system_prompt: impl Into<String>) -> Self {
        let prompt: String = default_system_prompt.into();
        let prompt = if prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT.to_string()
        } else {
            prompt
        };
        Self {
            default_system_prompt: prompt,
        }
    }

    pub fn assemble(
        &self,
        system_prompt: &str,
        memory: &str,
        recent_turns: &[Turn],
        new_input: &str,
    ) -> Vec<ChatMessage> {
        let mut payload = vec![ChatMessage::system(self.system_block(system_prompt, memory))];

        for turn in recent_turns {
            // Stored system turns would break the single-system-entry shape.
            if turn.role == Role::System {
                continue;
            }
            let content = turn.content.trim();
            if content.is_empty() {
                continue;
            }
            push_merged(&mut payload, turn.role, content);
        }

        push_merged(&mut payload, Role::User, new_input.trim());
        payload
    }

    fn system_block(&self, system_prompt: &str, memory: &str) -> String {
        let instructions = if system_prompt.trim().is_empty() {
            self.default_system_prompt.as_str()
        } else {
            system_prompt.trim()
        };

        let mut block = format!("[INSTRUCTIONS]\n{instructions}\n[/INSTRUCTIONS]");

        let memory = memory.trim();
        if !memory.is_empty() {
            block.push_str("\n\n");
            match StructuredMemory::parse(memory) {
                Some(parsed) => block.push_str(&render_memory(&parsed)),
                None => {
                    block.push_str("[SUMMARY]\n");
                    block.push_str(memory);
                    block.push_str("\n[/SUMMARY]");
                }
            }
        }

        block
    }
}

fn render_memory(memory: &StructuredMemory) -> String {
    let keywords = if memory.keywords.is_empty() {
        "N/A".to_string()
    } else {
        memory.keywords.join(", ")
    };
    format!(
        "[MEMORY]\nCONTEXT: {}\nKEYWORDS: {}\nTONE: {}\nDIRECTION: {}\n[/MEMORY]",
        memory.context, keywords, memory.tone, memory.direction
    )
}

/// Append `content` as a new entry, or newline-join it onto the last entry
/// when that entry has the same role.
fn push_merged(payload: &mut Vec<ChatMessage>, role: Role, content: &str) {
    match payload.last_mut() {
        Some(last) if last.role == role => {
            if !content.is_empty() {
                last.content.push('\n');
                last.content.push_str(content);
            }
        }
        _ => payload.push(ChatMessage::new(role, content)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMORY: &str = r#"{"context":"Planning a trip to Lisbon","keywords":["Lisbon","May"],"tone":"enthousiaste","direction":"book hotels"}"#;

    fn assert_shape(payload: &[ChatMessage]) {
        assert_eq!(payload[0].role, Role::System);
        assert_eq!(
            payload.iter().filter(|m| m.role == Role::System).count(),
            1,
            "exactly one system entry"
        );
        assert_eq!(payload.last().unwrap().role, Role::User);
        for pair in payload.windows(2) {
            assert_ne!(pair[0].role, pair[1].role, "adjacent entries share a role");
        }
    }

    #[test]
    fn minimal_payload() {
        let payload = ContextAssembler::default().assemble("Be terse.", "", &[], "  Hello  ");
        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0].content, "[INSTRUCTIONS]\nBe terse.\n[/INSTRUCTIONS]");
        assert_eq!(payload[1].content, "Hello");
        assert_shape(&payload);
    }

    #[test]
    fn blank_instructions_use_default() {
        let payload = ContextAssembler::new("You are Parley.").assemble("   ", "", &[], "hi");
        assert!(payload[0].content.contains("You are Parley."));
    }

    #[test]
    fn default_prompt_matches_configured_default() {
        let configured = parley_config::AppConfig::default().context.default_system_prompt;
        let payload = ContextAssembler::default().assemble("", "", &[], "hi");
        assert!(payload[0].content.contains(&configured));

        let payload = ContextAssembler::new("  ").assemble("", "", &[], "hi");
        assert!(payload[0].content.contains(&configured));
    }

    #[test]
    fn parsed_memory_is_rendered() {
        let payload = ContextAssembler::default().assemble("", MEMORY, &[], "hi");
        let system = &payload[0].content;
        assert!(system.contains("[MEMORY]"));
        assert!(system.contains("CONTEXT: Planning a trip to Lisbon"));
        assert!(system.contains("KEYWORDS: Lisbon, May"));
        assert!(system.contains("TONE: enthousiaste"));
        assert!(system.contains("DIRECTION: book hotels"));
        assert!(!system.contains("[SUMMARY]"));
    }

    #[test]
    fn empty_keywords_render_as_na() {
        let payload = ContextAssembler::default().assemble("", r#"{"context":"c"}"#, &[], "hi");
        assert!(payload[0].content.contains("KEYWORDS: N/A"));
    }

    #[test]
    fn unparseable_memory_falls_back_to_raw_summary() {
        let payload =
            ContextAssembler::default().assemble("", "the user likes trains", &[], "hi");
        assert!(payload[0].content.contains("[SUMMARY]\nthe user likes trains\n[/SUMMARY]"));
        assert!(!payload[0].content.contains("[MEMORY]"));
    }

    #[test]
    fn same_role_neighbours_are_merged() {
        let turns = vec![
            Turn::user("first question"),
            Turn::user("second question"),
            Turn::assistant("answer"),
        ];
        let payload = ContextAssembler::default().assemble("", "", &turns, "follow-up");
        assert_eq!(payload.len(), 4);
        assert_eq!(payload[1].content, "first question\nsecond question");
        assert_eq!(payload[3].content, "follow-up");
        assert_shape(&payload);
    }

    #[test]
    fn new_input_merges_into_trailing_user_turn() {
        let turns = vec![Turn::assistant("a"), Turn::user("unanswered")];
        let payload = ContextAssembler::default().assemble("", "", &turns, "again");
        assert_eq!(payload.len(), 3);
        assert_eq!(payload[2].content, "unanswered\nagain");
        assert_shape(&payload);
    }

    #[test]
    fn blank_turns_and_system_turns_are_skipped() {
        let turns = vec![
            Turn::assistant("   "),
            Turn::system("stray system turn"),
            Turn::assistant("kept"),
        ];
        let payload = ContextAssembler::default().assemble("", "", &turns, "q");
        assert_eq!(payload.len(), 3);
        assert_eq!(payload[1].content, "kept");
        assert_shape(&payload);
    }

    #[test]
    fn leading_assistant_turn_follows_system() {
        let turns = vec![Turn::assistant("hello!"), Turn::assistant("still me")];
        let payload = ContextAssembler::default().assemble("", "", &turns, "hey");
        assert_eq!(payload[1].role, Role::Assistant);
        assert_eq!(payload[1].content, "hello!\nstill me");
        assert_shape(&payload);
    }

    #[test]
    fn empty_input_still_ends_with_user_entry() {
        let turns = vec![Turn::user("q"), Turn::assistant("a")];
        let payload = ContextAssembler::default().assemble("", "", &turns, "   ");
        assert_shape(&payload);
        assert_eq!(payload.last().unwrap().content, "");
    }

    #[test]
    fn assembly_is_deterministic() {
        let turns = vec![Turn::user("q"), Turn::assistant("a")];
        let asm = ContextAssembler::default();
        assert_eq!(
            asm.assemble("s", MEMORY, &turns, "n"),
            asm.assemble("s", MEMORY, &turns, "n")
        );
    }
}
