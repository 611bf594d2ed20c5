//! Explicit commands and tool-selection replies.
//!
//! Users address a mode or a tool with a leading `/word`; the router model
//! answers with `name(argument), name2(argument2)` or `none`. Both parsers
//! are permissive: anything they do not recognize is simply absent.
//!
//! Command words follow Unicode word characters, so `/météo` is one word.

use parley_core::tool::{ToolInvocationResult, ToolRegistry};
use regex_lite::Regex;
use std::sync::LazyLock;

/// `name(argument)` at the very start of a segment; trailing text is ignored.
static TOOL_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)\s*\(([^)]*)\)").expect("Invalid tool call regex")
});

/// A user input split into an optional command key and the remaining text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInput {
    /// Lowercased command word, without the `/`
    pub command: Option<String>,
    /// Trimmed text after the command (or the whole trimmed input)
    pub rest: String,
}

/// Split `/cmd rest` into `(Some("cmd"), "rest")`.
///
/// Input without a leading `/word` yields `(None, trimmed_input)`.
pub fn parse_command(input: &str) -> ParsedInput {
    let trimmed = input.trim();
    if let Some(body) = trimmed.strip_prefix('/') {
        let end = body
            .find(|c: char| !is_word_char(c))
            .unwrap_or(body.len());
        if end > 0 {
            return ParsedInput {
                command: Some(body[..end].to_lowercase()),
                rest: body[end..].trim().to_string(),
            };
        }
    }
    ParsedInput {
        command: None,
        rest: trimmed.to_string(),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Parse a router reply into `(tool_name, argument)` pairs, in reply order.
///
/// The reply is split on top-level commas. A segment counts when it starts
/// with `name(argument)` or is exactly a tool name (a zero-argument call).
/// Names are lowercased and kept only if registered. Duplicates are kept.
pub fn parse_tool_selections(reply: &str, registry: &ToolRegistry) -> Vec<(String, String)> {
    let reply = reply.trim();
    if reply.is_empty() || reply.eq_ignore_ascii_case("none") {
        return Vec::new();
    }

    split_segments(reply)
        .into_iter()
        .filter_map(|segment| {
            let segment = segment.trim();
            let (name, argument) = match TOOL_CALL.captures(segment) {
                Some(captures) => (
                    captures.get(1)?.as_str().to_lowercase(),
                    captures.get(2).map_or("", |m| m.as_str()).trim().to_string(),
                ),
                None => (segment.to_lowercase(), String::new()),
            };
            registry.get(&name)?;
            Some((name, argument))
        })
        .collect()
}

/// Split on commas outside parentheses, so `get_weather(Paris, France)` stays whole.
fn split_segments(reply: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (index, c) in reply.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                segments.push(&reply[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    segments.push(&reply[start..]);
    segments
}

/// Fold tool facts into the user's text.
///
/// Facts come first, introduced as retrieved data rather than something the
/// user said. Without facts the text is returned unchanged.
pub fn enrich_prompt(original: &str, results: &[ToolInvocationResult]) -> String {
    if results.is_empty() {
        return original.to_string();
    }

    let facts: Vec<serde_json::Value> = results
        .iter()
        .map(|r| {
            let mut fact = serde_json::Map::new();
            fact.insert(r.tool_name.clone(), serde_json::Value::String(r.content.clone()));
            serde_json::Value::Object(fact)
        })
        .collect();
    let facts = serde_json::to_string(&facts).unwrap_or_default();

    format!(
        "[FACTS]\nData retrieved by tools for this request (not written by the user):\n{facts}\n[/FACTS]\n\n[PROMPT]\n{original}\n[/PROMPT]"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::tool::Tool;
    use std::sync::Arc;

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "test tool"
        }
        async fn execute(&self, argument: &str) -> ToolInvocationResult {
            ToolInvocationResult::new(self.0, argument)
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(NamedTool("get_weather")));
        registry.register(Arc::new(NamedTool("datetime")));
        registry
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
    }

    #[test]
    fn command_with_rest() {
        let parsed = parse_command("/summary focus on the budget");
        assert_eq!(parsed.command.as_deref(), Some("summary"));
        assert_eq!(parsed.rest, "focus on the budget");
    }

    #[test]
    fn bare_command() {
        let parsed = parse_command("/cmd");
        assert_eq!(parsed.command.as_deref(), Some("cmd"));
        assert_eq!(parsed.rest, "");
    }

    #[test]
    fn no_command_marker() {
        let parsed = parse_command("  Bonjour  ");
        assert_eq!(parsed.command, None);
        assert_eq!(parsed.rest, "Bonjour");
    }

    #[test]
    fn command_is_lowercased_and_multiline_rest_kept() {
        let parsed = parse_command("  /METEO  Agadir\nplease ");
        assert_eq!(parsed.command.as_deref(), Some("meteo"));
        assert_eq!(parsed.rest, "Agadir\nplease");
    }

    #[test]
    fn slash_without_word_is_not_a_command() {
        let parsed = parse_command("/ hello");
        assert_eq!(parsed.command, None);
        assert_eq!(parsed.rest, "/ hello");
    }

    #[test]
    fn accented_command_word_stays_whole() {
        let parsed = parse_command("/météo Paris");
        assert_eq!(parsed.command.as_deref(), Some("météo"));
        assert_eq!(parsed.rest, "Paris");

        let parsed = parse_command("/Été");
        assert_eq!(parsed.command.as_deref(), Some("été"));
        assert_eq!(parsed.rest, "");
    }

    #[test]
    fn punctuation_after_command_word_goes_to_rest() {
        let parsed = parse_command("/summary: budget");
        assert_eq!(parsed.command.as_deref(), Some("summary"));
        assert_eq!(parsed.rest, ": budget");
    }

    #[test]
    fn selections_in_order() {
        let selections = parse_tool_selections("get_weather(Paris), datetime()", &registry());
        assert_eq!(selections, pairs(&[("get_weather", "Paris"), ("datetime", "")]));
    }

    #[test]
    fn none_means_no_tools() {
        assert!(parse_tool_selections("none", &registry()).is_empty());
        assert!(parse_tool_selections("  NONE ", &registry()).is_empty());
        assert!(parse_tool_selections("", &registry()).is_empty());
    }

    #[test]
    fn unknown_names_are_dropped() {
        let selections = parse_tool_selections("web_search(rust), datetime()", &registry());
        assert_eq!(selections, pairs(&[("datetime", "")]));
    }

    #[test]
    fn bare_names_and_case() {
        let selections = parse_tool_selections("DateTime, Get_Weather( Lyon )", &registry());
        assert_eq!(selections, pairs(&[("datetime", ""), ("get_weather", "Lyon")]));
    }

    #[test]
    fn duplicates_are_kept() {
        let selections = parse_tool_selections("get_weather(Paris), get_weather(Paris)", &registry());
        assert_eq!(selections.len(), 2);
    }

    #[test]
    fn argument_may_contain_commas() {
        let selections = parse_tool_selections("get_weather(Paris, France)", &registry());
        assert_eq!(selections, pairs(&[("get_weather", "Paris, France")]));
    }

    #[test]
    fn tool_names_inside_prose_are_not_calls() {
        let selections = parse_tool_selections("Sure, I would not call datetime here.", &registry());
        assert!(selections.is_empty());
    }

    #[test]
    fn trailing_prose_after_a_call_is_ignored() {
        let selections = parse_tool_selections(
            "get_weather(Paris) since get_weather is relevant",
            &registry(),
        );
        assert_eq!(selections, pairs(&[("get_weather", "Paris")]));
    }

    #[test]
    fn unclosed_call_is_dropped() {
        let selections = parse_tool_selections("datetime(), get_weather(Paris", &registry());
        assert_eq!(selections, pairs(&[("datetime", "")]));
    }

    #[test]
    fn segments_split_outside_parentheses_only() {
        assert_eq!(
            split_segments("a(x, y), b, c()"),
            vec!["a(x, y)", " b", " c()"]
        );
    }

    #[test]
    fn enrichment_wraps_facts_and_prompt() {
        let results = vec![
            ToolInvocationResult::new("get_weather", "21°C in Paris"),
            ToolInvocationResult::new("datetime", "Tuesday"),
        ];
        let enriched = enrich_prompt("/meteo Paris", &results);
        assert!(enriched.starts_with("[FACTS]\n"));
        assert!(enriched.contains(r#"[{"get_weather":"21°C in Paris"},{"datetime":"Tuesday"}]"#));
        assert!(enriched.ends_with("[PROMPT]\n/meteo Paris\n[/PROMPT]"));
        let facts_at = enriched.find("[FACTS]").unwrap();
        let prompt_at = enriched.find("[PROMPT]").unwrap();
        assert!(facts_at < prompt_at);
    }

    #[test]
    fn no_facts_leaves_text_alone() {
        assert_eq!(enrich_prompt("hello", &[]), "hello");
    }
}
