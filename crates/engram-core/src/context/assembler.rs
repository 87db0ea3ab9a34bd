//! Budgeted context assembly.
//!
//! Budget allocation runs in a fixed reservation order, each stage
//! consuming from what remains: system instructions, tool outputs (capped
//! at a fraction of the budget), retrieved memories in retriever order,
//! then the live conversation tail. Every admitted item is whole; nothing
//! is truncated mid-item.

use engram_types::config::ContextConfig;
use engram_types::memory::ScoredMemory;
use engram_types::session::Message;
use engram_types::tool::ToolCall;
use tracing::debug;
use uuid::Uuid;

const SECTION_JOIN: &str = "\n\n";
const TOOL_HEADER: &str = "[Tool results]\n";
const MEMORY_HEADER: &str = "[Relevant history]\n";
const MEMORY_SEPARATOR: &str = "\n---\n";
const TAIL_HEADER: &str = "[Conversation]\n";

/// Token cost of appending `extra` bytes to a payload already `rendered`
/// bytes long, under the engine-wide 4-bytes-per-token estimate. Charging
/// the marginal amount keeps the total equal to the estimate of the full
/// rendered text, headers and separators included.
fn marginal_cost(rendered: usize, extra: usize) -> u32 {
    (((rendered + extra) / 4) - (rendered / 4)) as u32
}

/// Bytes a new section pays to join the sections already admitted.
fn section_prefix(sections: &[String]) -> usize {
    if sections.is_empty() {
        0
    } else {
        SECTION_JOIN.len()
    }
}

/// Result of one assembly pass.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// The full prompt payload.
    pub text: String,
    /// Tokens consumed; never exceeds the `max_tokens` passed to assemble.
    pub used_tokens: u32,
    /// Ids of the memories that made it into the payload.
    pub memory_ids: Vec<Uuid>,
}

/// Assembles the per-turn context payload under a hard token ceiling.
pub struct ContextAssembler {
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Build the context payload for one turn.
    ///
    /// `memories` must already be in retriever order (best first);
    /// `live_tail` is chronological. The most recent live-tail messages
    /// win budget over older ones, so the latest user message is the last
    /// thing ever dropped.
    pub fn assemble(
        &self,
        system: &str,
        memories: &[ScoredMemory],
        live_tail: &[Message],
        tool_outputs: &[ToolCall],
        max_tokens: u32,
    ) -> AssembledContext {
        let mut remaining = max_tokens;
        // Bytes the final payload will occupy once joined. Every admitted
        // item advances this by its own bytes plus the decoration it drags
        // in (section header, join, per-item separator), so the decoration
        // is charged against the budget too.
        let mut rendered = 0usize;
        let mut sections: Vec<String> = Vec::new();
        let mut memory_ids = Vec::new();

        // (a) System instructions, inside their fixed reservation.
        if !system.is_empty() {
            let cost = marginal_cost(rendered, system.len());
            if cost <= self.config.system_reserved_tokens.min(remaining) {
                remaining -= cost;
                rendered += system.len();
                sections.push(system.to_string());
            }
        }

        // (b) Tool outputs, capped at a fraction of the overall budget.
        let tool_cap = (max_tokens as f32 * self.config.tool_output_fraction) as u32;
        let mut tool_remaining = tool_cap.min(remaining);
        let mut tool_lines = Vec::new();
        for call in tool_outputs {
            // A tool that produced no result (timeout, failure) contributes
            // nothing to the payload.
            let Some(result) = &call.result else { continue };
            let value = match result.as_str() {
                Some(s) => s.to_string(),
                None => result.to_string(),
            };
            let line = format!("{}: {}", call.kind, value);
            let extra = if tool_lines.is_empty() {
                section_prefix(&sections) + TOOL_HEADER.len() + line.len()
            } else {
                "\n".len() + line.len()
            };
            let cost = marginal_cost(rendered, extra);
            if cost <= tool_remaining {
                tool_remaining -= cost;
                remaining -= cost;
                rendered += extra;
                tool_lines.push(line);
            }
        }
        if !tool_lines.is_empty() {
            sections.push(format!("{TOOL_HEADER}{}", tool_lines.join("\n")));
        }

        // (c) Retrieved memories, greedily in score order. The content is
        // charged at its stored token_count; only the decoration is charged
        // by rendered size.
        let mut memory_lines = Vec::new();
        for scored in memories {
            let decoration = if memory_lines.is_empty() {
                section_prefix(&sections) + MEMORY_HEADER.len()
            } else {
                MEMORY_SEPARATOR.len()
            };
            let cost = scored.memory.token_count + marginal_cost(rendered, decoration);
            if cost <= remaining {
                remaining -= cost;
                rendered += decoration + scored.memory.content.len();
                memory_lines.push(scored.memory.content.clone());
                memory_ids.push(scored.memory.id);
            }
        }
        if !memory_lines.is_empty() {
            sections.push(format!(
                "{MEMORY_HEADER}{}",
                memory_lines.join(MEMORY_SEPARATOR)
            ));
        }

        // (d) Live tail fills what is left. Admission runs most-recent-
        // first so the oldest messages are dropped first, then the kept
        // ones are rendered back in chronological order.
        let tail_window = self.config.live_tail_messages as usize;
        let mut kept_tail: Vec<&Message> = Vec::new();
        for message in live_tail.iter().rev().take(tail_window) {
            let line = format!("{}: {}", message.role, message.content);
            let extra = if kept_tail.is_empty() {
                section_prefix(&sections) + TAIL_HEADER.len() + line.len()
            } else {
                "\n".len() + line.len()
            };
            let cost = marginal_cost(rendered, extra);
            if cost <= remaining {
                remaining -= cost;
                rendered += extra;
                kept_tail.push(message);
            }
        }
        if !kept_tail.is_empty() {
            kept_tail.reverse();
            let lines: Vec<String> = kept_tail
                .iter()
                .map(|m| format!("{}: {}", m.role, m.content))
                .collect();
            sections.push(format!("{TAIL_HEADER}{}", lines.join("\n")));
        }

        let used_tokens = max_tokens - remaining;
        debug!(
            used_tokens,
            max_tokens,
            memories = memory_ids.len(),
            tail = kept_tail.len(),
            "assembled context"
        );
        AssembledContext {
            text: sections.join(SECTION_JOIN),
            used_tokens,
            memory_ids,
        }
    }
}
