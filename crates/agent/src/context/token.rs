//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. The window
//! split built on it is advisory, never an exact budget.

use parley_core::message::Turn;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.len() + 3) / 4
}

/// The result of fitting recent turns into the token window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSplit {
    /// Newest turns that fit alongside the memory, oldest first.
    pub kept: Vec<Turn>,
    /// Older turns left out of the window, oldest first.
    pub overflow: Vec<Turn>,
}

/// Keep the newest turns whose estimated size, added to the memory's, stays
/// under `max_tokens`.
///
/// Walks newest to oldest and stops at the first turn that does not fit, so
/// `kept` is always a contiguous suffix of `turns`.
pub fn split_window(memory: &str, turns: &[Turn], max_tokens: usize) -> WindowSplit {
    let mut used = estimate_tokens(memory);
    let mut cut = turns.len();

    for (index, turn) in turns.iter().enumerate().rev() {
        let cost = estimate_tokens(&turn.content);
        if used + cost >= max_tokens {
            break;
        }
        used += cost;
        cut = index;
    }

    WindowSplit {
        kept: turns[cut..].to_vec(),
        overflow: turns[..cut].to_vec(),
    }
}
