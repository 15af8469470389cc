//! Context window management for prior-session history.
//!
//! The transcript grows without bound while the model's context window
//! does not.  Before prior sessions are placed into the system prompt
//! they are cut down to a token budget by dropping the oldest whole
//! lines.  Only the request is trimmed; the file on disk is untouched.

use std::borrow::Cow;

use tiktoken_rs::o200k_base;
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// Marker placed in front of a trimmed history.
pub const OMITTED_MARKER: &str = "[earlier sessions omitted]\n";

// ---------------------------------------------------------------------------
// Token estimation
// ---------------------------------------------------------------------------

/// Cached BPE tokenizer, `None` if it failed to load.
fn bpe() -> Option<&'static CoreBPE> {
    use std::sync::OnceLock;
    static BPE: OnceLock<Option<CoreBPE>> = OnceLock::new();
    BPE.get_or_init(|| match o200k_base() {
        Ok(bpe) => Some(bpe),
        Err(e) => {
            tracing::warn!(error = %e, "tokenizer unavailable, using length heuristic");
            None
        }
    })
    .as_ref()
}

/// Token count for `text` using the o200k_base encoding, or roughly
/// four bytes per token when the tokenizer is unavailable.
pub fn estimate_tokens(text: &str) -> usize {
    match bpe() {
        Some(enc) => enc.encode_with_special_tokens(text).len(),
        None => text.len().div_ceil(4),
    }
}

// ---------------------------------------------------------------------------
// Trimming
// ---------------------------------------------------------------------------

/// Fit `text` into `budget` tokens.
///
/// Returns `text` unchanged when it already fits or when `budget` is
/// `None`.  Otherwise the oldest lines are dropped until the rest,
/// together with [`OMITTED_MARKER`], fits.  A single line larger than
/// the budget yields just the marker.
pub fn fit_to_budget(text: &str, budget: Option<usize>) -> Cow<'_, str> {
    let Some(budget) = budget else {
        return Cow::Borrowed(text);
    };
    let total = estimate_tokens(text);
    if total <= budget {
        return Cow::Borrowed(text);
    }

    let available = budget.saturating_sub(estimate_tokens(OMITTED_MARKER));
    let lines: Vec<&str> = text.split_inclusive('\n').collect();

    // Walk backwards, keeping the newest lines that fit.
    let mut used = 0usize;
    let mut keep_from = lines.len();
    for (idx, line) in lines.iter().enumerate().rev() {
        let cost = estimate_tokens(line);
        if used + cost > available {
            break;
        }
        used += cost;
        keep_from = idx;
    }

    debug!(
        tokens = total,
        budget,
        dropped_lines = keep_from,
        kept_lines = lines.len() - keep_from,
        "trimmed prior sessions to context budget"
    );

    let mut out = String::from(OMITTED_MARKER);
    for line in &lines[keep_from..] {
        out.push_str(line);
    }
    Cow::Owned(out)
}
