//! State keys of the form `intent_<intent>[_ctx_<hash>]`.

use crate::Context;
use serde_json::Value;
use sha2::{Digest, Sha256};

const STATE_PREFIX: &str = "intent_";
const CONTEXT_MARKER: &str = "_ctx_";
/// Hex characters kept from the context digest.
const CONTEXT_HASH_LEN: usize = 8;

/// Derives the policy lookup key for an intent and optional context.
///
/// Pure: identical inputs always give the identical key. Only string,
/// integer and bool context entries are hashed; floats, arrays, objects and
/// null are ignored. Short digests can collide; that is accepted.
#[must_use]
pub fn encode_state(intent: &str, context: Option<&Context>) -> String {
    let mut state = format!("{STATE_PREFIX}{intent}");
    if let Some(digest) = context.and_then(context_digest) {
        state.push_str(CONTEXT_MARKER);
        state.push_str(&digest);
    }
    state
}

/// Intent part of a state key, if it has the expected shape.
#[must_use]
pub fn intent_of(state: &str) -> Option<&str> {
    let rest = state.strip_prefix(STATE_PREFIX)?;
    Some(rest.split_once(CONTEXT_MARKER).map_or(rest, |(intent, _)| intent))
}

fn context_digest(context: &Context) -> Option<String> {
    // BTreeMap iteration is already key-sorted.
    let joined = context
        .iter()
        .filter_map(|(k, v)| scalar_text(v).map(|v| format!("{k}_{v}")))
        .collect::<Vec<_>>()
        .join("_");
    if joined.is_empty() {
        return None;
    }
    let digest = Sha256::digest(joined.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    Some(hex[..CONTEXT_HASH_LEN].to_string())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}
