//! Module-level registry of model capabilities.
//!
//! A read-mostly table of model name to context-window size, shared by every
//! component that needs to reason about model limits. Registrations happen
//! once at startup; lookups dominate afterwards, so the table sits behind a
//! reader/writer lock and batch registration takes the writer once.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::RwLock;

static MODEL_CONTEXT_WINDOWS: Lazy<RwLock<HashMap<String, u32>>> = Lazy::new(|| {
    RwLock::new(HashMap::from([
        ("gpt-4o".to_string(), 128_000),
        ("gpt-4o-mini".to_string(), 128_000),
        ("claude-sonnet-4-20250514".to_string(), 200_000),
        ("gemini-2.0-flash".to_string(), 1_048_576),
        ("deepseek-chat".to_string(), 65_536),
    ]))
});

/// Register the context-window size of a model.
pub fn register_model_context_window(model: impl Into<String>, tokens: u32) {
    let mut table = MODEL_CONTEXT_WINDOWS
        .write()
        .unwrap_or_else(|e| e.into_inner());
    table.insert(model.into(), tokens);
}

/// Register several models at once, taking the writer lock a single time.
pub fn register_model_context_windows<I, S>(models: I)
where
    I: IntoIterator<Item = (S, u32)>,
    S: Into<String>,
{
    let mut table = MODEL_CONTEXT_WINDOWS
        .write()
        .unwrap_or_else(|e| e.into_inner());
    for (model, tokens) in models {
        table.insert(model.into(), tokens);
    }
}

/// Look up the context-window size of a model.
pub fn model_context_window(model: &str) -> Option<u32> {
    let table = MODEL_CONTEXT_WINDOWS
        .read()
        .unwrap_or_else(|e| e.into_inner());
    table.get(model).copied()
}
