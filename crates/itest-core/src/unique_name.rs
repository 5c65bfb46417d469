//! Per-test unique object names.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

fn counters() -> &'static Mutex<HashMap<String, u64>> {
    static COUNTERS: OnceLock<Mutex<HashMap<String, u64>>> = OnceLock::new();
    COUNTERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Builds a name that is unique within the process.
///
/// The result is `"<test>-<hint>-<n>"` (or `"<test>-<n>"` for an empty
/// hint), with every `/` replaced by `-`, where `n` counts up from 1 per
/// prefix.
pub fn unique_name(test_name: &str, hint: &str) -> String {
    let mut prefix = test_name.to_string();
    if !hint.is_empty() {
        prefix.push('-');
        prefix.push_str(hint);
    }
    let prefix = prefix.replace('/', "-");

    let n = {
        let mut map = counters().lock().unwrap_or_else(|e| e.into_inner());
        let slot = map.entry(prefix.clone()).or_insert(0);
        *slot += 1;
        *slot
    };

    format!("{prefix}-{n}")
}
