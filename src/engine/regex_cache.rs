//! Thread-local cache of compiled pattern leaves
//!
//! Every pattern leaf is compiled anchored at the match position, so the same
//! source written in several rules or grammars is compiled once per thread.

use hashbrown::HashMap;
use regex::Regex;
use std::cell::RefCell;

thread_local! {
    /// Anchored source -> compiled regex
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

/// Anchored form of a pattern source
#[inline]
pub fn anchored(source: &str) -> String {
    format!("^(?:{})", source)
}

/// Get or compile `source` anchored at the start of the haystack
///
/// Returns the compiler's message when the pattern is invalid.
pub fn get_or_compile(source: &str) -> Result<Regex, String> {
    let pattern = anchored(source);
    REGEX_CACHE.with(|cache| {
        if let Some(regex) = cache.borrow().get(&pattern) {
            return Ok(regex.clone());
        }

        let regex = Regex::new(&pattern).map_err(|e| e.to_string())?;
        cache.borrow_mut().insert(pattern, regex.clone());
        Ok(regex)
    })
}

/// Drop every cached regex on this thread
pub fn clear_cache() {
    REGEX_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Number of cached patterns on this thread
pub fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}
