//! Property-based coverage for the invariants spec'd as holding "for all
//! inputs": cache-key stability/shape and UTF-8-safe truncation never
//! panicking regardless of input bytes.

use iris_fetch::cache::make_cache_key;
use iris_fetch::utils::safe_truncate_chars;
use proptest::prelude::*;
use serde_json::json;

proptest! {
    /// `make_cache_key` always yields 64 lowercase hex characters, for any
    /// url/param combination.
    #[test]
    fn cache_key_is_always_64_hex_chars(url in "[a-z]{1,10}://[a-z.]{1,20}/[a-z/]{0,20}") {
        let key = make_cache_key(&url, &[("extract_text", json!(true))]);
        prop_assert_eq!(key.len(), 64);
        prop_assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    /// Key is stable regardless of the order params are passed in.
    #[test]
    fn cache_key_ignores_param_order(
        a in any::<bool>(),
        b in any::<bool>(),
        c in any::<bool>(),
    ) {
        let url = "https://example.com/page";
        let forward = make_cache_key(
            url,
            &[("extract_text", json!(a)), ("extract_links", json!(b)), ("screenshot", json!(c))],
        );
        let reversed = make_cache_key(
            url,
            &[("screenshot", json!(c)), ("extract_links", json!(b)), ("extract_text", json!(a))],
        );
        prop_assert_eq!(forward, reversed);
    }

    /// Truncation never panics and never exceeds the requested character
    /// count, for arbitrary (possibly multi-byte) input.
    #[test]
    fn safe_truncate_chars_never_panics_and_respects_bound(
        s in ".{0,200}",
        max_chars in 0usize..50,
    ) {
        let truncated = safe_truncate_chars(&s, max_chars);
        prop_assert!(truncated.chars().count() <= max_chars);
        prop_assert!(s.starts_with(truncated));
    }
}
