//! Collision-free names for synthesized artifacts.
//!
//! Naming scheme, fixed so related artifact names derive from one base
//! by string transformation alone:
//!
//! - unique base:        `<sanitized-base>__b<N>`   (N: process counter)
//! - extern declaration: the unique base itself (this is the published
//!   symbol the forwarding stub imports)
//! - compiled stub:      `<unique>__stub`
//! - artifact-registry key (signature and options slots): the unique base
//!
//! The counter makes repeated and recursive bindings of the same source
//! function yield distinct symbols by construction.

use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn sanitize(base: &str) -> String {
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "anon".to_string()
    } else {
        cleaned
    }
}

/// Generates a name no other call in this process has returned or will
/// return, for any base.
pub fn unique_name(base: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}__b{n}", sanitize(base))
}

/// Symbol of the compiled forwarding stub derived from a unique base.
pub fn stub_symbol(unique: &str) -> String {
    format!("{unique}__stub")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_across_repeated_calls() {
        let a = unique_name("calculate");
        let b = unique_name("calculate");
        assert_ne!(a, b);
        assert!(a.starts_with("calculate__b"));
    }

    #[test]
    fn non_identifier_characters_are_sanitized() {
        let name = unique_name("vec.len<f64>");
        assert!(name.starts_with("vec_len_f64___b"));

        let anon = unique_name("");
        assert!(anon.starts_with("anon__b"));
    }

    #[test]
    fn stub_symbol_derives_by_fixed_suffix() {
        assert_eq!(stub_symbol("calculate__b7"), "calculate__b7__stub");
    }
}
