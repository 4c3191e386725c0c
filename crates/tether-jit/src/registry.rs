//! The process-wide symbol registry.
//!
//! Maps symbol names to native entry addresses for the lifetime of the
//! process. Every [`JITModule`](cranelift_jit::JITModule) built by this
//! crate installs a lookup function over this table, so `Linkage::Import`
//! references resolve against it no later than the first call into the
//! importing module.
//!
//! The table is insert-only. A name maps to exactly one address forever;
//! registering the same name twice is a programmer error and asserts,
//! since callers are expected to use collision-free generated names.

use std::sync::{Mutex, OnceLock, PoisonError};

use rustc_hash::FxHashMap;

fn symbols() -> &'static Mutex<FxHashMap<String, usize>> {
    static SYMBOLS: OnceLock<Mutex<FxHashMap<String, usize>>> = OnceLock::new();
    SYMBOLS.get_or_init(|| Mutex::new(FxHashMap::default()))
}

// The table is never left mid-mutation, so a poisoned guard is safe to
// recover; the duplicate panic below releases the guard first anyway.
fn lock_symbols() -> std::sync::MutexGuard<'static, FxHashMap<String, usize>> {
    symbols().lock().unwrap_or_else(PoisonError::into_inner)
}

/// Publishes `name -> address` into the process-wide table.
///
/// # Panics
///
/// Panics if `name` was registered before. Uniqueness is the caller's
/// responsibility; duplicates are never retried or overwritten. The
/// first registration stays in place and the table remains usable.
pub fn register_symbol(name: &str, address: usize) {
    let mut table = lock_symbols();
    if table.contains_key(name) {
        drop(table);
        panic!("symbol `{name}` registered twice in the process-wide table");
    }
    table.insert(name.to_string(), address);
    log::debug!("registered symbol `{name}` at {address:#x}");
}

/// Resolves a registered symbol to its native address.
pub fn resolve_symbol(name: &str) -> Option<usize> {
    lock_symbols().get(name).copied()
}
