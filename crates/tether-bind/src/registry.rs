//! Publication of symbols and bookkeeping of generated artifacts.
//!
//! Both tables are process-wide and insert-only: entries are never
//! removed, and a key maps to one value forever. Uniqueness comes from
//! the name generator; the tables enforce it structurally anyway rather
//! than relying on collision avoidance alone.

use std::sync::{Mutex, OnceLock, PoisonError};

use rustc_hash::FxHashMap;
use tether_jit::CompileOptions;
use tether_types::Signature;

/// Publishes a generated symbol's native address into the process-wide
/// symbol table consulted at link time. Called at most once per name.
pub(crate) fn publish(name: &str, address: usize) {
    log::debug!("publishing `{name}` -> {address:#x}");
    tether_jit::register_symbol(name, address);
}

/// Metadata kept per generated binding: the signature and options it was
/// created under, and the derived symbol names.
#[derive(Debug, Clone)]
pub struct ArtifactRecord {
    pub signature: Signature,
    pub options: CompileOptions,
    /// The published symbol the stub declares as an import.
    pub extern_symbol: String,
    /// The symbol the forwarding stub was compiled under.
    pub stub_symbol: String,
}

fn artifacts() -> &'static Mutex<FxHashMap<String, ArtifactRecord>> {
    static ARTIFACTS: OnceLock<Mutex<FxHashMap<String, ArtifactRecord>>> = OnceLock::new();
    ARTIFACTS.get_or_init(|| Mutex::new(FxHashMap::default()))
}

// Entries are inserted whole, so recovering a poisoned guard is safe;
// the duplicate panic below releases the guard before unwinding.
fn lock_artifacts() -> std::sync::MutexGuard<'static, FxHashMap<String, ArtifactRecord>> {
    artifacts().lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records the artifacts generated under one unique base name.
///
/// # Panics
///
/// Panics on a duplicate key; generated names are unique by construction.
/// The original record stays in place and the registry remains usable.
pub(crate) fn record_artifact(name: &str, record: ArtifactRecord) {
    let mut table = lock_artifacts();
    if table.contains_key(name) {
        drop(table);
        panic!("artifact `{name}` recorded twice in the process-wide registry");
    }
    table.insert(name.to_string(), record);
}

/// Looks up the artifact record for a generated base name.
pub fn artifact_record(name: &str) -> Option<ArtifactRecord> {
    lock_artifacts().get(name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_types::ScalarType;

    fn record() -> ArtifactRecord {
        ArtifactRecord {
            signature: Signature::new(vec![ScalarType::F64.into()], ScalarType::F64.into()),
            options: CompileOptions::default(),
            extern_symbol: "f__b0".to_string(),
            stub_symbol: "f__b0__stub".to_string(),
        }
    }

    #[test]
    fn record_then_look_up() {
        record_artifact("bind_registry_test_a", record());
        let found = artifact_record("bind_registry_test_a").unwrap();
        assert_eq!(found.stub_symbol, "f__b0__stub");
        assert!(artifact_record("bind_registry_test_missing").is_none());
    }

    #[test]
    #[should_panic(expected = "recorded twice")]
    fn duplicate_artifact_panics() {
        record_artifact("bind_registry_test_dup", record());
        record_artifact("bind_registry_test_dup", record());
    }

    #[test]
    fn duplicate_panic_leaves_the_registry_usable() {
        record_artifact("bind_registry_test_first", record());
        let duplicate = std::panic::catch_unwind(|| {
            let mut second = record();
            second.stub_symbol = "f__b1__stub".to_string();
            record_artifact("bind_registry_test_first", second);
        });
        assert!(duplicate.is_err());
        // The original record survives and later inserts still land.
        let found = artifact_record("bind_registry_test_first").unwrap();
        assert_eq!(found.stub_symbol, "f__b0__stub");
        record_artifact("bind_registry_test_second", record());
        assert!(artifact_record("bind_registry_test_second").is_some());
    }
}
