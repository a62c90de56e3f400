//! Shared cache of table column metadata.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{CompileError, Result};

/// Metadata of one physical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Database type name.
    pub data_type: String,
    /// The column accepts NULL.
    pub nullable: bool,
}

impl ColumnInfo {
    /// Creates a non-nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: false,
        }
    }
}

/// A blocking source of column metadata, typically a database connection.
pub trait ColumnSource: Send + Sync {
    /// Returns the columns of `table`.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the lookup failed.
    fn columns(&self, table: &str) -> std::result::Result<Vec<ColumnInfo>, String>;
}

type Slot = Arc<Mutex<Option<Arc<[ColumnInfo]>>>>;

/// Caches column metadata per table across compilations.
///
/// Each table key has its own lock: concurrent compilations resolving the
/// same table wait for a single lookup, while other tables proceed.
pub struct ColumnRegistry {
    source: Box<dyn ColumnSource>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl std::fmt::Debug for ColumnRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnRegistry").finish_non_exhaustive()
    }
}

fn poisoned(table: &str) -> CompileError {
    CompileError::Registry {
        table: table.to_string(),
        message: "registry lock poisoned".to_string(),
    }
}

impl ColumnRegistry {
    /// Creates a registry over `source`.
    #[must_use]
    pub fn new(source: impl ColumnSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self, table: &str) -> Result<MutexGuard<'_, HashMap<String, Slot>>> {
        self.slots.lock().map_err(|_| poisoned(table))
    }

    /// Returns the columns of `table`, looking them up on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Registry`] when the source fails or a lock is
    /// poisoned. A failed lookup is not cached.
    pub fn resolve(&self, table: &str) -> Result<Arc<[ColumnInfo]>> {
        let slot = Arc::clone(self.slots(table)?.entry(table.to_lowercase()).or_default());
        let mut cached = slot.lock().map_err(|_| poisoned(table))?;
        if let Some(columns) = cached.as_ref() {
            return Ok(Arc::clone(columns));
        }
        let columns: Arc<[ColumnInfo]> = self
            .source
            .columns(table)
            .map_err(|message| CompileError::Registry {
                table: table.to_string(),
                message,
            })?
            .into();
        debug!(table, columns = columns.len(), "resolved table columns");
        *cached = Some(Arc::clone(&columns));
        Ok(columns)
    }

    /// Returns the data type of `column` in `table`, ignoring case.
    ///
    /// # Errors
    ///
    /// Propagates lookup failures of [`ColumnRegistry::resolve`].
    pub fn data_type(&self, table: &str, column: &str) -> Result<Option<String>> {
        Ok(self
            .resolve(table)?
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
            .map(|c| c.data_type.clone()))
    }

    /// Drops the cached columns of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Registry`] when the lock is poisoned.
    pub fn invalidate(&self, table: &str) -> Result<()> {
        self.slots(table)?.remove(&table.to_lowercase());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl ColumnSource for Counting {
        fn columns(&self, table: &str) -> std::result::Result<Vec<ColumnInfo>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match table.to_lowercase().as_str() {
                "orders" => Ok(vec![
                    ColumnInfo::new("ID", "INTEGER"),
                    ColumnInfo::new("STATUS", "VARCHAR"),
                ]),
                _ => Err(format!("no such table: {table}")),
            }
        }
    }

    fn registry() -> (ColumnRegistry, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ColumnRegistry::new(Counting {
            calls: Arc::clone(&calls),
        });
        (registry, calls)
    }

    #[test]
    fn test_concurrent_resolution_looks_up_once() {
        let (registry, calls) = registry();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    assert_eq!(registry.resolve("ORDERS").unwrap().len(), 2);
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            registry.data_type("orders", "status").unwrap().as_deref(),
            Some("VARCHAR")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_and_invalidation() {
        let (registry, calls) = registry();
        let err = registry.resolve("missing").unwrap_err();
        assert!(matches!(err, CompileError::Registry { ref table, .. } if table == "missing"));
        assert!(registry.resolve("missing").is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        registry.resolve("orders").unwrap();
        registry.invalidate("Orders").unwrap();
        registry.resolve("orders").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(registry.data_type("orders", "missing").unwrap(), None);
    }
}
