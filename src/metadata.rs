//! Metadata store adapters: unit name → function metadata.
//!
//! JSON layout, either one file keyed by unit name:
//!
//! ```json
//! { "Foo::Bar": { "func": { "v": 1.1, "args": { "x": { "schema": "int", "req": true } } } } }
//! ```
//!
//! or a directory with one file per unit (`Foo::Bar` → `Foo/Bar.json`)
//! holding the inner `{ "func": {...} }` object.

use crate::error::MetadataError;
use crate::model::MetadataIndex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Resolves the metadata of every function declared in a unit.
pub trait MetadataStore {
    fn resolve(&self, unit: &str) -> Result<MetadataIndex, MetadataError>;
}

/// JSON-backed store, reading from a single file or a directory tree.
#[derive(Debug, Clone)]
pub enum JsonMetadataStore {
    File(PathBuf),
    Dir(PathBuf),
}

impl JsonMetadataStore {
    /// Pick the layout from what `path` is on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            JsonMetadataStore::Dir(path)
        } else {
            JsonMetadataStore::File(path)
        }
    }

    fn read(unit: &str, path: &Path) -> Result<String, MetadataError> {
        fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => MetadataError::UnitNotFound {
                unit: unit.to_string(),
            },
            _ => MetadataError::Read {
                unit: unit.to_string(),
                path: path.to_path_buf(),
                source,
            },
        })
    }
}

/// `Foo::Bar` → `Foo/Bar.json`
pub fn unit_file_name(unit: &str) -> PathBuf {
    let mut path: PathBuf = unit.split("::").collect();
    path.set_extension("json");
    path
}

impl MetadataStore for JsonMetadataStore {
    fn resolve(&self, unit: &str) -> Result<MetadataIndex, MetadataError> {
        let malformed = |source| MetadataError::Malformed {
            unit: unit.to_string(),
            source,
        };
        match self {
            JsonMetadataStore::Dir(dir) => {
                let content = Self::read(unit, &dir.join(unit_file_name(unit)))?;
                serde_json::from_str(&content).map_err(malformed)
            }
            JsonMetadataStore::File(path) => {
                let content = Self::read(unit, path)?;
                let mut units: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_str(&content).map_err(malformed)?;
                let entry = units.remove(unit).ok_or_else(|| MetadataError::UnitNotFound {
                    unit: unit.to_string(),
                })?;
                serde_json::from_value(entry).map_err(malformed)
            }
        }
    }
}

/// In-memory store for embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    units: HashMap<String, MetadataIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: impl Into<String>, index: MetadataIndex) -> &mut Self {
        self.units.insert(unit.into(), index);
        self
    }
}

impl MetadataStore for MemoryStore {
    fn resolve(&self, unit: &str) -> Result<MetadataIndex, MetadataError> {
        self.units
            .get(unit)
            .cloned()
            .ok_or_else(|| MetadataError::UnitNotFound {
                unit: unit.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArgsAs;
    use tempfile::TempDir;

    const UNIT_JSON: &str = r#"{
        "bar": {"v": 1.1, "args": {"arg1": {"schema": "int", "req": true}}, "args_as": "hashref"},
        "baz": {"v": 1.1}
    }"#;

    #[test]
    fn unit_file_name_nests_namespaces() {
        assert_eq!(unit_file_name("Foo::Bar::Baz"), PathBuf::from("Foo/Bar/Baz.json"));
        assert_eq!(unit_file_name("Foo"), PathBuf::from("Foo.json"));
    }

    #[test]
    fn resolves_from_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("Foo")).unwrap();
        fs::write(dir.path().join("Foo/Bar.json"), UNIT_JSON).unwrap();

        let store = JsonMetadataStore::new(dir.path());
        let index = store.resolve("Foo::Bar").unwrap();
        assert_eq!(index.keys().collect::<Vec<_>>(), ["bar", "baz"]);
        assert_eq!(index["bar"].args_as, ArgsAs::HashRef);
        assert!(index["bar"].args["arg1"].required);

        assert!(matches!(
            store.resolve("Foo::Missing"),
            Err(MetadataError::UnitNotFound { unit }) if unit == "Foo::Missing"
        ));
    }

    #[test]
    fn resolves_from_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.json");
        fs::write(&path, format!(r#"{{"Foo": {UNIT_JSON}, "Other": 3}}"#)).unwrap();

        let store = JsonMetadataStore::new(&path);
        assert_eq!(store.resolve("Foo").unwrap().len(), 2);
        assert!(matches!(store.resolve("Nope"), Err(MetadataError::UnitNotFound { .. })));
        assert!(matches!(store.resolve("Other"), Err(MetadataError::Malformed { .. })));
    }

    #[test]
    fn malformed_json_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Foo.json"), "{ not json").unwrap();
        let err = JsonMetadataStore::new(dir.path()).resolve("Foo").unwrap_err();
        assert!(err.to_string().starts_with("malformed metadata for unit 'Foo'"));
    }

    #[test]
    fn memory_store() {
        let mut store = MemoryStore::new();
        store.insert("Foo", MetadataIndex::new());
        assert!(store.resolve("Foo").unwrap().is_empty());
        assert!(store.resolve("Bar").is_err());
    }
}
