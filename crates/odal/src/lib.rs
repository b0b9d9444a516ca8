//! Layered configuration files.
//!
//! A config struct lives in a main directory as `<dir>/<PATH>`. A device may
//! carry an overlay with the same file name, containing only the keys that
//! differ from the main file. Tables are merged recursively, the overlay wins.
mod error;

use std::{fs, path::Path};

use serde::{Serialize, de::DeserializeOwned};
use toml::{Table, Value};

pub use error::{ConfigKind, Error, ErrorKind, Result};

/// A configuration struct that is stored as a TOML file.
pub trait Config: Serialize + DeserializeOwned {
    /// File name of the config, relative to the config directories.
    const PATH: &'static str;

    /// Loads the config from the main directory only.
    fn load(main_dir: &Path) -> Result<Self> {
        let main = read_table::<Self>(main_dir, ConfigKind::Main)?;
        from_table(main)
    }

    /// Loads the config from the main directory, with the overlay merged on top.
    fn load_with_overlay(main_dir: &Path, overlay_dir: &Path) -> Result<Self> {
        let main = read_table::<Self>(main_dir, ConfigKind::Main)?;
        let overlay = read_table::<Self>(overlay_dir, ConfigKind::Overlay)?;

        from_table(merge(main, overlay))
    }

    /// Writes only the keys of `self` that differ from `main` into `overlay_dir`.
    fn save_as_overlay(&self, main: &Self, overlay_dir: &Path) -> Result<()> {
        let changed = to_table::<Self>(self)?;
        let main = to_table::<Self>(main)?;
        let diff = extract_diff(&main, &changed);

        let text = toml::to_string(&diff).map_err(|e| Error {
            name: Self::PATH,
            kind: ErrorKind::Serialize(e),
        })?;

        let path = overlay_dir.join(Self::PATH);
        fs::create_dir_all(overlay_dir)
            .and_then(|()| fs::write(&path, text))
            .map_err(|source| Error {
                name: Self::PATH,
                kind: ErrorKind::Store {
                    path: path.display().to_string(),
                    source,
                },
            })?;

        tracing::debug!("`{}`: stored overlay in `{}`", Self::PATH, path.display());
        Ok(())
    }
}

fn read_table<T: Config>(dir: &Path, config_kind: ConfigKind) -> Result<Table> {
    let path = dir.join(T::PATH);
    let text = fs::read_to_string(&path).map_err(|source| Error {
        name: T::PATH,
        kind: ErrorKind::Load {
            path: path.display().to_string(),
            config_kind,
            source,
        },
    })?;

    text.parse::<Table>().map_err(|source| Error {
        name: T::PATH,
        kind: ErrorKind::Parse {
            path: path.display().to_string(),
            config_kind,
            source,
        },
    })
}

fn from_table<T: Config>(table: Table) -> Result<T> {
    Value::Table(table).try_into().map_err(|e| Error {
        name: T::PATH,
        kind: ErrorKind::Deserialize(e),
    })
}

fn to_table<T: Config>(config: &T) -> Result<Table> {
    match Value::try_from(config) {
        Ok(Value::Table(table)) => Ok(table),
        Ok(_) => Err(Error {
            name: T::PATH,
            kind: ErrorKind::NotATable,
        }),
        Err(e) => Err(Error {
            name: T::PATH,
            kind: ErrorKind::Serialize(e),
        }),
    }
}

/// Merges `overlay` on top of `main`.
///
/// Nested tables are merged key by key, any other value in the overlay
/// replaces the main value. Keys only present in the overlay are dropped.
#[must_use]
pub fn merge(main: Table, mut overlay: Table) -> Table {
    let mut merged = Table::new();

    for (key, value) in main {
        let merged_value = match (value, overlay.remove(&key)) {
            (Value::Table(main_table), Some(Value::Table(overlay_table))) => {
                Value::Table(merge(main_table, overlay_table))
            }
            (_, Some(overlay_value)) => overlay_value,
            (value, None) => value,
        };
        merged.insert(key, merged_value);
    }

    merged
}

/// Returns the keys of `changed` whose values differ from `main`.
///
/// Nested tables are compared key by key, so the result only contains the
/// leaves that changed, together with the tables leading up to them.
#[must_use]
pub fn extract_diff(main: &Table, changed: &Table) -> Table {
    let mut diff = Table::new();

    for (key, value) in changed {
        match (main.get(key), value) {
            (Some(Value::Table(main_table)), Value::Table(changed_table)) => {
                let nested = extract_diff(main_table, changed_table);
                if !nested.is_empty() {
                    diff.insert(key.clone(), Value::Table(nested));
                }
            }
            (Some(main_value), value) if main_value == value => {}
            (_, value) => {
                diff.insert(key.clone(), value.clone());
            }
        }
    }

    diff
}
