//! # Settings Loader
//!
//! Centralized configuration loading for the ledger viewer. It reads the
//! `settings.json` file (paths, delimiter, server address) and the external
//! alias table used by the column mapper.
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! // Missing path falls back to `settings.json` in the current directory,
//! // then to built-in defaults
//! let settings = settings_loader::load_settings_with_fallback(None)?;
//!
//! // Alias table named by the settings, or the built-in one
//! let aliases = settings_loader::resolve_alias_table(&settings)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use models::{AliasTable, Settings};

pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// Loads settings from a JSON file. Keys missing from the file keep their
/// defaults.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading settings file: {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing settings JSON in {}", path.display()))?;
    Ok(settings)
}

/// Loads the explicitly requested settings file, or `settings.json` when it
/// exists, or the defaults.
///
/// An explicit path that cannot be read is an error; only the implicit
/// default location is optional.
pub fn load_settings_with_fallback(path: Option<&PathBuf>) -> Result<Settings> {
    if let Some(settings_path) = path {
        return load_settings(settings_path);
    }

    if settings_file_exists(DEFAULT_SETTINGS_FILE) {
        return load_settings(DEFAULT_SETTINGS_FILE);
    }

    Ok(Settings::default())
}

/// Loads an alias table (`{"field": ["alias", ...]}`) from JSON.
pub fn load_alias_table<P: AsRef<Path>>(path: P) -> Result<AliasTable> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading alias table: {}", path.display()))?;
    let table: AliasTable = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing alias table JSON in {}", path.display()))?;
    Ok(table)
}

/// The alias table named in settings, or the built-in one.
pub fn resolve_alias_table(settings: &Settings) -> Result<AliasTable> {
    match &settings.aliases_file {
        Some(path) => load_alias_table(path),
        None => Ok(AliasTable::builtin()),
    }
}

/// The configured delimiter as a byte, `None` meaning auto-detect.
pub fn resolve_delimiter(settings: &Settings) -> Result<Option<u8>> {
    match settings.delimiter {
        Some(c) if c.is_ascii() => Ok(Some(c as u8)),
        Some(c) => bail!("Delimiter must be a single ASCII character, got '{}'", c),
        None => Ok(None),
    }
}

/// Checks if a settings file exists at the given path
pub fn settings_file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists() && path.as_ref().is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::SourceField;
    use tempfile::tempdir;

    #[test]
    fn test_load_settings_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"data_dir": "/srv/ledgers", "delimiter": "\t"}"#).unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/srv/ledgers"));
        assert_eq!(settings.delimiter, Some('\t'));
        assert_eq!(settings.port, 8080);
        assert_eq!(resolve_delimiter(&settings).unwrap(), Some(b'\t'));
    }

    #[test]
    fn test_explicit_missing_settings_is_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(load_settings_with_fallback(Some(&missing)).is_err());
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let settings = Settings {
            delimiter: Some('、'),
            ..Settings::default()
        };
        assert!(resolve_delimiter(&settings).is_err());
    }

    #[test]
    fn test_alias_table_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        fs::write(&path, r#"{"counterparty": ["Vendor"], "quantity": ["Qty"]}"#).unwrap();

        let settings = Settings {
            aliases_file: Some(path),
            ..Settings::default()
        };
        let table = resolve_alias_table(&settings).unwrap();
        assert_eq!(table.aliases(SourceField::Counterparty), ["Vendor".to_string()]);
        assert!(table.aliases(SourceField::Date).is_empty());
    }

    #[test]
    fn test_shipped_alias_file_matches_builtin() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/aliases.json");
        assert_eq!(load_alias_table(path).unwrap(), AliasTable::builtin());
    }
}
