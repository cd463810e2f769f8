// Common test utilities for Vedis integration tests

use std::path::PathBuf;
use tempfile::TempDir;
use vedis::{Database, Value};

/// Test fixture owning a temporary directory with one database file path
pub struct TestDb {
    #[allow(dead_code)]
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl TestDb {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("test.vedis");
        Self { temp_dir, path }
    }

    /// Open (or reopen) the database file
    pub fn open(&self) -> Database {
        Database::open(&self.path).expect("Failed to open database")
    }

    #[allow(dead_code)]
    pub fn journal_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push("-journal");
        PathBuf::from(name)
    }
}

impl Default for TestDb {
    fn default() -> Self {
        Self::new()
    }
}

/// String value shorthand
#[allow(dead_code)]
pub fn s(text: &str) -> Value {
    Value::from(text)
}

/// Array of string values
#[allow(dead_code)]
pub fn strings(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|item| Value::from(*item)).collect())
}

#[allow(dead_code)]
pub fn memory_db() -> Database {
    Database::in_memory().expect("Failed to open in-memory database")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_journal_path() {
        let fixture = TestDb::new();
        assert!(fixture
            .journal_path()
            .to_string_lossy()
            .ends_with("test.vedis-journal"));
    }
}
