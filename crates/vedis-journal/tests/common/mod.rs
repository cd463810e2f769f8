// Common test utilities for journal integration tests

use std::path::PathBuf;
use tempfile::TempDir;
use vedis_journal::JournalConfig;

/// Test fixture that owns a temporary directory holding one database path
pub struct JournalTestFixture {
    #[allow(dead_code)]
    pub temp_dir: TempDir,
    pub db_path: PathBuf,
}

impl JournalTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("fixture.db");
        Self { temp_dir, db_path }
    }

    pub fn config(&self) -> JournalConfig {
        JournalConfig::for_database(&self.db_path)
    }

    #[allow(dead_code)]
    pub fn journal_bytes(&self) -> Vec<u8> {
        std::fs::read(self.config().path).expect("Failed to read journal")
    }

    #[allow(dead_code)]
    pub fn overwrite_journal(&self, bytes: &[u8]) {
        std::fs::write(self.config().path, bytes).expect("Failed to write journal");
    }
}

impl Default for JournalTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_journal_sits_next_to_database() {
        let fixture = JournalTestFixture::new();
        let journal = fixture.config().path;
        assert_eq!(journal.parent(), fixture.db_path.parent());
        assert!(journal.to_string_lossy().ends_with("fixture.db-journal"));
    }
}
