//! On-disk format versions and magic numbers.
//!
//! A build refuses files newer than it can interpret.

/// Database file format version
pub const DATABASE_FORMAT_VERSION: u16 = 1;

/// Rollback journal format version
pub const JOURNAL_FORMAT_VERSION: u16 = 1;

/// Magic numbers for file validation
pub mod magic {
    /// Database header magic: "VDBF" (Vedis DataBase File)
    pub const DATABASE: u32 = 0x5644_4246;

    /// Journal magic: "VDJL" (Vedis JournaL)
    pub const JOURNAL: u32 = 0x5644_4A4C;
}

/// Version compatibility information
pub struct FormatVersion {
    /// Current version of this format
    pub current: u16,
    /// Minimum supported version for reading
    pub min_read: u16,
    /// Minimum supported version for writing
    pub min_write: u16,
}

impl FormatVersion {
    /// Check if a version can be read
    pub fn can_read(&self, version: u16) -> bool {
        version >= self.min_read && version <= self.current
    }

    /// Check if a version can be written
    pub fn can_write(&self, version: u16) -> bool {
        version >= self.min_write && version <= self.current
    }
}

/// Database file format version info
pub fn database_version() -> FormatVersion {
    FormatVersion {
        current: DATABASE_FORMAT_VERSION,
        min_read: 1,
        min_write: 1,
    }
}

/// Journal format version info
pub fn journal_version() -> FormatVersion {
    FormatVersion {
        current: JOURNAL_FORMAT_VERSION,
        min_read: 1,
        min_write: 1,
    }
}
