//! Temporary directories for on-disk stores.

// Test utilities are expected to panic on failure - that's their purpose
#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// File name used by [`TestDir::store_path`].
const STORE_FILE: &str = "cowallet.redb";

/// A managed temporary directory, removed on drop.
///
/// # Example
///
/// ```
/// use cowallet_test_utils::TestDir;
///
/// let dir = TestDir::new();
/// let path = dir.store_path();
/// assert!(path.starts_with(dir.path()));
/// ```
pub struct TestDir {
    inner: TempDir,
}

impl TestDir {
    /// Create a new temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let inner = tempfile::Builder::new()
            .prefix("cowallet-test-")
            .tempdir()
            .expect("failed to create temp directory");
        Self { inner }
    }

    /// Returns the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Join a relative path to the temporary directory.
    #[must_use]
    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.inner.path().join(path)
    }

    /// Path of the default store file inside this directory.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.join(STORE_FILE)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
