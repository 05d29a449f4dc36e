//! Golden test utilities for metadata snapshots.
//!
//! Snapshots are JSON files compared structurally, so formatting in the
//! golden file does not matter.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// A golden test that compares serialized values against JSON files.
pub struct GoldenTest {
    name: String,
    golden_dir: PathBuf,
    update_mode: bool,
}

impl GoldenTest {
    /// Creates a new golden test reading files from `golden_dir`.
    pub fn new(name: impl Into<String>, golden_dir: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            golden_dir: golden_dir.as_ref().to_path_buf(),
            update_mode: std::env::var("UPDATE_GOLDEN").is_ok(),
        }
    }

    /// Creates a golden test using this crate's `golden/` directory.
    pub fn with_default_dir(name: impl Into<String>) -> Self {
        Self::new(name, PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("golden"))
    }

    /// Asserts that `actual` serializes to the JSON stored in the golden file.
    ///
    /// If `UPDATE_GOLDEN` is set, rewrites the golden file instead.
    pub fn assert_json<T: Serialize>(&self, actual: &T) {
        let path = self.file_path();
        let actual = serde_json::to_value(actual).expect("Failed to serialize value");

        if self.update_mode {
            let text = serde_json::to_string_pretty(&actual).expect("Failed to render JSON");
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("Failed to create golden directory");
            }
            fs::write(&path, text + "\n").expect("Failed to write golden file");
            return;
        }

        let Ok(text) = fs::read_to_string(&path) else {
            panic!(
                "Golden file not found: {:?}\n\
                 Run with UPDATE_GOLDEN=1 to create it.\n\
                 Actual:\n{}",
                path,
                serde_json::to_string_pretty(&actual).unwrap_or_default()
            );
        };
        let expected: serde_json::Value =
            serde_json::from_str(&text).expect("Golden file is not valid JSON");

        assert_eq!(
            actual, expected,
            "Golden test '{}' failed. Run with UPDATE_GOLDEN=1 to update.",
            self.name
        );
    }

    fn file_path(&self) -> PathBuf {
        self.golden_dir.join(format!("{}.json", self.name))
    }
}
