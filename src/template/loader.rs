//! Template loader: directory listing, reading, fingerprinting, decoding.
//!
//! Two modes are offered. [`TemplateLoader::load_dir`] stops at the first
//! bad file, which is what a deployment run wants: nothing is sent to the
//! registry unless every template in the set loaded. [`TemplateLoader::load_dir_report`]
//! tries every file and collects failures for interactive review.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, TemplateError};

use super::fingerprint::Fingerprinter;
use super::spec::{LocalTemplate, TemplateFormat};

/// Loads local templates from disk.
#[derive(Debug, Default)]
pub struct TemplateLoader {
    /// Fingerprinter applied to raw file bytes.
    fingerprinter: Fingerprinter,
}

/// A file that failed to load.
#[derive(Debug)]
pub struct LoadFailure {
    /// File that failed.
    pub path: PathBuf,
    /// Why it failed.
    pub error: TemplateError,
}

/// Result of loading a directory without stopping at the first failure.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Templates that loaded.
    pub templates: Vec<LocalTemplate>,
    /// Files that did not.
    pub failures: Vec<LoadFailure>,
}

impl TemplateLoader {
    /// Creates a new template loader.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fingerprinter: Fingerprinter::new(),
        }
    }

    /// Lists template candidates in a directory, sorted by file name.
    ///
    /// Subdirectories are skipped; every other entry is a candidate.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list_entries(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let unreadable = |e: std::io::Error| TemplateError::DirectoryUnreadable {
            path: dir.to_path_buf(),
            message: e.to_string(),
        };

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(unreadable)? {
            let path = entry.map_err(unreadable)?.path();
            if path.is_dir() {
                debug!("Skipping directory: {}", path.display());
                continue;
            }
            entries.push(path);
        }

        entries.sort();
        Ok(entries)
    }

    /// Loads every template in a directory, failing on the first bad file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or any file fails
    /// to load.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<LocalTemplate>> {
        let dir = dir.as_ref();
        info!("Loading templates from: {}", dir.display());

        let templates = self
            .list_entries(dir)?
            .iter()
            .map(|path| self.load_file(path))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!("Loaded {} template(s)", templates.len());
        Ok(templates)
    }

    /// Loads every template in a directory, collecting per-file failures.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory itself cannot be read.
    pub fn load_dir_report(&self, dir: impl AsRef<Path>) -> Result<LoadReport> {
        let dir = dir.as_ref();
        info!("Loading templates from: {}", dir.display());

        let mut report = LoadReport::default();
        for path in self.list_entries(dir)? {
            match self.load_file(&path) {
                Ok(template) => report.templates.push(template),
                Err(error) => {
                    warn!("{error}");
                    report.failures.push(LoadFailure { path, error });
                }
            }
        }

        info!(
            "Loaded {} template(s), {} failure(s)",
            report.templates.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Loads a single template file.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is unsupported, or the file cannot
    /// be read or decoded.
    pub fn load_file(&self, path: impl AsRef<Path>) -> std::result::Result<LocalTemplate, TemplateError> {
        let path = path.as_ref();
        debug!("Parsing template: {}", path.display());

        let format = TemplateFormat::from_path(path)?;

        let bytes = std::fs::read(path).map_err(|e| TemplateError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        self.parse_bytes(path, &bytes, format)
    }

    /// Fingerprints and decodes template bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not decode into a usable template.
    pub fn parse_bytes(
        &self,
        path: &Path,
        bytes: &[u8],
        format: TemplateFormat,
    ) -> std::result::Result<LocalTemplate, TemplateError> {
        // Fingerprint first: it must cover the exact bytes, not the decoded form.
        let fingerprint = self.fingerprinter.fingerprint(bytes);

        let document: serde_json::Value = match format {
            TemplateFormat::Yaml => serde_yaml::from_slice(bytes)
                .map_err(|e| TemplateError::parse(path, format!("YAML parse error: {e}")))?,
            TemplateFormat::Json => serde_json::from_slice(bytes)
                .map_err(|e| TemplateError::parse(path, format!("JSON parse error: {e}")))?,
        };

        let template = LocalTemplate::from_document(path, fingerprint, document)?;
        debug!(
            "Template '{}' fingerprint {}",
            template.display_name,
            self.fingerprinter.short(template.fingerprint())
        );
        Ok(template)
    }
}

impl LoadReport {
    /// Returns true if every file loaded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
