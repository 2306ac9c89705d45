//! Minimal build host: reads a source tree into [`Files`], runs plugins over
//! it, and writes the result to a destination tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use stylesmith_shared::{FileEntry, FileStats, Files, Result, StylesmithError};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// What a plugin can ask of the build it runs in.
pub trait BuildContext: Send + Sync {
    /// Keys among `keys` matching any of `patterns` (`!`-prefixed patterns exclude).
    fn match_files(&self, patterns: &[String], keys: &[&str]) -> Vec<String>;

    /// Absolute source directory that file keys are relative to.
    fn source(&self) -> &Path;

    /// Build environment value, e.g. `BUILD_ENV`.
    fn env(&self, name: &str) -> Option<&str>;
}

/// A step the build runs over the whole file set.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, files: &mut Files, ctx: &dyn BuildContext) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Glob matching
// ---------------------------------------------------------------------------

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Select the keys matching at least one include pattern and no `!` pattern.
pub fn match_patterns(patterns: &[String], keys: &[&str]) -> Vec<String> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();

    for raw in patterns {
        let (negated, source) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw.as_str()),
        };
        match Pattern::new(source) {
            Ok(p) if negated => exclude.push(p),
            Ok(p) => include.push(p),
            Err(e) => warn!(pattern = %raw, error = %e, "ignoring invalid pattern"),
        }
    }

    keys.iter()
        .filter(|key| include.iter().any(|p| p.matches_with(key, MATCH_OPTIONS)))
        .filter(|key| !exclude.iter().any(|p| p.matches_with(key, MATCH_OPTIONS)))
        .map(|key| key.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// A directory-to-directory build.
pub struct Build {
    root: PathBuf,
    source: PathBuf,
    destination: PathBuf,
    clean: bool,
    env: BTreeMap<String, String>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Build {
    /// A build rooted at `root`, reading `src/` and writing `build/`.
    ///
    /// A relative root is resolved against the current directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            source: root.join("src"),
            destination: root.join("build"),
            root,
            clean: true,
            env: BTreeMap::new(),
            plugins: Vec::new(),
        }
    }

    /// Set the source directory, relative to the root.
    pub fn source(mut self, dir: impl AsRef<Path>) -> Self {
        self.source = self.root.join(dir);
        self
    }

    /// Set the destination directory, relative to the root.
    pub fn destination(mut self, dir: impl AsRef<Path>) -> Self {
        self.destination = self.root.join(dir);
        self
    }

    /// Whether to remove the destination before writing.
    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Set a build environment value.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Append a plugin.
    pub fn use_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn destination_dir(&self) -> &Path {
        &self.destination
    }

    /// Read every file under the source directory.
    #[instrument(skip_all, fields(source = %self.source.display()))]
    pub fn read(&self) -> Result<Files> {
        let mut files = Files::new();

        for entry in WalkDir::new(&self.source).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.source).to_path_buf();
                StylesmithError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let key = relative_key(&self.source, path);
            let contents = std::fs::read(path).map_err(|e| StylesmithError::io(path, e))?;
            let metadata = entry
                .metadata()
                .map_err(|e| StylesmithError::io(path, e.into()))?;

            files.insert(
                key,
                FileEntry {
                    contents,
                    mode: file_mode(&metadata),
                    stats: Some(FileStats {
                        size: metadata.len(),
                        modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                    }),
                },
            );
        }

        debug!(count = files.len(), "read source files");
        Ok(files)
    }

    /// Run every plugin over `files`, in order.
    pub async fn process(&self, mut files: Files) -> Result<Files> {
        for plugin in &self.plugins {
            debug!(plugin = plugin.name(), "running plugin");
            plugin.run(&mut files, self).await?;
        }
        Ok(files)
    }

    /// Write `files` under the destination directory.
    #[instrument(skip_all, fields(destination = %self.destination.display()))]
    pub fn write(&self, files: &Files) -> Result<()> {
        if self.clean && self.destination.exists() {
            std::fs::remove_dir_all(&self.destination)
                .map_err(|e| StylesmithError::io(&self.destination, e))?;
        }

        for (key, entry) in files {
            let path = self.destination.join(key);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| StylesmithError::io(parent, e))?;
            }
            std::fs::write(&path, &entry.contents).map_err(|e| StylesmithError::io(&path, e))?;
            set_file_mode(&path, entry.mode.as_deref())?;
        }

        info!(count = files.len(), "wrote build output");
        Ok(())
    }

    /// Read, process and write.
    pub async fn build(&self) -> Result<Files> {
        let files = self.read()?;
        let files = self.process(files).await?;
        self.write(&files)?;
        Ok(files)
    }
}

impl BuildContext for Build {
    fn match_files(&self, patterns: &[String], keys: &[&str]) -> Vec<String> {
        match_patterns(patterns, keys)
    }

    fn source(&self) -> &Path {
        &self.source
    }

    fn env(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }
}

fn relative_key(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> Option<String> {
    use std::os::unix::fs::PermissionsExt;
    Some(format!("{:04o}", metadata.permissions().mode() & 0o7777))
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> Option<String> {
    None
}

#[cfg(unix)]
fn set_file_mode(path: &Path, mode: Option<&str>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let Some(mode) = mode.and_then(|m| u32::from_str_radix(m, 8).ok()) else {
        return Ok(());
    };
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| StylesmithError::io(path, e))
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path, _mode: Option<&str>) -> Result<()> {
    Ok(())
}
