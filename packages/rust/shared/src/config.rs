//! Pipeline options and project configuration for Stylesmith.
//!
//! [`Options`] is what a host passes when registering the pipeline. It can be
//! built in code or deserialized from JSON/TOML, where every union field
//! accepts the short and the long form (`pattern = "*.css"` or a list, etc.).
//! The CLI reads a `stylesmith.toml` project file into [`ProjectConfig`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, StylesmithError};
use crate::plugin::{Syntax, Transformer};

/// Default glob pattern selecting the files to process.
pub const DEFAULT_PATTERN: &str = "**/*.css";

/// Default project file name looked up by the CLI.
pub const CONFIG_FILE_NAME: &str = "stylesmith.toml";

// ---------------------------------------------------------------------------
// Raw options
// ---------------------------------------------------------------------------

/// Options as given at registration, before defaults are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Pattern(s) of files to process, relative to the build source directory.
    pub pattern: Option<PatternConfig>,
    /// `true` for inline maps, `{ inline = false }` for external `.map` files.
    pub map: Option<MapConfig>,
    /// Custom syntax, by name or as an instance.
    pub syntax: Option<SyntaxSpec>,
    /// Plugins to run, in order.
    pub plugins: Option<PluginsConfig>,
}

/// One pattern or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternConfig {
    One(String),
    Many(Vec<String>),
}

/// Source map setting: a flag, or a table with an optional `inline` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MapConfig {
    Enabled(bool),
    Options {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inline: Option<bool>,
    },
}

/// A syntax to parse input with.
#[derive(Clone)]
pub enum SyntaxSpec {
    /// Resolved by name through the plugin resolver.
    Name(String),
    /// Used as-is.
    Module(Arc<dyn Syntax>),
}

/// The `plugins` option: a single entry or an ordered list of entries.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PluginsConfig {
    Many(Vec<PluginEntry>),
    One(PluginEntry),
}

/// One element of the `plugins` list.
#[derive(Clone)]
pub enum PluginEntry {
    /// A plugin name, instantiated with empty options.
    Name(String),
    /// Plugin names mapped to `false` (skip), `true` (empty options) or options.
    /// Key order is declaration order.
    Map(serde_json::Map<String, serde_json::Value>),
    /// A ready transformer, used as-is.
    Instance(Arc<dyn Transformer>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPluginEntry {
    Name(String),
    Map(serde_json::Map<String, serde_json::Value>),
}

impl<'de> Deserialize<'de> for PluginEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match RawPluginEntry::deserialize(deserializer)? {
            RawPluginEntry::Name(name) => Self::Name(name),
            RawPluginEntry::Map(map) => Self::Map(map),
        })
    }
}

impl<'de> Deserialize<'de> for SyntaxSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Name)
    }
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Self::Instance(t) => f.debug_tuple("Instance").field(&t.name()).finish(),
        }
    }
}

impl fmt::Debug for SyntaxSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Module(s) => f.debug_tuple("Module").field(&s.name()).finish(),
        }
    }
}

impl From<&str> for PluginEntry {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl Options {
    /// Set the file pattern(s).
    pub fn pattern<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pattern = Some(PatternConfig::Many(
            patterns.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Set the source map option.
    pub fn map(mut self, map: MapConfig) -> Self {
        self.map = Some(map);
        self
    }

    /// Set the syntax.
    pub fn syntax(mut self, syntax: SyntaxSpec) -> Self {
        self.syntax = Some(syntax);
        self
    }

    /// Append a plugin entry.
    pub fn plugin(mut self, entry: impl Into<PluginEntry>) -> Self {
        let entry = entry.into();
        self.plugins = Some(match self.plugins.take() {
            None => PluginsConfig::Many(vec![entry]),
            Some(PluginsConfig::One(first)) => PluginsConfig::Many(vec![first, entry]),
            Some(PluginsConfig::Many(mut list)) => {
                list.push(entry);
                PluginsConfig::Many(list)
            }
        });
        self
    }

    /// Apply defaults and flatten the plugin list.
    pub fn normalize(self) -> NormalizedOptions {
        let patterns = match self.pattern {
            None => vec![DEFAULT_PATTERN.to_string()],
            Some(PatternConfig::One(p)) => vec![p],
            Some(PatternConfig::Many(list)) => list,
        };

        let entries = match self.plugins {
            None => Vec::new(),
            Some(PluginsConfig::One(entry)) => vec![entry],
            Some(PluginsConfig::Many(list)) => list,
        };

        let mut plugins = Vec::new();
        for entry in entries {
            match entry {
                PluginEntry::Name(name) => plugins.push(PluginSpec::Named {
                    name,
                    options: PluginOptions::default(),
                }),
                PluginEntry::Map(map) => {
                    for (name, value) in map {
                        match value {
                            serde_json::Value::Bool(false) => {}
                            serde_json::Value::Bool(true) | serde_json::Value::Null => {
                                plugins.push(PluginSpec::Named {
                                    name,
                                    options: PluginOptions::default(),
                                })
                            }
                            other => plugins.push(PluginSpec::Named {
                                name,
                                options: PluginOptions(other),
                            }),
                        }
                    }
                }
                PluginEntry::Instance(transformer) => {
                    plugins.push(PluginSpec::Instance(transformer))
                }
            }
        }

        NormalizedOptions {
            patterns,
            map: self.map,
            syntax: self.syntax,
            plugins,
        }
    }
}

// ---------------------------------------------------------------------------
// Normalized options
// ---------------------------------------------------------------------------

/// Options with defaults applied; what the pipeline works from.
#[derive(Debug, Clone)]
pub struct NormalizedOptions {
    /// Never empty.
    pub patterns: Vec<String>,
    /// `None` when the caller left `map` unset.
    pub map: Option<MapConfig>,
    pub syntax: Option<SyntaxSpec>,
    /// Enabled plugins in processing order.
    pub plugins: Vec<PluginSpec>,
}

/// A plugin to resolve, in processing order.
#[derive(Clone)]
pub enum PluginSpec {
    Named { name: String, options: PluginOptions },
    Instance(Arc<dyn Transformer>),
}

impl PluginSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Named { name, .. } => name,
            Self::Instance(t) => t.name(),
        }
    }
}

impl fmt::Debug for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { name, options } => f
                .debug_struct("Named")
                .field("name", name)
                .field("options", &options.0)
                .finish(),
            Self::Instance(t) => f.debug_tuple("Instance").field(&t.name()).finish(),
        }
    }
}

/// Options handed to a plugin factory. An empty object when none were given.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginOptions(pub serde_json::Value);

impl Default for PluginOptions {
    fn default() -> Self {
        Self(serde_json::Value::Object(serde_json::Map::new()))
    }
}

impl PluginOptions {
    /// Deserialize into a plugin's typed options.
    pub fn parse<T: serde::de::DeserializeOwned>(&self, plugin: &str) -> Result<T> {
        serde_json::from_value(self.0.clone()).map_err(|e| {
            StylesmithError::config(format!("invalid options for plugin {plugin}: {e}"))
        })
    }
}

// ---------------------------------------------------------------------------
// Project config (stylesmith.toml)
// ---------------------------------------------------------------------------

/// Top-level project file read by the CLI.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectConfig {
    /// Directory layout.
    #[serde(default)]
    pub build: BuildConfig,

    /// Pipeline options.
    #[serde(default)]
    pub stylesmith: Options,
}

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Source directory, relative to the project root.
    #[serde(default = "default_source")]
    pub source: String,

    /// Destination directory, relative to the project root.
    #[serde(default = "default_destination")]
    pub destination: String,

    /// Remove the destination before writing.
    #[serde(default = "default_true")]
    pub clean: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            destination: default_destination(),
            clean: true,
        }
    }
}

fn default_source() -> String {
    "src".into()
}
fn default_destination() -> String {
    "build".into()
}
fn default_true() -> bool {
    true
}

/// Load a project config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StylesmithError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| StylesmithError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Load `stylesmith.toml` from `root`. Returns defaults if the file does not exist.
pub fn load_config(root: &Path) -> Result<ProjectConfig> {
    let path = root.join(CONFIG_FILE_NAME);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(ProjectConfig::default());
    }

    load_config_from(&path)
}
