//! Shared types, error model, and configuration for Stylesmith.
//!
//! This crate is the foundation depended on by all other Stylesmith crates.
//! It provides:
//! - [`StylesmithError`] - the unified error type
//! - The in-memory file model ([`Files`], [`FileEntry`])
//! - Plugin capability traits ([`Transformer`], [`Syntax`])
//! - Source map data and the VLQ mappings codec ([`SourceMap`], [`Mappings`])
//! - Pipeline options and project configuration ([`Options`], [`ProjectConfig`])

pub mod config;
pub mod error;
pub mod plugin;
pub mod sourcemap;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    BuildConfig, CONFIG_FILE_NAME, DEFAULT_PATTERN, MapConfig, NormalizedOptions, Options,
    PatternConfig, PluginEntry, PluginOptions, PluginSpec, PluginsConfig, ProjectConfig,
    SyntaxSpec, load_config, load_config_from,
};
pub use error::{CssSyntaxError, MODULE_NOT_FOUND_CODE, Result, StylesmithError};
pub use plugin::{Node, NodeKind, Stylesheet, Syntax, TransformContext, Transformed, Transformer};
pub use sourcemap::{Mappings, Segment, SourceMap, line_count};
pub use types::{FileEntry, FileStats, Files, MAP_SUFFIX, map_key};
