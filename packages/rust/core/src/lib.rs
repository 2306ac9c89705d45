//! Stylesheet pipeline orchestration for Stylesmith.
//!
//! [`Stylesmith`] is a build plugin: it resolves the configured transformer
//! chain once and runs it over every matching file of a build. [`host`]
//! provides a small directory-to-directory build to run it in.

pub mod host;
pub mod map_policy;
pub mod pipeline;
pub mod transform;

pub use host::{Build, BuildContext, Plugin, match_patterns};
pub use pipeline::{Stylesmith, plugin_name};
