//! Stylesheet processing engine for Stylesmith.
//!
//! This crate provides:
//! - [`Processor`] - runs input through a syntax and a transformer chain,
//!   composing source maps across steps and with earlier build stages
//! - [`Registry`] / [`PluginResolver`] - name-based plugin and syntax loading
//! - [`syntax`] - the built-in `css` and `scss` syntaxes
//! - [`plugins`] - the built-in transformers

pub mod plugins;
pub mod processor;
pub mod registry;
pub mod sourcemap;
pub mod syntax;

pub use processor::{MapOptions, ProcessOptions, ProcessResult, Processor};
pub use registry::{PluginFactory, PluginResolver, Registry, resolve_processor};
pub use syntax::{CssSyntax, ScssSyntax};
