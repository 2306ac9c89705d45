//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use stylesmith_core::{Build, Stylesmith, map_policy};
use stylesmith_engine::Registry;
use stylesmith_shared::{ProjectConfig, load_config, load_config_from};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Stylesmith: run stylesheets through a configurable transform chain.
#[derive(Parser)]
#[command(
    name = "stylesmith",
    version,
    about = "Build a site directory, transforming its stylesheets through a plugin chain.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Read the source directory, transform stylesheets, write the destination.
    Build {
        /// Project config file (defaults to <root>/stylesmith.toml).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Project root directory.
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Source directory, relative to the root. Overrides the config file.
        #[arg(long)]
        source: Option<String>,

        /// Destination directory, relative to the root. Overrides the config file.
        #[arg(long)]
        destination: Option<String>,

        /// Build environment value (repeatable), e.g. BUILD_ENV=development.
        #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,
    },

    /// List the built-in plugins and syntaxes.
    Plugins,
}

fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialise the tracing subscriber based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "stylesmith=info",
        1 => "stylesmith=debug",
        _ => "stylesmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            config,
            root,
            source,
            destination,
            env,
        } => cmd_build(config.as_deref(), &root, source, destination, env).await,
        Command::Plugins => cmd_plugins(),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(
    config: Option<&Path>,
    root: &Path,
    source: Option<String>,
    destination: Option<String>,
    env: Vec<(String, String)>,
) -> Result<()> {
    let project = read_project(config, root)?;
    let source = source.unwrap_or(project.build.source);
    let destination = destination.unwrap_or(project.build.destination);

    let mut build = Build::new(root)
        .source(&source)
        .destination(&destination)
        .clean(project.build.clean);

    // The process environment supplies the default build environment.
    if let Ok(value) = std::env::var(map_policy::ENV_KEY) {
        build = build.env(map_policy::ENV_KEY, value);
    }
    for (key, value) in env {
        debug!(%key, %value, "build environment");
        build = build.env(key, value);
    }

    let build = build.use_plugin(Stylesmith::new(project.stylesmith));

    info!(root = %root.display(), %source, %destination, "starting build");

    let start = Instant::now();
    let spinner = spinner("Building");
    let result = build.build().await;
    spinner.finish_and_clear();

    let files = result.wrap_err("build failed")?;

    println!();
    println!("  Build complete!");
    println!("  Files:  {}", files.len());
    println!("  Output: {}", build.destination_dir().display());
    println!("  Time:   {:.1}s", start.elapsed().as_secs_f64());
    println!();

    Ok(())
}

fn cmd_plugins() -> Result<()> {
    let registry = Registry::with_builtins();

    println!("Plugins:");
    for name in registry.plugin_names() {
        println!("  {name}");
    }
    println!("Syntaxes:");
    for name in registry.syntax_names() {
        println!("  {name}");
    }
    Ok(())
}

fn read_project(config: Option<&Path>, root: &Path) -> Result<ProjectConfig> {
    let project = match config {
        Some(path) => load_config_from(path),
        None => load_config(root),
    };
    project.wrap_err("failed to load project config")
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(
            style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_pairs_split_on_first_equals() {
        assert_eq!(
            parse_env_pair("BUILD_ENV=development").unwrap(),
            ("BUILD_ENV".to_string(), "development".to_string())
        );
        assert_eq!(
            parse_env_pair("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_env_pair("nope").is_err());
        assert!(parse_env_pair("=x").is_err());
    }

    #[test]
    fn build_command_parses() {
        let cli = Cli::parse_from([
            "stylesmith",
            "-v",
            "build",
            "--root",
            "site",
            "--env",
            "BUILD_ENV=development",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Build { root, env, config, .. } => {
                assert_eq!(root, PathBuf::from("site"));
                assert_eq!(env, vec![("BUILD_ENV".into(), "development".into())]);
                assert!(config.is_none());
            }
            Command::Plugins => panic!("expected build"),
        }
    }
}
