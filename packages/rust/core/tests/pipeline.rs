//! End-to-end behaviour of the `stylesmith` plugin inside a build.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stylesmith_core::{Build, BuildContext, Stylesmith};
use stylesmith_engine::Registry;
use stylesmith_shared::{
    FileEntry, Files, MapConfig, Options, PluginOptions, Result, SourceMap, TransformContext,
    Transformed, Transformer, load_config,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Returns its input unchanged.
struct Identity;

#[async_trait]
impl Transformer for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    async fn apply(&self, css: String, _ctx: &TransformContext) -> Result<Transformed> {
        Ok(Transformed::unmapped(css))
    }
}

/// Appends `/* <name><suffix> */` so the order of application is visible.
struct Mark {
    name: String,
    suffix: String,
}

#[async_trait]
impl Transformer for Mark {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, css: String, _ctx: &TransformContext) -> Result<Transformed> {
        Ok(Transformed::unmapped(format!(
            "{css}/* {}{} */",
            self.name, self.suffix
        )))
    }
}

/// Records the input path each file is processed with.
struct RecordPaths(Arc<Mutex<Vec<Option<PathBuf>>>>);

#[async_trait]
impl Transformer for RecordPaths {
    fn name(&self) -> &str {
        "record-paths"
    }

    async fn apply(&self, css: String, ctx: &TransformContext) -> Result<Transformed> {
        if let Ok(mut seen) = self.0.lock() {
            seen.push(ctx.from.clone());
        }
        Ok(Transformed::unmapped(css))
    }
}

fn mark_factory(
    name: &'static str,
) -> impl Fn(&PluginOptions) -> Result<Arc<dyn Transformer>> + Send + Sync + 'static {
    move |opts| {
        let suffix = opts
            .0
            .get("suffix")
            .and_then(|v| v.as_str())
            .map(|s| format!(":{s}"))
            .unwrap_or_default();
        Ok(Arc::new(Mark {
            name: name.to_string(),
            suffix,
        }))
    }
}

fn registry() -> Arc<Registry> {
    let mut registry = Registry::with_builtins();
    registry
        .register_plugin("identity", |_| Ok(Arc::new(Identity)))
        .register_plugin("broken-plugin", |_| Ok(Arc::new(Identity)))
        .register_plugin("first", mark_factory("first"))
        .register_plugin("second", mark_factory("second"))
        .register_plugin("third", mark_factory("third"))
        .register_plugin("skipped", mark_factory("skipped"));
    Arc::new(registry)
}

fn pipeline(options: Options) -> Stylesmith {
    Stylesmith::with_resolver(options, registry())
}

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("stylesmith-it-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn site() -> Files {
    let mut files = Files::new();
    files.insert("main.css".into(), FileEntry::new("a {\n  color: red;\n}\n"));
    files.insert("css/nested.css".into(), FileEntry::new("b { margin: 0; }\n"));
    files.insert("index.html".into(), FileEntry::new("<link href=main.css>"));
    files.insert("app.js".into(), FileEntry::new("console.log(1)"));
    files
}

/// Runs the pipeline over an in-memory file set; nothing touches the disk.
async fn run(options: Options, files: Files) -> Result<Files> {
    Build::new("/site")
        .use_plugin(pipeline(options))
        .process(files)
        .await
}

async fn run_dev(options: Options, files: Files) -> Result<Files> {
    Build::new("/site")
        .env("BUILD_ENV", "development")
        .use_plugin(pipeline(options))
        .process(files)
        .await
}

fn external() -> MapConfig {
    MapConfig::Options {
        inline: Some(false),
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nothing_matching_is_a_no_op() {
    let mut files = Files::new();
    files.insert("index.html".into(), FileEntry::new("<html>"));

    let out = run(Options::default().plugin("first"), files.clone()).await.unwrap();
    assert_eq!(out, files);
}

#[tokio::test]
async fn only_matching_files_change() {
    let opts = Options::default().pattern(["*.css"]).plugin("first");
    let before = site();
    let out = run(opts, before.clone()).await.unwrap();

    assert_eq!(out["main.css"].text(), "a {\n  color: red;\n}\n/* first */");
    assert_eq!(out["css/nested.css"], before["css/nested.css"]);
    assert_eq!(out["index.html"], before["index.html"]);
    assert_eq!(out["app.js"], before["app.js"]);
}

#[tokio::test]
async fn default_pattern_reaches_nested_stylesheets() {
    let out = run(Options::default().plugin("first"), site()).await.unwrap();
    assert!(out["main.css"].text().ends_with("/* first */"));
    assert!(out["css/nested.css"].text().ends_with("/* first */"));
    assert_eq!(out["index.html"].text(), "<link href=main.css>");
}

// ---------------------------------------------------------------------------
// Plugin resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn plugin_forms_apply_in_declaration_order() {
    let opts: Options = serde_json::from_value(serde_json::json!({
        "pattern": "main.css",
        "plugins": [
            "first",
            { "second": true, "skipped": false },
            { "third": { "suffix": "x" } }
        ]
    }))
    .unwrap();

    let out = run(opts, site()).await.unwrap();
    assert_eq!(
        out["main.css"].text(),
        "a {\n  color: red;\n}\n/* first *//* second *//* third:x */"
    );
}

#[tokio::test]
async fn missing_plugin_fails_before_touching_files() {
    let opts = Options::default().plugin("first").plugin("nonexistent-plugin");
    let stylesmith = pipeline(opts);
    let build = Build::new("/site");

    let mut files = site();
    let err = stylesmith.run(&mut files, &build).await.unwrap_err();

    assert_eq!(err.code(), Some("ERR_MODULE_NOT_FOUND"));
    assert_eq!(err.kind(), "ModuleNotFoundError");
    assert_eq!(files, site());
}

#[tokio::test]
async fn relative_roots_give_absolute_input_paths() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let opts = Options::default()
        .pattern(["*.css"])
        .plugin(stylesmith_shared::PluginEntry::Instance(Arc::new(
            RecordPaths(Arc::clone(&seen)),
        )));

    let build = Build::new(".").use_plugin(pipeline(opts));
    assert!(BuildContext::source(&build).is_absolute());

    let mut files = site();
    files.insert("bad.css".into(), FileEntry::new("invalid-css"));
    let err = build.process(files).await.unwrap_err();

    let reported = err.to_string();
    assert!(reported.starts_with('/'), "{reported}");
    assert!(reported.contains("src/bad.css:1:1"));

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let from = seen[0].clone().unwrap();
    assert!(from.is_absolute());
    assert!(from.ends_with("src/main.css"));
}

// ---------------------------------------------------------------------------
// Contents
// ---------------------------------------------------------------------------

#[tokio::test]
async fn identity_chain_without_maps_is_byte_identical() {
    let opts = Options::default()
        .plugin("identity")
        .map(MapConfig::Enabled(false));
    let before = site();

    let out = run_dev(opts, before.clone()).await.unwrap();
    assert_eq!(out, before);
    assert!(!out.contains_key("main.css.map"));
}

#[tokio::test]
async fn invalid_input_is_a_syntax_error() {
    let mut files = Files::new();
    files.insert("broken.css".into(), FileEntry::new("invalid-css"));

    let err = run(Options::default().plugin("broken-plugin"), files)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "CssSyntaxError");
    assert!(err.to_string().contains("broken.css:1:1"));
}

// ---------------------------------------------------------------------------
// Source maps
// ---------------------------------------------------------------------------

#[tokio::test]
async fn external_maps_are_written_next_to_the_file() {
    let mut files = site();
    if let Some(entry) = files.get_mut("main.css") {
        entry.mode = Some("0640".into());
    }

    let opts = Options::default().plugin("identity").map(external());
    let out = run(opts, files).await.unwrap();

    let css = out["main.css"].text();
    assert!(css.ends_with("\n/*# sourceMappingURL=main.css.map */"));
    assert!(!css.contains("data:application/json"));

    let companion = &out["main.css.map"];
    assert_eq!(companion.mode.as_deref(), Some("0640"));
    let map = SourceMap::from_json(&companion.text()).unwrap();
    assert_eq!(map.version, 3);
    assert_eq!(map.file.as_deref(), Some("main.css"));
    assert_eq!(map.sources, vec!["main.css"]);

    assert!(out.contains_key("css/nested.css.map"));
    assert!(!out.contains_key("index.html.map"));
}

#[tokio::test]
async fn inline_maps_replace_existing_companions() {
    let mut files = site();
    files.insert(
        "main.css.map".into(),
        FileEntry::new(
            r#"{"version":3,"sources":["main.scss"],"names":[],"mappings":"AAAA;AACA;AACA;AACA"}"#,
        ),
    );

    let opts = Options::default()
        .plugin("identity")
        .map(MapConfig::Enabled(true));
    let out = run(opts, files).await.unwrap();

    assert!(!out.contains_key("main.css.map"));
    assert!(!out.contains_key("css/nested.css.map"));
    assert!(out["main.css"]
        .text()
        .contains("\n/*# sourceMappingURL=data:application/json;base64,"));
}

#[tokio::test]
async fn development_builds_default_to_inline_maps() {
    let out = run_dev(Options::default().plugin("identity"), site())
        .await
        .unwrap();
    assert!(out["main.css"]
        .text()
        .contains("/*# sourceMappingURL=data:application/json;base64,"));

    let out = run(Options::default().plugin("identity"), site()).await.unwrap();
    assert_eq!(out, site());
}

#[tokio::test]
async fn reprocessing_own_output_is_stable() {
    for map in [external(), MapConfig::Enabled(true)] {
        let opts = || Options::default().plugin("identity").map(map);

        let once = run(opts(), site()).await.unwrap();
        let twice = run(opts(), once.clone()).await.unwrap();
        assert_eq!(twice, once, "map config {map:?}");
    }
}

// ---------------------------------------------------------------------------
// Host build
// ---------------------------------------------------------------------------

#[tokio::test]
async fn project_build_from_config_file() {
    let root = temp_dir();
    std::fs::create_dir_all(root.join("assets/css")).unwrap();
    std::fs::write(root.join("assets/css/site.css"), "a {}   \n\n\n").unwrap();
    std::fs::write(root.join("assets/index.html"), "<html></html>").unwrap();
    std::fs::write(
        root.join("stylesmith.toml"),
        r#"
[build]
source = "assets"
destination = "public"

[stylesmith]
map = { inline = false }
plugins = [{ banner = { text = "site" } }, "trim-whitespace"]
"#,
    )
    .unwrap();

    let project = load_config(&root).unwrap();
    let build = Build::new(&root)
        .source(&project.build.source)
        .destination(&project.build.destination)
        .use_plugin(Stylesmith::new(project.stylesmith));
    build.build().await.unwrap();

    let out = root.join("public");
    let css = std::fs::read_to_string(out.join("css/site.css")).unwrap();
    assert_eq!(css, "/*! site */\na {}\n\n/*# sourceMappingURL=site.css.map */");

    let map = std::fs::read_to_string(out.join("css/site.css.map")).unwrap();
    let map = SourceMap::from_json(&map).unwrap();
    assert_eq!(map.sources, vec!["site.css"]);
    assert_eq!(
        map.sources_content,
        Some(vec![Some("a {}   \n\n\n".to_string())])
    );
    assert_eq!(
        std::fs::read_to_string(out.join("index.html")).unwrap(),
        "<html></html>"
    );

    let _ = std::fs::remove_dir_all(&root);
}
