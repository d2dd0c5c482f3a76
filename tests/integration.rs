use std::path::Path;
use std::sync::Arc;

use nimbus_imports::hooks::{HookLoadArgs, HookResolveIdArgs, HookTransformArgs};
use nimbus_imports::{
    imports_plugin, utils, BuildConfig, FsResolver, HostOptions, ImportsPlugin, Plugin,
    PluginContext, ResolvedConfig,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Lay out a small project under a temp dir and return it.
fn create_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let write = |rel: &str, content: &str| {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    };
    write("src/data.json", r#"{"title":"Nimbus","count":2}"#);
    write("src/pages/notes.md", "# Notes\nline two");
    write("src/logo.svg", "<svg viewBox=\"0 0 1 1\"/>");
    write(
        "src/pages/index.nbx",
        concat!(
            "import data from \"/src/data.json\" assert { type: \"json\" };\n",
            "import notes from \"./notes.md\" assert { type: \"text\" };\n",
            "const $$Index = $$createComponent(($$result, $$props, $$slots) => {\n",
            "  return $$render([data.title, notes]);\n",
            "});\n",
            "export default $$Index;\n",
        ),
    );
    dir
}

/// Plugin configured against the project root, with an absolute out dir.
fn configure(root: &Path) -> ImportsPlugin {
    let plugin = imports_plugin();
    plugin.config_resolved(&ResolvedConfig {
        root: utils::normalize(&root.to_string_lossy()),
        build: BuildConfig {
            out_dir: utils::normalize(&root.join("dist").to_string_lossy()),
            assets_dir: "assets".to_string(),
        },
        ..ResolvedConfig::default()
    });
    plugin
}

fn host_context(root: &Path) -> PluginContext {
    PluginContext::new(Arc::new(FsResolver::new(root)))
}

fn page_id(root: &Path) -> String {
    utils::normalize(&root.join("src/pages/index.nbx").to_string_lossy())
}

/// Pull the first assertion-encoded specifier out of rewritten source.
fn first_encoded_specifier(code: &str) -> String {
    code.split('"')
        .find(|part| part.contains("assert="))
        .expect("rewritten source carries an encoded specifier")
        .to_string()
}

// ============================================================================
// Parse-to-resolve flow
// ============================================================================

#[tokio::test]
async fn asserted_import_flows_from_parse_to_load() {
    let project = create_project();
    let plugin = configure(project.path());
    let ctx = host_context(project.path());

    // The host runs registered parser extensions over every module.
    let mut options = HostOptions::default();
    plugin.options(&mut options);
    let extension = &options.parser_extensions[0];

    let source = std::fs::read_to_string(project.path().join("src/pages/index.nbx")).unwrap();
    let importer = page_id(project.path());
    let rewritten = extension
        .pre_parse(&source, &importer)
        .unwrap()
        .expect("assertions trigger a rewrite");

    // Assertion clauses are gone; specifiers carry the encoded suffix.
    assert!(!rewritten.contains("assert {"));
    assert!(rewritten.contains("\"/src/data.json.js?assert=%7B%22type%22%3A%22json%22%7D\""));
    assert!(rewritten.contains("\"./notes.md.js?assert=%7B%22type%22%3A%22text%22%7D\""));

    // The host then resolves each rewritten specifier.
    let specifier = first_encoded_specifier(&rewritten);
    let resolved = plugin
        .resolve_id(
            &ctx,
            &HookResolveIdArgs {
                specifier: &specifier,
                importer: Some(&importer),
                is_entry: false,
            },
        )
        .await
        .unwrap()
        .expect("asserted specifier resolves");

    let data_path = utils::normalize(&project.path().join("src/data.json").to_string_lossy());
    assert_eq!(
        resolved.id.as_str(),
        format!("{data_path}.js?assert=%7B%22type%22%3A%22json%22%7D")
    );

    // And loads the typed module for the resolved id.
    let loaded = plugin
        .load(&ctx, &HookLoadArgs { id: &resolved.id })
        .await
        .unwrap()
        .expect("asserted id loads");
    assert_eq!(
        loaded.code.as_str(),
        r#"export default {"title":"Nimbus","count":2}"#
    );
}

#[tokio::test]
async fn relative_asserted_import_resolves_against_importer() {
    let project = create_project();
    let plugin = configure(project.path());
    let ctx = host_context(project.path());
    let importer = page_id(project.path());

    let resolved = plugin
        .resolve_id(
            &ctx,
            &HookResolveIdArgs {
                specifier: "./notes.md.js?assert=%7B%22type%22%3A%22text%22%7D",
                importer: Some(&importer),
                is_entry: false,
            },
        )
        .await
        .unwrap()
        .expect("relative asserted specifier resolves");

    let notes_path =
        utils::normalize(&project.path().join("src/pages/notes.md").to_string_lossy());
    assert!(resolved.id.starts_with(notes_path.as_str()));

    let loaded = plugin
        .load(&ctx, &HookLoadArgs { id: &resolved.id })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.code.as_str(), "export default \"# Notes\\nline two\"");
}

#[tokio::test]
async fn plain_imports_never_engage_the_pipeline() {
    let project = create_project();
    let plugin = configure(project.path());
    let ctx = host_context(project.path());

    let mut options = HostOptions::default();
    plugin.options(&mut options);
    let untouched = options.parser_extensions[0]
        .pre_parse("import x from \"./x.js\";\n", "/src/m.js")
        .unwrap();
    assert!(untouched.is_none());

    let resolved = plugin
        .resolve_id(
            &ctx,
            &HookResolveIdArgs {
                specifier: "./x.js",
                importer: None,
                is_entry: false,
            },
        )
        .await
        .unwrap();
    assert!(resolved.is_none());

    let loaded = plugin
        .load(&ctx, &HookLoadArgs { id: "/src/x.js" })
        .await
        .unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn unsupported_assertion_type_fails_the_load() {
    let project = create_project();
    let plugin = configure(project.path());
    let ctx = host_context(project.path());

    let err = plugin
        .load(
            &ctx,
            &HookLoadArgs {
                id: "/src/data.yaml.js?assert=%7B%22type%22%3A%22yaml%22%7D",
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Unsupported assertion: \"yaml\"");
}

// ============================================================================
// Metadata transform
// ============================================================================

#[tokio::test]
async fn page_transform_installs_metadata_surface() {
    let project = create_project();
    let plugin = configure(project.path());
    let ctx = host_context(project.path());
    let importer = page_id(project.path());

    let source = std::fs::read_to_string(project.path().join("src/pages/index.nbx")).unwrap();
    let out = plugin
        .transform(
            &ctx,
            &HookTransformArgs {
                id: &importer,
                code: &source,
            },
        )
        .await
        .unwrap()
        .expect("scripting sources are transformed");

    let code = out.code.unwrap();
    assert!(code.starts_with("{let s=Symbol.for(\"import.meta\")"));
    assert!(code.contains(&format!("m.fileHref={}", utils::js_string(&importer))));
    assert!(code.contains("m.pageHref=m.fileHref"));
    assert!(code.contains("m.siteHref=\"http://localhost:3000/\""));
    assert!(code.contains(
        "globalThis[Symbol.for(\"import.meta\")].props=$$props;\n  return $$render"
    ));

    let map = out.map.unwrap();
    assert_eq!(map.sources, vec![importer]);
    assert_eq!(map.sources_content.as_ref().unwrap()[0], source);
}

#[tokio::test]
async fn non_scripting_sources_are_left_alone() {
    let project = create_project();
    let plugin = configure(project.path());
    let ctx = host_context(project.path());

    let out = plugin
        .transform(
            &ctx,
            &HookTransformArgs {
                id: "/src/app.css",
                code: "body{}",
            },
        )
        .await
        .unwrap();
    assert!(out.is_none());
}

// ============================================================================
// Asset emission and dev serving
// ============================================================================

#[tokio::test]
async fn build_end_copies_registered_assets() {
    let project = create_project();
    let plugin = configure(project.path());
    let ctx = host_context(project.path());

    // The host runtime registers assets through the shared handle as
    // injected `with()` accessors run.
    let logo = utils::normalize(&project.path().join("src/logo.svg").to_string_lossy());
    let asset = plugin.assets().add(&logo);
    assert_eq!(asset.extension, ".svg");

    plugin.build_end(&ctx).await.unwrap();

    let emitted = project.path().join("dist/assets").join(&asset.hashname);
    assert_eq!(
        std::fs::read_to_string(emitted).unwrap(),
        "<svg viewBox=\"0 0 1 1\"/>"
    );

    // The dev server resolves the same asset by its public path.
    let served = plugin
        .handle_request(&format!("/assets/{}", asset.hashname))
        .unwrap();
    assert_eq!(served, std::path::PathBuf::from(&logo));
}

#[tokio::test]
async fn build_end_without_assets_writes_nothing() {
    let project = create_project();
    let plugin = configure(project.path());
    let ctx = host_context(project.path());

    plugin.build_end(&ctx).await.unwrap();
    assert!(!project.path().join("dist").exists());
}
