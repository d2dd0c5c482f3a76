//! Metadata injection for scripting sources.
//!
//! Every scripting module gets a header block that wires the module's
//! `import.meta` to the process-wide registry slot:
//!
//! 1. after each component entry point, a statement publishes the
//!    component's `$$props` into the slot
//! 2. a prepended header assigns `fileHref` / `pageHref` / `siteHref` /
//!    `requestHref` and installs the `page` / `request` / `props`
//!    accessors
//!
//! The rewrite is purely positional. It does no I/O, so the emitted
//! accessors reach the asset registry only when the module runs.

pub mod template;

use std::sync::LazyLock;

use regex::Regex;

use crate::config::BuildContext;
use crate::edit::SourceEditor;
use crate::sourcemap::SourceMap;
use crate::utils;

/// Matches the opening of a component entry point. The three-parameter
/// arrow signature is the rendering convention's fingerprint.
static COMPONENT_PARAMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*\$\$result\s*,\s*\$\$props\s*,\s*\$\$slots\s*\)\s*=>\s*\{")
        .expect("component params pattern")
});

/// Files with this extension under the pages directory are pages: they
/// set `pageHref` and derive a request URL from their route.
pub const PAGE_EXTENSION: &str = ".nbx";

/// Inject the metadata header into a scripting source. Non-scripting
/// ids pass through as `None`.
pub fn apply(code: &str, id: &str, ctx: &BuildContext) -> Option<(String, SourceMap)> {
    let importee = utils::normalize(id);
    if !utils::is_scripting_source(&importee) {
        return None;
    }

    let mut source = SourceEditor::new(code);
    let is_page =
        importee.starts_with(&ctx.pages_dir) && importee.ends_with(PAGE_EXTENSION);

    for found in COMPONENT_PARAMS.find_iter(code) {
        source.append_right(found.end(), template::PROPS_JS);
    }

    // Emitted slice arguments are UTF-16 units, the unit `.slice` uses
    // at runtime.
    let pages_dir_len = ctx.pages_dir.encode_utf16().count();
    let ext_len = PAGE_EXTENSION.len();

    let header = template::curly_join([
        template::header_js(&ctx.assets_name, &ctx.base_name),
        format!("m.fileHref={}", utils::js_string(&importee)),
        if is_page {
            "m.pageHref=m.fileHref".to_string()
        } else {
            String::new()
        },
        format!("m.siteHref={}", utils::js_string(&ctx.site)),
        format!(
            "m.requestHref=(m.siteHref+m.pageHref.slice({pages_dir_len},-{ext_len})).replace(/\\/index$/i, '/')"
        ),
        format!(
            "let {}",
            template::comma_join([
                "pageMeta=r(m.pageHref)".to_string(),
                "requestMeta=r(m.requestHref)".to_string(),
            ])
        ),
        format!(
            "Object.defineProperties(import.meta,{{{}}})",
            template::comma_join([
                "...Object.getOwnPropertyDescriptors(r(m.fileHref))".to_string(),
                "page:{configurable:true,get(){return pageMeta}}".to_string(),
                "request:{configurable:true,get(){return requestMeta}}".to_string(),
                "props:{configurable:true,get(){return m.props}}".to_string(),
            ])
        ),
    ]);
    source.prepend(format!("{{{header}}}"));

    Some(source.finish(&importee))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn context() -> BuildContext {
        BuildContext {
            root_dir: "/app/".to_string(),
            base_name: String::new(),
            assets_name: "assets".to_string(),
            dist_dir: "dist".to_string(),
            pages_dir: "/app/src/pages/".to_string(),
            hostname: "localhost".to_string(),
            https: false,
            port: 3000,
            site: "http://localhost:3000/".to_string(),
        }
    }

    #[test]
    fn test_skips_non_scripting_sources() {
        assert!(apply("body{}", "/app/src/app.css", &context()).is_none());
        assert!(apply("{}", "/app/package.json", &context()).is_none());
    }

    #[test]
    fn test_header_prepended_to_scripting_source() {
        let (code, map) = apply("export const n = 1;\n", "/app/src/util.ts", &context()).unwrap();
        assert!(code.starts_with("{let s=Symbol.for(\"import.meta\"),m=globalThis[s]||"));
        assert!(code.ends_with("export const n = 1;\n"));
        assert!(code.contains("m.fileHref=\"/app/src/util.ts\""));
        assert!(code.contains("m.siteHref=\"http://localhost:3000/\""));
        assert_eq!(map.sources, vec!["/app/src/util.ts".to_string()]);
        assert!(!map.mappings.is_empty());
    }

    #[test]
    fn test_non_page_leaves_page_href_alone() {
        let (code, _) = apply("export {};", "/app/src/util.ts", &context()).unwrap();
        assert!(!code.contains("m.pageHref=m.fileHref"));
        // The skipped page assignment leaves an empty statement behind.
        assert!(code.contains("m.fileHref=\"/app/src/util.ts\";;m.siteHref="));
    }

    #[test]
    fn test_page_sets_page_href_and_request_href() {
        let (code, _) = apply("export {};", "/app/src/pages/index.nbx", &context()).unwrap();
        assert!(code.contains("m.pageHref=m.fileHref"));
        assert!(code.contains(
            "m.requestHref=(m.siteHref+m.pageHref.slice(15,-4)).replace(/\\/index$/i, '/')"
        ));
    }

    #[test]
    fn test_page_extension_mismatch_is_not_a_page() {
        let (code, _) = apply("export {};", "/app/src/pages/data.ts", &context()).unwrap();
        assert!(!code.contains("m.pageHref=m.fileHref"));
    }

    #[test]
    fn test_props_injected_after_component_entry() {
        let source = "const page = ($$result, $$props, $$slots) => {return render($$props)};";
        let (code, _) = apply(source, "/app/src/pages/index.nbx", &context()).unwrap();
        assert!(code.contains(
            "($$result, $$props, $$slots) => {globalThis[Symbol.for(\"import.meta\")].props=$$props;return render($$props)}"
        ));
    }

    #[test]
    fn test_props_injected_for_every_component() {
        let source = "a(($$result,$$props,$$slots)=>{1});b(($$result, $$props, $$slots) => {2});";
        let (code, _) = apply(source, "/app/src/mod.mjs", &context()).unwrap();
        assert_eq!(code.matches(template::PROPS_JS).count(), 2);
    }

    #[test]
    fn test_meta_accessors_defined() {
        let (code, _) = apply("export {};", "/app/src/util.ts", &context()).unwrap();
        assert!(code.contains("Object.defineProperties(import.meta,{"));
        assert!(code.contains("...Object.getOwnPropertyDescriptors(r(m.fileHref))"));
        assert!(code.contains("page:{configurable:true,get(){return pageMeta}}"));
        assert!(code.contains("request:{configurable:true,get(){return requestMeta}}"));
        assert!(code.contains("props:{configurable:true,get(){return m.props}}"));
        assert!(code.contains("let pageMeta=r(m.pageHref),requestMeta=r(m.requestHref)"));
    }

    #[test]
    fn test_windows_id_normalized_into_header() {
        let (code, _) = apply("export {};", "C:\\app\\src\\util.ts", &context()).unwrap();
        assert!(code.contains("m.fileHref=\"/C:/app/src/util.ts\""));
    }
}
