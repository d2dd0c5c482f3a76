//! ImportsPlugin - import assertions for a rolldown-style host
//!
//! Wires the pipeline into the host's hook surface:
//! 1. Register the assertion parser extension in `options`
//! 2. Decode asserted specifiers in `resolve_id`, delegate resolution to
//!    the host, then re-encode the assertion onto the resolved id
//! 3. Produce typed module content in `load`
//! 4. Inject the metadata header in `transform`
//! 5. Flush registered assets to disk in `build_end`
//! 6. Serve registered assets by public path for the dev server

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::assertion;
use crate::assets::Assets;
use crate::config::{BuildContext, ResolvedConfig};
use crate::hooks::{
    HookLoadArgs, HookLoadOutput, HookLoadReturn, HookNoopReturn, HookResolveIdArgs,
    HookResolveIdOutput, HookResolveIdReturn, HookTransformArgs, HookTransformOutput,
    HookTransformReturn, HookUsage, HostOptions, Plugin, PluginContext, ResolveOptions,
};
use crate::loader;
use crate::parser::AssertionSyntax;
use crate::transform;

/// The imports plugin.
///
/// Holds the build context derived from the host config and the shared
/// asset registry. The registry handle is cloneable so a host runtime
/// can wire it into the injected `m.assets` bridge.
pub struct ImportsPlugin {
    context: RwLock<BuildContext>,
    assets: Assets,
}

impl ImportsPlugin {
    pub fn new() -> Self {
        Self {
            context: RwLock::new(BuildContext::default()),
            assets: Assets::new(),
        }
    }

    /// Handle to the shared asset registry.
    pub fn assets(&self) -> Assets {
        self.assets.clone()
    }

    /// Snapshot of the current build context.
    pub fn build_context(&self) -> BuildContext {
        self.context.read().expect("build context poisoned").clone()
    }
}

impl Default for ImportsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ImportsPlugin {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("nimbus:imports")
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::RESOLVE_ID | HookUsage::LOAD | HookUsage::TRANSFORM | HookUsage::BUILD_END
    }

    fn config_resolved(&self, config: &ResolvedConfig) {
        let derived = BuildContext::from_config(config);
        tracing::debug!(root = %derived.root_dir, site = %derived.site, "configured");
        *self.context.write().expect("build context poisoned") = derived;
    }

    fn options(&self, options: &mut HostOptions) {
        options.parser_extensions.push(Arc::new(AssertionSyntax));
    }

    /// Decode an asserted specifier, resolve the underlying path through
    /// the host, and re-encode the assertion onto the resolved id.
    async fn resolve_id(
        &self,
        ctx: &PluginContext,
        args: &HookResolveIdArgs<'_>,
    ) -> HookResolveIdReturn {
        if !args.specifier.contains("assert=") {
            return Ok(None);
        }
        let Some((safe_id, assertion)) = assertion::split_assertion(args.specifier) else {
            return Ok(None);
        };

        // `/src/`-rooted specifiers are project-relative.
        let safe_id = match safe_id.strip_prefix("/src/") {
            Some(rest) => {
                let context = self.context.read().expect("build context poisoned");
                format!("{}src/{rest}", context.root_dir)
            }
            None => safe_id,
        };

        let resolved = ctx.resolve(
            &safe_id,
            args.importer,
            &ResolveOptions { skip_self: true },
        )?;
        let Some(resolved) = resolved else {
            return Ok(None);
        };

        let (resolved_id, params) = assertion::split_query(&resolved.id);
        let id = assertion::encode_specifier(&resolved_id, &params, &assertion);
        tracing::debug!(specifier = args.specifier, id = %id, "resolved asserted import");

        Ok(Some(HookResolveIdOutput {
            id: id.into(),
            external: Some(resolved.external),
        }))
    }

    async fn load(&self, _ctx: &PluginContext, args: &HookLoadArgs<'_>) -> HookLoadReturn {
        let Some(code) = loader::load(args.id).await? else {
            return Ok(None);
        };
        tracing::debug!(id = args.id, "loaded asserted module");
        Ok(Some(HookLoadOutput {
            code: code.into(),
            map: None,
        }))
    }

    async fn transform(
        &self,
        _ctx: &PluginContext,
        args: &HookTransformArgs<'_>,
    ) -> HookTransformReturn {
        let context = self.context.read().expect("build context poisoned").clone();
        let Some((code, map)) = transform::apply(args.code, args.id, &context) else {
            return Ok(None);
        };
        Ok(Some(HookTransformOutput {
            code: Some(code),
            map: Some(map),
        }))
    }

    async fn build_end(&self, _ctx: &PluginContext) -> HookNoopReturn {
        let (dist_dir, assets_name) = {
            let context = self.context.read().expect("build context poisoned");
            (context.dist_dir.clone(), context.assets_name.clone())
        };
        self.assets.flush(&dist_dir, &assets_name).await?;
        Ok(())
    }

    /// Serve a registered asset by its public path.
    fn handle_request(&self, url: &str) -> Option<PathBuf> {
        let lead = {
            let context = self.context.read().expect("build context poisoned");
            format!("/{}/", context.assets_name)
        };
        let hashname = url.strip_prefix(&lead)?;
        self.assets.get_from_server(hashname)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::{BuildConfig, ServerConfig};
    use crate::hooks::FsResolver;
    use crate::utils;

    fn configured_plugin(root: &std::path::Path) -> ImportsPlugin {
        let plugin = ImportsPlugin::new();
        plugin.config_resolved(&ResolvedConfig {
            root: utils::normalize(&root.to_string_lossy()),
            base: "/".to_string(),
            build: BuildConfig::default(),
            server: ServerConfig::default(),
        });
        plugin
    }

    fn host_context(root: &std::path::Path) -> PluginContext {
        PluginContext::new(Arc::new(FsResolver::new(root)))
    }

    #[test]
    fn test_options_registers_parser_extension() {
        let plugin = ImportsPlugin::new();
        let mut options = HostOptions::default();
        plugin.options(&mut options);
        assert_eq!(options.parser_extensions.len(), 1);
        assert_eq!(
            options.parser_extensions[0].name(),
            "nimbus:assertion-syntax"
        );
    }

    #[test]
    fn test_hook_usage_announced() {
        let plugin = ImportsPlugin::new();
        let usage = plugin.register_hook_usage();
        assert!(usage.contains(HookUsage::RESOLVE_ID));
        assert!(usage.contains(HookUsage::LOAD));
        assert!(usage.contains(HookUsage::TRANSFORM));
        assert!(usage.contains(HookUsage::BUILD_END));
    }

    #[tokio::test]
    async fn test_resolve_id_ignores_plain_specifiers() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = configured_plugin(dir.path());
        let ctx = host_context(dir.path());
        let out = plugin
            .resolve_id(
                &ctx,
                &HookResolveIdArgs {
                    specifier: "./util.ts",
                    importer: None,
                    is_entry: false,
                },
            )
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_resolve_id_rewrites_src_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("src/data.json");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "{}").unwrap();

        let plugin = configured_plugin(dir.path());
        let ctx = host_context(dir.path());
        let specifier = "/src/data.json.js?assert=%7B%22type%22%3A%22json%22%7D";
        let out = plugin
            .resolve_id(
                &ctx,
                &HookResolveIdArgs {
                    specifier,
                    importer: None,
                    is_entry: false,
                },
            )
            .await
            .unwrap()
            .unwrap();

        let expected_base = utils::normalize(&file.to_string_lossy());
        assert_eq!(
            out.id.as_str(),
            format!("{expected_base}.js?assert=%7B%22type%22%3A%22json%22%7D")
        );
        assert_eq!(out.external, Some(false));
    }

    #[tokio::test]
    async fn test_resolve_id_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("src/data.json");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "{}").unwrap();

        let plugin = configured_plugin(dir.path());
        let ctx = host_context(dir.path());
        let first = plugin
            .resolve_id(
                &ctx,
                &HookResolveIdArgs {
                    specifier: "/src/data.json.js?assert=%7B%22type%22%3A%22json%22%7D",
                    importer: None,
                    is_entry: false,
                },
            )
            .await
            .unwrap()
            .unwrap();

        // Feeding the resolved id back in must not stack another suffix.
        let second = plugin
            .resolve_id(
                &ctx,
                &HookResolveIdArgs {
                    specifier: first.id.as_str(),
                    importer: None,
                    is_entry: false,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.id, first.id);
    }

    #[tokio::test]
    async fn test_resolve_id_unresolvable_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = configured_plugin(dir.path());
        let ctx = host_context(dir.path());
        let out = plugin
            .resolve_id(
                &ctx,
                &HookResolveIdArgs {
                    specifier: "/src/gone.json.js?assert=%7B%22type%22%3A%22json%22%7D",
                    importer: None,
                    is_entry: false,
                },
            )
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_load_and_transform_round() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("src/greeting.txt");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "hi").unwrap();

        let plugin = configured_plugin(dir.path());
        let ctx = host_context(dir.path());

        let id = assertion::encode_specifier(
            &utils::normalize(&file.to_string_lossy()),
            &[],
            &assertion::Assertion::of_type("text"),
        );
        let loaded = plugin
            .load(&ctx, &HookLoadArgs { id: &id })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.code.as_str(), "export default \"hi\"");

        let transformed = plugin
            .transform(
                &ctx,
                &HookTransformArgs {
                    id: "/app/src/util.ts",
                    code: "export {};",
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(transformed
            .code
            .unwrap()
            .contains("m.fileHref=\"/app/src/util.ts\""));
        assert!(transformed.map.is_some());
    }

    #[tokio::test]
    async fn test_build_end_flushes_assets() {
        let dir = tempfile::tempdir().unwrap();
        let logo = dir.path().join("src/logo.svg");
        std::fs::create_dir_all(logo.parent().unwrap()).unwrap();
        std::fs::write(&logo, "<svg/>").unwrap();

        let plugin = ImportsPlugin::new();
        plugin.config_resolved(&ResolvedConfig {
            root: utils::normalize(&dir.path().to_string_lossy()),
            build: BuildConfig {
                out_dir: utils::normalize(&dir.path().join("dist").to_string_lossy()),
                assets_dir: "assets".to_string(),
            },
            ..ResolvedConfig::default()
        });

        let asset = plugin
            .assets()
            .add(&utils::normalize(&logo.to_string_lossy()));
        let ctx = host_context(dir.path());
        plugin.build_end(&ctx).await.unwrap();

        let copied = dir.path().join("dist/assets").join(&asset.hashname);
        assert_eq!(std::fs::read_to_string(copied).unwrap(), "<svg/>");
    }

    #[test]
    fn test_handle_request_serves_registered_assets() {
        let dir = tempfile::tempdir().unwrap();
        let logo = dir.path().join("src/logo.svg");
        std::fs::create_dir_all(logo.parent().unwrap()).unwrap();
        std::fs::write(&logo, "<svg/>").unwrap();

        let plugin = configured_plugin(dir.path());
        let source = utils::normalize(&logo.to_string_lossy());
        let asset = plugin.assets().add(&source);

        let served = plugin
            .handle_request(&format!("/assets/{}", asset.hashname))
            .unwrap();
        assert_eq!(served, PathBuf::from(&source));

        assert!(plugin.handle_request("/assets/unknown.svg").is_none());
        assert!(plugin.handle_request("/other/path").is_none());
    }
}
