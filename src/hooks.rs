//! Plugin hook surface and host boundary.
//!
//! The import pipeline integrates with a rolldown-style host through a
//! small trait surface:
//! 1. `config_resolved` snapshots the host configuration
//! 2. `options` registers parser extensions ahead of the parse phase
//! 3. `resolve_id` / `load` / `transform` run per module request
//! 4. `build_end` runs once after the module graph is sealed
//!
//! Hosts hand resolution back to plugins through [`HostResolver`];
//! [`FsResolver`] is the filesystem-backed implementation used by the dev
//! server and tests.

use std::borrow::Cow;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arcstr::ArcStr;

use crate::assertion;
use crate::config::ResolvedConfig;
use crate::sourcemap::SourceMap;
use crate::utils;

// ---------------------------------------------------------------------------
// Hook Usage
// ---------------------------------------------------------------------------

/// Bitset announcing which hooks a plugin implements, so hosts can skip
/// the ones it does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookUsage(u8);

impl HookUsage {
    pub const EMPTY: Self = Self(0);
    pub const RESOLVE_ID: Self = Self(1 << 0);
    pub const LOAD: Self = Self(1 << 1);
    pub const TRANSFORM: Self = Self(1 << 2);
    pub const BUILD_END: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for HookUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Hook Arguments and Outputs
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct HookResolveIdArgs<'a> {
    pub specifier: &'a str,
    pub importer: Option<&'a str>,
    pub is_entry: bool,
}

#[derive(Debug, Default)]
pub struct HookResolveIdOutput {
    pub id: ArcStr,
    pub external: Option<bool>,
}

#[derive(Debug)]
pub struct HookLoadArgs<'a> {
    pub id: &'a str,
}

#[derive(Debug, Default)]
pub struct HookLoadOutput {
    pub code: ArcStr,
    pub map: Option<SourceMap>,
}

#[derive(Debug)]
pub struct HookTransformArgs<'a> {
    pub id: &'a str,
    pub code: &'a str,
}

#[derive(Debug, Default)]
pub struct HookTransformOutput {
    pub code: Option<String>,
    pub map: Option<SourceMap>,
}

pub type HookResolveIdReturn = anyhow::Result<Option<HookResolveIdOutput>>;
pub type HookLoadReturn = anyhow::Result<Option<HookLoadOutput>>;
pub type HookTransformReturn = anyhow::Result<Option<HookTransformOutput>>;
pub type HookNoopReturn = anyhow::Result<()>;

// ---------------------------------------------------------------------------
// Host Options and Parser Extensions
// ---------------------------------------------------------------------------

/// Mutable host options handed to plugins during the `options` hook.
#[derive(Default)]
pub struct HostOptions {
    /// Extensions the host's parser runs over every scripting source
    /// before parsing it as plain JavaScript.
    pub parser_extensions: Vec<Arc<dyn ParserExtension>>,
}

/// A source-level extension to the host's parser.
///
/// `pre_parse` receives the module source before the host parses it and
/// returns replacement source, or `None` when the module is untouched.
pub trait ParserExtension: Send + Sync {
    fn name(&self) -> Cow<'static, str>;

    fn pre_parse(&self, code: &str, id: &str) -> anyhow::Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// Host Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Skip the calling plugin's own `resolve_id` hook to avoid recursion.
    pub skip_self: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    pub id: ArcStr,
    pub external: bool,
}

/// The host's module resolution, callable from inside plugin hooks.
pub trait HostResolver: Send + Sync {
    fn resolve(
        &self,
        specifier: &str,
        importer: Option<&str>,
        options: &ResolveOptions,
    ) -> anyhow::Result<Option<ResolvedId>>;
}

/// Context a host passes into plugin hooks.
#[derive(Clone)]
pub struct PluginContext {
    resolver: Arc<dyn HostResolver>,
}

impl PluginContext {
    pub fn new(resolver: Arc<dyn HostResolver>) -> Self {
        Self { resolver }
    }

    /// Resolve a specifier through the host, as if it were imported by
    /// `importer`.
    pub fn resolve(
        &self,
        specifier: &str,
        importer: Option<&str>,
        options: &ResolveOptions,
    ) -> anyhow::Result<Option<ResolvedId>> {
        self.resolver.resolve(specifier, importer, options)
    }
}

// ---------------------------------------------------------------------------
// Plugin Trait
// ---------------------------------------------------------------------------

/// A build plugin. Every hook has a pass-through default, so plugins
/// implement only the hooks they announce in `register_hook_usage`.
pub trait Plugin: Send + Sync {
    fn name(&self) -> Cow<'static, str>;

    fn register_hook_usage(&self) -> HookUsage;

    /// Called once with the host's resolved configuration, before any
    /// module hook runs.
    fn config_resolved(&self, _config: &ResolvedConfig) {}

    /// Called once to let the plugin adjust host options, e.g. register
    /// parser extensions.
    fn options(&self, _options: &mut HostOptions) {}

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        _args: &HookResolveIdArgs<'_>,
    ) -> impl Future<Output = HookResolveIdReturn> + Send {
        async { Ok(None) }
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        _args: &HookLoadArgs<'_>,
    ) -> impl Future<Output = HookLoadReturn> + Send {
        async { Ok(None) }
    }

    fn transform(
        &self,
        _ctx: &PluginContext,
        _args: &HookTransformArgs<'_>,
    ) -> impl Future<Output = HookTransformReturn> + Send {
        async { Ok(None) }
    }

    fn build_end(&self, _ctx: &PluginContext) -> impl Future<Output = HookNoopReturn> + Send {
        async { Ok(()) }
    }

    /// Dev-server middleware hook. Returns the file backing `url`, or
    /// `None` to fall through to the next handler.
    fn handle_request(&self, _url: &str) -> Option<PathBuf> {
        None
    }
}

// ---------------------------------------------------------------------------
// Filesystem Resolver
// ---------------------------------------------------------------------------

/// Resolves specifiers against the real filesystem.
///
/// Absolute specifiers resolve as-is, `./` and `../` specifiers resolve
/// against their importer, and bare specifiers resolve under `root`.
/// Query parameters ride along untouched. A specifier whose file does not
/// exist resolves to `None`.
#[derive(Debug, Clone)]
pub struct FsResolver {
    root: PathBuf,
}

impl FsResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl HostResolver for FsResolver {
    fn resolve(
        &self,
        specifier: &str,
        importer: Option<&str>,
        _options: &ResolveOptions,
    ) -> anyhow::Result<Option<ResolvedId>> {
        let (path, params) = assertion::split_query(specifier);

        let resolved = if path.starts_with('/') {
            utils::collapse_dot_segments(&path)
        } else if path.starts_with("./") || path.starts_with("../") {
            let Some(importer) = importer else {
                return Ok(None);
            };
            let (importer, _) = assertion::split_query(importer);
            match utils::resolve_reference(&importer, &path) {
                Some(resolved) => resolved,
                None => return Ok(None),
            }
        } else {
            utils::normalize(&self.root.join(&path).to_string_lossy())
        };

        if !Path::new(&resolved).is_file() {
            return Ok(None);
        }

        let id = if params.is_empty() {
            resolved
        } else {
            format!("{resolved}?{}", assertion::serialize_query(&params))
        };

        Ok(Some(ResolvedId {
            id: id.into(),
            external: false,
        }))
    }
}
