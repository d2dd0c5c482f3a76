//! Host configuration snapshot taken when the build starts.
//!
//! The plugin receives the host bundler's resolved config once and derives
//! the normalized values every later hook reads:
//!
//! - `root_dir` / `pages_dir` with guaranteed trailing slashes
//! - `assets_name`, the public URL prefix emitted assets are served under
//! - `site`, the origin used to mint page and request hrefs

use serde::Deserialize;

use crate::utils;

// ---------------------------------------------------------------------------
// ResolvedConfig (host-facing shape)
// ---------------------------------------------------------------------------

/// The subset of the host bundler's resolved configuration the plugin
/// consumes. Hosts may carry more fields; unknown ones are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolvedConfig {
    /// Project root directory.
    pub root: String,
    /// Public base path the site is served under.
    pub base: String,
    pub build: BuildConfig,
    pub server: ServerConfig,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            root: ".".to_owned(),
            base: "/".to_owned(),
            build: BuildConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Build-output section of the host config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildConfig {
    /// Directory bundles are written to.
    pub out_dir: String,
    /// Directory name under `out_dir` that receives emitted assets.
    pub assets_dir: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            out_dir: "dist".to_owned(),
            assets_dir: "assets".to_owned(),
        }
    }
}

/// Dev-server section of the host config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Hostname the dev server binds to. `None` falls back to localhost.
    pub host: Option<String>,
    pub port: u16,
    pub https: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 3000,
            https: false,
        }
    }
}

// ---------------------------------------------------------------------------
// BuildContext (derived values)
// ---------------------------------------------------------------------------

/// Normalized values derived from [`ResolvedConfig`], computed once when the
/// host announces its config and read by every later hook.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Project root, normalized, with a trailing slash.
    pub root_dir: String,
    /// Public base path with its leading and trailing slash stripped.
    pub base_name: String,
    /// Public URL prefix for emitted assets.
    pub assets_name: String,
    /// Build output directory, normalized.
    pub dist_dir: String,
    /// Directory whose scripting sources count as pages.
    pub pages_dir: String,
    pub hostname: String,
    pub https: bool,
    pub port: u16,
    /// Origin used to mint `siteHref` and request hrefs.
    pub site: String,
}

impl BuildContext {
    /// Derive the build context from the host's resolved config.
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let root_dir = format!("{}/", utils::normalize(&config.root));

        let base = utils::normalize(&config.base);
        let base = base.strip_prefix('/').unwrap_or(&base);
        let base_name = base.strip_suffix('/').unwrap_or(base).to_owned();

        let assets_dir = utils::normalize(&config.build.assets_dir);
        let assets_name = if base_name.is_empty() {
            assets_dir
        } else {
            format!("{base_name}/{assets_dir}")
        };

        let hostname = config
            .server
            .host
            .clone()
            .unwrap_or_else(|| "localhost".to_owned());
        let https = config.server.https;
        let port = if config.server.port == 0 {
            3000
        } else {
            config.server.port
        };
        let scheme = if https { "https" } else { "http" };
        let site = format!("{scheme}://{hostname}:{port}/");

        Self {
            pages_dir: format!("{root_dir}src/pages/"),
            dist_dir: utils::normalize(&config.build.out_dir),
            root_dir,
            base_name,
            assets_name,
            hostname,
            https,
            port,
            site,
        }
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        let root_dir = format!("{}/", utils::normalize(&cwd.to_string_lossy()));
        Self {
            pages_dir: format!("{root_dir}src/pages/"),
            root_dir,
            base_name: String::new(),
            assets_name: String::new(),
            dist_dir: String::new(),
            hostname: "localhost".to_owned(),
            https: false,
            port: 3000,
            site: "http://localhost/".to_owned(),
        }
    }
}
