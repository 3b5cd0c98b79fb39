//! Project configuration.
//!
//! Handles loading, validating, and merging `srcdoc.toml`. The file is sparse:
//! stock defaults are serialized to a TOML table and the user file is merged on
//! top of it, so a project only states what differs from the defaults.
//!
//! ## Config File Location
//!
//! ```text
//! repo/
//! ├── srcdoc.toml              # Optional, overrides stock defaults
//! ├── README.md                # Root index source, site title from its H1
//! ├── CNAME                    # Optional, sitemap domain
//! ├── src-local/
//! ├── simulationCases/
//! └── postProcess/
//! ```
//!
//! ## Derived Values
//!
//! Some values are not stored in the file but derived from the repository when
//! absent: the repository name (root directory name), the public domain
//! (`CNAME`), and the site title (first H1 of the README). [`Project`] holds
//! the merged config together with these resolved values.
//!
//! Unknown keys are rejected to catch typos early.

use crate::types::SourceFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the repository root.
pub const CONFIG_FILENAME: &str = "srcdoc.toml";

const DEFAULT_DOMAIN: &str = "https://test.comphy-lab.org";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `srcdoc.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Documentation output directory, relative to the repository root.
    pub docs_dir: String,
    /// Narrative document rendered as the root index.
    pub readme: String,
    /// Directories searched recursively for sources; each gets an index page.
    pub source_dirs: Vec<String>,
    /// Base URL passed to the typesetting engine.
    pub base_url: String,
    /// Repository name. Defaults to the root directory name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    /// Public domain used in the sitemap. Defaults to the `CNAME` file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Site title. Defaults to the README's first H1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_title: Option<String>,
    /// Used in fallback page descriptions.
    pub project_name: String,
    /// Keywords used when none can be derived from a page.
    pub default_keywords: String,
    /// Extra stylesheet linked from every page, relative to the docs root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<String>,
    pub paths: PathsConfig,
    pub links: LinksConfig,
    pub tools: ToolsConfig,
    /// Display titles for source directory index pages.
    pub directory_titles: BTreeMap<String, String>,
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            docs_dir: "docs".to_string(),
            readme: "README.md".to_string(),
            source_dirs: vec![
                "src-local".to_string(),
                "simulationCases".to_string(),
                "postProcess".to_string(),
            ],
            base_url: "/".to_string(),
            repo_name: None,
            domain: None,
            site_title: None,
            project_name: "CoMPhy Lab computational fluid dynamics".to_string(),
            default_keywords: "fluid dynamics, CFD, Basilisk, computational physics".to_string(),
            stylesheet: None,
            paths: PathsConfig::default(),
            links: LinksConfig::default(),
            tools: ToolsConfig::default(),
            directory_titles: BTreeMap::from([
                ("src-local".to_string(), "Local Source Files".to_string()),
                ("simulationCases".to_string(), "Simulation Cases".to_string()),
                ("postProcess".to_string(), "Post-Processing Tools".to_string()),
            ]),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.docs_dir.trim().is_empty() {
            return Err(ConfigError::Validation("docs_dir must not be empty".into()));
        }
        if self.source_dirs.is_empty() {
            return Err(ConfigError::Validation(
                "source_dirs must not be empty".into(),
            ));
        }
        if !self.base_url.starts_with('/') {
            return Err(ConfigError::Validation(
                "base_url must start with '/'".into(),
            ));
        }
        if self.links.external_source_url.is_empty() {
            return Err(ConfigError::Validation(
                "links.external_source_url must not be empty".into(),
            ));
        }
        if self.tools.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "tools.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Locations of the template and external scripts, relative to the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub template: String,
    pub literate_c: String,
    pub decl_anchors: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            template: ".github/assets/custom_template.html".to_string(),
            literate_c: "basilisk/src/darcsit/literate-c".to_string(),
            decl_anchors: "basilisk/src/darcsit/decl_anchors.awk".to_string(),
        }
    }
}

/// Link targets used while rewriting pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinksConfig {
    /// Directory checked for `#include "x"` targets with local pages.
    pub local_sources_dir: String,
    /// Prefix for includes that have no local page.
    pub external_source_url: String,
    /// GitHub owner used for notebook viewer links.
    pub github_org: String,
    pub branch: String,
    /// Sitemap entries under this directory get the higher priority.
    pub priority_dir: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            local_sources_dir: "src-local".to_string(),
            external_source_url: "http://basilisk.fr/src/".to_string(),
            github_org: "comphy-lab".to_string(),
            branch: "main".to_string(),
            priority_dir: "src-local".to_string(),
        }
    }
}

/// External binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub pandoc: String,
    pub awk: String,
    /// Per-invocation timeout. When absent, tools may run indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pandoc: "pandoc".to_string(),
            awk: "awk".to_string(),
            timeout_secs: None,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of files converted in parallel.
    /// When absent, defaults to the number of CPU cores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value. `Ok(None)` when it doesn't exist.
pub fn load_raw_config(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `srcdoc.toml` from the repository root, or an explicit file.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<SiteConfig, ConfigError> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(CONFIG_FILENAME));
    if explicit.is_some() && !path.exists() {
        return Err(ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("config file not found: {}", path.display()),
        )));
    }
    resolve_config(stock_defaults_value(), load_raw_config(&path)?)
}

/// First `# ` heading of a markdown document.
pub fn readme_title(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

// =============================================================================
// Resolved project
// =============================================================================

/// Merged config plus the values derived from the repository itself.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: SiteConfig,
    pub repo_name: String,
    pub domain: String,
    pub site_title: String,
}

impl Project {
    /// Load the config for `root` and resolve derived values.
    pub fn load(root: &Path, config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let root = fs::canonicalize(root)?;
        let config = load_config(&root, config_file)?;
        Ok(Self::from_config(root, config))
    }

    pub fn from_config(root: PathBuf, config: SiteConfig) -> Self {
        let repo_name = config.repo_name.clone().unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "docs".to_string())
        });

        let domain = config.domain.clone().unwrap_or_else(|| {
            match fs::read_to_string(root.join("CNAME")) {
                Ok(cname) if !cname.trim().is_empty() => format!("https://{}", cname.trim()),
                Ok(_) => DEFAULT_DOMAIN.to_string(),
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(error = %e, "Could not read CNAME file");
                    }
                    DEFAULT_DOMAIN.to_string()
                }
            }
        });

        let site_title = config.site_title.clone().unwrap_or_else(|| {
            fs::read_to_string(root.join(&config.readme))
                .ok()
                .and_then(|c| readme_title(&c))
                .unwrap_or_else(|| "Documentation".to_string())
        });

        Self {
            root,
            config,
            repo_name,
            domain,
            site_title,
        }
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.root.join(&self.config.docs_dir)
    }

    pub fn readme_path(&self) -> PathBuf {
        self.root.join(&self.config.readme)
    }

    pub fn template_path(&self) -> PathBuf {
        self.root.join(&self.config.paths.template)
    }

    pub fn literate_c_path(&self) -> PathBuf {
        self.root.join(&self.config.paths.literate_c)
    }

    pub fn decl_anchors_path(&self) -> PathBuf {
        self.root.join(&self.config.paths.decl_anchors)
    }

    pub fn local_sources_dir(&self) -> PathBuf {
        self.root.join(&self.config.links.local_sources_dir)
    }

    /// Where the rendered page for `source` is written.
    pub fn output_path(&self, source: &SourceFile) -> PathBuf {
        self.docs_dir().join(source.output_relative())
    }

    /// Display title for a source directory's index page.
    pub fn directory_title(&self, dir: &str) -> String {
        self.config
            .directory_titles
            .get(dir)
            .cloned()
            .unwrap_or_else(|| crate::naming::capitalize(dir))
    }
}

/// Returns a fully-commented stock `srcdoc.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# srcdoc configuration
# ====================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Output directory for the generated site.
docs_dir = "docs"

# Narrative document rendered as the site's root index.
readme = "README.md"

# Directories searched recursively. Each gets its own index page.
source_dirs = ["src-local", "simulationCases", "postProcess"]

# Base URL handed to the typesetting template.
base_url = "/"

# Defaults to the name of the repository directory.
# repo_name = "my-repo"

# Defaults to the CNAME file, or https://test.comphy-lab.org.
# domain = "https://example.org"

# Defaults to the first "# " heading of the README.
# site_title = "My Project"

# Used in fallback page descriptions:
# "Documentation for <file> in the <project_name> framework."
project_name = "CoMPhy Lab computational fluid dynamics"

# Keywords used when none can be derived from a page.
default_keywords = "fluid dynamics, CFD, Basilisk, computational physics"

# Extra stylesheet linked from every page, relative to the docs directory.
# stylesheet = "custom_styles.css"

# ---------------------------------------------------------------------------
# Template and helper scripts (relative to the repository root)
# ---------------------------------------------------------------------------
[paths]
template = ".github/assets/custom_template.html"
literate_c = "basilisk/src/darcsit/literate-c"
decl_anchors = "basilisk/src/darcsit/decl_anchors.awk"

# ---------------------------------------------------------------------------
# Link rewriting
# ---------------------------------------------------------------------------
[links]
# '#include "x.h"' links to the local page when x.h exists here...
local_sources_dir = "src-local"
# ...and to this URL prefix otherwise.
external_source_url = "http://basilisk.fr/src/"
# Notebook viewer links: nbviewer.org/github/<github_org>/<repo>/blob/<branch>/...
github_org = "comphy-lab"
branch = "main"
# Sitemap entries under this directory get priority 0.8.
priority_dir = "src-local"

# ---------------------------------------------------------------------------
# External tools
# ---------------------------------------------------------------------------
[tools]
pandoc = "pandoc"
awk = "awk"
# Kill a tool after this many seconds and mark the file failed.
# timeout_secs = 120

# ---------------------------------------------------------------------------
# Index page titles per source directory
# ---------------------------------------------------------------------------
[directory_titles]
src-local = "Local Source Files"
simulationCases = "Simulation Cases"
postProcess = "Post-Processing Tools"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum files converted in parallel. Omit to use every CPU core.
# max_processes = 4
"##
}
