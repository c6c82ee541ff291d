use crate::core::models::PipelineConfig;
use crate::utils::{Logger, Result, SluiceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "sluice.config.json";

/// Configuration file format (sluice.config.json). Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SluiceConfigFile {
    /// Source tree (default: "src")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_dir: Option<String>,

    /// Output tree (default: "dist")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,

    /// Source maps directory inside the output tree (default: "maps")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maps_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_maps: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<HtmlSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<CssSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub js: Option<JsSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ImagesSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<WatchSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify: Option<NotifySection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HtmlSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_prefix: Option<String>,
    /// `@file`, `@root` or a directory relative to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CssSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    /// Browserslist queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browsers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_name: Option<String>,
    /// ECMAScript target for syntax lowering (e.g. "es2020")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImagesSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimize: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WatchSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NotifySection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Values given on the command line; they win over the file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub outdir: Option<String>,
    pub port: Option<u16>,
    pub minify: Option<bool>,
    pub source_maps: Option<bool>,
}

/// Loads `sluice.config.json` and merges it with CLI overrides
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `sluice.config.json` from the project root if it exists
    pub fn load_from_file(root: &Path) -> Result<Option<SluiceConfigFile>> {
        let config_path = root.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            Logger::debug(&format!("No {} found, using defaults", CONFIG_FILE_NAME));
            return Ok(None);
        }

        Self::load_from_path(&config_path).map(Some)
    }

    /// Load an explicitly named config file; it must exist
    pub fn load_from_path(config_path: &Path) -> Result<SluiceConfigFile> {
        Logger::debug(&format!("Loading config from {}", config_path.display()));

        let content = std::fs::read_to_string(config_path).map_err(|e| {
            SluiceError::config(format!("cannot read {}: {}", config_path.display(), e))
        })?;

        let config: SluiceConfigFile = serde_json::from_str(&content).map_err(|e| {
            SluiceError::config(format!("failed to parse {}: {}", config_path.display(), e))
        })?;

        Logger::debug("✅ Config file loaded successfully");
        Ok(config)
    }

    /// CLI > config file > defaults
    pub fn merge_with_cli(
        file_config: Option<SluiceConfigFile>,
        root: PathBuf,
        overrides: &CliOverrides,
    ) -> PipelineConfig {
        let file = file_config.unwrap_or_default();
        let root = root.canonicalize().unwrap_or(root);
        let mut config = PipelineConfig::for_root(&root);

        if let Some(src_dir) = &file.src_dir {
            config.src_dir = resolve(&root, src_dir);
        }
        if let Some(outdir) = overrides.outdir.as_ref().or(file.out_dir.as_ref()) {
            config.outdir = resolve(&root, outdir);
        }
        if let Some(maps_dir) = file.maps_dir {
            config.maps_dir = maps_dir;
        }
        if let Some(source_maps) = overrides.source_maps.or(file.source_maps) {
            config.source_maps = source_maps;
        }

        let html = file.html.unwrap_or_default();
        if let Some(prefix) = html.include_prefix {
            config.html.include_prefix = prefix;
        }
        if let Some(base) = html.include_base {
            config.html.include_base = base;
        }
        config.html.minify = overrides.minify.or(html.minify).unwrap_or(config.html.minify);

        let css = file.css.unwrap_or_default();
        if let Some(entry) = css.entry {
            config.css.entry = PathBuf::from(entry);
        }
        if let Some(browsers) = css.browsers {
            config.css.browsers = browsers;
        }
        config.css.minify = overrides.minify.or(css.minify).unwrap_or(config.css.minify);

        let js = file.js.unwrap_or_default();
        if let Some(entry) = js.entry {
            config.js.entry = PathBuf::from(entry);
        }
        if let Some(bundle_name) = js.bundle_name {
            config.js.bundle_name = bundle_name;
        }
        if let Some(target) = js.target {
            config.js.target = target;
        }
        config.js.minify = overrides.minify.or(js.minify).unwrap_or(config.js.minify);

        if let Some(optimize) = file.images.and_then(|images| images.optimize) {
            config.images.optimize = optimize;
        }

        let server = file.server.unwrap_or_default();
        if let Some(host) = server.host {
            config.server.host = host;
        }
        if let Some(port) = overrides.port.or(server.port) {
            config.server.port = port;
        }

        if let Some(debounce_ms) = file.watch.and_then(|watch| watch.debounce_ms) {
            config.watch.debounce_ms = debounce_ms;
        }

        let notify = file.notify.unwrap_or_default();
        if let Some(enabled) = notify.enabled {
            config.notify.enabled = enabled;
        }
        if let Some(title) = notify.title {
            config.notify.title = title;
        }
        if let Some(message) = notify.message {
            config.notify.message = message;
        }

        config
    }

    /// Example config file with every key at its default
    /// Reject settings that cannot work together
    pub fn validate(config: &PipelineConfig) -> Result<()> {
        if config.server.port == 0 || config.server.reload_port().is_none() {
            return Err(SluiceError::config(format!(
                "server port {} leaves no port for live reload (use 1-65534)",
                config.server.port
            )));
        }
        Ok(())
    }

    pub fn generate_example() -> String {
        let defaults = PipelineConfig::default();
        let example = SluiceConfigFile {
            src_dir: Some("src".to_string()),
            out_dir: Some("dist".to_string()),
            maps_dir: Some(defaults.maps_dir.clone()),
            source_maps: Some(defaults.source_maps),
            html: Some(HtmlSection {
                include_prefix: Some(defaults.html.include_prefix.clone()),
                include_base: Some(defaults.html.include_base.clone()),
                minify: Some(defaults.html.minify),
            }),
            css: Some(CssSection {
                entry: Some(defaults.css.entry.to_string_lossy().into_owned()),
                browsers: Some(defaults.css.browsers.clone()),
                minify: Some(defaults.css.minify),
            }),
            js: Some(JsSection {
                entry: Some(defaults.js.entry.to_string_lossy().into_owned()),
                bundle_name: Some(defaults.js.bundle_name.clone()),
                target: Some(defaults.js.target.clone()),
                minify: Some(defaults.js.minify),
            }),
            images: Some(ImagesSection {
                optimize: Some(defaults.images.optimize),
            }),
            server: Some(ServerSection {
                host: Some(defaults.server.host.clone()),
                port: Some(defaults.server.port),
            }),
            watch: Some(WatchSection {
                debounce_ms: Some(defaults.watch.debounce_ms),
            }),
            notify: Some(NotifySection {
                enabled: Some(defaults.notify.enabled),
                title: Some(defaults.notify.title.clone()),
                message: Some(defaults.notify.message.clone()),
            }),
        };

        serde_json::to_string_pretty(&example).unwrap_or_else(|_| "{}".to_string())
    }
}

fn resolve(root: &Path, dir: &str) -> PathBuf {
    if Path::new(dir).is_absolute() {
        PathBuf::from(dir)
    } else {
        root.join(dir)
    }
}
