use crate::core::{interfaces::CssProcessor, models::{CssOptions, CssOutput}};
use crate::utils::{Logger, Result, SluiceError, Timer};
use lightningcss::{
    bundler::{Bundler, FileProvider},
    printer::PrinterOptions,
    stylesheet::{MinifyOptions, ParserOptions},
    targets::{Browsers, Targets},
};
use parcel_sourcemap::SourceMap;
use std::path::{Path, PathBuf};

/// Lightning CSS pipeline: inline `@import`, lower syntax and add prefixes
/// for the configured browsers, then minify
pub struct LightningCssProcessor {
    options: CssOptions,
    source_maps: bool,
    project_root: PathBuf,
}

impl LightningCssProcessor {
    pub fn new(options: CssOptions, source_maps: bool, project_root: PathBuf) -> Self {
        Self {
            options,
            source_maps,
            project_root,
        }
    }

    pub fn resolve_targets(browsers: &[String]) -> Result<Targets> {
        if browsers.is_empty() {
            return Ok(Targets::default());
        }

        let browsers = Browsers::from_browserslist(browsers.iter().map(String::as_str))
            .map_err(|e| SluiceError::config(format!("invalid browsers query: {}", e)))?;

        Ok(Targets {
            browsers,
            ..Targets::default()
        })
    }

    fn compile(
        entry: &Path,
        options: &CssOptions,
        source_maps: bool,
        project_root: &Path,
    ) -> Result<CssOutput> {
        let targets = Self::resolve_targets(&options.browsers)?;
        let fs = FileProvider::new();
        let mut source_map = if source_maps {
            Some(SourceMap::new(&project_root.to_string_lossy()))
        } else {
            None
        };

        let mut stylesheet = {
            let mut bundler = Bundler::new(&fs, source_map.as_mut(), ParserOptions::default());
            bundler
                .bundle(entry)
                .map_err(|e| SluiceError::css_in(e.to_string(), entry.to_path_buf()))?
        };

        stylesheet
            .minify(MinifyOptions {
                targets: targets.clone(),
                ..MinifyOptions::default()
            })
            .map_err(|e| SluiceError::css_in(e.to_string(), entry.to_path_buf()))?;

        let result = stylesheet
            .to_css(PrinterOptions {
                minify: options.minify,
                source_map: source_map.as_mut(),
                targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| SluiceError::css_in(e.to_string(), entry.to_path_buf()))?;

        let map = match source_map.as_mut() {
            Some(map) => Some(
                map.to_json(None)
                    .map_err(|e| SluiceError::css(format!("source map: {}", e)))?,
            ),
            None => None,
        };

        Ok(CssOutput {
            code: result.code,
            source_map: map,
        })
    }
}

#[async_trait::async_trait]
impl CssProcessor for LightningCssProcessor {
    async fn process_entry(&self, entry: &Path) -> Result<CssOutput> {
        let _timer = Timer::start("CSS processing");

        Logger::processing_file(
            entry.file_name().and_then(|s| s.to_str()).unwrap_or("unknown"),
            "lightningcss",
        );

        let entry = entry.to_path_buf();
        let options = self.options.clone();
        let source_maps = self.source_maps;
        let project_root = self.project_root.clone();

        // lightningcss is CPU-bound
        tokio::task::spawn_blocking(move || {
            Self::compile(&entry, &options, source_maps, &project_root)
        })
        .await?
    }
}
