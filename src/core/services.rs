use crate::core::{interfaces::*, models::*};
use crate::infrastructure::{
    DesktopNotifier, IncludeHtmlProcessor, LightningCssProcessor, OxcJsBundler, PngRecompressor,
    TokioFileSystemService,
};
use crate::utils::{Logger, Result, SluiceError, Timer};
use futures::future::join_all;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Logs task failures and raises a desktop notification; never stops the pipeline
pub struct ErrorReporter {
    notifier: Arc<dyn Notifier>,
    options: NotifyOptions,
}

impl ErrorReporter {
    pub fn new(notifier: Arc<dyn Notifier>, options: NotifyOptions) -> Self {
        Self { notifier, options }
    }

    pub fn report(&self, task: Task, error: &SluiceError) {
        Logger::error(&format!("'{}' failed: {}", task, error.format_detailed()));

        if self.options.enabled {
            self.notifier.notify(&self.options.title, &self.options.message);
        }
    }
}

/// Runs the named pipeline tasks against a resolved configuration
pub struct PipelineService {
    config: PipelineConfig,
    fs: Arc<dyn FileSystemService>,
    html: Arc<dyn HtmlProcessor>,
    css: Arc<dyn CssProcessor>,
    js: Arc<dyn JsBundler>,
    images: Arc<dyn ImageOptimizer>,
    reporter: ErrorReporter,
}

impl PipelineService {
    pub fn new(
        config: PipelineConfig,
        fs: Arc<dyn FileSystemService>,
        html: Arc<dyn HtmlProcessor>,
        css: Arc<dyn CssProcessor>,
        js: Arc<dyn JsBundler>,
        images: Arc<dyn ImageOptimizer>,
        reporter: ErrorReporter,
    ) -> Self {
        Self {
            config,
            fs,
            html,
            css,
            js,
            images,
            reporter,
        }
    }

    /// Wire the standard processors for `config`
    pub fn with_defaults(config: PipelineConfig) -> Result<Self> {
        let html = IncludeHtmlProcessor::new(config.html.clone(), config.root.clone())?;
        let css = LightningCssProcessor::new(
            config.css.clone(),
            config.source_maps,
            config.root.clone(),
        );
        let js = OxcJsBundler::new(config.js.clone(), config.source_maps, config.root.clone());
        let images = PngRecompressor::new(config.images.clone());

        let notifier: Arc<dyn Notifier> = if config.notify.enabled {
            Arc::new(DesktopNotifier::detect())
        } else {
            Arc::new(DesktopNotifier::disabled())
        };
        let reporter = ErrorReporter::new(notifier, config.notify.clone());

        Ok(Self::new(
            config,
            Arc::new(TokioFileSystemService),
            Arc::new(html),
            Arc::new(css),
            Arc::new(js),
            Arc::new(images),
            reporter,
        ))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Modules of the last JS bundle, wherever they live
    pub fn js_modules(&self) -> Vec<PathBuf> {
        self.js.module_paths()
    }

    /// Run one build step. Fails fast on the first error inside the task.
    pub async fn run_task(&self, task: Task) -> Result<TaskReport> {
        let started = Instant::now();

        let mut report = match task {
            Task::Html => self.html_task().await?,
            Task::Css => self.css_task().await?,
            Task::Js => self.js_task().await?,
            Task::Images => self.images_task().await?,
            Task::Videos => {
                let dest = self.config.outdir.join("videos");
                self.copy_task(Task::Videos, &self.config.video_sources(), &dest)
                    .await?
            }
            Task::Fonts => {
                let dest = self.config.outdir.join("fonts");
                self.copy_task(Task::Fonts, &self.config.font_sources(), &dest)
                    .await?
            }
            Task::Favicon => self.favicon_task().await?,
            Task::Server | Task::Watch | Task::Build | Task::Default => {
                return Err(SluiceError::Other(format!("'{}' is not a build step", task)));
            }
        };

        report.elapsed = started.elapsed();
        Ok(report)
    }

    /// Run a task, hand any failure to the error reporter, and keep going
    pub async fn run_reported(&self, task: Task) -> TaskOutcome {
        Logger::task_start(task.name());

        let result = match self.run_task(task).await {
            Ok(report) => {
                Logger::task_finished(task.name(), report.elapsed);
                Ok(report)
            }
            Err(error) => {
                self.reporter.report(task, &error);
                Err(error.format_detailed())
            }
        };

        TaskOutcome { task, result }
    }

    /// Run tasks concurrently; outcomes come back in input order
    pub async fn run_tasks(&self, tasks: &[Task]) -> Vec<TaskOutcome> {
        join_all(tasks.iter().map(|task| self.run_reported(*task))).await
    }

    pub async fn build(&self) -> Vec<TaskOutcome> {
        let _timer = Timer::start("build");
        self.run_tasks(&Task::BUILD).await
    }

    async fn html_task(&self) -> Result<TaskReport> {
        let mut report = TaskReport::new(Task::Html);
        let sources = self.config.html_sources();

        for file in self.fs.collect(&sources).await? {
            let content = self.fs.read_to_string(&file).await?;
            let processed = self.html.process(&content, &file).await?;

            let dest = self.destination(&sources, &file, &self.config.outdir);
            self.fs.write(&dest, processed.as_bytes()).await?;
            report.outputs.push(OutputFile::new(dest, processed.len()));
        }

        Ok(report)
    }

    async fn css_task(&self) -> Result<TaskReport> {
        let mut report = TaskReport::new(Task::Css);
        let entry = self.config.css_entry();

        if !self.fs.file_exists(&entry) {
            Logger::warn(&format!("CSS entry {} not found, skipping", entry.display()));
            return Ok(report);
        }

        let output = self.css.process_entry(&entry).await?;
        let file_name = file_name_of(&entry)?;

        let dest = self.config.outdir.join(&file_name);
        self.fs.write(&dest, output.code.as_bytes()).await?;
        report.outputs.push(OutputFile::new(dest, output.code.len()));

        if let Some(map) = output.source_map {
            report.outputs.push(self.write_map(&file_name, &map).await?);
        }

        Ok(report)
    }

    async fn js_task(&self) -> Result<TaskReport> {
        let mut report = TaskReport::new(Task::Js);
        let entry = self.config.js_entry();

        if !self.fs.file_exists(&entry) {
            Logger::warn(&format!("JS entry {} not found, skipping", entry.display()));
            return Ok(report);
        }

        let output = self.js.bundle(&entry).await?;
        let bundle_name = self.config.js.bundle_name.clone();

        let dest = self.config.outdir.join(&bundle_name);
        self.fs.write(&dest, output.code.as_bytes()).await?;
        report.outputs.push(OutputFile::new(dest, output.code.len()));

        if let Some(map) = output.source_map {
            report.outputs.push(self.write_map(&bundle_name, &map).await?);
        }

        Ok(report)
    }

    async fn images_task(&self) -> Result<TaskReport> {
        let mut report = TaskReport::new(Task::Images);
        let sources = self.config.image_sources();
        let dest_dir = self.config.outdir.join("images");

        let mut jobs = Vec::new();
        for file in self.fs.collect(&sources).await? {
            let dest = self.destination(&sources, &file, &dest_dir);
            if !self.fs.is_stale(&file, &dest).await {
                Logger::skipped_unchanged(&file.display().to_string());
                report.skipped += 1;
                continue;
            }

            let content = self.fs.read(&file).await?;
            jobs.push((file, dest, content));
        }

        let optimizer = Arc::clone(&self.images);
        let optimized = tokio::task::spawn_blocking(move || {
            jobs.into_par_iter()
                .map(|(file, dest, content)| {
                    optimizer.optimize(&content, &file).map(|bytes| (dest, bytes))
                })
                .collect::<Result<Vec<_>>>()
        })
        .await??;

        for (dest, bytes) in optimized {
            self.fs.write(&dest, &bytes).await?;
            report.outputs.push(OutputFile::new(dest, bytes.len()));
        }

        Ok(report)
    }

    async fn copy_task(&self, task: Task, sources: &SourceSet, dest_dir: &Path) -> Result<TaskReport> {
        let mut report = TaskReport::new(task);

        for file in self.fs.collect(sources).await? {
            let dest = self.destination(sources, &file, dest_dir);
            let size = self.fs.copy(&file, &dest).await?;
            report.outputs.push(OutputFile::new(dest, size as usize));
        }

        Ok(report)
    }

    async fn favicon_task(&self) -> Result<TaskReport> {
        let mut report = TaskReport::new(Task::Favicon);
        let favicon = self.config.favicon_path();

        if !self.fs.file_exists(&favicon) {
            Logger::debug("No favicon.ico, skipping");
            return Ok(report);
        }

        let dest = self.config.outdir.join(file_name_of(&favicon)?);
        let size = self.fs.copy(&favicon, &dest).await?;
        report.outputs.push(OutputFile::new(dest, size as usize));

        Ok(report)
    }

    async fn write_map(&self, file_name: &str, map: &str) -> Result<OutputFile> {
        let dest = self.config.maps_outdir().join(format!("{}.map", file_name));
        self.fs.write(&dest, map.as_bytes()).await?;
        Ok(OutputFile::new(dest, map.len()))
    }

    fn destination(&self, sources: &SourceSet, file: &Path, dest_dir: &Path) -> PathBuf {
        match sources.relative(file) {
            Some(relative) => dest_dir.join(relative),
            None => dest_dir.join(file.file_name().unwrap_or(file.as_os_str())),
        }
    }
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| SluiceError::config(format!("{} has no file name", path.display())))
}
