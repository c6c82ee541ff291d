use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Named unit of pipeline work, addressable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Html,
    Css,
    Js,
    Images,
    Videos,
    Fonts,
    Favicon,
    Server,
    Watch,
    Build,
    Default,
}

impl Task {
    pub const ALL: [Task; 11] = [
        Task::Html,
        Task::Css,
        Task::Js,
        Task::Images,
        Task::Videos,
        Task::Fonts,
        Task::Favicon,
        Task::Server,
        Task::Watch,
        Task::Build,
        Task::Default,
    ];

    /// Tasks that `build` runs, in reporting order
    pub const BUILD: [Task; 7] = [
        Task::Html,
        Task::Css,
        Task::Js,
        Task::Images,
        Task::Videos,
        Task::Fonts,
        Task::Favicon,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Task::Html => "html",
            Task::Css => "css",
            Task::Js => "js",
            Task::Images => "images",
            Task::Videos => "videos",
            Task::Fonts => "fonts",
            Task::Favicon => "favicon",
            Task::Server => "server",
            Task::Watch => "watch",
            Task::Build => "build",
            Task::Default => "default",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Task::Html => "resolve includes and minify src/html/**/*.html",
            Task::Css => "bundle, prefix and minify src/css/style.css",
            Task::Js => "bundle, transpile and minify src/js/main.js",
            Task::Images => "optimize changed images into dist/images",
            Task::Videos => "copy src/videos into dist/videos",
            Task::Fonts => "copy web fonts into dist/fonts",
            Task::Favicon => "copy src/favicon.ico into dist",
            Task::Server => "serve dist with live reload",
            Task::Watch => "rebuild on source changes",
            Task::Build => "html, css, js, images, videos, fonts, favicon",
            Task::Default => "server, build, watch",
        }
    }

    /// Flatten composite tasks into the tasks they run
    pub fn expand(&self) -> Vec<Task> {
        match self {
            Task::Build => Task::BUILD.to_vec(),
            Task::Default => {
                let mut tasks = vec![Task::Server];
                tasks.extend(Task::BUILD);
                tasks.push(Task::Watch);
                tasks
            }
            other => vec![*other],
        }
    }

    /// Expand a task list, dropping duplicates while keeping first-seen order
    pub fn expand_all(tasks: &[Task]) -> Vec<Task> {
        let mut expanded = Vec::new();
        for task in tasks.iter().flat_map(|t| t.expand()) {
            if !expanded.contains(&task) {
                expanded.push(task);
            }
        }
        expanded
    }

    /// True for tasks that write into the output tree
    pub fn is_build_step(&self) -> bool {
        Task::BUILD.contains(self)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Task::ALL
            .iter()
            .find(|task| task.name() == lowered)
            .copied()
            .ok_or_else(|| {
                let known: Vec<&str> = Task::ALL.iter().map(|t| t.name()).collect();
                format!("unknown task '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// Directory plus extension filter; stands in for a glob such as
/// `src/fonts/**/*.{eot,svg,ttf,woff,woff2}`
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSet {
    pub dir: PathBuf,
    pub extensions: Option<Vec<String>>,
    pub recursive: bool,
}

impl SourceSet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extensions: None,
            recursive: true,
        }
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = Some(extensions.iter().map(|e| e.to_lowercase()).collect());
        self
    }

    pub fn shallow(mut self) -> Self {
        self.recursive = false;
        self
    }

    pub fn accepts_extension(&self, path: &Path) -> bool {
        match &self.extensions {
            None => true,
            Some(extensions) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
                .unwrap_or(false),
        }
    }

    /// Whether `path` lies inside this set
    pub fn matches(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.dir) {
            Ok(relative) => {
                let depth_ok = self.recursive || relative.components().count() == 1;
                depth_ok && self.accepts_extension(path)
            }
            Err(_) => false,
        }
    }

    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.dir).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HtmlOptions {
    pub include_prefix: String,
    /// Directory include paths resolve against; `@file` means "next to the
    /// including file", `@root` means the project root
    pub include_base: String,
    pub minify: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CssOptions {
    pub entry: PathBuf,
    pub browsers: Vec<String>,
    pub minify: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsOptions {
    pub entry: PathBuf,
    pub bundle_name: String,
    pub target: String,
    pub minify: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    pub optimize: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
}

impl ServerOptions {
    /// Live-reload socket listens next to the HTTP port; `None` when the
    /// HTTP port leaves no room for it
    pub fn reload_port(&self) -> Option<u16> {
        self.port.checked_add(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchOptions {
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotifyOptions {
    pub enabled: bool,
    pub title: String,
    pub message: String,
}

/// Fully resolved pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub root: PathBuf,
    pub src_dir: PathBuf,
    pub outdir: PathBuf,
    pub maps_dir: String,
    pub source_maps: bool,
    pub html: HtmlOptions,
    pub css: CssOptions,
    pub js: JsOptions,
    pub images: ImageOptions,
    pub server: ServerOptions,
    pub watch: WatchOptions,
    pub notify: NotifyOptions,
}

pub const IMAGE_EXTENSIONS: [&str; 5] = ["gif", "jpg", "jpeg", "png", "svg"];
pub const FONT_EXTENSIONS: [&str; 5] = ["eot", "svg", "ttf", "woff", "woff2"];
pub const SCRIPT_EXTENSIONS: [&str; 5] = ["js", "mjs", "cjs", "jsx", "json"];

impl PipelineConfig {
    /// Defaults for a project rooted at `root`
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            src_dir: root.join("src"),
            outdir: root.join("dist"),
            root,
            maps_dir: "maps".to_string(),
            source_maps: true,
            html: HtmlOptions {
                include_prefix: "@".to_string(),
                include_base: "dist".to_string(),
                minify: true,
            },
            css: CssOptions {
                entry: PathBuf::from("css/style.css"),
                browsers: vec!["last 2 versions".to_string()],
                minify: true,
            },
            js: JsOptions {
                entry: PathBuf::from("js/main.js"),
                bundle_name: "bundle.js".to_string(),
                target: "es2020".to_string(),
                minify: true,
            },
            images: ImageOptions { optimize: true },
            server: ServerOptions {
                host: "localhost".to_string(),
                port: 3000,
            },
            watch: WatchOptions { debounce_ms: 100 },
            notify: NotifyOptions {
                enabled: true,
                title: "Error".to_string(),
                message: "Compilation failure.".to_string(),
            },
        }
    }

    pub fn html_sources(&self) -> SourceSet {
        SourceSet::new(self.src_dir.join("html")).with_extensions(&["html"])
    }

    pub fn css_entry(&self) -> PathBuf {
        self.src_dir.join(&self.css.entry)
    }

    pub fn css_sources(&self) -> SourceSet {
        SourceSet::new(self.src_dir.join("css")).with_extensions(&["css"])
    }

    pub fn js_entry(&self) -> PathBuf {
        self.src_dir.join(&self.js.entry)
    }

    pub fn js_sources(&self) -> SourceSet {
        SourceSet::new(self.src_dir.join("js")).with_extensions(&SCRIPT_EXTENSIONS)
    }

    pub fn image_sources(&self) -> SourceSet {
        SourceSet::new(self.src_dir.join("images")).with_extensions(&IMAGE_EXTENSIONS)
    }

    pub fn video_sources(&self) -> SourceSet {
        SourceSet::new(self.src_dir.join("videos"))
    }

    pub fn font_sources(&self) -> SourceSet {
        SourceSet::new(self.src_dir.join("fonts")).with_extensions(&FONT_EXTENSIONS)
    }

    pub fn favicon_path(&self) -> PathBuf {
        self.src_dir.join("favicon.ico")
    }

    pub fn maps_outdir(&self) -> PathBuf {
        self.outdir.join(&self.maps_dir)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_root(".")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub size: usize,
}

impl OutputFile {
    pub fn new(path: PathBuf, size: usize) -> Self {
        Self { path, size }
    }
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: Task,
    pub outputs: Vec<OutputFile>,
    pub skipped: usize,
    pub elapsed: Duration,
}

impl TaskReport {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            outputs: Vec::new(),
            skipped: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn total_size(&self) -> usize {
        self.outputs.iter().map(|o| o.size).sum()
    }
}

/// Result of one task after the error reporter has seen it
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: Task,
    pub result: std::result::Result<TaskReport, String>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// How connected browsers should pick up a change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadKind {
    Full,
    Css { path: String },
}

#[derive(Debug, Clone)]
pub struct CssOutput {
    pub code: String,
    pub source_map: Option<String>,
}

/// Bundle output with optional source map
#[derive(Debug, Clone)]
pub struct BundleOutput {
    pub code: String,
    pub source_map: Option<String>,
    pub modules: usize,
    pub cached: usize,
}
