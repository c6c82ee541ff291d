// Watch mode: re-runs the tasks whose sources changed and tells the
// browsers to reload

use crate::core::interfaces::ReloadSink;
use crate::core::models::{PipelineConfig, ReloadKind, SourceSet, Task, TaskOutcome};
use crate::core::services::PipelineService;
use crate::utils::{Logger, Result, SluiceError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Maps changed paths to the tasks that consume them
#[derive(Debug, Clone)]
pub struct WatchRouter {
    routes: Vec<(Task, SourceSet)>,
    outdir: PathBuf,
    js_modules: HashSet<PathBuf>,
}

impl WatchRouter {
    /// Videos, fonts and favicon are not watched
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            routes: vec![
                (Task::Html, config.html_sources()),
                (Task::Css, config.css_sources()),
                (Task::Js, config.js_sources()),
                (Task::Images, config.image_sources()),
            ],
            outdir: config.outdir.clone(),
            js_modules: HashSet::new(),
        }
    }

    /// Files of the current JS bundle route to `js` wherever they live
    pub fn set_js_modules(&mut self, modules: impl IntoIterator<Item = PathBuf>) {
        self.js_modules = modules.into_iter().collect();
    }

    /// Directories holding bundle modules that `root` does not cover
    pub fn outside_dirs(&self, root: &Path) -> BTreeSet<PathBuf> {
        self.js_modules
            .iter()
            .filter(|path| !path.starts_with(root))
            .filter_map(|path| path.parent().map(Path::to_path_buf))
            .collect()
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        if path.starts_with(&self.outdir) {
            return true;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return true,
        };

        name.ends_with(".map")
            || name.ends_with('~')
            || name.ends_with(".swp")
            || name.ends_with(".tmp")
            || name.starts_with(".#")
    }

    pub fn tasks_for(&self, path: &Path) -> Vec<Task> {
        if self.is_ignored(path) {
            return Vec::new();
        }

        let mut tasks: Vec<Task> = self
            .routes
            .iter()
            .filter(|(_, set)| set.matches(path))
            .map(|(task, _)| *task)
            .collect();

        if !tasks.contains(&Task::Js) && self.js_modules.contains(path) {
            tasks.push(Task::Js);
        }
        tasks
    }

    /// Tasks for a batch of paths, in build order without duplicates
    pub fn route<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> BTreeSet<Task> {
        paths
            .into_iter()
            .flat_map(|path| self.tasks_for(path))
            .collect()
    }
}

/// Reload to send after a task re-ran successfully
pub fn reload_kind_for(task: Task, config: &PipelineConfig) -> ReloadKind {
    match task {
        Task::Css => ReloadKind::Css {
            path: config
                .css
                .entry
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("style.css")
                .to_string(),
        },
        _ => ReloadKind::Full,
    }
}

/// File watcher that monitors the source tree and triggers task re-runs
pub struct PipelineWatcher {
    watch_root: PathBuf,
    debounce: Duration,
    router: WatchRouter,
}

impl PipelineWatcher {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            watch_root: config.src_dir.clone(),
            debounce: Duration::from_millis(config.watch.debounce_ms),
            router: WatchRouter::from_config(config),
        }
    }

    /// Watch until `shutdown` resolves
    pub async fn watch<F>(
        &self,
        service: &PipelineService,
        reload: Option<Arc<dyn ReloadSink>>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| SluiceError::Watch(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&self.watch_root, RecursiveMode::Recursive)
            .map_err(|e| {
                SluiceError::Watch(format!("Failed to watch {}: {}", self.watch_root.display(), e))
            })?;

        Logger::info(&format!(
            "👀 Watching {} (Ctrl+C to stop)",
            self.watch_root.display()
        ));

        let mut router = self.router.clone();
        let mut extra_dirs: BTreeSet<PathBuf> = BTreeSet::new();
        self.follow_js_modules(service, &mut router, &mut watcher, &mut extra_dirs);

        tokio::pin!(shutdown);
        let mut pending: BTreeSet<Task> = BTreeSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    Logger::info("👋 Stopping watch mode...");
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => {
                        if Self::is_relevant(&event) {
                            let tasks = router.route(event.paths.iter().map(PathBuf::as_path));
                            for path in &event.paths {
                                Logger::debug(&format!("Changed: {}", path.display()));
                            }
                            pending.extend(tasks);
                        }
                    }
                    None => {
                        Logger::warn("Watch channel disconnected");
                        break;
                    }
                },
                _ = tokio::time::sleep(self.debounce), if !pending.is_empty() => {
                    let tasks: Vec<Task> = std::mem::take(&mut pending).into_iter().collect();
                    run_batch(service, &tasks, reload.as_deref()).await;
                    self.follow_js_modules(service, &mut router, &mut watcher, &mut extra_dirs);
                }
            }
        }

        Ok(())
    }

    /// Track the latest bundle graph and watch module directories
    /// outside the source tree
    fn follow_js_modules(
        &self,
        service: &PipelineService,
        router: &mut WatchRouter,
        watcher: &mut RecommendedWatcher,
        watched: &mut BTreeSet<PathBuf>,
    ) {
        router.set_js_modules(service.js_modules());

        for dir in router.outside_dirs(&self.watch_root) {
            if watched.contains(&dir) {
                continue;
            }
            match watcher.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    Logger::debug(&format!("Watching module directory {}", dir.display()));
                    watched.insert(dir);
                }
                Err(e) => Logger::warn(&format!("Failed to watch {}: {}", dir.display(), e)),
            }
        }
    }

    fn is_relevant(event: &Event) -> bool {
        !matches!(event.kind, EventKind::Access(_) | EventKind::Other)
    }
}

/// Re-run `tasks` one after another; each success triggers a reload
pub async fn run_batch(
    service: &PipelineService,
    tasks: &[Task],
    reload: Option<&dyn ReloadSink>,
) -> Vec<TaskOutcome> {
    Logger::info(&format!(
        "🔄 Rebuilding: {}",
        tasks.iter().map(Task::name).collect::<Vec<_>>().join(", ")
    ));

    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        let outcome = service.run_reported(*task).await;
        if outcome.is_success() {
            if let Some(sink) = reload {
                sink.reload(reload_kind_for(*task, service.config()));
            }
        }
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> WatchRouter {
        WatchRouter::from_config(&PipelineConfig::for_root("/p"))
    }

    #[test]
    fn test_paths_route_to_tasks() {
        let router = router();
        assert_eq!(router.tasks_for(Path::new("/p/src/html/index.html")), vec![Task::Html]);
        assert_eq!(router.tasks_for(Path::new("/p/src/css/base/reset.css")), vec![Task::Css]);
        assert_eq!(router.tasks_for(Path::new("/p/src/js/lib/util.mjs")), vec![Task::Js]);
        assert_eq!(router.tasks_for(Path::new("/p/src/images/logo.PNG")), vec![Task::Images]);
    }

    #[test]
    fn test_unwatched_and_ignored_paths() {
        let router = router();
        assert!(router.tasks_for(Path::new("/p/src/fonts/a.woff")).is_empty());
        assert!(router.tasks_for(Path::new("/p/src/favicon.ico")).is_empty());
        assert!(router.tasks_for(Path::new("/p/src/css/style.css.map")).is_empty());
        assert!(router.tasks_for(Path::new("/p/src/js/.#main.js")).is_empty());
        assert!(router.tasks_for(Path::new("/p/src/js/main.js~")).is_empty());
        assert!(router.tasks_for(Path::new("/p/dist/bundle.js")).is_empty());
    }

    #[test]
    fn test_batch_is_deduplicated_in_build_order() {
        let router = router();
        let paths = [
            PathBuf::from("/p/src/js/a.js"),
            PathBuf::from("/p/src/html/index.html"),
            PathBuf::from("/p/src/js/b.js"),
        ];

        let tasks: Vec<Task> = router
            .route(paths.iter().map(PathBuf::as_path))
            .into_iter()
            .collect();
        assert_eq!(tasks, vec![Task::Html, Task::Js]);
    }

    #[test]
    fn test_bundle_modules_outside_js_dir_route_to_js() {
        let mut router = router();
        assert!(router.tasks_for(Path::new("/p/src/shared/util.js")).is_empty());

        router.set_js_modules([
            PathBuf::from("/p/src/js/main.js"),
            PathBuf::from("/p/src/shared/util.js"),
            PathBuf::from("/p/lib/config.json"),
        ]);

        assert_eq!(router.tasks_for(Path::new("/p/src/shared/util.js")), vec![Task::Js]);
        assert_eq!(router.tasks_for(Path::new("/p/lib/config.json")), vec![Task::Js]);
        assert_eq!(router.tasks_for(Path::new("/p/src/js/main.js")), vec![Task::Js]);
        assert!(router.tasks_for(Path::new("/p/src/shared/other.js")).is_empty());
        assert_eq!(
            router.outside_dirs(Path::new("/p/src")),
            BTreeSet::from([PathBuf::from("/p/lib")])
        );
    }

    #[test]
    fn test_reload_kind() {
        let config = PipelineConfig::for_root("/p");
        assert_eq!(
            reload_kind_for(Task::Css, &config),
            ReloadKind::Css {
                path: "style.css".to_string()
            }
        );
        assert_eq!(reload_kind_for(Task::Html, &config), ReloadKind::Full);
    }
}
