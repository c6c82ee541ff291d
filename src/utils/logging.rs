use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use std::time::{Duration, Instant};

pub struct Logger;

impl Logger {
    /// Install the global subscriber. `RUST_LOG` overrides the default filter.
    pub fn init(verbose: bool) {
        let default_filter = if verbose { "sluice=debug" } else { "sluice=info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        // A second init (tests, embedding) is harmless
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }

    pub fn pipeline_start(root: &str, outdir: &str) {
        info!("📁 Source: {}", root);
        info!("📦 Output: {}", outdir);
    }

    pub fn task_start(name: &str) {
        info!("Starting '{}'...", name);
    }

    pub fn task_finished(name: &str, elapsed: Duration) {
        info!("Finished '{}' after {:.2?}", name, elapsed);
    }

    pub fn bundling_started() {
        info!("Bundling started...");
    }

    pub fn bundling_finished(elapsed: Duration, modules: usize, cached: usize) {
        info!(
            "Bundling finished: {:.2?} ({} modules, {} from cache)",
            elapsed, modules, cached
        );
    }

    pub fn processing_file(name: &str, mode: &str) {
        debug!("⚡ Processing: {} ({})", name, mode);
    }

    pub fn skipped_unchanged(name: &str) {
        debug!("⏭️  Unchanged: {}", name);
    }

    pub fn info(msg: &str) {
        info!("{}", msg);
    }

    pub fn debug(msg: &str) {
        debug!("{}", msg);
    }

    pub fn error(msg: &str) {
        error!("❌ {}", msg);
    }

    pub fn warn(msg: &str) {
        warn!("⚠️  {}", msg);
    }
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        debug!("⏱️  Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("⏱️  Completed: {} in {:.2?}", self.name, self.elapsed());
    }
}
