use crate::core::{interfaces::ReloadSink, models::*, services::PipelineService};
use crate::infrastructure::{DevServer, LiveReloadHub};
use crate::utils::{
    CliOverrides, ConfigLoader, Logger, PipelineUI, PipelineWatcher, Result, SluiceError,
    CONFIG_FILE_NAME,
};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Parser, Debug)]
#[command(name = "sluice", version)]
#[command(about = "Sluice - HTML, CSS, JS and asset pipeline with a live-reload dev server")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Tasks to run: html, css, js, images, videos, fonts, favicon, server,
    /// watch, build, default
    #[arg(value_name = "TASK")]
    pub tasks: Vec<Task>,

    /// Project root directory
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Config file (default: <root>/sluice.config.json if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub outdir: Option<String>,

    /// Port to serve on; live reload uses the next port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Disable HTML, CSS and JS minification
    #[arg(long)]
    pub no_minify: bool,

    /// Do not write source maps
    #[arg(long)]
    pub no_source_maps: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example sluice.config.json
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// List available tasks
    Tasks,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            outdir: self.outdir.clone(),
            port: self.port,
            minify: self.no_minify.then_some(false),
            source_maps: self.no_source_maps.then_some(false),
        }
    }

    /// Requested tasks, `default` when none are given
    pub fn requested_tasks(&self) -> Vec<Task> {
        if self.tasks.is_empty() {
            vec![Task::Default]
        } else {
            self.tasks.clone()
        }
    }
}

pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self) -> Result<()> {
        let cli = Cli::parse();
        Logger::init(cli.verbose);

        match &cli.command {
            Some(Commands::Init { force }) => self.handle_init_command(&cli.root, *force),
            Some(Commands::Tasks) => {
                self.handle_tasks_command();
                Ok(())
            }
            None => self.handle_pipeline(&cli).await,
        }
    }

    pub fn load_config(cli: &Cli) -> Result<PipelineConfig> {
        let file_config = match &cli.config {
            Some(path) => Some(ConfigLoader::load_from_path(path)?),
            None => ConfigLoader::load_from_file(&cli.root)?,
        };

        let config = ConfigLoader::merge_with_cli(file_config, cli.root.clone(), &cli.overrides());
        ConfigLoader::validate(&config)?;
        Ok(config)
    }

    async fn handle_pipeline(&self, cli: &Cli) -> Result<()> {
        let tasks = Task::expand_all(&cli.requested_tasks());
        let config = Self::load_config(cli)?;

        let ui = PipelineUI::new();
        ui.show_banner();
        Logger::pipeline_start(
            &config.src_dir.display().to_string(),
            &config.outdir.display().to_string(),
        );

        let service = PipelineService::with_defaults(config.clone())?;
        let serving = tasks.contains(&Task::Server);
        let watching = tasks.contains(&Task::Watch);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = if serving {
            Some(Self::start_server(&config, shutdown_rx).await?)
        } else {
            None
        };

        let build_steps: Vec<Task> = tasks.iter().copied().filter(Task::is_build_step).collect();
        let mut failed = 0;
        if !build_steps.is_empty() {
            let outcomes = service.run_tasks(&build_steps).await;
            ui.show_summary(&config.outdir, &outcomes);
            failed = outcomes.iter().filter(|o| !o.is_success()).count();
        }

        if watching {
            let reload = server
                .as_ref()
                .map(|running| Arc::new(running.hub.clone()) as Arc<dyn ReloadSink>);
            PipelineWatcher::new(&config)
                .watch(&service, reload, ctrl_c())
                .await?;
        } else if serving {
            Logger::info("Press Ctrl+C to stop the server");
            ctrl_c().await;
        }

        if let Some(running) = server {
            let _ = shutdown_tx.send(true);
            running.stop().await;
        }

        // Long-running modes never fail on a task error
        if failed > 0 && !watching && !serving {
            return Err(SluiceError::Other(format!("{} task(s) failed", failed)));
        }

        Ok(())
    }

    async fn start_server(
        config: &PipelineConfig,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RunningServer> {
        let server = DevServer::new(
            config.outdir.clone(),
            config.maps_dir.clone(),
            config.server.clone(),
        );
        let listener = server.bind().await?;
        let reload_port = config
            .server
            .reload_port()
            .ok_or_else(|| SluiceError::config("no port left for live reload"))?;
        let reload_listener = LiveReloadHub::bind(&config.server.host, reload_port).await?;

        let hub = LiveReloadHub::new();
        let reload_hub = hub.clone();
        let reload_task = tokio::spawn(async move {
            if let Err(e) = reload_hub.serve(reload_listener).await {
                Logger::error(&format!("Live reload stopped: {}", e));
            }
        });

        let http_task = tokio::spawn(async move {
            let stop = async move {
                let _ = shutdown.changed().await;
            };
            if let Err(e) = server.serve(listener, stop).await {
                Logger::error(&format!("Server stopped: {}", e));
            }
        });

        Logger::info(&format!(
            "🌐 Local: http://{}:{}",
            config.server.host, config.server.port
        ));

        Ok(RunningServer {
            hub,
            http_task,
            reload_task,
        })
    }

    fn handle_init_command(&self, root: &Path, force: bool) -> Result<()> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.exists() && !force {
            return Err(SluiceError::config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }

        std::fs::write(&path, ConfigLoader::generate_example() + "\n")?;
        println!("  {} wrote {}", "✓".bright_green(), path.display());
        Ok(())
    }

    fn handle_tasks_command(&self) {
        println!();
        for task in Task::ALL {
            println!(
                "  {:<10} {}",
                task.name().bright_cyan(),
                task.description().bright_black()
            );
        }
        println!();
    }
}

impl Default for CliHandler {
    fn default() -> Self {
        Self::new()
    }
}

struct RunningServer {
    hub: LiveReloadHub,
    http_task: JoinHandle<()>,
    reload_task: JoinHandle<()>,
}

impl RunningServer {
    async fn stop(self) {
        let _ = self.http_task.await;
        self.reload_task.abort();
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        Logger::warn(&format!("Failed to listen for Ctrl+C: {}", e));
        std::future::pending::<()>().await;
    }
}
