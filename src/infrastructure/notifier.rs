use crate::core::interfaces::Notifier;
use crate::utils::Logger;
use std::path::PathBuf;

/// Desktop notifications through the platform's command-line notifier
pub struct DesktopNotifier {
    backend: Option<Backend>,
}

#[derive(Debug, Clone, PartialEq)]
enum Backend {
    NotifySend(PathBuf),
    OsaScript(PathBuf),
}

impl DesktopNotifier {
    /// Use `notify-send` or `osascript` if one is on `PATH`
    pub fn detect() -> Self {
        let backend = which::which("notify-send")
            .map(Backend::NotifySend)
            .or_else(|_| which::which("osascript").map(Backend::OsaScript))
            .ok();

        if backend.is_none() {
            Logger::debug("No desktop notifier found; notifications disabled");
        }

        Self { backend }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }

    fn command(backend: &Backend, title: &str, message: &str) -> tokio::process::Command {
        match backend {
            Backend::NotifySend(program) => {
                let mut command = tokio::process::Command::new(program);
                command.arg(title).arg(message);
                command
            }
            Backend::OsaScript(program) => {
                let script = format!(
                    "display notification {} with title {}",
                    apple_script_string(message),
                    apple_script_string(title)
                );
                let mut command = tokio::process::Command::new(program);
                command.arg("-e").arg(script);
                command
            }
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) {
        let Some(backend) = &self.backend else {
            return;
        };

        // Fire and forget; outside a runtime there is nothing to spawn on
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let mut command = Self::command(backend, title, message);
        handle.spawn(async move {
            if let Err(e) = command.status().await {
                Logger::debug(&format!("Desktop notification failed: {}", e));
            }
        });
    }
}

fn apple_script_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
