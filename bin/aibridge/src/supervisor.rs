//! Process supervision for adapter children.
//!
//! One subprocess per configured assistant, spawned with a merged
//! environment and staggered to avoid a thundering herd against the
//! backend auth endpoint. Output streams are line-buffered into
//! adapter-tagged log events. Crashed children are restarted after a
//! fixed backoff, unconditionally, until shutdown is requested.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use aibridge_core::env as adapter_env;
use aibridge_core::{AdapterConfig, BridgeConfig, Error, Result};

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub spawn_stagger: Duration,
    pub restart_backoff: Duration,
    pub backend_url: String,
    pub broker_url: String,
    pub api_key: String,
}

impl SupervisorSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            spawn_stagger: Duration::from_millis(config.orchestrator.spawn_stagger_ms),
            restart_backoff: Duration::from_millis(config.orchestrator.restart_backoff_ms),
            backend_url: config.backend.url.clone(),
            broker_url: config.broker.url.clone(),
            api_key: config.backend.api_key.clone(),
        }
    }
}

struct Supervised {
    config: AdapterConfig,
    pid: Option<u32>,
    restarts: usize,
}

pub struct Supervisor {
    settings: SupervisorSettings,
    children: Mutex<HashMap<String, Supervised>>,
    shutting_down: AtomicBool,
    total_restarts: AtomicUsize,
}

impl Supervisor {
    pub fn new(settings: SupervisorSettings) -> Self {
        Self {
            settings,
            children: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
            total_restarts: AtomicUsize::new(0),
        }
    }

    /// Spawn every configured adapter, staggered by the configured delay.
    pub async fn start_all(self: &Arc<Self>, configs: Vec<AdapterConfig>) -> Result<()> {
        let mut first = true;
        for config in configs {
            if !first {
                tokio::time::sleep(self.settings.spawn_stagger).await;
            }
            first = false;
            self.spawn_adapter(config).await?;
        }
        Ok(())
    }

    /// Names of adapters currently in the supervised set.
    pub async fn supervised(&self) -> Vec<String> {
        self.children.lock().await.keys().cloned().collect()
    }

    /// Restarts performed across all adapters since startup.
    pub fn restart_count(&self) -> usize {
        self.total_restarts.load(Ordering::SeqCst)
    }

    /// Set the shutdown flag, terminate every child and clear the set.
    /// No restarts are scheduled once the flag is up.
    pub async fn stop_all(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let mut children = self.children.lock().await;
        for (name, entry) in children.iter() {
            if let Some(pid) = entry.pid {
                info!(adapter = %name, pid, "Terminating adapter");
                terminate(pid);
            }
        }
        children.clear();
    }

    fn spawn_adapter<'a>(
        self: &'a Arc<Self>,
        config: AdapterConfig,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let name = config.name.clone();
            let child = self.launch(&config)?;
            let pid = child.id();
            info!(adapter = %name, pid, "Adapter spawned");

            {
                let mut children = self.children.lock().await;
                let entry = children.entry(name.clone()).or_insert(Supervised {
                    config,
                    pid: None,
                    restarts: 0,
                });
                entry.pid = pid;
            }

            tokio::spawn(self.clone().watch(name, child));
            Ok(())
        })
    }

    fn launch(&self, config: &AdapterConfig) -> Result<Child> {
        let (program, args) = if config.command.is_empty() {
            let exe = std::env::current_exe()
                .map_err(|e| Error::Config(format!("cannot resolve current executable: {e}")))?;
            (
                exe.to_string_lossy().into_owned(),
                vec!["adapter".to_string()],
            )
        } else {
            (config.command.clone(), config.args.clone())
        };

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env(adapter_env::ASSISTANT, &config.name)
            .env(adapter_env::PROFILE, &config.profile)
            .env(adapter_env::BACKEND_URL, &self.settings.backend_url)
            .env(adapter_env::BROKER_URL, &self.settings.broker_url)
            .env(adapter_env::API_KEY, &self.settings.api_key);
        for (k, v) in &config.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Config(format!("failed to spawn '{program}': {e}")))?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(config.name.clone(), "stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(config.name.clone(), "stderr", stderr));
        }
        Ok(child)
    }

    /// Exit watcher. A failed exit schedules exactly one restart after the
    /// backoff and keeps the adapter supervised; a clean exit (or any exit
    /// during shutdown) removes it permanently.
    async fn watch(self: Arc<Self>, name: String, mut child: Child) {
        let status = child.wait().await;
        let success = status.as_ref().map(|s| s.success()).unwrap_or(false);
        let code = status.ok().and_then(|s| s.code());

        if self.shutting_down.load(Ordering::SeqCst) {
            info!(adapter = %name, ?code, "Adapter exited during shutdown");
            self.children.lock().await.remove(&name);
            return;
        }

        if success {
            info!(adapter = %name, "Adapter exited cleanly, removing from supervision");
            self.children.lock().await.remove(&name);
            return;
        }

        warn!(
            adapter = %name,
            ?code,
            backoff_ms = self.settings.restart_backoff.as_millis() as u64,
            "Adapter crashed, scheduling restart"
        );
        tokio::time::sleep(self.settings.restart_backoff).await;

        if self.shutting_down.load(Ordering::SeqCst) {
            self.children.lock().await.remove(&name);
            return;
        }

        let (config, nth) = {
            let mut children = self.children.lock().await;
            match children.get_mut(&name) {
                Some(entry) => {
                    entry.restarts += 1;
                    (entry.config.clone(), entry.restarts)
                }
                // stop_all cleared the set while we were backing off.
                None => return,
            }
        };
        self.total_restarts.fetch_add(1, Ordering::SeqCst);
        info!(adapter = %name, restart = nth, "Restarting adapter");
        if let Err(e) = self.spawn_adapter(config).await {
            error!(adapter = %name, error = %e, "Restart failed");
        }
    }
}

/// Re-emit one child stream line-by-line as adapter-tagged log events.
async fn forward_lines<R: AsyncRead + Unpin>(name: String, stream: &'static str, source: R) {
    let mut lines = BufReader::new(source).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match stream {
            "stderr" => warn!(adapter = %name, "{line}"),
            _ => info!(adapter = %name, "{line}"),
        }
    }
}

#[cfg(unix)]
fn terminate(pid: u32) {
    // Graceful first: the adapter exits 0 on SIGTERM.
    unsafe {
        libc::kill(pid as i32, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn terminate(pid: u32) {
    warn!(pid, "Graceful termination not supported on this platform");
}
