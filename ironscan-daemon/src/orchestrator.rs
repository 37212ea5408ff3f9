//! Component assembly and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `ironscand`. It
//! connects the state store, loads the feed, builds the supervisor,
//! publisher and scan controller, binds the control socket and runs the
//! main loop until a shutdown signal arrives.
//!
//! # Startup Order
//!
//! 1. State store (fatal if unreachable and `store.required`)
//! 2. Feed load (a refused feed blocks scans but not startup)
//! 3. Result publisher (optional, never fatal)
//! 4. Scan controller
//! 5. Control socket (fatal if it cannot be bound)
//! 6. Startup reconciliation of scans left `RUNNING`
//!
//! # Shutdown Order
//!
//! 1. Control socket (stop accepting requests)
//! 2. Scan controller (stop running scans, record final statuses)
//! 3. Result publisher (flush pending batches)
//! 4. PID file

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use ironscan_controller::{ControllerSettings, ScanController};
use ironscan_core::config::IronscanConfig;
use ironscan_core::pipeline::DynPipeline;
use ironscan_feed::{FeedLoader, FeedRegistry, FeedState};
use ironscan_publisher::{PublisherHandle, RedisMessageBus, ResultPublisher};
use ironscan_store::{
    AnyStateStore, MemoryStateStore, RedisStateStore, RetryPolicy, RetryingStore, StateStore,
};
use ironscan_supervisor::ProcessSupervisor;

use crate::handler::RequestHandler;
use crate::health::{DaemonHealth, spawn_health_log_task};
use crate::metrics_server;
use crate::server::ControlServer;

/// State store stack used by the daemon.
pub type DaemonStore = RetryingStore<AnyStateStore>;

/// Interval of the periodic health log.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Interval of the uptime gauge refresh.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator {
    config: IronscanConfig,
    controller: ScanController<DaemonStore>,
    handler: Arc<RequestHandler<DaemonStore>>,
    publisher: Option<Box<dyn DynPipeline>>,
    server: Option<ControlServer<DaemonStore>>,
    shutdown: CancellationToken,
    start_time: Instant,
}

impl Orchestrator {
    /// Build every component from an already loaded configuration.
    ///
    /// # Errors
    ///
    /// - Configuration validation fails
    /// - The metrics recorder cannot be installed
    /// - The state store is required and unreachable
    /// - The control socket cannot be bound
    pub async fn build_from_config(config: IronscanConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }
        record_daemon_metrics();

        let store = connect_store(&config).await?;

        let feed = Arc::new(FeedRegistry::new(FeedLoader::from_config(&config.feed)));
        load_feed(&feed).await;

        let supervisor = ProcessSupervisor::from_config(&config.supervisor);

        let (publisher, publisher_handle) = build_publisher(&config).await;

        let mut builder = ScanController::builder(store, supervisor, Arc::clone(&feed))
            .settings(ControllerSettings::from_config(&config.controller));
        if let Some(handle) = &publisher_handle {
            builder = builder.publisher(handle.clone());
        }
        let controller = builder.build();

        let handler = Arc::new(RequestHandler::new(controller.clone(), publisher_handle));
        let server = ControlServer::bind(Arc::clone(&handler), &config.socket)?;

        tracing::info!(
            store = controller.store().inner().backend_name(),
            max_concurrent_scans = config.supervisor.max_concurrent_scans,
            publisher = publisher.is_some(),
            "orchestrator built"
        );

        Ok(Self {
            config,
            controller,
            handler,
            publisher,
            server: Some(server),
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        })
    }

    /// Run until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

        self.run_until(async move {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            tracing::info!(signal = name, "shutdown signal received");
        })
        .await
    }

    /// Run until `stop` completes or the shutdown token is cancelled.
    ///
    /// SIGHUP reloads the feed while running.
    pub async fn run_until<F>(mut self, stop: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sighup = signal(SignalKind::hangup())
            .map_err(|e| anyhow::anyhow!("failed to install SIGHUP handler: {}", e))?;

        let pid_path = (!self.config.general.pid_file.is_empty())
            .then(|| self.config.general.pid_file.clone());
        if let Some(path) = &pid_path {
            write_pid_file(Path::new(path))?;
        }

        if let Some(publisher) = self.publisher.as_mut() {
            if let Err(e) = publisher.start().await {
                tracing::warn!(error = %e, "result publisher failed to start");
            }
        }

        match self.controller.reconcile_on_startup().await {
            Ok(report) => {
                tracing::info!(
                    interrupted = report.interrupted.len(),
                    queued = report.queued.len(),
                    "startup reconciliation complete"
                );
                // scans queued by a previous run wait for a slot again
                for id in report.queued {
                    match self.controller.start_scan(id).await {
                        Ok(status) => {
                            tracing::info!(scan_id = %id, status = %status, "queued scan resumed")
                        }
                        Err(e) => {
                            tracing::warn!(scan_id = %id, error = %e, "queued scan not resumed")
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(
                error = %e,
                "startup reconciliation failed; orphaned scans are settled on next read"
            ),
        }

        let mut server_task = self
            .server
            .take()
            .map(|server| tokio::spawn(server.serve(self.shutdown.child_token())));

        let handler = Arc::clone(&self.handler);
        let health_task = spawn_health_log_task(HEALTH_LOG_INTERVAL, self.shutdown.child_token(), move || {
            let handler = Arc::clone(&handler);
            async move { handler.health().await }
        });
        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown.child_token()));

        tracing::info!(pid = std::process::id(), "ironscand running");
        tokio::pin!(stop);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = self.shutdown.cancelled() => break,
                _ = sighup.recv() => {
                    tracing::info!("SIGHUP received, reloading feed");
                    match self.controller.reload_feed().await {
                        Ok(snapshot) => tracing::info!(
                            vts = snapshot.index.len(),
                            state = snapshot.state.as_str(),
                            "feed reloaded"
                        ),
                        Err(e) => tracing::error!(error = %e, "feed reload failed; keeping previous feed"),
                    }
                }
            }
        }

        tracing::info!("shutting down");
        self.shutdown.cancel();
        if let Some(task) = server_task.take() {
            let _ = task.await;
        }
        self.controller.shutdown().await;
        let _ = health_task.await;
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        if let Some(publisher) = self.publisher.as_mut() {
            if let Err(e) = publisher.stop().await {
                tracing::warn!(error = %e, "result publisher failed to stop cleanly");
            }
        }

        if let Some(path) = &pid_path {
            remove_pid_file(Path::new(path));
        }
        tracing::info!("ironscand stopped");
        Ok(())
    }

    /// Token that stops [`run_until`](Self::run_until) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The scan controller.
    pub fn controller(&self) -> &ScanController<DaemonStore> {
        &self.controller
    }

    /// Current aggregated health.
    pub async fn health(&self) -> DaemonHealth {
        self.handler.health().await
    }

    /// The loaded configuration.
    pub fn config(&self) -> &IronscanConfig {
        &self.config
    }
}

/// Connect the configured state store backend.
///
/// A Redis backend that cannot be reached is fatal when `store.required`,
/// otherwise the daemon falls back to the in-memory backend.
async fn connect_store(config: &IronscanConfig) -> Result<DaemonStore> {
    let policy = RetryPolicy::from_config(&config.store);

    let backend = match config.store.backend.as_str() {
        "memory" => {
            tracing::warn!("using in-memory state store; scan state is lost on restart");
            AnyStateStore::Memory(MemoryStateStore::new())
        }
        _ => match connect_redis(&config.store.redis_url, policy.clone()).await {
            Ok(redis) => AnyStateStore::Redis(redis),
            Err(e) if config.store.required => {
                return Err(anyhow::anyhow!(
                    "state store unreachable at startup: {}",
                    e
                ));
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "state store unreachable, falling back to in-memory store"
                );
                AnyStateStore::Memory(MemoryStateStore::new())
            }
        },
    };

    tracing::info!(backend = backend.backend_name(), "state store ready");
    Ok(RetryingStore::new(backend, policy))
}

async fn connect_redis(
    url: &str,
    policy: RetryPolicy,
) -> Result<RedisStateStore, ironscan_store::StoreError> {
    let redis = policy
        .run("connect", || RedisStateStore::connect(url))
        .await?;
    policy.run("ping", || redis.ping()).await?;
    Ok(redis)
}

/// Initial feed load. Failures leave the registry unloaded.
async fn load_feed(feed: &FeedRegistry) {
    match feed.reload().await {
        Ok(snapshot) => match &snapshot.state {
            FeedState::Refused(reason) => tracing::error!(
                reason = %reason,
                "feed refused; scans are blocked until a trusted feed is loaded"
            ),
            state => tracing::info!(
                vts = snapshot.index.len(),
                state = state.as_str(),
                files_rejected = snapshot.report.files_rejected,
                "feed loaded"
            ),
        },
        Err(e) => tracing::error!(error = %e, "feed load failed"),
    }
}

/// Build the result publisher if enabled. Connection failures disable it.
async fn build_publisher(
    config: &IronscanConfig,
) -> (Option<Box<dyn DynPipeline>>, Option<PublisherHandle>) {
    if !config.publisher.enabled {
        tracing::info!("result publisher disabled");
        return (None, None);
    }
    match RedisMessageBus::connect(&config.publisher.redis_url).await {
        Ok(bus) => {
            let publisher = ResultPublisher::new(bus, &config.publisher);
            let handle = publisher.handle();
            (Some(Box::new(publisher)), Some(handle))
        }
        Err(e) => {
            tracing::warn!(error = %e, "message bus unreachable, result publishing disabled");
            (None, None)
        }
    }
}

/// Write the current process PID to a file.
///
/// The file is created with `create_new` so a second instance fails instead
/// of overwriting it. The parent directory is created 0700 and the file
/// is 0600.
///
/// # Errors
///
/// Returns an error if the PID file already exists or cannot be written.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o700)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        fs::create_dir_all(parent)?;
    }

    let pid = std::process::id();
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{pid}")?;
    tracing::info!(pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file. Failure is logged, never fatal.
pub fn remove_pid_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "PID file removed"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file"),
    }
}

fn record_daemon_metrics() {
    use ironscan_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

fn spawn_uptime_updater(
    start_time: Instant,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    use ironscan_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
