//! Test configuration builder.
//!
//! [`TestConfigBuilder`] produces an `IronscanConfig` rooted in a temporary
//! directory: in-memory state store, publisher and metrics off, no PID
//! file, a two-advisory feed and a `/bin/sh -c` scanner script.

use std::path::{Path, PathBuf};

use ironscan_core::config::IronscanConfig;

/// Two advisories in the `Debian Local Security Checks` family.
pub const ADVISORIES: &str = r#"{
    "family": "Debian Local Security Checks",
    "advisories": [
        {"oid": "1.3.6.1.4.1.25623.1.1.2.2024.1", "title": "DSA-1"},
        {"oid": "1.3.6.1.4.1.25623.1.1.2.2024.2", "title": "DSA-2"}
    ]
}"#;

/// Scanner that reports one host with two results, then exits 0.
pub const FULL_SCAN: &str = r#"
cat > /dev/null
echo '{"kind":"host_progress","host":"10.0.0.1","completed":1,"total":2}'
echo '{"kind":"result","host":"10.0.0.1","port":"22/tcp","vt_oid":"1.1","severity":"high","description":"weak ssh"}'
echo '{"kind":"result","host":"10.0.0.1","vt_oid":"1.2","severity":"low"}'
echo '{"kind":"host_done","host":"10.0.0.1"}'
exit 0
"#;

/// Scanner that runs until stopped.
pub const LONG_SCAN: &str = "sleep 30";

#[allow(dead_code)]
pub struct TestConfigBuilder {
    config: IronscanConfig,
    root: PathBuf,
}

#[allow(dead_code)]
impl TestConfigBuilder {
    /// Create a builder rooted at `root`. Writes the feed directory.
    pub fn new(root: &Path) -> Self {
        let feed_dir = root.join("feed");
        std::fs::create_dir_all(&feed_dir).expect("create feed dir");
        std::fs::write(feed_dir.join("debian.notus"), ADVISORIES).expect("write advisories");
        std::fs::create_dir_all(root.join("keys")).expect("create keys dir");

        let mut config = IronscanConfig::default();
        config.general.pid_file = String::new();
        config.socket.path = root.join("ironscan.sock").display().to_string();
        config.socket.max_connections = 8;
        config.socket.request_timeout_secs = 10;
        config.store.backend = "memory".to_owned();
        config.feed.feed_dir = feed_dir.display().to_string();
        config.feed.trust_keys_dir = root.join("keys").display().to_string();
        // no manifest in the fixture feed
        config.feed.disable_integrity_check = true;
        config.supervisor.scanner_binary = "/bin/sh".to_owned();
        config.supervisor.scanner_args = vec!["-c".to_owned(), FULL_SCAN.to_owned()];
        config.supervisor.stop_grace_secs = 1;
        config.supervisor.monitor_interval_ms = 100;
        config.supervisor.max_memory_mb = 0;
        config.supervisor.max_cpu_percent = 10_000.0;
        config.supervisor.max_concurrent_scans = 4;
        config.publisher.enabled = false;
        config.metrics.enabled = false;
        config.controller.stop_timeout_secs = 3;

        Self {
            config,
            root: root.to_path_buf(),
        }
    }

    /// Scanner script passed to `/bin/sh -c`.
    pub fn script(mut self, script: &str) -> Self {
        self.config.supervisor.scanner_args = vec!["-c".to_owned(), script.to_owned()];
        self
    }

    /// Scanner binary to execute.
    pub fn scanner_binary(mut self, binary: &str) -> Self {
        self.config.supervisor.scanner_binary = binary.to_owned();
        self
    }

    /// Concurrency ceiling.
    pub fn ceiling(mut self, n: usize) -> Self {
        self.config.supervisor.max_concurrent_scans = n;
        self
    }

    /// Enforce feed signature verification.
    pub fn integrity_check(mut self, enabled: bool) -> Self {
        self.config.feed.disable_integrity_check = !enabled;
        self
    }

    /// Connection limit of the control socket.
    pub fn max_connections(mut self, n: usize) -> Self {
        self.config.socket.max_connections = n;
        self
    }

    /// Write a PID file under the test root.
    pub fn with_pid_file(mut self) -> Self {
        self.config.general.pid_file = self.root.join("run").join("ironscand.pid").display().to_string();
        self
    }

    pub fn build(self) -> IronscanConfig {
        self.config
    }
}
