//! The fixed audit check sequence
//!
//! Checks run strictly in order. The first two are blocking: without the
//! docker binary or an active daemon every later check is meaningless, so
//! the run halts there. All other checks record their outcome and continue.
//! Every probe error is converted into an outcome locally; nothing here
//! aborts the run except the two blocking failures.

use crate::audit::report::{AuditReport, Outcome};
use crate::daemon_config::ConfigState;
use crate::error::Result;
use crate::host::{
    ContainerAccess, DiskUsage, DockerInfo, HostProbe, DOCKER_GROUP, DOCKER_SOCKET_PATH,
    SMOKE_IMAGE,
};

/// Expected permission bits on the control socket
const SOCKET_MODE: u32 = 0o660;

/// Run the full audit against `probe`
pub fn run(probe: &dyn HostProbe) -> AuditReport {
    let mut report = AuditReport::new();

    // Blocking: nothing else is worth checking without the binary
    let outcome = installed(probe);
    let blocked = outcome.is_fail();
    report.record("docker installed", outcome);
    if blocked {
        return report;
    }

    // Blocking: every later check assumes a live daemon
    let outcome = daemon(probe);
    let blocked = outcome.is_fail();
    report.record("docker daemon", outcome);
    if blocked {
        return report;
    }

    report.record("control socket", socket(probe));
    report.record("docker group", group(probe));
    report.record("user access", user_access(probe));
    report.record("container listing", container_listing(probe));
    report.record("ip forwarding", ip_forwarding(probe));
    report.record("daemon configuration", config(probe));
    report.record("networks", networks(probe));

    // One daemon query feeds the storage, cgroup, and summary checks
    let info = probe.docker_info();
    report.record("storage driver", storage_driver(&info));
    report.record("cgroup driver", cgroup_driver(&info));

    report.record("smoke test", smoke_test(probe));
    report.record("disk usage", disk_usage(probe));
    report.record("system summary", system_summary(&info));

    report
}

fn installed(probe: &dyn HostProbe) -> Outcome {
    match probe.docker_path() {
        Some(path) => Outcome::pass(format!("found at {}", path.display())),
        None => Outcome::fail("docker is not installed"),
    }
}

fn daemon(probe: &dyn HostProbe) -> Outcome {
    if probe.daemon_active() {
        Outcome::pass("service is active")
    } else {
        Outcome::fail("service is not running")
    }
}

fn socket(probe: &dyn HostProbe) -> Outcome {
    match probe.socket_stat() {
        Ok(Some(stat)) if stat.mode == SOCKET_MODE => Outcome::pass(format!(
            "{} mode {:o}, uid {}, gid {}",
            DOCKER_SOCKET_PATH, stat.mode, stat.uid, stat.gid
        )),
        Ok(Some(stat)) => Outcome::warn(format!(
            "unexpected mode {:o} on {}, expected {:o}",
            stat.mode, DOCKER_SOCKET_PATH, SOCKET_MODE
        )),
        Ok(None) => Outcome::fail(format!("control socket missing at {}", DOCKER_SOCKET_PATH)),
        Err(e) => Outcome::fail(format!("cannot stat {}: {}", DOCKER_SOCKET_PATH, e)),
    }
}

fn group(probe: &dyn HostProbe) -> Outcome {
    match probe.docker_group() {
        Ok(Some(group)) if group.members.is_empty() => {
            Outcome::warn(format!("group '{}' has no members", group.name))
        }
        Ok(Some(group)) => Outcome::pass(format!(
            "group '{}' members: {}",
            group.name,
            group.members.join(", ")
        )),
        Ok(None) => Outcome::warn(format!("group '{}' does not exist", DOCKER_GROUP)),
        Err(e) => Outcome::warn(format!("group lookup failed: {}", e)),
    }
}

fn user_access(probe: &dyn HostProbe) -> Outcome {
    match probe.user_in_docker_group() {
        Ok(true) => Outcome::pass(format!("invoking user belongs to '{}'", DOCKER_GROUP)),
        Ok(false) => Outcome::warn(format!(
            "invoking user is not in '{}', docker commands need elevation",
            DOCKER_GROUP
        )),
        Err(e) => Outcome::warn(format!("membership lookup failed: {}", e)),
    }
}

fn container_listing(probe: &dyn HostProbe) -> Outcome {
    match probe.list_containers() {
        ContainerAccess::Direct => Outcome::pass("containers listable without elevation"),
        ContainerAccess::Elevated => Outcome::warn("listing containers requires elevation"),
        ContainerAccess::Denied(detail) => {
            Outcome::warn(format!("cannot list containers: {}", detail))
        }
    }
}

fn ip_forwarding(probe: &dyn HostProbe) -> Outcome {
    match probe.ip_forward() {
        Ok(true) => Outcome::pass("net.ipv4.ip_forward = 1"),
        Ok(false) => Outcome::warn("net.ipv4.ip_forward is disabled, container networking will break"),
        Err(e) => Outcome::warn(format!("{}", e)),
    }
}

fn config(probe: &dyn HostProbe) -> Outcome {
    match probe.daemon_config() {
        ConfigState::Missing => Outcome::warn("no daemon.json, daemon uses built-in defaults"),
        ConfigState::Invalid(detail) => {
            Outcome::fail(format!("invalid daemon configuration: {}", detail))
        }
        ConfigState::Loaded(config) => Outcome::pass(format!(
            "log driver {}, storage driver {}",
            config.log_driver(),
            config.storage_driver()
        )),
    }
}

fn networks(probe: &dyn HostProbe) -> Outcome {
    match probe.network_count() {
        Ok(0) => Outcome::fail("no networks configured"),
        Ok(count) => Outcome::pass(format!("{} network(s) configured", count)),
        Err(e) => Outcome::fail(format!("cannot list networks: {}", e)),
    }
}

fn storage_driver(info: &Result<DockerInfo>) -> Outcome {
    match info {
        Ok(info) => match info.storage_driver.as_deref() {
            Some(driver) if !driver.is_empty() => Outcome::pass(driver.to_string()),
            _ => Outcome::fail("storage driver unresolvable"),
        },
        Err(e) => Outcome::fail(format!("cannot query storage driver: {}", e)),
    }
}

fn cgroup_driver(info: &Result<DockerInfo>) -> Outcome {
    match info {
        Ok(info) => match info.cgroup_driver.as_deref() {
            Some(driver) if !driver.is_empty() => Outcome::pass(driver.to_string()),
            _ => Outcome::warn("cgroup driver unresolvable"),
        },
        Err(e) => Outcome::warn(format!("cannot query cgroup driver: {}", e)),
    }
}

fn smoke_test(probe: &dyn HostProbe) -> Outcome {
    let result = probe.run_smoke_test();
    if result.success {
        Outcome::pass(result.detail)
    } else {
        // A fresh installation has no cached image, so a failed pull is
        // expected and never fatal.
        Outcome::warn(format!(
            "'docker run --rm {}' failed: {}",
            SMOKE_IMAGE, result.detail
        ))
    }
}

fn disk_usage(probe: &dyn HostProbe) -> Outcome {
    match probe.disk_usage() {
        Ok(rows) if rows.is_empty() => Outcome::pass("no disk usage reported"),
        Ok(rows) => Outcome::pass(render_disk_usage(&rows)),
        Err(e) => Outcome::warn(format!("cannot query disk usage: {}", e)),
    }
}

fn system_summary(info: &Result<DockerInfo>) -> Outcome {
    let info = match info {
        Ok(info) => info,
        Err(e) => return Outcome::warn(format!("cannot query system information: {}", e)),
    };

    let mut parts = Vec::new();
    if let Some(os) = &info.operating_system {
        parts.push(os.clone());
    }
    if let Some(kernel) = &info.kernel_version {
        parts.push(format!("kernel {}", kernel));
    }
    if let Some(bytes) = info.mem_total {
        parts.push(format!("{} memory", format_gib(bytes)));
    }

    if parts.is_empty() {
        Outcome::warn("no system information reported")
    } else {
        Outcome::pass(parts.join(", "))
    }
}

fn render_disk_usage(rows: &[DiskUsage]) -> String {
    rows.iter()
        .map(|row| format!("{} {}", row.kind, row.size))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a byte count as GiB with one decimal
fn format_gib(bytes: u64) -> String {
    format!("{:.1} GiB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::report::Severity;
    use crate::daemon_config::DaemonConfig;
    use crate::error::Error;
    use crate::host::{GroupInfo, SmokeResult, SocketStat};
    use std::path::PathBuf;

    /// Configurable in-memory probe
    struct MockHost {
        docker_path: Option<PathBuf>,
        daemon_active: bool,
        socket: Option<SocketStat>,
        group: Option<GroupInfo>,
        in_group: bool,
        access: ContainerAccess,
        ip_forward: bool,
        config: ConfigState,
        networks: std::result::Result<usize, String>,
        info: DockerInfo,
        smoke_ok: bool,
        disk: Vec<DiskUsage>,
    }

    impl MockHost {
        /// A fully healthy host; tests degrade individual fields
        fn ready() -> Self {
            Self {
                docker_path: Some(PathBuf::from("/usr/bin/docker")),
                daemon_active: true,
                socket: Some(SocketStat {
                    mode: 0o660,
                    uid: 0,
                    gid: 999,
                }),
                group: Some(GroupInfo {
                    name: "docker".to_string(),
                    members: vec!["alice".to_string()],
                }),
                in_group: true,
                access: ContainerAccess::Direct,
                ip_forward: true,
                config: ConfigState::Loaded(
                    serde_json::from_str::<DaemonConfig>("{}").unwrap(),
                ),
                networks: Ok(3),
                info: DockerInfo {
                    storage_driver: Some("overlay2".to_string()),
                    cgroup_driver: Some("systemd".to_string()),
                    operating_system: Some("Ubuntu 24.04.1 LTS".to_string()),
                    kernel_version: Some("6.8.0-41-generic".to_string()),
                    mem_total: Some(16 * 1024 * 1024 * 1024),
                    server_version: Some("27.1.1".to_string()),
                },
                smoke_ok: true,
                disk: vec![DiskUsage {
                    kind: "Images".to_string(),
                    total_count: "1".to_string(),
                    size: "78MB".to_string(),
                    reclaimable: "0B (0%)".to_string(),
                }],
            }
        }
    }

    impl HostProbe for MockHost {
        fn docker_path(&self) -> Option<PathBuf> {
            self.docker_path.clone()
        }

        fn daemon_active(&self) -> bool {
            self.daemon_active
        }

        fn socket_stat(&self) -> Result<Option<SocketStat>> {
            Ok(self.socket)
        }

        fn docker_group(&self) -> Result<Option<GroupInfo>> {
            Ok(self.group.clone())
        }

        fn user_in_docker_group(&self) -> Result<bool> {
            Ok(self.in_group)
        }

        fn list_containers(&self) -> ContainerAccess {
            self.access.clone()
        }

        fn ip_forward(&self) -> Result<bool> {
            Ok(self.ip_forward)
        }

        fn daemon_config(&self) -> ConfigState {
            self.config.clone()
        }

        fn network_count(&self) -> Result<usize> {
            self.networks.clone().map_err(|message| Error::CommandFailed {
                command: "docker network ls".to_string(),
                message,
            })
        }

        fn docker_info(&self) -> Result<DockerInfo> {
            Ok(self.info.clone())
        }

        fn run_smoke_test(&self) -> SmokeResult {
            if self.smoke_ok {
                SmokeResult {
                    success: true,
                    detail: "hello-world container ran and was removed".to_string(),
                }
            } else {
                SmokeResult {
                    success: false,
                    detail: "pull access denied".to_string(),
                }
            }
        }

        fn disk_usage(&self) -> Result<Vec<DiskUsage>> {
            Ok(self.disk.clone())
        }
    }

    fn severity_of(report: &AuditReport, name: &str) -> Severity {
        report
            .results()
            .iter()
            .find(|r| r.name == name)
            .unwrap_or_else(|| panic!("no check named '{}'", name))
            .outcome
            .severity
    }

    #[test]
    fn test_healthy_host_passes_everything() {
        let report = run(&MockHost::ready());
        assert_eq!(report.results().len(), 14);
        assert_eq!(report.passed(), 14);
        assert_eq!(report.warned(), 0);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_missing_binary_halts_after_one_check() {
        let mut host = MockHost::ready();
        host.docker_path = None;

        let report = run(&host);
        assert_eq!(report.results().len(), 1);
        assert_eq!(severity_of(&report, "docker installed"), Severity::Fail);
        assert!(report.results()[0].outcome.message.contains("not installed"));
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_inactive_daemon_halts_after_two_checks() {
        let mut host = MockHost::ready();
        host.daemon_active = false;

        let report = run(&host);
        assert_eq!(report.results().len(), 2);
        assert_eq!(severity_of(&report, "docker installed"), Severity::Pass);
        assert_eq!(severity_of(&report, "docker daemon"), Severity::Fail);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_fresh_install_scenario() {
        // Daemon up but nothing tuned yet: odd socket mode, empty group,
        // forwarding off, no daemon.json. Warnings only, exit stays zero.
        let mut host = MockHost::ready();
        host.socket = Some(SocketStat {
            mode: 0o640,
            uid: 0,
            gid: 999,
        });
        host.group = Some(GroupInfo {
            name: "docker".to_string(),
            members: Vec::new(),
        });
        host.ip_forward = false;
        host.config = ConfigState::Missing;

        let report = run(&host);
        assert_eq!(report.results().len(), 14);
        assert!(report.passed() >= 8);
        assert!(report.warned() >= 3);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_counters_always_sum_to_check_count() {
        let mut host = MockHost::ready();
        host.socket = None;
        host.networks = Ok(0);
        host.smoke_ok = false;

        let report = run(&host);
        assert_eq!(
            report.passed() + report.warned() + report.failed(),
            report.results().len()
        );
    }

    #[test]
    fn test_socket_mode_660_passes_others_warn() {
        let report = run(&MockHost::ready());
        assert_eq!(severity_of(&report, "control socket"), Severity::Pass);

        for mode in [0o600, 0o640, 0o666, 0o755] {
            let mut host = MockHost::ready();
            host.socket = Some(SocketStat { mode, uid: 0, gid: 999 });
            let report = run(&host);
            assert_eq!(
                severity_of(&report, "control socket"),
                Severity::Warn,
                "mode {:o} must warn, never fail",
                mode
            );
        }
    }

    #[test]
    fn test_missing_socket_fails() {
        let mut host = MockHost::ready();
        host.socket = None;

        let report = run(&host);
        assert_eq!(severity_of(&report, "control socket"), Severity::Fail);
        // Non-blocking: the run continues past it
        assert_eq!(report.results().len(), 14);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_config_absent_warns_invalid_fails() {
        let mut host = MockHost::ready();
        host.config = ConfigState::Missing;
        let report = run(&host);
        assert_eq!(severity_of(&report, "daemon configuration"), Severity::Warn);

        let mut host = MockHost::ready();
        host.config = ConfigState::Invalid("expected `,` at line 3".to_string());
        let report = run(&host);
        assert_eq!(severity_of(&report, "daemon configuration"), Severity::Fail);
        let message = &report
            .results()
            .iter()
            .find(|r| r.name == "daemon configuration")
            .unwrap()
            .outcome
            .message;
        assert!(message.contains("invalid"));
    }

    #[test]
    fn test_config_defaults_reported_for_sparse_file() {
        let report = run(&MockHost::ready());
        let message = &report
            .results()
            .iter()
            .find(|r| r.name == "daemon configuration")
            .unwrap()
            .outcome
            .message;
        assert!(message.contains("json-file"));
        assert!(message.contains("auto"));
    }

    #[test]
    fn test_smoke_failure_is_never_fatal() {
        let mut host = MockHost::ready();
        host.smoke_ok = false;

        let report = run(&host);
        assert_eq!(severity_of(&report, "smoke test"), Severity::Warn);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_no_networks_fails() {
        let mut host = MockHost::ready();
        host.networks = Ok(0);

        let report = run(&host);
        assert_eq!(severity_of(&report, "networks"), Severity::Fail);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_network_query_error_fails() {
        let mut host = MockHost::ready();
        host.networks = Err("connection refused".to_string());

        let report = run(&host);
        assert_eq!(severity_of(&report, "networks"), Severity::Fail);
    }

    #[test]
    fn test_unresolvable_storage_fails_unresolvable_cgroup_warns() {
        let mut host = MockHost::ready();
        host.info.storage_driver = None;
        host.info.cgroup_driver = Some(String::new());

        let report = run(&host);
        assert_eq!(severity_of(&report, "storage driver"), Severity::Fail);
        assert_eq!(severity_of(&report, "cgroup driver"), Severity::Warn);
    }

    #[test]
    fn test_elevated_listing_warns() {
        let mut host = MockHost::ready();
        host.access = ContainerAccess::Elevated;
        let report = run(&host);
        assert_eq!(severity_of(&report, "container listing"), Severity::Warn);

        host.access = ContainerAccess::Denied("permission denied".to_string());
        let report = run(&host);
        assert_eq!(severity_of(&report, "container listing"), Severity::Warn);
    }

    #[test]
    fn test_summary_reports_memory_in_gib() {
        let report = run(&MockHost::ready());
        let message = &report
            .results()
            .iter()
            .find(|r| r.name == "system summary")
            .unwrap()
            .outcome
            .message;
        assert!(message.contains("Ubuntu 24.04.1 LTS"));
        assert!(message.contains("kernel 6.8.0-41-generic"));
        assert!(message.contains("16.0 GiB memory"));
    }

    #[test]
    fn test_check_order_is_fixed() {
        let report = run(&MockHost::ready());
        let names: Vec<&str> = report.results().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "docker installed",
                "docker daemon",
                "control socket",
                "docker group",
                "user access",
                "container listing",
                "ip forwarding",
                "daemon configuration",
                "networks",
                "storage driver",
                "cgroup driver",
                "smoke test",
                "disk usage",
                "system summary",
            ]
        );
    }

    #[test]
    fn test_format_gib() {
        assert_eq!(format_gib(16 * 1024 * 1024 * 1024), "16.0 GiB");
        assert_eq!(format_gib(8_254_390_272), "7.7 GiB");
    }
}
