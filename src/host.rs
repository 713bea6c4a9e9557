//! Host system queries for the audit engine
//!
//! Every external fact the auditor consumes comes through the [`HostProbe`]
//! trait: binary lookup, service state, socket metadata, group membership,
//! kernel parameters, and the docker CLI's structured (`{{json .}}`) output.
//! [`LiveHost`] is the production implementation; tests substitute a mock.

use crate::daemon_config::{self, ConfigState, DAEMON_CONFIG_PATH};
use crate::error::{Error, Result};
use nix::unistd::{getgroups, Group, Uid, User};
use serde::Deserialize;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Path of the daemon's control socket
pub const DOCKER_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Group granted unprivileged access to the control socket
pub const DOCKER_GROUP: &str = "docker";

/// Reference image for the end-to-end smoke test
pub const SMOKE_IMAGE: &str = "hello-world";

/// Kernel parameter controlling IPv4 packet forwarding
pub const IP_FORWARD_PATH: &str = "/proc/sys/net/ipv4/ip_forward";

/// Ownership and permission bits of the control socket
#[derive(Debug, Clone, Copy)]
pub struct SocketStat {
    /// Permission bits (lower 9 bits of st_mode)
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

/// A named group and its member list
#[derive(Debug, Clone)]
pub struct GroupInfo {
    pub name: String,
    pub members: Vec<String>,
}

/// How container listing succeeded, if at all
#[derive(Debug, Clone)]
pub enum ContainerAccess {
    /// `docker ps` worked for the invoking user
    Direct,
    /// Only worked through privilege elevation
    Elevated,
    /// Both attempts failed
    Denied(String),
}

/// Result of the disposable smoke-test container run
#[derive(Debug, Clone)]
pub struct SmokeResult {
    pub success: bool,
    pub detail: String,
}

/// Fields extracted from `docker info --format '{{json .}}'`
///
/// The renamed keys are the exact field names in the daemon's JSON output;
/// they are the only structured-output contract the auditor depends on.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DockerInfo {
    #[serde(rename = "Driver")]
    pub storage_driver: Option<String>,

    #[serde(rename = "CgroupDriver")]
    pub cgroup_driver: Option<String>,

    #[serde(rename = "OperatingSystem")]
    pub operating_system: Option<String>,

    #[serde(rename = "KernelVersion")]
    pub kernel_version: Option<String>,

    #[serde(rename = "MemTotal")]
    pub mem_total: Option<u64>,

    #[serde(rename = "ServerVersion")]
    pub server_version: Option<String>,
}

/// One row of `docker system df --format '{{json .}}'` output
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiskUsage {
    #[serde(rename = "Type")]
    pub kind: String,

    #[serde(rename = "TotalCount")]
    pub total_count: String,

    #[serde(rename = "Size")]
    pub size: String,

    #[serde(rename = "Reclaimable")]
    pub reclaimable: String,
}

/// Read-only queries against the host the audit runs on
pub trait HostProbe {
    /// Locate the docker binary on the search path
    fn docker_path(&self) -> Option<PathBuf>;

    /// Is the docker service active?
    fn daemon_active(&self) -> bool;

    /// Stat the control socket; `Ok(None)` means the socket is absent
    fn socket_stat(&self) -> Result<Option<SocketStat>>;

    /// Look up the docker group; `Ok(None)` means the group does not exist
    fn docker_group(&self) -> Result<Option<GroupInfo>>;

    /// Is the invoking user a member of the docker group?
    fn user_in_docker_group(&self) -> Result<bool>;

    /// Attempt to list containers, unprivileged first
    fn list_containers(&self) -> ContainerAccess;

    /// Read the IPv4 forwarding kernel parameter
    fn ip_forward(&self) -> Result<bool>;

    /// Probe the daemon configuration file
    fn daemon_config(&self) -> ConfigState;

    /// Count configured docker networks
    fn network_count(&self) -> Result<usize>;

    /// Fetch the daemon's structured system information
    fn docker_info(&self) -> Result<DockerInfo>;

    /// Run and discard one smoke-test container
    fn run_smoke_test(&self) -> SmokeResult;

    /// Fetch per-category disk usage rows
    fn disk_usage(&self) -> Result<Vec<DiskUsage>>;
}

/// Production probe that queries the live host
pub struct LiveHost;

impl LiveHost {
    pub fn new() -> Self {
        Self
    }

    /// Run a docker subcommand and return trimmed stdout
    fn docker_output(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("docker").args(args).output().map_err(|e| {
            Error::CommandFailed {
                command: format!("docker {}", args.join(" ")),
                message: e.to_string(),
            }
        })?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: format!("docker {}", args.join(" ")),
                message: first_line(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for LiveHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for LiveHost {
    fn docker_path(&self) -> Option<PathBuf> {
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join("docker"))
            .find(|candidate| candidate.is_file())
    }

    fn daemon_active(&self) -> bool {
        Command::new("systemctl")
            .args(["is-active", "--quiet", "docker"])
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn socket_stat(&self) -> Result<Option<SocketStat>> {
        match std::fs::metadata(DOCKER_SOCKET_PATH) {
            Ok(meta) => Ok(Some(SocketStat {
                mode: meta.mode() & 0o777,
                uid: meta.uid(),
                gid: meta.gid(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn docker_group(&self) -> Result<Option<GroupInfo>> {
        let group = Group::from_name(DOCKER_GROUP)
            .map_err(|e| Error::GroupLookup(e.to_string()))?;

        Ok(group.map(|g| GroupInfo {
            name: g.name,
            members: g.mem,
        }))
    }

    fn user_in_docker_group(&self) -> Result<bool> {
        let Some(group) = Group::from_name(DOCKER_GROUP)
            .map_err(|e| Error::GroupLookup(e.to_string()))?
        else {
            return Ok(false);
        };

        // Supplementary groups cover the current session; the member list
        // also catches a usermod that has not taken effect yet.
        let supplementary = getgroups().map_err(|e| Error::GroupLookup(e.to_string()))?;
        if supplementary.contains(&group.gid) {
            return Ok(true);
        }

        let user = User::from_uid(Uid::current())
            .map_err(|e| Error::GroupLookup(e.to_string()))?;
        Ok(user.is_some_and(|u| group.mem.contains(&u.name)))
    }

    fn list_containers(&self) -> ContainerAccess {
        if self.docker_output(&["ps", "--format", "{{.ID}}"]).is_ok() {
            return ContainerAccess::Direct;
        }

        let elevated = Command::new("sudo")
            .args(["-n", "docker", "ps", "--format", "{{.ID}}"])
            .output();

        match elevated {
            Ok(output) if output.status.success() => ContainerAccess::Elevated,
            Ok(output) => {
                ContainerAccess::Denied(first_line(&String::from_utf8_lossy(&output.stderr)))
            }
            Err(e) => ContainerAccess::Denied(e.to_string()),
        }
    }

    fn ip_forward(&self) -> Result<bool> {
        let raw = std::fs::read_to_string(IP_FORWARD_PATH).map_err(|e| {
            Error::KernelParameter {
                parameter: "net.ipv4.ip_forward".to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(raw.trim() == "1")
    }

    fn daemon_config(&self) -> ConfigState {
        daemon_config::load(Path::new(DAEMON_CONFIG_PATH))
    }

    fn network_count(&self) -> Result<usize> {
        let output = self.docker_output(&["network", "ls", "--format", "{{.Name}}"])?;
        Ok(output.lines().filter(|line| !line.trim().is_empty()).count())
    }

    fn docker_info(&self) -> Result<DockerInfo> {
        let raw = self.docker_output(&["info", "--format", "{{json .}}"])?;
        serde_json::from_str(&raw).map_err(|e| Error::CommandOutput {
            command: "docker info".to_string(),
            message: e.to_string(),
        })
    }

    fn run_smoke_test(&self) -> SmokeResult {
        let output = Command::new("docker")
            .args(["run", "--rm", SMOKE_IMAGE])
            .output();

        match output {
            Ok(output) if output.status.success() => SmokeResult {
                success: true,
                detail: format!("{} container ran and was removed", SMOKE_IMAGE),
            },
            Ok(output) => SmokeResult {
                success: false,
                detail: first_line(&String::from_utf8_lossy(&output.stderr)),
            },
            Err(e) => SmokeResult {
                success: false,
                detail: e.to_string(),
            },
        }
    }

    fn disk_usage(&self) -> Result<Vec<DiskUsage>> {
        let raw = self.docker_output(&["system", "df", "--format", "{{json .}}"])?;
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| Error::CommandOutput {
                    command: "docker system df".to_string(),
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

/// First non-empty line of command output, for one-line diagnostics
fn first_line(output: &str) -> String {
    output
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("no output")
        .trim()
        .to_string()
}
