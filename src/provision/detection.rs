// ABOUTME: Locates the container runtime socket on the local host.
// ABOUTME: Explicit settings win; otherwise Podman sockets are checked before Docker.

use super::types::{RuntimeConfig, RuntimeInfo, RuntimeType};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("configured runtime socket does not exist: {0}")]
    SocketMissing(String),
}

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Find the runtime to use.
///
/// With an explicit `runtime` the configured (or default) socket is used
/// as-is. Otherwise the order is:
/// 1. Rootless Podman (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman (`/run/podman/podman.sock`)
/// 3. Docker (`/var/run/docker.sock`)
pub fn detect_local(config: &RuntimeConfig) -> Result<RuntimeInfo, DetectionError> {
    if let Some(runtime_type) = config.runtime {
        let socket_path = config
            .socket
            .clone()
            .unwrap_or_else(|| default_socket_path(runtime_type));
        if !Path::new(&socket_path).exists() {
            return Err(DetectionError::SocketMissing(socket_path));
        }
        return Ok(RuntimeInfo {
            runtime_type,
            socket_path,
        });
    }

    if let Some(socket) = &config.socket {
        if !Path::new(socket).exists() {
            return Err(DetectionError::SocketMissing(socket.clone()));
        }
        let runtime_type = if socket.contains("podman") {
            RuntimeType::Podman
        } else {
            RuntimeType::Docker
        };
        return Ok(RuntimeInfo {
            runtime_type,
            socket_path: socket.clone(),
        });
    }

    candidates()
        .into_iter()
        .find(|info| Path::new(&info.socket_path).exists())
        .ok_or(DetectionError::NoRuntimeFound)
}

fn candidates() -> Vec<RuntimeInfo> {
    let mut found = Vec::with_capacity(3);
    if let Some(uid) = get_uid() {
        found.push(RuntimeInfo {
            runtime_type: RuntimeType::Podman,
            socket_path: format!("/run/user/{}/podman/podman.sock", uid),
        });
    }
    found.push(RuntimeInfo {
        runtime_type: RuntimeType::Podman,
        socket_path: ROOTFUL_PODMAN.to_string(),
    });
    found.push(RuntimeInfo {
        runtime_type: RuntimeType::Docker,
        socket_path: DOCKER_SOCKET.to_string(),
    });
    found
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

fn default_socket_path(runtime: RuntimeType) -> String {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET.to_string(),
        RuntimeType::Podman => ROOTFUL_PODMAN.to_string(),
    }
}
