//! Locate a Docker-API socket for testcontainers, or explain why there is none.

use anyhow::{Result, bail};
use std::{
    env,
    os::unix::net::UnixStream,
    path::{Path, PathBuf},
    sync::OnceLock,
    thread,
    time::{Duration, Instant},
};

const SOCKET_WAIT: Duration = Duration::from_secs(2);
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Make sure testcontainers can reach a container runtime, pointing
/// `DOCKER_HOST` at a Podman socket when Docker's is absent.
///
/// # Errors
/// Returns an error naming what was tried when no socket answers.
pub fn ensure_container_runtime() -> Result<()> {
    static RUNTIME: OnceLock<Result<(), String>> = OnceLock::new();
    match RUNTIME.get_or_init(detect) {
        Ok(()) => Ok(()),
        Err(message) => bail!("{message}"),
    }
}

fn detect() -> Result<(), String> {
    if let Ok(docker_host) = env::var("DOCKER_HOST") {
        return match docker_host
            .strip_prefix("unix://")
            .or_else(|| docker_host.starts_with('/').then_some(docker_host.as_str()))
        {
            Some(path) if answers(Path::new(path)) => Ok(()),
            Some(_) => Err(format!(
                "`DOCKER_HOST` is `{docker_host}`, but nothing accepts connections there"
            )),
            // tcp:// and friends are left to testcontainers.
            None => Ok(()),
        };
    }

    if answers(Path::new(DOCKER_SOCKET)) {
        return Ok(());
    }

    if let Some(podman) = podman_sockets().into_iter().find(|path| answers(path)) {
        let docker_host = format!("unix://{}", podman.display());
        // SAFETY: set once, before any container is started.
        unsafe {
            env::set_var("DOCKER_HOST", docker_host);
        }
        return Ok(());
    }

    Err(format!(
        "no container runtime: `{DOCKER_SOCKET}` and the Podman sockets are unreachable and `DOCKER_HOST` is unset"
    ))
}

fn podman_sockets() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") {
        candidates.push(PathBuf::from(runtime_dir).join("podman/podman.sock"));
    }
    candidates.push(PathBuf::from("/run/podman/podman.sock"));
    candidates
}

fn answers(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    let started = Instant::now();
    while started.elapsed() < SOCKET_WAIT {
        if UnixStream::connect(path).is_ok() {
            return true;
        }
        thread::sleep(Duration::from_millis(200));
    }
    false
}
