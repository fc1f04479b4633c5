//! Supervised `gst-launch` child processes.
//!
//! Both pools follow the same lifecycle: spawn the pipeline in its own
//! process group, give it a short grace period, then either adopt the
//! handle or report the captured stderr of an early death. Stopping
//! signals the whole group so helper processes die with the pipeline.

pub mod encoder;
pub mod multicast;

pub use encoder::EncoderPool;
pub use multicast::MulticastPool;

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default launcher binary for pipeline children.
pub const GST_LAUNCH: &str = "gst-launch-1.0";

/// How long a freshly spawned pipeline gets before its liveness check.
pub(crate) const SPAWN_GRACE: Duration = Duration::from_millis(500);

pub(crate) struct PipelineHandle {
    pub child: Child,
    pub pgid: i32,
}

pub(crate) fn spawn_in_group(
    program: &str,
    args: &[String],
    envs: &[(&str, &str)],
) -> std::io::Result<Child> {
    let mut command = Command::new(program);
    command
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    command.process_group(0);
    command.spawn()
}

#[cfg(unix)]
pub(crate) fn signal_group(pgid: i32, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    if let Err(err) = killpg(Pid::from_raw(pgid), signal) {
        debug!("killpg({pgid}, {signal:?}) failed: {err}");
    }
}

/// SIGTERM the process group, wait up to `grace` for a clean exit, then
/// escalate to SIGKILL.
pub(crate) async fn terminate(
    mut handle: PipelineHandle,
    grace: Duration,
    label: &str,
) {
    #[cfg(unix)]
    signal_group(handle.pgid, nix::sys::signal::Signal::SIGTERM);
    #[cfg(not(unix))]
    let _ = handle.child.start_kill();

    match timeout(grace, handle.child.wait()).await {
        Ok(Ok(status)) => debug!("{label} exited with {status}"),
        Ok(Err(err)) => warn!("{label} wait failed: {err}"),
        Err(_) => {
            warn!("{label} ignored SIGTERM after {grace:?}; killing group");
            #[cfg(unix)]
            signal_group(handle.pgid, nix::sys::signal::Signal::SIGKILL);
            let _ = handle.child.start_kill();
            let _ = handle.child.wait().await;
        }
    }
}

/// Drain whatever a dead child left on its stderr pipe.
pub(crate) async fn drain_stderr(stderr: Option<ChildStderr>) -> String {
    let Some(mut stderr) = stderr else {
        return String::new();
    };
    let mut output = String::new();
    let _ = stderr.read_to_string(&mut output).await;
    output.trim().to_string()
}
