use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use sentinel_model::ProbedDevice;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error};

/// Hard deadline on one probe invocation.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Invoker for the external hardware probe executable.
///
/// The probe is a black box that prints a JSON array of capture devices
/// on stdout and exits 0. Anything else — non-zero exit, timeout, or
/// malformed output — degrades to an empty inventory so a flaky probe
/// can never break the input supervisor's cadence.
pub struct HardwareProbe {
    program: PathBuf,
    timeout: Duration,
}

impl HardwareProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        HardwareProbe {
            program: program.into(),
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Override the deadline. Test hook and tuning knob.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the probe once and parse its inventory.
    pub async fn run(&self) -> Vec<ProbedDevice> {
        let child = Command::new(&self.program)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(err) => {
                error!(
                    "failed to launch probe {}: {err}",
                    self.program.display()
                );
                return Vec::new();
            }
        };

        // Dropping the future on timeout kills the child via
        // kill_on_drop.
        let output = match timeout(self.timeout, child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                error!("probe wait failed: {err}");
                return Vec::new();
            }
            Err(_) => {
                error!(
                    "probe {} exceeded {:?} deadline",
                    self.program.display(),
                    self.timeout
                );
                return Vec::new();
            }
        };

        if !output.status.success() {
            error!(
                "probe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Vec::new();
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            debug!("probe reported no devices");
            return Vec::new();
        }

        match serde_json::from_str::<Vec<ProbedDevice>>(&stdout) {
            Ok(devices) => devices,
            Err(err) => {
                error!("probe output unparseable: {err}");
                Vec::new()
            }
        }
    }
}
