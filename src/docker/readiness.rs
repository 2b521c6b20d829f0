// Bounded wait for a freshly started dependency to accept work

use crate::clock::Clock;
use crate::errors::{ProvisioningError, Result};
use std::time::Duration;

/// Result of a single readiness probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Ready,
    Pending,
    /// The container stopped; waiting longer cannot help
    Exited,
}

/// Poll `probe` every `interval` until it reports ready, giving up after `timeout`.
/// The probe always runs at least once, even with a zero timeout.
pub fn wait_until_ready<F>(
    name: &str,
    timeout: Duration,
    interval: Duration,
    clock: &dyn Clock,
    mut probe: F,
) -> Result<u32>
where
    F: FnMut() -> Result<Probe>,
{
    let start = clock.now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match probe()? {
            Probe::Ready => {
                tracing::debug!(dependency = name, attempts, "dependency ready");
                return Ok(attempts);
            }
            Probe::Exited => {
                return Err(ProvisioningError::Exited {
                    name: name.to_string(),
                }
                .into());
            }
            Probe::Pending => {}
        }

        if clock.now().duration_since(start) >= timeout {
            return Err(ProvisioningError::NotReady {
                name: name.to_string(),
                timeout,
            }
            .into());
        }

        tracing::debug!(dependency = name, attempts, "not ready yet");
        clock.sleep(interval);
    }
}
