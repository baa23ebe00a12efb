//! TLS endpoint probing via `openssl s_client`
//!
//! A probe is one handshake attempt against `servername:port`. The raw
//! transcript is classified by the harvest worker; this module only runs the
//! subprocess and reports how it ended.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Outcome class of a probe, as recorded in the domain bookkeeping database
///
/// The string forms are stable on-disk values in the `last_result` column:
/// `"ok"`, `"nocert"`, `"error"`, `"timeout"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Handshake succeeded and at least one certificate was captured
    Ok,
    /// Handshake succeeded but no certificate appeared in the transcript
    NoCert,
    /// Subprocess failed to start or exited unsuccessfully
    Error,
    /// Probe exceeded its deadline and was killed
    Timeout,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Ok => "ok",
            ProbeStatus::NoCert => "nocert",
            ProbeStatus::Error => "error",
            ProbeStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the probe subprocess did before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeRaw {
    /// The subprocess ran to completion within the deadline
    Exited {
        /// Whether it exited with status zero
        success: bool,
        /// Captured stdout, lossily decoded
        output: String,
    },
    /// The deadline elapsed; the subprocess was killed and its output discarded
    TimedOut,
}

/// A probe backend, one handshake attempt per call
///
/// The production implementation shells out to openssl; tests substitute
/// scripted implementations.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, servername: &str) -> std::io::Result<ProbeRaw>;
}

/// Probes by running `openssl s_client -showcerts` against the target
#[derive(Debug, Clone)]
pub struct OpensslProber {
    port: u16,
    timeout: Duration,
}

impl OpensslProber {
    pub fn new(port: u16, timeout: Duration) -> Self {
        OpensslProber { port, timeout }
    }
}

#[async_trait]
impl Prober for OpensslProber {
    async fn probe(&self, servername: &str) -> std::io::Result<ProbeRaw> {
        let target = format!("{}:{}", servername, self.port);

        // s_client reads stdin until EOF; closing it immediately makes the
        // handshake complete and the process exit on its own. stderr carries
        // only connection chatter and is discarded.
        let mut child = Command::new("openssl")
            .args(["s_client", "-connect", &target, "-servername", servername, "-showcerts"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout pipe not available"))?;

        let capture = async {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, buf))
        };

        let outcome = tokio::time::timeout(self.timeout, capture).await;
        match outcome {
            Ok(captured) => {
                let (status, buf) = captured?;
                Ok(ProbeRaw::Exited {
                    success: status.success(),
                    output: String::from_utf8_lossy(&buf).into_owned(),
                })
            }
            Err(_elapsed) => {
                // Partial output from a hung peer is worthless; kill and drop it.
                let _ = child.kill().await;
                Ok(ProbeRaw::TimedOut)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings_are_stable() {
        assert_eq!(ProbeStatus::Ok.as_str(), "ok");
        assert_eq!(ProbeStatus::NoCert.as_str(), "nocert");
        assert_eq!(ProbeStatus::Error.as_str(), "error");
        assert_eq!(ProbeStatus::Timeout.as_str(), "timeout");
    }

    #[test]
    fn test_status_display_matches_as_str() {
        for status in [
            ProbeStatus::Ok,
            ProbeStatus::NoCert,
            ProbeStatus::Error,
            ProbeStatus::Timeout,
        ] {
            assert_eq!(status.to_string(), status.as_str());
        }
    }
}
