//! Certificate extraction and rendering
//!
//! The corpus treats certificates as opaque DER. Everything that needs to
//! look inside one goes through the `openssl x509` binary, same as the
//! probes themselves go through `openssl s_client`.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{CorpusError, CorpusResult};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Extract DER certificates from text containing PEM blocks.
///
/// Probe transcripts carry handshake noise around the blocks, so this scans
/// for each `CERTIFICATE` block and decodes it on its own; a block that fails
/// to decode is skipped rather than poisoning its neighbors. Order is
/// preserved, leaf first.
pub fn extract_certificates(text: &str) -> Vec<Vec<u8>> {
    let mut certs = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(PEM_BEGIN) {
        let block_start = &rest[start..];
        let Some(end) = block_start.find(PEM_END) else {
            break;
        };
        let block_end = end + PEM_END.len();
        let block = &block_start[..block_end];

        match pem::parse(block) {
            Ok(p) if p.tag() == "CERTIFICATE" => certs.push(p.contents().to_vec()),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "skipping undecodable certificate block"),
        }

        rest = &block_start[block_end..];
    }

    certs
}

/// Encode DER certificate bytes as a PEM string
pub fn to_pem(der: &[u8]) -> String {
    pem::encode(&pem::Pem::new("CERTIFICATE", der))
}

/// Render a certificate human-readably via `openssl x509 -text`
pub async fn render_text(der: &[u8]) -> CorpusResult<String> {
    let mut child = Command::new("openssl")
        .args(["x509", "-inform", "der", "-text", "-noout"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(der).await?;
        // dropping the handle closes the pipe
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(CorpusError::Codec(format!(
            "openssl x509 exited with {}",
            output.status
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| CorpusError::Codec(format!("openssl x509 output not UTF-8: {e}")))
}
