//! Git smart-HTTP wire engine (§4.9).
//!
//! Implements the three operations handlers need directly against the
//! `info/refs`, `git-upload-pack`, and `git-receive-pack` smart-HTTP
//! endpoints, using pkt-line framing over `reqwest`. No `git` binary is
//! invoked and no capabilities beyond `report-status` are negotiated —
//! `multi_ack`/`side-band-64k` are deliberately left off so the upload-pack
//! response is a single ACK/NAK line followed by the raw packfile, which
//! keeps the reader a few dozen lines instead of a full side-band demuxer.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;

use crate::{ObjectId, RefName};

pub type RefMap = HashMap<RefName, ObjectId>;

#[derive(Debug, thiserror::Error)]
pub enum GitWireError {
    #[error("http request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("malformed smart-http response from {url}: {message}")]
    Protocol { url: String, message: String },

    #[error("receive-pack rejected ref {ref_name}: {reason}")]
    ReceivePackRejected { ref_name: String, reason: String },
}

impl GitWireError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::UnexpectedStatus { .. })
    }

    pub fn error_category(&self) -> crate::ErrorCategory {
        crate::ErrorCategory::GitWire
    }
}

/// Optional HTTP basic-auth credentials for a git-wire call.
#[derive(Debug, Clone)]
pub struct GitCredentials {
    pub username: String,
    pub password: String,
}

impl GitCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// The three smart-HTTP operations handlers depend on. Abstracted behind a
/// trait so sync-handler tests can substitute a mock instead of driving
/// `wiremock` for every unit test (scenario tests in
/// `hubcast-integration-tests` exercise the real [`HttpGitWireClient`]).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitWireClient: Send + Sync {
    async fn ls_remote(
        &self,
        url: &str,
        credentials: Option<GitCredentials>,
    ) -> Result<RefMap, GitWireError>;

    /// Ref discovery scoped to the `git-receive-pack` service, used before a
    /// `send_pack` so the advertised capabilities match what the remote
    /// actually negotiates on push (§4.9).
    async fn ls_remote_for_push(
        &self,
        url: &str,
        credentials: Option<GitCredentials>,
    ) -> Result<RefMap, GitWireError>;

    async fn fetch_pack(
        &self,
        url: &str,
        want: &ObjectId,
        haves: &[ObjectId],
    ) -> Result<Bytes, GitWireError>;

    async fn send_pack(
        &self,
        url: &str,
        reference: &RefName,
        from: &ObjectId,
        to: &ObjectId,
        packfile: Bytes,
        credentials: Option<GitCredentials>,
    ) -> Result<(), GitWireError>;
}

/// `reqwest`-backed implementation. Each call opens its own connection
/// (pooled by the shared client), so concurrent calls on the same remote
/// are safe (§9).
pub struct HttpGitWireClient {
    client: Client,
}

impl HttpGitWireClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GitWireClient for HttpGitWireClient {
    async fn ls_remote(
        &self,
        url: &str,
        credentials: Option<GitCredentials>,
    ) -> Result<RefMap, GitWireError> {
        ls_remote_impl(&self.client, url, "git-upload-pack", credentials).await
    }

    async fn ls_remote_for_push(
        &self,
        url: &str,
        credentials: Option<GitCredentials>,
    ) -> Result<RefMap, GitWireError> {
        ls_remote_impl(&self.client, url, "git-receive-pack", credentials).await
    }

    async fn fetch_pack(
        &self,
        url: &str,
        want: &ObjectId,
        haves: &[ObjectId],
    ) -> Result<Bytes, GitWireError> {
        fetch_pack_impl(&self.client, url, want, haves).await
    }

    async fn send_pack(
        &self,
        url: &str,
        reference: &RefName,
        from: &ObjectId,
        to: &ObjectId,
        packfile: Bytes,
        credentials: Option<GitCredentials>,
    ) -> Result<(), GitWireError> {
        send_pack_impl(&self.client, url, reference, from, to, packfile, credentials).await
    }
}

async fn ls_remote_impl(
    client: &Client,
    url: &str,
    service: &str,
    credentials: Option<GitCredentials>,
) -> Result<RefMap, GitWireError> {
    let info_refs_url = format!("{}/info/refs?service={}", url.trim_end_matches('/'), service);

    let mut request = client.get(&info_refs_url);
    if let Some(creds) = &credentials {
        request = request.basic_auth(&creds.username, Some(&creds.password));
    }

    let response = request
        .send()
        .await
        .map_err(|source| GitWireError::Http {
            url: info_refs_url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(GitWireError::UnexpectedStatus {
            url: info_refs_url,
            status: status.as_u16(),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| GitWireError::Http {
            url: info_refs_url.clone(),
            source,
        })?;

    parse_ref_advertisement(&body, &info_refs_url)
}

/// Parses the pkt-line ref advertisement: an optional `# service=...`
/// announcement line plus flush, then one `<sha> <ref>\0<capabilities>`
/// line followed by plain `<sha> <ref>` lines, terminated by a flush pkt.
fn parse_ref_advertisement(body: &[u8], url: &str) -> Result<RefMap, GitWireError> {
    let lines = decode_pkt_lines(body);
    let mut refs = RefMap::new();
    let mut seen_first_ref = false;

    for line in lines {
        let PktLine::Data(data) = line else {
            continue;
        };
        if data.starts_with(b"#") {
            continue;
        }

        let text = std::str::from_utf8(&data).map_err(|_| GitWireError::Protocol {
            url: url.to_string(),
            message: "non-utf8 ref advertisement line".to_string(),
        })?;
        let text = text.trim_end_matches('\n');

        // The first ref line carries a NUL-separated capability list.
        let text = if !seen_first_ref {
            seen_first_ref = true;
            text.split('\0').next().unwrap_or(text)
        } else {
            text
        };

        let Some((sha, reference)) = text.split_once(' ') else {
            continue;
        };

        if reference == "capabilities^{}" {
            continue;
        }

        let oid = ObjectId::from_str(sha).map_err(|_| GitWireError::Protocol {
            url: url.to_string(),
            message: format!("invalid object id in ref advertisement: {sha}"),
        })?;
        let ref_name = RefName::new(reference.to_string()).map_err(|_| GitWireError::Protocol {
            url: url.to_string(),
            message: format!("invalid ref name in advertisement: {reference}"),
        })?;

        refs.insert(ref_name, oid);
    }

    Ok(refs)
}

async fn fetch_pack_impl(
    client: &Client,
    url: &str,
    want: &ObjectId,
    haves: &[ObjectId],
) -> Result<Bytes, GitWireError> {
    let endpoint = format!("{}/git-upload-pack", url.trim_end_matches('/'));

    let mut body = BytesMut::new();
    body.extend_from_slice(&encode_pkt_line(format!("want {}\n", want.as_hex()).as_bytes()));
    body.extend_from_slice(&FLUSH_PKT);
    for have in haves {
        body.extend_from_slice(&encode_pkt_line(format!("have {}\n", have.as_hex()).as_bytes()));
    }
    body.extend_from_slice(&encode_pkt_line(b"done\n"));

    let response = client
        .post(&endpoint)
        .header("Content-Type", "application/x-git-upload-pack-request")
        .body(body.freeze())
        .send()
        .await
        .map_err(|source| GitWireError::Http {
            url: endpoint.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(GitWireError::UnexpectedStatus {
            url: endpoint,
            status: status.as_u16(),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| GitWireError::Http {
            url: endpoint.clone(),
            source,
        })?;

    split_acknowledgement_and_pack(&body, &endpoint)
}

/// The upload-pack result is one or more pkt-line ACK/NAK lines, followed by
/// the raw packfile bytes (no further pkt-line framing, since we did not
/// negotiate `side-band-64k`).
fn split_acknowledgement_and_pack(body: &[u8], url: &str) -> Result<Bytes, GitWireError> {
    let mut offset = 0usize;
    loop {
        let (line, consumed) = decode_one_pkt_line(&body[offset..]).ok_or_else(|| GitWireError::Protocol {
            url: url.to_string(),
            message: "truncated upload-pack acknowledgement".to_string(),
        })?;
        offset += consumed;

        match line {
            PktLine::Flush => continue,
            PktLine::Data(data) => {
                if data.starts_with(b"NAK") || data.starts_with(b"ACK") {
                    break;
                }
                // Any other non-NAK/ACK line before the pack (e.g. shallow
                // lines) is skipped; negotiation here never requests
                // shallow clones so this loop normally runs once.
            }
        }
    }

    Ok(Bytes::copy_from_slice(&body[offset..]))
}

async fn send_pack_impl(
    client: &Client,
    url: &str,
    reference: &RefName,
    from: &ObjectId,
    to: &ObjectId,
    packfile: Bytes,
    credentials: Option<GitCredentials>,
) -> Result<(), GitWireError> {
    let endpoint = format!("{}/git-receive-pack", url.trim_end_matches('/'));

    let command = format!(
        "{} {} {}\0report-status\n",
        from.as_hex(),
        to.as_hex(),
        reference.as_str()
    );

    let mut body = BytesMut::new();
    body.extend_from_slice(&encode_pkt_line(command.as_bytes()));
    body.extend_from_slice(&FLUSH_PKT);
    body.extend_from_slice(&packfile);

    let mut request = client
        .post(&endpoint)
        .header("Content-Type", "application/x-git-receive-pack-request")
        .body(body.freeze());
    if let Some(creds) = &credentials {
        request = request.basic_auth(&creds.username, Some(&creds.password));
    }

    let response = request.send().await.map_err(|source| GitWireError::Http {
        url: endpoint.clone(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(GitWireError::UnexpectedStatus {
            url: endpoint,
            status: status.as_u16(),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| GitWireError::Http {
            url: endpoint.clone(),
            source,
        })?;

    parse_report_status(&body, reference.as_str(), &endpoint)
}

/// Parses the `report-status` response: `unpack ok|<error>`, then one
/// `ok <ref>` or `ng <ref> <reason>` line per pushed ref (we push exactly
/// one), then a flush.
fn parse_report_status(body: &[u8], ref_name: &str, url: &str) -> Result<(), GitWireError> {
    let lines: Vec<Vec<u8>> = decode_pkt_lines(body)
        .into_iter()
        .filter_map(|line| match line {
            PktLine::Data(data) => Some(data),
            PktLine::Flush => None,
        })
        .collect();

    let unpack_line = lines.first().ok_or_else(|| GitWireError::Protocol {
        url: url.to_string(),
        message: "empty receive-pack report".to_string(),
    })?;
    let unpack_text = String::from_utf8_lossy(unpack_line);
    let unpack_text = unpack_text.trim_end();
    if let Some(reason) = unpack_text.strip_prefix("unpack ") {
        if reason != "ok" {
            return Err(GitWireError::ReceivePackRejected {
                ref_name: ref_name.to_string(),
                reason: format!("unpack failed: {reason}"),
            });
        }
    }

    for line in lines.iter().skip(1) {
        let text = String::from_utf8_lossy(line);
        let text = text.trim_end();
        if let Some(rest) = text.strip_prefix("ng ") {
            let (reported_ref, reason) = rest.split_once(' ').unwrap_or((rest, "rejected"));
            if reported_ref == ref_name {
                return Err(GitWireError::ReceivePackRejected {
                    ref_name: ref_name.to_string(),
                    reason: reason.to_string(),
                });
            }
        }
    }

    Ok(())
}

// ============================================================================
// pkt-line framing
// ============================================================================

const FLUSH_PKT: [u8; 4] = *b"0000";

#[derive(Debug, Clone)]
enum PktLine {
    Flush,
    Data(Vec<u8>),
}

fn encode_pkt_line(payload: &[u8]) -> Bytes {
    let length = payload.len() + 4;
    let mut out = BytesMut::with_capacity(length);
    out.extend_from_slice(format!("{length:04x}").as_bytes());
    out.extend_from_slice(payload);
    out.freeze()
}

fn decode_one_pkt_line(buf: &[u8]) -> Option<(PktLine, usize)> {
    if buf.len() < 4 {
        return None;
    }
    let length_hex = std::str::from_utf8(&buf[0..4]).ok()?;
    let length = usize::from_str_radix(length_hex, 16).ok()?;

    if length == 0 {
        return Some((PktLine::Flush, 4));
    }
    if length < 4 || buf.len() < length {
        return None;
    }

    Some((PktLine::Data(buf[4..length].to_vec()), length))
}

fn decode_pkt_lines(buf: &[u8]) -> Vec<PktLine> {
    let mut lines = Vec::new();
    let mut offset = 0usize;
    while offset < buf.len() {
        match decode_one_pkt_line(&buf[offset..]) {
            Some((line, consumed)) => {
                offset += consumed;
                lines.push(line);
            }
            None => break,
        }
    }
    lines
}

#[cfg(test)]
#[path = "git_wire_tests.rs"]
mod tests;
