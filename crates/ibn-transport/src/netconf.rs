//! NETCONF session seam and RFC 6241 message helpers.
//!
//! The SSH subsystem itself is linked in by whoever provides a
//! `NetconfSession`; this module owns the document formats so every
//! implementation (and the mock) produces identical RPCs.

use std::sync::LazyLock;

use async_trait::async_trait;
use ibn_protocol::ModelRef;
use regex::Regex;

use crate::error::{TransportError, TransportResult};

/// NETCONF base namespace.
pub const BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";
/// ietf-netconf-monitoring namespace (get-schema).
pub const MONITORING_NS: &str = "urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring";
/// NETCONF 1.0 end-of-message marker.
pub const MESSAGE_DELIMITER: &str = "]]>]]>";

pub const CAP_BASE_1_0: &str = "urn:ietf:params:netconf:base:1.0";
pub const CAP_BASE_1_1: &str = "urn:ietf:params:netconf:base:1.1";
pub const CAP_CANDIDATE: &str = "urn:ietf:params:netconf:capability:candidate:1.0";
pub const CAP_VALIDATE: &str = "urn:ietf:params:netconf:capability:validate:1.0";
pub const CAP_CONFIRMED_COMMIT: &str = "urn:ietf:params:netconf:capability:confirmed-commit:1.0";

/// Configuration datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datastore {
    Running,
    Candidate,
    Startup,
}

impl Datastore {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Candidate => "candidate",
            Self::Startup => "startup",
        }
    }
}

/// `default-operation` of an edit-config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultOperation {
    Merge,
    Replace,
    None,
}

impl DefaultOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
            Self::None => "none",
        }
    }
}

/// One open NETCONF session to one device.
///
/// Dropping a session must release the underlying connection; `close`
/// additionally sends `<close-session/>`.
#[async_trait]
pub trait NetconfSession: Send + Sync {
    /// Capability URIs advertised in the server hello.
    async fn get_capabilities(&self) -> TransportResult<Vec<String>>;

    /// Retrieve a YANG module's source text via `<get-schema>`.
    async fn get_schema(&self, identifier: &str, version: Option<&str>) -> TransportResult<String>;

    async fn get_config(&self, source: Datastore, filter: Option<&str>) -> TransportResult<String>;

    async fn edit_config(
        &self,
        config: &str,
        target: Datastore,
        default_operation: DefaultOperation,
    ) -> TransportResult<()>;

    async fn validate(&self, source: Datastore) -> TransportResult<()>;

    /// Commit the candidate. With `confirmed`, the device reverts after
    /// `timeout_secs` unless a follow-up plain commit arrives.
    async fn commit(&self, confirmed: bool, timeout_secs: Option<u64>) -> TransportResult<()>;

    async fn discard_changes(&self) -> TransportResult<()>;

    async fn close(&self) -> TransportResult<()>;
}

// ── RPC documents ─────────────────────────────────────────────

/// Client `<hello>` advertising base 1.0/1.1.
pub fn hello() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<hello xmlns="{BASE_NS}">
  <capabilities>
    <capability>{CAP_BASE_1_0}</capability>
    <capability>{CAP_BASE_1_1}</capability>
  </capabilities>
</hello>"#
    )
}

fn rpc(message_id: u64, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rpc message-id="{message_id}" xmlns="{BASE_NS}">
  {body}
</rpc>"#
    )
}

pub fn get_schema_rpc(message_id: u64, identifier: &str, version: Option<&str>) -> String {
    let version = version
        .map(|v| format!("<version>{v}</version>"))
        .unwrap_or_default();
    rpc(
        message_id,
        &format!(
            r#"<get-schema xmlns="{MONITORING_NS}"><identifier>{identifier}</identifier>{version}<format>yang</format></get-schema>"#
        ),
    )
}

pub fn get_config_rpc(message_id: u64, source: Datastore, filter: Option<&str>) -> String {
    let filter = filter
        .map(|f| format!(r#"<filter type="subtree">{f}</filter>"#))
        .unwrap_or_default();
    rpc(
        message_id,
        &format!(
            "<get-config><source><{}/></source>{filter}</get-config>",
            source.as_str()
        ),
    )
}

/// `config` is the full `<config>` element produced by the payload
/// generator.
pub fn edit_config_rpc(
    message_id: u64,
    config: &str,
    target: Datastore,
    default_operation: DefaultOperation,
) -> String {
    rpc(
        message_id,
        &format!(
            "<edit-config><target><{}/></target><default-operation>{}</default-operation>{config}</edit-config>",
            target.as_str(),
            default_operation.as_str()
        ),
    )
}

pub fn validate_rpc(message_id: u64, source: Datastore) -> String {
    rpc(
        message_id,
        &format!("<validate><source><{}/></source></validate>", source.as_str()),
    )
}

pub fn commit_rpc(message_id: u64, confirmed: bool, timeout_secs: Option<u64>) -> String {
    let body = match (confirmed, timeout_secs) {
        (true, Some(t)) => format!("<commit><confirmed/><confirm-timeout>{t}</confirm-timeout></commit>"),
        (true, None) => "<commit><confirmed/></commit>".to_string(),
        (false, _) => "<commit/>".to_string(),
    };
    rpc(message_id, &body)
}

pub fn discard_changes_rpc(message_id: u64) -> String {
    rpc(message_id, "<discard-changes/>")
}

pub fn close_session_rpc(message_id: u64) -> String {
    rpc(message_id, "<close-session/>")
}

/// Append the 1.0 end-of-message marker.
pub fn frame(message: &str) -> String {
    format!("{message}{MESSAGE_DELIMITER}")
}

/// Split a buffer into complete messages; the trailing partial message (if
/// any) is returned separately.
pub fn split_frames(buffer: &str) -> (Vec<&str>, &str) {
    let mut messages = Vec::new();
    let mut rest = buffer;
    while let Some(idx) = rest.find(MESSAGE_DELIMITER) {
        let msg = rest[..idx].trim();
        if !msg.is_empty() {
            messages.push(msg);
        }
        rest = &rest[idx + MESSAGE_DELIMITER.len()..];
    }
    (messages, rest)
}

// ── Reply parsing ─────────────────────────────────────────────

static RE_CAPABILITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<capability>\s*([^<]+?)\s*</capability>").unwrap());

static RE_ERROR_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<error-message[^>]*>\s*(.*?)\s*</error-message>").unwrap()
});

static RE_DATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<data[^>]*>(.*)</data>").unwrap());

/// Capability URIs from a server `<hello>`.
pub fn parse_hello_capabilities(hello: &str) -> Vec<String> {
    RE_CAPABILITY
        .captures_iter(hello)
        .map(|c| c[1].to_string())
        .collect()
}

/// Extract the YANG module advertised by a capability URI
/// (`...?module=NAME&revision=DATE`). Protocol capabilities return `None`.
pub fn parse_capability(uri: &str) -> Option<ModelRef> {
    let uri = uri.replace("&amp;", "&");
    let query = uri.split_once('?')?.1;
    let mut name = None;
    let mut revision = None;
    for pair in query.split('&') {
        if let Some(v) = pair.strip_prefix("module=") {
            name = Some(v.to_string());
        } else if let Some(v) = pair.strip_prefix("revision=") {
            revision = Some(v.to_string());
        }
    }
    let name = name.filter(|n| !n.is_empty())?;
    Some(ModelRef {
        name,
        revision: revision.filter(|r| !r.is_empty()),
    })
}

/// True for an `<rpc-reply>` carrying `<ok/>` and no `<rpc-error>`.
pub fn is_ok_reply(reply: &str) -> bool {
    reply.contains("<ok/>") && !reply.contains("<rpc-error")
}

/// Map a reply to `Ok(())` or the device's error message.
pub fn check_reply(reply: &str) -> TransportResult<()> {
    if reply.contains("<rpc-error") {
        let msg = RE_ERROR_MESSAGE
            .captures(reply)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| "unspecified rpc-error".to_string());
        return Err(TransportError::Rpc(msg));
    }
    if is_ok_reply(reply) {
        Ok(())
    } else {
        Err(TransportError::Protocol("reply carries neither <ok/> nor <rpc-error>".into()))
    }
}

/// YANG source text from a `<get-schema>` reply.
pub fn extract_schema(reply: &str) -> TransportResult<String> {
    check_reply_errors(reply)?;
    let inner = RE_DATA
        .captures(reply)
        .map(|c| c[1].to_string())
        .ok_or_else(|| TransportError::Protocol("get-schema reply has no <data>".into()))?;
    Ok(unescape_xml(inner.trim()))
}

fn check_reply_errors(reply: &str) -> TransportResult<()> {
    if reply.contains("<rpc-error") {
        check_reply(reply)
    } else {
        Ok(())
    }
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
