//! IMAP source over rustls: plain TCP, TLS client connection, line-based
//! protocol exchange. Blocking IO runs under `spawn_blocking`.
//!
//! Fetching uses UID commands so identifiers stay valid across sessions;
//! `mark_seen` opens its own short session per call.

use std::collections::HashMap;
use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mail_parser::MessageParser;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ChannelError;
use crate::mail::{MailConfig, MailSource};
use crate::pipeline::types::RawMessage;

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

pub struct ImapSource {
    config: MailConfig,
    /// message id → mailbox UID, refreshed on every fetch.
    uids: Mutex<HashMap<String, String>>,
}

impl ImapSource {
    pub fn new(config: MailConfig) -> Self {
        Self {
            config,
            uids: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl MailSource for ImapSource {
    async fn fetch_unseen(&self, limit: usize) -> Result<Vec<RawMessage>, ChannelError> {
        let cfg = self.config.clone();
        let fetched = tokio::task::spawn_blocking(move || fetch_unseen_blocking(&cfg, limit))
            .await
            .map_err(|e| protocol_err(format!("fetch task panicked: {e}")))??;

        let mut map = self.uids.lock().unwrap();
        map.clear();
        let mut messages = Vec::with_capacity(fetched.len());
        for (uid, msg) in fetched {
            map.insert(msg.id.clone(), uid);
            messages.push(msg);
        }
        debug!(count = messages.len(), "fetched unseen messages");
        Ok(messages)
    }

    async fn mark_seen(&self, id: &str) -> Result<(), ChannelError> {
        let uid = self.uids.lock().unwrap().get(id).cloned();
        let Some(uid) = uid else {
            warn!(message_id = %id, "no mailbox uid for id, cannot mark seen");
            return Ok(());
        };

        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || mark_seen_blocking(&cfg, &uid))
            .await
            .map_err(|e| protocol_err(format!("store task panicked: {e}")))?
    }
}

// ── Blocking protocol ───────────────────────────────────────────────

fn fetch_unseen_blocking(
    config: &MailConfig,
    limit: usize,
) -> Result<Vec<(String, RawMessage)>, ChannelError> {
    let mut tls = connect(config)?;

    let search = send_cmd(&mut tls, "A3", "UID SEARCH UNSEEN")?;
    let uids = parse_search_uids(&search);

    let mut results = Vec::new();
    let mut tag_counter = 4_u32;

    for uid in uids.iter().take(limit) {
        let fetch_tag = format!("A{tag_counter}");
        tag_counter += 1;
        let fetch_resp = send_cmd(&mut tls, &fetch_tag, &format!("UID FETCH {uid} (RFC822)"))?;

        let raw = raw_from_fetch(&fetch_resp);
        match MessageParser::default().parse(raw.as_bytes()) {
            Some(parsed) => results.push((uid.clone(), to_raw_message(&parsed))),
            None => warn!(uid = %uid, "unparseable message skipped"),
        }
    }

    let logout_tag = format!("A{tag_counter}");
    let _ = send_cmd(&mut tls, &logout_tag, "LOGOUT");

    Ok(results)
}

fn mark_seen_blocking(config: &MailConfig, uid: &str) -> Result<(), ChannelError> {
    let mut tls = connect(config)?;
    let resp = send_cmd(&mut tls, "A3", &format!("UID STORE {uid} +FLAGS (\\Seen)"))?;
    if !resp.last().is_some_and(|l| l.contains("OK")) {
        return Err(protocol_err(format!("STORE rejected for uid {uid}")));
    }
    let _ = send_cmd(&mut tls, "A4", "LOGOUT");
    Ok(())
}

/// TCP + TLS + greeting + LOGIN + SELECT.
fn connect(config: &MailConfig) -> Result<TlsStream, ChannelError> {
    let tcp = TcpStream::connect((&*config.imap_host, config.imap_port)).map_err(connect_err)?;
    tcp.set_read_timeout(Some(Duration::from_secs(30)))
        .map_err(connect_err)?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name: rustls::pki_types::ServerName<'_> =
        rustls::pki_types::ServerName::try_from(config.imap_host.clone())
            .map_err(connect_err)?;
    let conn = rustls::ClientConnection::new(tls_config, server_name).map_err(connect_err)?;
    let mut tls = rustls::StreamOwned::new(conn, tcp);

    let _greeting = read_line(&mut tls)?;

    let login = send_cmd(
        &mut tls,
        "A1",
        &format!("LOGIN \"{}\" \"{}\"", config.address, config.password),
    )?;
    if !login.last().is_some_and(|l| l.contains("OK")) {
        return Err(ChannelError::AuthFailed {
            name: "imap".into(),
            reason: "LOGIN rejected".into(),
        });
    }

    let select = send_cmd(&mut tls, "A2", &format!("SELECT \"{}\"", config.folder))?;
    if !select.last().is_some_and(|l| l.contains("OK")) {
        return Err(protocol_err(format!("cannot select folder {}", config.folder)));
    }

    Ok(tls)
}

fn read_line(tls: &mut TlsStream) -> Result<String, ChannelError> {
    let mut buf = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        match std::io::Read::read(tls, &mut byte) {
            Ok(0) => return Err(protocol_err("connection closed")),
            Ok(_) => {
                buf.push(byte[0]);
                if buf.ends_with(b"\r\n") {
                    return Ok(String::from_utf8_lossy(&buf).to_string());
                }
            }
            Err(e) => return Err(protocol_err(e.to_string())),
        }
    }
}

/// Send one tagged command and read lines until the tagged completion.
fn send_cmd(tls: &mut TlsStream, tag: &str, cmd: &str) -> Result<Vec<String>, ChannelError> {
    let full = format!("{tag} {cmd}\r\n");
    IoWrite::write_all(tls, full.as_bytes()).map_err(|e| protocol_err(e.to_string()))?;
    IoWrite::flush(tls).map_err(|e| protocol_err(e.to_string()))?;

    let mut lines = Vec::new();
    loop {
        let line = read_line(tls)?;
        let done = line.starts_with(tag);
        lines.push(line);
        if done {
            break;
        }
    }
    Ok(lines)
}

fn connect_err(e: impl std::fmt::Display) -> ChannelError {
    ChannelError::ConnectFailed {
        name: "imap".into(),
        reason: e.to_string(),
    }
}

fn protocol_err(reason: impl Into<String>) -> ChannelError {
    ChannelError::Protocol {
        name: "imap".into(),
        reason: reason.into(),
    }
}

// ── Response parsing ────────────────────────────────────────────────

/// UIDs from a `* SEARCH n n n` untagged response.
fn parse_search_uids(resp: &[String]) -> Vec<String> {
    let mut uids = Vec::new();
    for line in resp {
        if line.starts_with("* SEARCH") {
            uids.extend(line.split_whitespace().skip(2).map(str::to_string));
        }
    }
    uids
}

/// Raw RFC822 text from a FETCH response: drop the untagged opener, the
/// tagged completion and the closing paren line.
fn raw_from_fetch(resp: &[String]) -> String {
    let mut lines: Vec<&String> = resp
        .iter()
        .skip(1)
        .take(resp.len().saturating_sub(2))
        .collect();
    if lines.last().is_some_and(|l| l.trim() == ")") {
        lines.pop();
    }
    lines.into_iter().cloned().collect()
}

/// Parsed mail → pipeline message. Missing headers degrade: empty subject,
/// generated id, fetch-time date.
fn to_raw_message(parsed: &mail_parser::Message) -> RawMessage {
    let sender_name = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.name())
        .map(|s| s.to_string())
        .unwrap_or_default();
    let sender_email = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".into());

    let subject = parsed.subject().unwrap_or_default().to_string();
    let body = parsed
        .body_text(0)
        .map(|t| t.to_string())
        .or_else(|| parsed.body_html(0).map(|h| strip_html(h.as_ref())))
        .unwrap_or_default();

    let id = parsed
        .message_id()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));
    let date = parsed.date().map(convert_date).unwrap_or_else(Utc::now);

    RawMessage {
        id,
        date,
        sender_name,
        sender_email,
        subject,
        body,
    }
}

fn convert_date(d: &mail_parser::DateTime) -> DateTime<Utc> {
    chrono::NaiveDate::from_ymd_opt(i32::from(d.year), u32::from(d.month), u32::from(d.day))
        .and_then(|date| {
            date.and_hms_opt(u32::from(d.hour), u32::from(d.minute), u32::from(d.second))
        })
        .map(|naive| naive.and_utc())
        .unwrap_or_else(Utc::now)
}

/// Strip HTML tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ───────────────────────────────────────────────────────────
