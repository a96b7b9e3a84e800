//! SMTP session handler

use super::{Forwarder, SmtpInboundMessage};
use crate::routing::{DecisionPipeline, RoutingError};
use aliasrelay_common::config::SmtpConfig;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    BufWriter,
};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Longest accepted command line, CRLF included (RFC 5321 text line limit)
const MAX_COMMAND_LINE: usize = 1000;

/// Upper bound on a single read while collecting DATA
const DATA_CHUNK: usize = 8192;

/// SMTP session state
#[derive(Debug, Clone, PartialEq)]
enum SessionState {
    Connected,
    Greeted,
    MailFrom,
    RcptTo,
}

/// Result of reading a DATA section
#[derive(Debug)]
enum DataOutcome {
    Complete(Vec<u8>),
    TooLarge,
    TimedOut,
}

/// Result of one bounded line read
#[derive(Debug, PartialEq)]
enum LineRead {
    Eof,
    /// A complete line, or the tail of the stream without a newline
    Line,
    /// `limit` bytes arrived without a newline
    TooLong,
}

/// Read up to `limit` bytes or through the next `\n`, whichever comes first
async fn read_bounded<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> std::io::Result<LineRead> {
    let read = reader.take(limit as u64).read_until(b'\n', buf).await?;
    Ok(if read == 0 {
        LineRead::Eof
    } else if buf.ends_with(b"\n") || read < limit {
        LineRead::Line
    } else {
        LineRead::TooLong
    })
}

/// SMTP session handler
pub struct SmtpHandler {
    hostname: String,
    config: SmtpConfig,
    pipeline: Arc<DecisionPipeline>,
    forwarder: Arc<dyn Forwarder>,
    peer_addr: SocketAddr,
}

impl SmtpHandler {
    /// Create a new handler
    pub fn new(
        hostname: String,
        config: SmtpConfig,
        pipeline: Arc<DecisionPipeline>,
        forwarder: Arc<dyn Forwarder>,
        peer_addr: SocketAddr,
    ) -> Self {
        Self {
            hostname,
            config,
            pipeline,
            forwarder,
            peer_addr,
        }
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.connection_timeout_secs)
    }

    /// Handle an SMTP session
    pub async fn handle<S>(self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        let mut writer = BufWriter::new(writer);

        let mut state = SessionState::Connected;
        // Outer None: no MAIL yet. Inner None: null reverse-path.
        let mut sender: Option<Option<String>> = None;
        let mut recipient: Option<String> = None;

        self.send_response(&mut writer, 220, &format!("{} ESMTP AliasRelay", self.hostname))
            .await?;

        let mut buf = Vec::with_capacity(MAX_COMMAND_LINE);

        loop {
            buf.clear();
            let read = timeout(
                self.idle_timeout(),
                read_bounded(&mut reader, &mut buf, MAX_COMMAND_LINE),
            )
            .await;
            match read {
                Ok(Ok(LineRead::Line)) => {}
                Ok(Ok(LineRead::Eof)) => {
                    debug!("Client {} disconnected", self.peer_addr);
                    break;
                }
                Ok(Ok(LineRead::TooLong)) => {
                    warn!("Command line from {} too long, closing", self.peer_addr);
                    self.send_response(&mut writer, 500, "5.5.2 Line too long")
                        .await?;
                    break;
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    debug!("Client {} idle, closing", self.peer_addr);
                    self.send_timeout(&mut writer).await?;
                    break;
                }
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            debug!("SMTP from {}: {}", self.peer_addr, line);

            let (command, args) = parse_command(line);

            match command.to_uppercase().as_str() {
                "HELO" => {
                    state = SessionState::Greeted;
                    sender = None;
                    recipient = None;
                    let greeting = format!("{} Hello {}", self.hostname, args);
                    self.send_response(&mut writer, 250, &greeting).await?;
                }

                "EHLO" => {
                    state = SessionState::Greeted;
                    sender = None;
                    recipient = None;

                    let responses = [
                        format!("{} Hello {}", self.hostname, args),
                        format!("SIZE {}", self.config.max_message_size),
                        "8BITMIME".to_string(),
                        "PIPELINING".to_string(),
                        "ENHANCEDSTATUSCODES".to_string(),
                    ];

                    for (i, resp) in responses.iter().enumerate() {
                        if i == responses.len() - 1 {
                            self.send_response(&mut writer, 250, resp).await?;
                        } else {
                            self.send_response_continue(&mut writer, 250, resp).await?;
                        }
                    }
                }

                "MAIL" => {
                    if state != SessionState::Greeted {
                        self.send_response(&mut writer, 503, "5.5.1 Bad sequence of commands")
                            .await?;
                        continue;
                    }

                    if let Some(from_addr) = parse_mail_from(args) {
                        sender = Some(from_addr);
                        state = SessionState::MailFrom;
                        self.send_response(&mut writer, 250, "2.1.0 OK").await?;
                    } else {
                        self.send_response(&mut writer, 501, "5.1.7 Bad sender address syntax")
                            .await?;
                    }
                }

                "RCPT" => {
                    match state {
                        SessionState::MailFrom => {}
                        SessionState::RcptTo => {
                            // One recipient per transaction, one routing decision per message
                            self.send_response(&mut writer, 452, "4.5.3 Too many recipients")
                                .await?;
                            continue;
                        }
                        _ => {
                            self.send_response(&mut writer, 503, "5.5.1 Bad sequence of commands")
                                .await?;
                            continue;
                        }
                    }

                    if let Some(to_addr) = parse_rcpt_to(args) {
                        recipient = Some(to_addr);
                        state = SessionState::RcptTo;
                        self.send_response(&mut writer, 250, "2.1.5 OK").await?;
                    } else {
                        self.send_response(&mut writer, 501, "5.1.3 Bad recipient address syntax")
                            .await?;
                    }
                }

                "DATA" => {
                    if state != SessionState::RcptTo {
                        self.send_response(&mut writer, 503, "5.5.1 Bad sequence of commands")
                            .await?;
                        continue;
                    }

                    let (Some(from), Some(to)) = (sender.take(), recipient.take()) else {
                        self.send_response(&mut writer, 503, "5.5.1 Bad sequence of commands")
                            .await?;
                        continue;
                    };

                    self.send_response(&mut writer, 354, "Start mail input; end with <CRLF>.<CRLF>")
                        .await?;

                    state = SessionState::Greeted;

                    match self.read_data(&mut reader).await? {
                        DataOutcome::Complete(data) => {
                            let message =
                                SmtpInboundMessage::new(from, to, data, self.forwarder.clone());
                            self.route_message(&mut writer, &message).await?;
                        }
                        DataOutcome::TooLarge => {
                            // The rest of the DATA stream is never read, so the
                            // session cannot resume.
                            warn!("Message from {} exceeds size limit, closing", self.peer_addr);
                            self.send_response(
                                &mut writer,
                                552,
                                "5.3.4 Message size exceeds fixed maximum message size",
                            )
                            .await?;
                            break;
                        }
                        DataOutcome::TimedOut => {
                            self.send_timeout(&mut writer).await?;
                            break;
                        }
                    }
                }

                "RSET" => {
                    sender = None;
                    recipient = None;
                    if state != SessionState::Connected {
                        state = SessionState::Greeted;
                    }
                    self.send_response(&mut writer, 250, "2.0.0 OK").await?;
                }

                "NOOP" => {
                    self.send_response(&mut writer, 250, "2.0.0 OK").await?;
                }

                "QUIT" => {
                    self.send_response(&mut writer, 221, "2.0.0 Bye").await?;
                    break;
                }

                "VRFY" => {
                    self.send_response(&mut writer, 252, "2.5.2 Cannot VRFY user")
                        .await?;
                }

                _ => {
                    self.send_response(&mut writer, 500, "5.5.2 Command not recognized")
                        .await?;
                }
            }
        }

        Ok(())
    }

    /// Run the message through the router and reply with its outcome
    async fn route_message<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut BufWriter<W>,
        message: &SmtpInboundMessage,
    ) -> Result<()> {
        let outcome = self.pipeline.process(message).await;

        info!(
            peer = %self.peer_addr,
            route = %outcome.route,
            result = %outcome.result,
            "Message routed"
        );

        if outcome.is_forwarded() {
            return self.send_response(writer, 250, "2.0.0 OK: forwarded").await;
        }

        let status = outcome
            .error
            .as_ref()
            .map(RoutingError::enhanced_status)
            .unwrap_or("5.0.0");

        match message.take_rejection().await {
            Some((code, reason)) => {
                let reply = format!("{} {}", status, reason);
                self.send_response(writer, code, &reply).await
            }
            None => self.send_response(writer, 451, "4.3.0 Temporary error").await,
        }
    }

    /// Read message data until <CRLF>.<CRLF>.
    ///
    /// Reads in chunks of at most [`DATA_CHUNK`] bytes and gives up as soon as
    /// the message passes `max_message_size`, so a line without a newline
    /// never grows past one chunk.
    async fn read_data<R: AsyncBufRead + Unpin>(&self, reader: &mut R) -> Result<DataOutcome> {
        let mut data = Vec::new();
        let mut chunk = Vec::with_capacity(DATA_CHUNK);
        let mut at_line_start = true;

        loop {
            chunk.clear();
            let read = timeout(
                self.idle_timeout(),
                read_bounded(reader, &mut chunk, DATA_CHUNK),
            )
            .await;
            let read = match read {
                Ok(read) => read?,
                Err(_) => return Ok(DataOutcome::TimedOut),
            };

            if read == LineRead::Eof {
                return Err(anyhow::anyhow!("Connection closed during DATA"));
            }

            if at_line_start && (chunk == b".\r\n" || chunk == b".\n") {
                break;
            }

            // Dot-stuffing: a leading dot is always removed
            let bytes = if at_line_start {
                chunk.strip_prefix(b".").unwrap_or(&chunk[..])
            } else {
                &chunk[..]
            };
            data.extend_from_slice(bytes);
            at_line_start = chunk.ends_with(b"\n");

            if data.len() > self.config.max_message_size {
                return Ok(DataOutcome::TooLarge);
            }
        }

        Ok(DataOutcome::Complete(data))
    }

    async fn send_timeout<W: AsyncWrite + Unpin>(&self, writer: &mut BufWriter<W>) -> Result<()> {
        self.send_response(
            writer,
            421,
            &format!("4.4.2 {} Idle timeout, closing connection", self.hostname),
        )
        .await
    }

    /// Send an SMTP response
    async fn send_response<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut BufWriter<W>,
        code: u16,
        message: &str,
    ) -> Result<()> {
        let response = format!("{} {}\r\n", code, message);
        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;
        debug!("SMTP to {}: {}", self.peer_addr, response.trim());
        Ok(())
    }

    /// Send a multi-line response (intermediate line)
    async fn send_response_continue<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut BufWriter<W>,
        code: u16,
        message: &str,
    ) -> Result<()> {
        let response = format!("{}-{}\r\n", code, message);
        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;
        debug!("SMTP to {}: {}", self.peer_addr, response.trim());
        Ok(())
    }
}

/// Parse an SMTP command line into command and arguments
fn parse_command(line: &str) -> (&str, &str) {
    match line.split_once(' ') {
        Some((command, args)) => (command, args.trim()),
        None => (line, ""),
    }
}

/// Strip an ASCII keyword such as `FROM:` regardless of case
fn strip_keyword<'a>(args: &'a str, keyword: &str) -> Option<&'a str> {
    let head = args.get(..keyword.len())?;
    if head.eq_ignore_ascii_case(keyword) {
        args.get(keyword.len()..)
    } else {
        None
    }
}

/// Pull the address out of `<addr> [params]` or `addr [params]`
fn extract_path(addr_part: &str) -> Option<&str> {
    let addr_part = addr_part.trim();
    if let Some(rest) = addr_part.strip_prefix('<') {
        let end = rest.find('>')?;
        Some(rest[..end].trim())
    } else {
        addr_part.split_whitespace().next()
    }
}

/// Parse MAIL FROM:<address>. `Some(None)` is the null sender `<>`.
fn parse_mail_from(args: &str) -> Option<Option<String>> {
    let email = extract_path(strip_keyword(args.trim(), "FROM:")?)?;

    if email.is_empty() {
        Some(None)
    } else {
        Some(Some(email.to_string()))
    }
}

/// Parse RCPT TO:<address>
fn parse_rcpt_to(args: &str) -> Option<String> {
    let email = extract_path(strip_keyword(args.trim(), "TO:")?)?;

    if email.is_empty() {
        None
    } else {
        Some(email.to_string())
    }
}
