//! In-memory doubles for the alias store, routing log and transport

use super::InboundMessage;
use crate::smtp::Forwarder;
use aliasrelay_common::{Error, Result};
use aliasrelay_storage::{Alias, AliasRepository, RoutingLogEntry, RoutingLogRepository};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Alias store backed by a map, counting every lookup
#[derive(Default)]
pub struct MemoryAliasStore {
    aliases: HashMap<String, Alias>,
    lookups: AtomicUsize,
    fail: bool,
    panic: bool,
}

impl MemoryAliasStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self, address: &str, forward_to: &str, allow_plus: bool) -> Self {
        self.aliases.insert(
            address.to_lowercase(),
            Alias::new(address, forward_to, allow_plus),
        );
        self
    }

    /// Every lookup fails with a database error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every lookup panics
    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::default()
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AliasRepository for MemoryAliasStore {
    async fn lookup_exact(&self, address: &str) -> Result<Option<Alias>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.panic {
            panic!("alias index corrupted");
        }
        if self.fail {
            return Err(Error::Database("connection reset".to_string()));
        }
        Ok(self.aliases.get(&address.to_lowercase()).cloned())
    }
}

/// Routing log that keeps entries in memory
#[derive(Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<RoutingLogEntry>>,
    attempts: AtomicUsize,
    fail: bool,
    hang: bool,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every append waits forever
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    /// Wait for `count` detached appends to finish, then return the entries
    pub async fn settled(&self, count: usize) -> Vec<RoutingLogEntry> {
        for _ in 0..1000 {
            if self.attempts() >= count {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.entries()
    }

    pub fn entries(&self) -> Vec<RoutingLogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoutingLogRepository for MemoryLogSink {
    async fn append(&self, entry: &RoutingLogEntry) -> Result<()> {
        if self.hang {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }
        if self.fail {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            return Err(Error::Database("disk full".to_string()));
        }
        self.entries.lock().unwrap().push(entry.clone());
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Inbound message that records what the router asked of it
pub struct TestMessage {
    from: String,
    to: String,
    message_id: String,
    raw_size: u64,
    forward_error: Option<String>,
    forward_panics: bool,
    forwarded: Mutex<Vec<String>>,
    rejected: Mutex<Vec<(u16, String)>>,
}

impl TestMessage {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            message_id: "<test-1@sender.example.org>".to_string(),
            raw_size: 1234,
            forward_error: None,
            forward_panics: false,
            forwarded: Mutex::new(Vec::new()),
            rejected: Mutex::new(Vec::new()),
        }
    }

    /// Make `forward` fail with the given message
    pub fn failing_forward(mut self, error: &str) -> Self {
        self.forward_error = Some(error.to_string());
        self
    }

    /// Make `forward` panic
    pub fn panicking_forward(mut self) -> Self {
        self.forward_panics = true;
        self
    }

    pub fn forwarded(&self) -> Vec<String> {
        self.forwarded.lock().unwrap().clone()
    }

    pub fn rejected(&self) -> Vec<(u16, String)> {
        self.rejected.lock().unwrap().clone()
    }
}

#[async_trait]
impl InboundMessage for TestMessage {
    fn from(&self) -> &str {
        &self.from
    }

    fn to(&self) -> &str {
        &self.to
    }

    fn raw_size(&self) -> u64 {
        self.raw_size
    }

    fn message_id(&self) -> &str {
        &self.message_id
    }

    async fn forward(&self, destination: &str) -> Result<()> {
        if self.forward_panics {
            panic!("transport state poisoned");
        }
        if let Some(error) = &self.forward_error {
            return Err(Error::Delivery(error.clone()));
        }
        self.forwarded.lock().unwrap().push(destination.to_string());
        Ok(())
    }

    async fn reject(&self, code: u16, reason: &str) {
        self.rejected.lock().unwrap().push((code, reason.to_string()));
    }
}

/// A forwarded copy as seen by [`RecordingForwarder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relayed {
    pub sender: Option<String>,
    pub destination: String,
    pub raw: Vec<u8>,
}

/// Forwarder that records messages instead of relaying them
#[derive(Default)]
pub struct RecordingForwarder {
    relayed: Mutex<Vec<Relayed>>,
    fail: bool,
}

impl RecordingForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn relayed(&self) -> Vec<Relayed> {
        self.relayed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(&self, sender: Option<&str>, destination: &str, raw: &[u8]) -> Result<()> {
        if self.fail {
            return Err(Error::Delivery("destination not verified".to_string()));
        }
        self.relayed.lock().unwrap().push(Relayed {
            sender: sender.map(str::to_string),
            destination: destination.to_string(),
            raw: raw.to_vec(),
        });
        Ok(())
    }
}
