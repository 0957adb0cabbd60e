//! RemoteTree - batched, sampled delivery to a remote collector

use std::collections::{HashMap, VecDeque};
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use contracts::{BuildMode, ContractError, Entry, LogLevel, LogRecord, Tree, TreeState};

use crate::metrics::TreeMetrics;

/// Serialization format for the batch payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Payload shipped to the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogBatch {
    pub entries: Vec<LogRecord>,
    /// `debug` or `release`
    pub environment: String,
}

impl LogBatch {
    pub fn encode(&self, format: NetworkFormat) -> Result<Vec<u8>, String> {
        match format {
            NetworkFormat::Json => {
                serde_json::to_vec(self).map_err(|e| format!("json error: {e}"))
            }
            NetworkFormat::Bincode => {
                bincode::serialize(self).map_err(|e| format!("bincode error: {e}"))
            }
        }
    }

    pub fn decode(bytes: &[u8], format: NetworkFormat) -> Result<Self, String> {
        match format {
            NetworkFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| format!("json error: {e}"))
            }
            NetworkFormat::Bincode => {
                bincode::deserialize(bytes).map_err(|e| format!("bincode error: {e}"))
            }
        }
    }
}

/// Where encoded batches go
pub trait LogTransport: Send + Sync {
    /// Deliver one encoded batch; an `Err` triggers a retry
    fn send(&self, payload: &[u8]) -> Result<(), ContractError>;
}

/// Fire-and-forget UDP transport
pub struct UdpTransport {
    socket: UdpSocket,
    max_packet_size: usize,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to `addr`
    pub fn connect(addr: SocketAddr, max_packet_size: usize) -> std::io::Result<Self> {
        let local: SocketAddr = if addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(addr)?;
        debug!(target: "canopy::diagnostics", target_addr = %addr, "UdpTransport connected");
        Ok(Self {
            socket,
            max_packet_size,
        })
    }
}

impl LogTransport for UdpTransport {
    fn send(&self, payload: &[u8]) -> Result<(), ContractError> {
        if payload.len() > self.max_packet_size {
            return Err(ContractError::tree_write(
                "remote",
                format!(
                    "payload of {} bytes exceeds max packet size {}",
                    payload.len(),
                    self.max_packet_size
                ),
            ));
        }
        self.socket
            .send(payload)
            .map(|_| ())
            .map_err(|e| ContractError::tree_connection("remote", e.to_string()))
    }
}

/// Configuration for RemoteTree
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    /// Collector address (UDP transport)
    pub addr: Option<SocketAddr>,
    pub format: NetworkFormat,
    /// Entries per batch
    pub batch_size: usize,
    /// Retries after the first failed attempt
    pub retry_count: u32,
    /// First backoff delay, doubled after every retry
    pub retry_delay: Duration,
    /// Fraction of verbose/debug/info entries kept, `0.0..=1.0`
    pub sampling_rate: f64,
    /// Buffered entries kept across failed sends
    pub max_pending: usize,
    /// Max UDP packet size (IPv4 limit is 65507)
    pub max_packet_size: usize,
    /// A log call arriving this long after the last send ships a partial batch
    pub flush_interval: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            addr: None,
            format: NetworkFormat::Json,
            batch_size: 50,
            retry_count: 3,
            retry_delay: Duration::from_millis(500),
            sampling_rate: 1.0,
            max_pending: 1_000,
            max_packet_size: 65_000,
            flush_interval: Duration::from_secs(30),
        }
    }
}

impl RemoteConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ContractError> {
        let mut config = Self::default();

        if let Some(raw) = params.get("addr") {
            let addr = raw.parse().map_err(|e| {
                ContractError::config_validation("params.addr", format!("invalid address '{raw}': {e}"))
            })?;
            config.addr = Some(addr);
        }

        config.format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => {
                return Err(ContractError::config_validation(
                    "params.format",
                    format!("unknown format '{other}'"),
                ))
            }
        };

        if let Some(v) = parse_param(params, "batch_size")? {
            config.batch_size = v;
        }
        if let Some(v) = parse_param(params, "retry_count")? {
            config.retry_count = v;
        }
        if let Some(ms) = parse_param::<u64>(params, "retry_delay_ms")? {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(v) = parse_param(params, "sampling_rate")? {
            config.sampling_rate = v;
        }
        if let Some(v) = parse_param(params, "max_pending")? {
            config.max_pending = v;
        }
        if let Some(v) = parse_param(params, "max_packet_size")? {
            config.max_packet_size = v;
        }
        if let Some(ms) = parse_param::<u64>(params, "flush_interval_ms")? {
            config.flush_interval = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ContractError> {
        if self.batch_size == 0 {
            return Err(ContractError::config_validation(
                "params.batch_size",
                "must be > 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(ContractError::config_validation(
                "params.sampling_rate",
                format!("must be within 0.0..=1.0, got {}", self.sampling_rate),
            ));
        }
        if self.max_pending < self.batch_size {
            return Err(ContractError::config_validation(
                "params.max_pending",
                "must be >= batch_size",
            ));
        }
        Ok(())
    }
}

fn parse_param<T: std::str::FromStr>(
    params: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, ContractError> {
    params
        .get(key)
        .map(|raw| {
            raw.trim().parse().map_err(|_| {
                ContractError::config_validation(format!("params.{key}"), format!("invalid value '{raw}'"))
            })
        })
        .transpose()
}

/// Entries waiting to be sent
struct Pending {
    entries: VecDeque<LogRecord>,
    /// Entries received since the last send attempt; requeued ones don't count
    fresh: usize,
    last_send: Instant,
}

impl Pending {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            fresh: 0,
            last_send: Instant::now(),
        }
    }

    fn take(&mut self) -> Vec<LogRecord> {
        self.fresh = 0;
        self.last_send = Instant::now();
        self.entries.drain(..).collect()
    }
}

/// Tree that batches entries for a remote collector.
///
/// Warnings and errors are always kept; lower levels are sampled. The buffer
/// is sent once `batch_size` new entries arrived, or on the first log call
/// after `flush_interval` has passed since the last send. Sends retry with
/// exponential backoff; a batch that still fails goes back to the front of
/// the buffer, which is capped at `max_pending` entries (oldest dropped), and
/// waits for the next threshold. Sending blocks the thread that triggers it,
/// so forests usually wrap this tree in an [`AsyncTree`](crate::AsyncTree).
pub struct RemoteTree {
    state: TreeState,
    name: String,
    config: RemoteConfig,
    environment: BuildMode,
    transport: Box<dyn LogTransport>,
    buffer: Mutex<Pending>,
    // one batch in flight at a time
    send_lock: Mutex<()>,
    metrics: TreeMetrics,
}

impl RemoteTree {
    pub fn new(config: RemoteConfig, transport: Box<dyn LogTransport>) -> Result<Self, ContractError> {
        config.validate()?;
        Ok(Self {
            state: TreeState::with_min_level(LogLevel::Info),
            name: "remote".to_string(),
            config,
            environment: BuildMode::default(),
            transport,
            buffer: Mutex::new(Pending::new()),
            send_lock: Mutex::new(()),
            metrics: TreeMetrics::new(),
        })
    }

    /// Remote tree over [`UdpTransport`]; `config.addr` is required
    #[instrument(name = "remote_tree_udp", skip(config))]
    pub fn udp(config: RemoteConfig) -> Result<Self, ContractError> {
        let addr = config
            .addr
            .ok_or_else(|| ContractError::config_validation("params.addr", "missing 'addr' parameter"))?;
        let transport = UdpTransport::connect(addr, config.max_packet_size)
            .map_err(|e| ContractError::tree_connection("remote", e.to_string()))?;
        Self::new(config, Box::new(transport))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Environment label written into every batch
    pub fn with_environment(mut self, environment: BuildMode) -> Self {
        self.environment = environment;
        self
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    pub fn metrics(&self) -> &TreeMetrics {
        &self.metrics
    }

    /// Entries waiting for the next batch
    pub fn pending(&self) -> usize {
        self.lock_buffer().entries.len()
    }

    /// Send whatever is buffered, regardless of batch size
    pub fn flush(&self) -> bool {
        let entries = self.lock_buffer().take();
        if entries.is_empty() {
            return true;
        }
        self.send_batch(entries)
    }

    fn should_sample(&self, level: LogLevel) -> bool {
        if level >= LogLevel::Warning {
            return true;
        }
        fastrand::f64() < self.config.sampling_rate
    }

    #[instrument(
        name = "remote_tree_send",
        skip(self, entries),
        fields(tree = %self.name, entries = entries.len())
    )]
    fn send_batch(&self, entries: Vec<LogRecord>) -> bool {
        let _in_flight = self.send_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let batch = LogBatch {
            entries,
            environment: self.environment.to_string(),
        };
        let payload = match batch.encode(self.config.format) {
            Ok(payload) => payload,
            Err(e) => {
                self.metrics.inc_failed();
                self.metrics.add_dropped(batch.entries.len() as u64);
                warn!(target: "canopy::diagnostics", tree = %self.name, error = %e, "Batch encoding failed, dropped");
                return false;
            }
        };

        let mut delay = self.config.retry_delay;
        for attempt in 0..=self.config.retry_count {
            match self.transport.send(&payload) {
                Ok(()) => {
                    self.metrics.add_delivered(batch.entries.len() as u64);
                    debug!(attempt, bytes = payload.len(), "Batch sent");
                    return true;
                }
                Err(e) if attempt < self.config.retry_count => {
                    debug!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Send failed, retrying");
                    std::thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                }
                Err(e) => {
                    warn!(target: "canopy::diagnostics", tree = %self.name, error = %e, "Batch send failed, requeued");
                }
            }
        }

        self.metrics.inc_failed();
        self.requeue(batch.entries);
        false
    }

    fn requeue(&self, entries: Vec<LogRecord>) {
        let mut buffer = self.lock_buffer();
        for entry in entries.into_iter().rev() {
            buffer.entries.push_front(entry);
        }
        let mut dropped = 0u64;
        while buffer.entries.len() > self.config.max_pending {
            buffer.entries.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            self.metrics.add_dropped(dropped);
        }
    }

    fn lock_buffer(&self) -> MutexGuard<'_, Pending> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RemoteTree {
    fn drop(&mut self) {
        if self.pending() > 0 {
            self.flush();
        }
    }
}

impl Tree for RemoteTree {
    fn state(&self) -> &TreeState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&self, entry: &Entry<'_>) {
        if !self.should_sample(entry.level) {
            return;
        }
        let batch = {
            let mut buffer = self.lock_buffer();
            buffer.entries.push_back(entry.to_record());
            buffer.fresh += 1;
            let due = buffer.fresh >= self.config.batch_size
                || buffer.last_send.elapsed() >= self.config.flush_interval;
            due.then(|| buffer.take())
        };
        if let Some(batch) = batch {
            self.send_batch(batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Record, SourceLocation, Template};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Transport that fails a fixed number of times, then records payloads
    #[derive(Default)]
    struct MockTransport {
        failures_left: AtomicUsize,
        attempts: AtomicUsize,
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl MockTransport {
        fn failing(times: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(times),
                ..Default::default()
            }
        }
    }

    impl LogTransport for Arc<MockTransport> {
        fn send(&self, payload: &[u8]) -> Result<(), ContractError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(ContractError::tree_connection("mock", "unreachable"));
            }
            self.sent.lock().unwrap().push(payload.to_vec());
            Ok(())
        }
    }

    fn config(batch_size: usize) -> RemoteConfig {
        RemoteConfig {
            batch_size,
            retry_count: 2,
            retry_delay: Duration::from_millis(1),
            max_pending: 10,
            ..Default::default()
        }
    }

    fn log(tree: &RemoteTree, level: LogLevel, message: &str) {
        let record = Record::new(level, Template::Text(message), SourceLocation::new("remote.rs", 7, 1));
        if tree.is_loggable(level) {
            tree.log(&record);
        }
    }

    #[test]
    fn test_default_min_level_is_info() {
        let transport = Arc::new(MockTransport::default());
        let tree = RemoteTree::new(config(10), Box::new(transport)).unwrap();
        assert_eq!(tree.min_level(), LogLevel::Info);
        assert!(!tree.is_loggable(LogLevel::Debug));
    }

    #[test]
    fn test_sends_full_batch_as_json() {
        let transport = Arc::new(MockTransport::default());
        let tree = RemoteTree::new(config(2), Box::new(Arc::clone(&transport)))
            .unwrap()
            .with_environment(BuildMode::Release);

        log(&tree, LogLevel::Info, "first");
        assert_eq!(tree.pending(), 1);
        log(&tree, LogLevel::Error, "second");
        assert_eq!(tree.pending(), 0);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let batch = LogBatch::decode(&sent[0], NetworkFormat::Json).unwrap();
        assert_eq!(batch.environment, "release");
        let messages: Vec<_> = batch.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert_eq!(batch.entries[1].level, LogLevel::Error);
        assert_eq!(tree.metrics().delivered(), 2);
    }

    #[test]
    fn test_bincode_batch_decodes() {
        let transport = Arc::new(MockTransport::default());
        let mut cfg = config(1);
        cfg.format = NetworkFormat::Bincode;
        let tree = RemoteTree::new(cfg, Box::new(Arc::clone(&transport))).unwrap();

        tree.tag("Bin").log(&Record::new(
            LogLevel::Warning,
            Template::Text("compact"),
            SourceLocation::new("remote.rs", 1, 1),
        ));

        let sent = transport.sent.lock().unwrap();
        let batch = LogBatch::decode(&sent[0], NetworkFormat::Bincode).unwrap();
        assert_eq!(batch.entries[0].message, "compact");
        assert_eq!(batch.entries[0].tag.as_deref(), Some("Bin"));
    }

    #[test]
    fn test_retries_then_succeeds() {
        let transport = Arc::new(MockTransport::failing(2));
        let tree = RemoteTree::new(config(1), Box::new(Arc::clone(&transport))).unwrap();

        log(&tree, LogLevel::Warning, "eventually");

        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
        assert_eq!(tree.pending(), 0);
    }

    #[test]
    fn test_failed_batch_is_requeued_and_capped() {
        let transport = Arc::new(MockTransport::failing(usize::MAX));
        let tree = RemoteTree::new(config(4), Box::new(Arc::clone(&transport))).unwrap();

        for i in 0..12 {
            log(&tree, LogLevel::Error, &format!("e{i}"));
        }

        // every send failed; only the newest max_pending entries survive
        assert_eq!(tree.pending(), 10);
        assert!(tree.metrics().dropped() >= 2);
        assert!(tree.metrics().failed() >= 1);
        assert_eq!(transport.attempts.load(Ordering::SeqCst) % 3, 0);

        let buffer = tree.lock_buffer();
        assert_eq!(buffer.entries.back().map(|e| e.message.as_str()), Some("e11"));
        drop(buffer);

        // let the final flush on drop succeed quickly
        transport.failures_left.store(0, Ordering::SeqCst);
    }

    #[test]
    fn test_requeued_entries_wait_for_new_batch() {
        let transport = Arc::new(MockTransport::failing(3));
        let tree = RemoteTree::new(config(2), Box::new(Arc::clone(&transport))).unwrap();

        log(&tree, LogLevel::Error, "a");
        log(&tree, LogLevel::Error, "b");
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(tree.pending(), 2);

        // one new entry is below the threshold; the requeued two don't count
        log(&tree, LogLevel::Error, "c");
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(tree.pending(), 3);

        log(&tree, LogLevel::Error, "d");
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 4);
        assert_eq!(tree.pending(), 0);

        let sent = transport.sent.lock().unwrap();
        let batch = LogBatch::decode(&sent[0], NetworkFormat::Json).unwrap();
        let messages: Vec<_> = batch.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_flush_interval_ships_partial_batch() {
        let transport = Arc::new(MockTransport::default());
        let mut cfg = config(10);
        cfg.flush_interval = Duration::from_millis(20);
        let tree = RemoteTree::new(cfg, Box::new(Arc::clone(&transport))).unwrap();

        log(&tree, LogLevel::Info, "early");
        assert_eq!(tree.pending(), 1);

        std::thread::sleep(Duration::from_millis(40));
        log(&tree, LogLevel::Info, "late");
        assert_eq!(tree.pending(), 0);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let batch = LogBatch::decode(&sent[0], NetworkFormat::Json).unwrap();
        assert_eq!(batch.entries.len(), 2);
    }

    #[test]
    fn test_sampling_keeps_warnings_and_errors() {
        let transport = Arc::new(MockTransport::default());
        let mut cfg = config(100);
        cfg.sampling_rate = 0.0;
        let tree = RemoteTree::new(cfg, Box::new(Arc::clone(&transport))).unwrap();

        log(&tree, LogLevel::Info, "sampled out");
        log(&tree, LogLevel::Warning, "kept");
        log(&tree, LogLevel::Error, "kept too");

        assert_eq!(tree.pending(), 2);
        assert!(tree.flush());
        assert_eq!(tree.pending(), 0);
    }

    #[test]
    fn test_udp_delivery() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut cfg = config(2);
        cfg.addr = Some(receiver.local_addr().unwrap());

        let tree = RemoteTree::udp(cfg).unwrap();
        log(&tree, LogLevel::Info, "over");
        log(&tree, LogLevel::Info, "udp");

        let mut buf = [0u8; 65_536];
        let n = receiver.recv(&mut buf).unwrap();
        let batch = LogBatch::decode(&buf[..n], NetworkFormat::Json).unwrap();
        assert_eq!(batch.entries.len(), 2);
        assert_eq!(batch.entries[1].message, "udp");
    }

    #[test]
    fn test_config_from_params() {
        let params = HashMap::from([
            ("addr".to_string(), "127.0.0.1:9999".to_string()),
            ("format".to_string(), "bincode".to_string()),
            ("batch_size".to_string(), "20".to_string()),
            ("retry_delay_ms".to_string(), "250".to_string()),
            ("sampling_rate".to_string(), "0.5".to_string()),
            ("flush_interval_ms".to_string(), "5000".to_string()),
        ]);

        let cfg = RemoteConfig::from_params(&params).unwrap();
        assert_eq!(cfg.addr.map(|a| a.port()), Some(9999));
        assert_eq!(cfg.format, NetworkFormat::Bincode);
        assert_eq!(cfg.batch_size, 20);
        assert_eq!(cfg.retry_delay, Duration::from_millis(250));
        assert_eq!(cfg.sampling_rate, 0.5);
        assert_eq!(cfg.retry_count, 3);
        assert_eq!(cfg.flush_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_config_rejects_bad_params() {
        let cases = [
            ("addr", "not-an-address"),
            ("format", "xml"),
            ("batch_size", "0"),
            ("sampling_rate", "1.5"),
            ("retry_count", "-1"),
        ];
        for (key, value) in cases {
            let params = HashMap::from([(key.to_string(), value.to_string())]);
            assert!(
                RemoteConfig::from_params(&params).is_err(),
                "{key}={value} accepted"
            );
        }
    }

    #[test]
    fn test_udp_requires_addr() {
        assert!(RemoteTree::udp(RemoteConfig::default()).is_err());
    }
}
