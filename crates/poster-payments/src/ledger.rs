//! Processed Event Ledger
//!
//! Stripe delivers webhooks at least once. The ledger tracks which event ids
//! are being fulfilled right now and which are done, so a redelivery does not
//! email the buyer twice.
//!
//! An event id moves `claim` → `complete` (persisted) or `claim` → `release`
//! (forgotten, so the next delivery runs again). Only completed ids are kept
//! across restarts, and only for [`DEFAULT_RETENTION_SECS`].

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{PaymentError, Result};

/// How long completed ids are remembered. Stripe stops redelivering after
/// three days.
pub const DEFAULT_RETENTION_SECS: i64 = 7 * 24 * 60 * 60;

/// State of an event id at claim time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Claim {
    /// First delivery; the caller owns processing
    New,
    /// Another delivery of this id is still being processed
    InFlight,
    /// Already fulfilled
    Done,
}

/// Event ledger trait
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Claim an event id for processing
    async fn claim(&self, event_id: &str) -> Result<Claim>;

    /// Mark a claimed event id as fulfilled
    async fn complete(&self, event_id: &str) -> Result<()>;

    /// Drop a claim so a later delivery is processed again
    async fn release(&self, event_id: &str) -> Result<()>;
}

fn poisoned<T>(_: T) -> PaymentError {
    PaymentError::Ledger("ledger lock poisoned".into())
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Default)]
struct LedgerState {
    in_flight: HashSet<String>,
    done: HashMap<String, i64>,
}

impl LedgerState {
    fn claim(&mut self, event_id: &str) -> Claim {
        if self.done.contains_key(event_id) {
            Claim::Done
        } else if self.in_flight.insert(event_id.to_string()) {
            Claim::New
        } else {
            Claim::InFlight
        }
    }

    fn complete(&mut self, event_id: &str, at: i64, retention_secs: i64) {
        self.in_flight.remove(event_id);
        self.done.insert(event_id.to_string(), at);
        self.done.retain(|_, done_at| *done_at > at - retention_secs);
    }
}

/// In-memory ledger (for development and tests)
pub struct MemoryEventLedger {
    state: Mutex<LedgerState>,
    retention_secs: i64,
}

impl Default for MemoryEventLedger {
    fn default() -> Self {
        Self {
            state: Mutex::default(),
            retention_secs: DEFAULT_RETENTION_SECS,
        }
    }
}

impl MemoryEventLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLedger for MemoryEventLedger {
    async fn claim(&self, event_id: &str) -> Result<Claim> {
        Ok(self.state.lock().map_err(poisoned)?.claim(event_id))
    }

    async fn complete(&self, event_id: &str) -> Result<()> {
        self.state
            .lock()
            .map_err(poisoned)?
            .complete(event_id, unix_now(), self.retention_secs);
        Ok(())
    }

    async fn release(&self, event_id: &str) -> Result<()> {
        self.state.lock().map_err(poisoned)?.in_flight.remove(event_id);
        Ok(())
    }
}

/// Append-only file ledger, one `<unix seconds> <event id>` line per
/// completed event.
///
/// Ids older than the retention window are dropped when the file is opened,
/// and the file is compacted if anything was dropped. Appends run on the
/// blocking pool.
pub struct FileEventLedger {
    path: PathBuf,
    state: Mutex<LedgerState>,
    retention_secs: i64,
}

impl FileEventLedger {
    /// Open (or create) a ledger file with the default retention
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_retention(path, DEFAULT_RETENTION_SECS)
    }

    /// Open (or create) a ledger file, forgetting ids older than `retention_secs`
    pub fn open_with_retention(path: impl Into<PathBuf>, retention_secs: i64) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let cutoff = unix_now() - retention_secs;
        let mut done = HashMap::new();
        let mut dropped = 0usize;
        match File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line?;
                    let parsed = line
                        .trim()
                        .split_once(' ')
                        .and_then(|(at, id)| Some((at.parse::<i64>().ok()?, id)));
                    match parsed {
                        Some((at, id)) if at > cutoff && !id.is_empty() => {
                            done.insert(id.to_string(), at);
                        }
                        _ if line.trim().is_empty() => {}
                        _ => dropped += 1,
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if dropped > 0 {
            rewrite(&path, &done)?;
        }

        tracing::debug!(
            path = %path.display(),
            events = done.len(),
            dropped,
            "Opened event ledger"
        );
        Ok(Self {
            path,
            state: Mutex::new(LedgerState {
                in_flight: HashSet::new(),
                done,
            }),
            retention_secs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn append(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.sync_data()?;
    Ok(())
}

fn rewrite(path: &Path, done: &HashMap<String, i64>) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        for (id, at) in done {
            writeln!(file, "{at} {id}")?;
        }
        file.sync_data()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl EventLedger for FileEventLedger {
    async fn claim(&self, event_id: &str) -> Result<Claim> {
        Ok(self.state.lock().map_err(poisoned)?.claim(event_id))
    }

    async fn complete(&self, event_id: &str) -> Result<()> {
        let at = unix_now();
        let path = self.path.clone();
        let line = format!("{at} {event_id}\n");
        tokio::task::spawn_blocking(move || append(&path, &line))
            .await
            .map_err(|e| PaymentError::Ledger(format!("ledger write task failed: {e}")))??;

        self.state
            .lock()
            .map_err(poisoned)?
            .complete(event_id, at, self.retention_secs);
        Ok(())
    }

    async fn release(&self, event_id: &str) -> Result<()> {
        self.state.lock().map_err(poisoned)?.in_flight.remove(event_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_ledger_lifecycle() {
        let ledger = MemoryEventLedger::new();
        assert_eq!(ledger.claim("evt_1").await.unwrap(), Claim::New);
        assert_eq!(ledger.claim("evt_1").await.unwrap(), Claim::InFlight);

        ledger.release("evt_1").await.unwrap();
        assert_eq!(ledger.claim("evt_1").await.unwrap(), Claim::New);

        ledger.complete("evt_1").await.unwrap();
        assert_eq!(ledger.claim("evt_1").await.unwrap(), Claim::Done);
    }

    #[tokio::test]
    async fn test_file_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/processed-events.log");

        {
            let ledger = FileEventLedger::open(&path).unwrap();
            assert_eq!(ledger.claim("evt_1").await.unwrap(), Claim::New);
            assert_eq!(ledger.claim("evt_2").await.unwrap(), Claim::New);
            ledger.complete("evt_1").await.unwrap();
            ledger.release("evt_2").await.unwrap();
        }

        let ledger = FileEventLedger::open(&path).unwrap();
        assert_eq!(ledger.claim("evt_1").await.unwrap(), Claim::Done);
        assert_eq!(ledger.claim("evt_2").await.unwrap(), Claim::New);
    }

    #[tokio::test]
    async fn test_in_flight_claims_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed-events.log");

        {
            let ledger = FileEventLedger::open(&path).unwrap();
            assert_eq!(ledger.claim("evt_1").await.unwrap(), Claim::New);
        }

        let ledger = FileEventLedger::open(&path).unwrap();
        assert_eq!(ledger.claim("evt_1").await.unwrap(), Claim::New);
    }

    #[test]
    fn test_open_prunes_expired_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed-events.log");
        let now = unix_now();
        std::fs::write(
            &path,
            format!("1000 evt_old\n{now} evt_recent\nnot-a-timestamp\n\n"),
        )
        .unwrap();

        let ledger = FileEventLedger::open(&path).unwrap();
        {
            let state = ledger.state.lock().unwrap();
            assert!(state.done.contains_key("evt_recent"));
            assert!(!state.done.contains_key("evt_old"));
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, format!("{now} evt_recent\n"));
    }

    #[tokio::test]
    async fn test_complete_forgets_ids_past_retention() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileEventLedger::open_with_retention(dir.path().join("l.log"), 60).unwrap();
        ledger
            .state
            .lock()
            .unwrap()
            .done
            .insert("evt_old".into(), unix_now() - 120);

        ledger.claim("evt_new").await.unwrap();
        ledger.complete("evt_new").await.unwrap();

        assert_eq!(ledger.claim("evt_old").await.unwrap(), Claim::New);
        assert_eq!(ledger.claim("evt_new").await.unwrap(), Claim::Done);
    }
}
