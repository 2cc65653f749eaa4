//! ledger.rs: durable record of every item URL that was ever ingested.
//!
//! The ledger is append-only. An entry is written (and synced) before the item
//! it names is forwarded to the dispatcher, so replaying the same source state
//! after a restart never forwards the item twice.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    fn contains(&self, url: &str) -> bool;

    /// Durably record `url`. Appending an already known URL is a no-op.
    async fn append(&self, url: &str) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Newline-delimited URL file, mirrored in memory for membership queries.
/// Writes and syncs run on the blocking pool.
pub struct FileLedger {
    path: PathBuf,
    seen: Mutex<HashSet<String>>,
    file: Arc<Mutex<File>>,
}

impl FileLedger {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating ledger dir {}", dir.display()))?;
        }

        let mut seen = HashSet::new();
        if path.exists() {
            let f = File::open(&path)
                .with_context(|| format!("reading ledger {}", path.display()))?;
            for line in BufReader::new(f).lines() {
                let line = line.with_context(|| format!("reading ledger {}", path.display()))?;
                let url = line.trim();
                if !url.is_empty() {
                    seen.insert(url.to_string());
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening ledger {} for append", path.display()))?;

        info!(
            target: "ledger",
            path = %path.display(),
            entries = seen.len(),
            "ledger opened"
        );

        Ok(Self {
            path,
            seen: Mutex::new(seen),
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl Ledger for FileLedger {
    fn contains(&self, url: &str) -> bool {
        self.seen.lock().contains(url)
    }

    async fn append(&self, url: &str) -> Result<()> {
        if self.contains(url) {
            return Ok(());
        }
        let file = self.file.clone();
        let line = format!("{url}\n");
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut file = file.lock();
            file.write_all(line.as_bytes())
                .with_context(|| format!("appending to ledger {}", path.display()))?;
            file.sync_data()
                .with_context(|| format!("syncing ledger {}", path.display()))
        })
        .await
        .context("ledger writer task")??;
        self.seen.lock().insert(url.to_string());
        Ok(())
    }

    fn len(&self) -> usize {
        self.seen.lock().len()
    }
}

/// In-memory ledger for tests and dry runs.
#[derive(Default)]
pub struct MemoryLedger {
    seen: Mutex<HashSet<String>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Ledger for MemoryLedger {
    fn contains(&self, url: &str) -> bool {
        self.seen.lock().contains(url)
    }

    async fn append(&self, url: &str) -> Result<()> {
        self.seen.lock().insert(url.to_string());
        Ok(())
    }

    fn len(&self) -> usize {
        self.seen.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/ledger.txt");

        let ledger = FileLedger::open(&path).unwrap();
        ledger.append("https://a.test/1").await.unwrap();
        ledger.append("https://a.test/2").await.unwrap();
        ledger.append("https://a.test/1").await.unwrap();
        drop(ledger);

        let reopened = FileLedger::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains("https://a.test/1"));
        assert!(!reopened.contains("https://a.test/3"));

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    // other tasks on a single-threaded runtime keep running while appends sync
    #[tokio::test(flavor = "current_thread")]
    async fn appends_leave_the_runtime_free() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = Arc::new(FileLedger::open(tmp.path().join("ledger.txt")).unwrap());

        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    tokio::task::yield_now().await;
                    ticks.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                }
            })
        };

        for n in 0..20 {
            ledger.append(&format!("https://a.test/{n}")).await.unwrap();
        }
        ticker.abort();

        assert_eq!(ledger.len(), 20);
        assert!(ticks.load(std::sync::atomic::Ordering::Relaxed) > 0);
        let raw = fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(raw.lines().count(), 20);
    }
}
