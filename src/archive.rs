// src/archive.rs
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::model::Item;

#[async_trait::async_trait]
pub trait ArchiveSink: Send + Sync {
    /// Append one item row to the current file.
    async fn append(&self, item: &Item) -> Result<()>;

    /// Rows in the current file.
    fn current_record_count(&self) -> usize;

    /// Start a new file, leaving the previous one untouched.
    /// Returns a label (path) of the new file.
    async fn rotate(&self) -> Result<String>;
}

struct Part {
    number: u32,
    path: PathBuf,
    file: File,
    records: usize,
}

/// JSON-lines archive split into numbered parts: `<prefix>_p00.jsonl`, `_p01`, ...
/// File I/O after `open` runs on the blocking pool.
pub struct JsonlArchive {
    dir: PathBuf,
    prefix: String,
    current: Arc<Mutex<Part>>,
}

impl JsonlArchive {
    /// Open the highest existing part in `dir` (or create part 0).
    pub fn open<P: AsRef<Path>>(dir: P, prefix: &str) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating archive dir {}", dir.display()))?;

        let number = latest_part(&dir, prefix)?.unwrap_or(0);
        let part = open_part(&dir, prefix, number)?;
        info!(
            target: "archive",
            path = %part.path.display(),
            records = part.records,
            "archive opened"
        );

        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            current: Arc::new(Mutex::new(part)),
        })
    }

    /// Run `f` against the current part on the blocking pool.
    async fn with_part<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Part) -> Result<T> + Send + 'static,
    {
        let current = self.current.clone();
        tokio::task::spawn_blocking(move || {
            let mut part = current.lock();
            f(&mut *part)
        })
        .await
        .context("archive writer task")?
    }

    pub fn current_path(&self) -> PathBuf {
        self.current.lock().path.clone()
    }
}

#[async_trait::async_trait]
impl ArchiveSink for JsonlArchive {
    async fn append(&self, item: &Item) -> Result<()> {
        let line = serde_json::to_string(item).context("encoding archive row")?;
        self.with_part(move |part| {
            writeln!(part.file, "{line}")
                .with_context(|| format!("writing archive {}", part.path.display()))?;
            part.records += 1;
            Ok(())
        })
        .await
    }

    fn current_record_count(&self) -> usize {
        self.current.lock().records
    }

    async fn rotate(&self) -> Result<String> {
        let dir = self.dir.clone();
        let prefix = self.prefix.clone();
        self.with_part(move |part| {
            part.file
                .flush()
                .with_context(|| format!("flushing archive {}", part.path.display()))?;
            *part = open_part(&dir, &prefix, part.number + 1)?;
            Ok(part.path.display().to_string())
        })
        .await
    }
}

fn part_path(dir: &Path, prefix: &str, number: u32) -> PathBuf {
    dir.join(format!("{prefix}_p{number:02}.jsonl"))
}

fn latest_part(dir: &Path, prefix: &str) -> Result<Option<u32>> {
    let head = format!("{prefix}_p");
    let mut best = None;
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(num) = name
            .strip_prefix(&head)
            .and_then(|rest| rest.strip_suffix(".jsonl"))
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };
        best = best.max(Some(num));
    }
    Ok(best)
}

fn open_part(dir: &Path, prefix: &str, number: u32) -> Result<Part> {
    let path = part_path(dir, prefix, number);
    let records = if path.exists() {
        let f = File::open(&path).with_context(|| format!("reading {}", path.display()))?;
        BufReader::new(f)
            .lines()
            .map_while(|l| l.ok())
            .filter(|l| !l.trim().is_empty())
            .count()
    } else {
        0
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening archive {}", path.display()))?;
    Ok(Part {
        number,
        path,
        file,
        records,
    })
}

/// In-memory archive: every part is a Vec of items.
pub struct MemoryArchive {
    pub parts: Mutex<Vec<Vec<Item>>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self {
            parts: Mutex::new(vec![Vec::new()]),
        }
    }

    pub fn total_records(&self) -> usize {
        self.parts.lock().iter().map(Vec::len).sum()
    }
}

impl Default for MemoryArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ArchiveSink for MemoryArchive {
    async fn append(&self, item: &Item) -> Result<()> {
        let mut parts = self.parts.lock();
        if let Some(last) = parts.last_mut() {
            last.push(item.clone());
        }
        Ok(())
    }

    fn current_record_count(&self) -> usize {
        self.parts.lock().last().map(Vec::len).unwrap_or(0)
    }

    async fn rotate(&self) -> Result<String> {
        let mut parts = self.parts.lock();
        parts.push(Vec::new());
        Ok(format!("memory part {}", parts.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Discovered, ItemAttributes};
    use chrono::Utc;

    fn item(n: u32) -> Item {
        Item::from_attributes(
            Discovered {
                source_id: "s".into(),
                url: format!("https://a.test/{n}"),
            },
            ItemAttributes::bare(Category::Room),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn rotation_keeps_old_part_and_reopen_finds_latest() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = JsonlArchive::open(tmp.path(), "items").unwrap();
        archive.append(&item(1)).await.unwrap();
        archive.append(&item(2)).await.unwrap();
        assert_eq!(archive.current_record_count(), 2);

        let label = archive.rotate().await.unwrap();
        assert!(label.ends_with("items_p01.jsonl"));
        assert_eq!(archive.current_record_count(), 0);
        archive.append(&item(3)).await.unwrap();
        drop(archive);

        let first = fs::read_to_string(tmp.path().join("items_p00.jsonl")).unwrap();
        assert_eq!(first.lines().count(), 2);

        let reopened = JsonlArchive::open(tmp.path(), "items").unwrap();
        assert!(reopened.current_path().ends_with("items_p01.jsonl"));
        assert_eq!(reopened.current_record_count(), 1);
    }

    #[tokio::test]
    async fn rows_decode_back_into_items() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = JsonlArchive::open(tmp.path(), "items").unwrap();
        let original = item(7);
        archive.append(&original).await.unwrap();

        let raw = fs::read_to_string(archive.current_path()).unwrap();
        let decoded: Item = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrent_appends_all_land_in_the_current_part() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = Arc::new(JsonlArchive::open(tmp.path(), "items").unwrap());

        let mut tasks = tokio::task::JoinSet::new();
        for n in 0..10 {
            let archive = archive.clone();
            tasks.spawn(async move { archive.append(&item(n)).await });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap().unwrap();
        }

        assert_eq!(archive.current_record_count(), 10);
        let raw = fs::read_to_string(archive.current_path()).unwrap();
        assert_eq!(raw.lines().count(), 10);
    }
}
