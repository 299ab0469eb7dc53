//! Reference `PersistedLogReader`: length-delimited CBOR records read from
//! a directory of append-only segment files, ordered by filename. This is
//! a demo implementation for `meta-node` to have something to serve — the
//! actual on-disk format is out of scope per `spec.md` §1, so it is kept
//! deliberately simple (single-threaded scan, no compaction, no index).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, BufReader};

use crate::codec;
use crate::log_buffer::PersistedLogReader;
use crate::model::Event;

/// Each record on disk is a little-endian `u32` length prefix followed by
/// that many bytes of CBOR-encoded `Event`.
pub struct FileLogReader {
    dir: PathBuf,
}

impl FileLogReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn segment_files(&self) -> Result<Vec<PathBuf>, anyhow::Error> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_segment(
        path: &Path,
        from_ts_ns: i64,
        last_processed: &mut i64,
        on_entry: &mut (dyn FnMut(Event) -> Result<(), anyhow::Error> + Send),
    ) -> Result<(), anyhow::Error> {
        let file = tokio::fs::File::open(path).await?;
        let mut reader = BufReader::new(file);
        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut payload = vec![0u8; len];
            reader.read_exact(&mut payload).await?;
            let event = codec::decode(&payload)?;
            if event.ts_ns >= from_ts_ns {
                *last_processed = event.ts_ns;
                on_entry(event)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PersistedLogReader for FileLogReader {
    async fn read_persisted(
        &self,
        from_ts_ns: i64,
        on_entry: &mut (dyn FnMut(Event) -> Result<(), anyhow::Error> + Send),
    ) -> Result<i64, anyhow::Error> {
        let mut last_processed = 0i64;
        for path in self.segment_files().await? {
            Self::read_segment(&path, from_ts_ns, &mut last_processed, on_entry).await?;
        }
        Ok(last_processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryInfo, Event};

    async fn write_segment(dir: &Path, name: &str, events: &[Event]) {
        let mut bytes = Vec::new();
        for event in events {
            let payload = codec::encode(event).unwrap();
            bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            bytes.extend_from_slice(&payload);
        }
        tokio::fs::write(dir.join(name), bytes).await.unwrap();
    }

    fn event(ts_ns: i64) -> Event {
        Event {
            directory: "/a".into(),
            old_entry: None,
            new_entry: Some(EntryInfo {
                name: "x".into(),
                attributes: serde_cbor::Value::Null,
            }),
            new_parent_path: None,
            signatures: vec![],
            ts_ns,
        }
    }

    #[tokio::test]
    async fn reads_entries_at_or_after_from_ts_ns_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_segment(dir.path(), "0001.log", &[event(10), event(20)]).await;
        write_segment(dir.path(), "0002.log", &[event(30)]).await;

        let reader = FileLogReader::new(dir.path());
        let mut seen = Vec::new();
        let last = reader
            .read_persisted(15, &mut |e| {
                seen.push(e.ts_ns);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(seen, vec![20, 30]);
        assert_eq!(last, 30);
    }

    #[tokio::test]
    async fn returns_zero_when_nothing_at_or_after_from_ts_ns() {
        let dir = tempfile::tempdir().unwrap();
        write_segment(dir.path(), "0001.log", &[event(10)]).await;

        let reader = FileLogReader::new(dir.path());
        let mut seen = Vec::new();
        let last = reader.read_persisted(100, &mut |e| {
            seen.push(e.ts_ns);
            Ok(())
        }).await.unwrap();
        assert!(seen.is_empty());
        assert_eq!(last, 0);
    }
}
