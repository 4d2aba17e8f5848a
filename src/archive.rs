//! Streaming zip assembly.
//!
//! The archive is produced incrementally while document fetches are still in
//! flight: a blocking writer task owns the [`zip::ZipWriter`] and feeds
//! finished byte ranges into a channel that backs the HTTP response body.
//! The zip format patches each local header after its data is written, so
//! the sink keeps the current entry in a small window buffer and ships the
//! window once the writer seeks past it. Memory stays bounded by one entry
//! plus the central directory, never the whole archive.
//!
//! Entries are spooled until their source stream completes, so a document
//! that errors mid-read is dropped without leaving a half-written entry in
//! the archive.

use crate::error::{Error, ExportError, Result};
use bytes::Bytes;
use std::collections::HashSet;
use std::io::{self, Seek, SeekFrom, Write};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use zip::write::{FileOptions, ZipWriter};

/// Entry written when an export produces no documents at all
pub(crate) const PLACEHOLDER_ENTRY_NAME: &str = "notice.txt";

/// Body of the placeholder entry
pub(crate) const PLACEHOLDER_ENTRY_TEXT: &str =
    "No invoice documents were available for this export.\n";

/// Commands accepted by the blocking writer task
enum ArchiveCommand {
    /// Begin spooling a new entry under the given name
    StartEntry { name: String },
    /// Append bytes to the entry being spooled
    Chunk(Bytes),
    /// Commit the spooled entry to the archive
    FinishEntry,
    /// Discard the spooled entry without writing it
    AbortEntry,
    /// Write the central directory and flush everything downstream
    Finalize,
}

/// What a finalized archive ended up containing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArchiveOutcome {
    /// Entries committed to the archive (excluding the placeholder)
    pub entries: usize,
    /// Whether the placeholder entry was written instead of documents
    pub placeholder: bool,
}

/// Write half of a streamed zip archive
///
/// Cheap handle over a blocking writer task. Dropping it without calling
/// [`ArchiveWriter::finish`] abandons the archive mid-stream, which the
/// receiving side observes as a truncated download.
pub struct ArchiveWriter {
    cmd_tx: mpsc::Sender<ArchiveCommand>,
    join: tokio::task::JoinHandle<Result<ArchiveOutcome>>,
}

impl ArchiveWriter {
    /// Command channel depth; keeps a slow client from unbounded spooling
    const COMMAND_BUFFER: usize = 16;

    /// Spawn the writer task emitting archive bytes into `body_tx`
    pub fn spawn(body_tx: mpsc::Sender<Bytes>) -> Self {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(Self::COMMAND_BUFFER);
        let join =
            tokio::task::spawn_blocking(move || run_writer(&mut cmd_rx, body_tx));
        Self { cmd_tx, join }
    }

    /// Begin a new entry
    pub async fn start_entry(&self, name: impl Into<String>) -> Result<()> {
        self.send(ArchiveCommand::StartEntry { name: name.into() })
            .await
    }

    /// Append a chunk of the current entry's bytes
    pub async fn append_chunk(&self, data: Bytes) -> Result<()> {
        self.send(ArchiveCommand::Chunk(data)).await
    }

    /// Commit the current entry
    pub async fn finish_entry(&self) -> Result<()> {
        self.send(ArchiveCommand::FinishEntry).await
    }

    /// Drop the current entry without committing it
    pub async fn abort_entry(&self) -> Result<()> {
        self.send(ArchiveCommand::AbortEntry).await
    }

    /// Finalize the archive and wait for the writer to drain
    ///
    /// Returns what the archive contains, or the writer's failure. Safe to
    /// call after an earlier command failed; the join result carries the
    /// real outcome either way.
    pub async fn finish(self) -> Result<ArchiveOutcome> {
        // The writer may already be gone; its join result is authoritative
        let _ = self.cmd_tx.send(ArchiveCommand::Finalize).await;
        drop(self.cmd_tx);

        match self.join.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Export(ExportError::ArchiveFailure {
                reason: "archive writer task failed".to_string(),
            })),
        }
    }

    async fn send(&self, cmd: ArchiveCommand) -> Result<()> {
        // A closed command channel means the writer stopped early, which
        // only happens once the downstream body is gone
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| Error::Export(ExportError::StreamAborted))
    }
}

/// Blocking loop owning the zip writer
fn run_writer(
    cmd_rx: &mut mpsc::Receiver<ArchiveCommand>,
    body_tx: mpsc::Sender<Bytes>,
) -> Result<ArchiveOutcome> {
    let sink = ChannelSink::new(body_tx);
    let mut zip = ZipWriter::new(sink);
    let options = FileOptions::default();

    let mut used_names: HashSet<String> = HashSet::new();
    let mut pending: Option<(String, Vec<u8>)> = None;
    let mut entries = 0usize;

    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            ArchiveCommand::StartEntry { name } => {
                if pending.is_some() {
                    warn!("previous archive entry was never closed, dropping it");
                }
                pending = Some((name, Vec::new()));
            }
            ArchiveCommand::Chunk(data) => {
                if let Some((_, spool)) = pending.as_mut() {
                    spool.extend_from_slice(&data);
                }
            }
            ArchiveCommand::FinishEntry => {
                if let Some((name, spool)) = pending.take() {
                    let entry_name = unique_entry_name(&mut used_names, name);
                    debug!(entry = %entry_name, size = spool.len(), "committing archive entry");
                    zip.start_file(&entry_name, options).map_err(zip_failure)?;
                    zip.write_all(&spool).map_err(write_failure)?;
                    entries += 1;
                }
            }
            ArchiveCommand::AbortEntry => {
                pending = None;
            }
            ArchiveCommand::Finalize => {
                let placeholder = entries == 0;
                if placeholder {
                    zip.start_file(PLACEHOLDER_ENTRY_NAME, options)
                        .map_err(zip_failure)?;
                    zip.write_all(PLACEHOLDER_ENTRY_TEXT.as_bytes())
                        .map_err(write_failure)?;
                }
                let sink = zip.finish().map_err(zip_failure)?;
                sink.finish().map_err(write_failure)?;
                return Ok(ArchiveOutcome {
                    entries,
                    placeholder,
                });
            }
        }
    }

    // Command channel closed without Finalize: the export was abandoned
    Err(Error::Export(ExportError::StreamAborted))
}

/// Map a zip-level error, keeping disconnects distinct from writer bugs
fn zip_failure(e: zip::result::ZipError) -> Error {
    match e {
        zip::result::ZipError::Io(io_err) if io_err.kind() == io::ErrorKind::BrokenPipe => {
            Error::Export(ExportError::StreamAborted)
        }
        other => Error::Export(ExportError::ArchiveFailure {
            reason: other.to_string(),
        }),
    }
}

/// Map a raw write error, keeping disconnects distinct from writer bugs
fn write_failure(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::BrokenPipe {
        Error::Export(ExportError::StreamAborted)
    } else {
        Error::Export(ExportError::ArchiveFailure {
            reason: e.to_string(),
        })
    }
}

/// Disambiguate duplicate entry names with a numeric suffix before the
/// extension: `in_1.pdf`, `in_1-2.pdf`, `in_1-3.pdf`.
fn unique_entry_name(used: &mut HashSet<String>, name: String) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = match name.rfind('.') {
        Some(idx) => (&name[..idx], &name[idx..]),
        None => (name.as_str(), ""),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}{}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// `Write + Seek` adapter between the zip writer and a byte channel
///
/// The zip writer only ever seeks backward to patch the local header of the
/// entry it just wrote, then seeks forward to the entry's end. Bytes below
/// `base` have been shipped and are immutable; the window `buf` holds
/// everything from `base` to the highest position written so far. A seek to
/// exactly the window end marks the entry as patched and complete, which is
/// the one safe moment to ship the window downstream.
struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    /// Unshipped bytes starting at stream offset `base`
    buf: Vec<u8>,
    /// Stream offset of `buf[0]`
    base: u64,
    /// Current logical write position, always within [base, base + buf.len()]
    pos: u64,
}

impl ChannelSink {
    fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            tx,
            buf: Vec::new(),
            base: 0,
            pos: 0,
        }
    }

    /// Send the whole window downstream and advance `base` past it
    fn ship_window(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::take(&mut self.buf));
        self.base += chunk.len() as u64;
        self.tx.blocking_send(chunk).map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "archive receiver went away")
        })
    }

    /// Ship everything up to the final write position and close the sink
    ///
    /// Called after the central directory is written. Anything past `pos`
    /// would be stale bytes from a rewound write and must not reach the
    /// receiver.
    fn finish(mut self) -> io::Result<()> {
        let keep = (self.pos - self.base) as usize;
        self.buf.truncate(keep);
        self.ship_window()
    }
}

impl Write for ChannelSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let offset = (self.pos - self.base) as usize;
        if offset > self.buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "write past the end of the window",
            ));
        }

        let overlap = (self.buf.len() - offset).min(data.len());
        self.buf[offset..offset + overlap].copy_from_slice(&data[..overlap]);
        if overlap < data.len() {
            self.buf.extend_from_slice(&data[overlap..]);
        }

        self.pos += data.len() as u64;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Flushing must not ship: the entry in the window may still get its
        // header patched
        Ok(())
    }
}

impl Seek for ChannelSink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let window_end = self.base + self.buf.len() as u64;

        let target = match pos {
            SeekFrom::Start(p) => {
                if p == window_end {
                    // The writer is repositioning to the end of a fully
                    // patched entry; the window is final
                    self.ship_window()?;
                }
                p
            }
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "seek before stream start")
            })?,
            SeekFrom::End(delta) => window_end.checked_add_signed(delta).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "seek before stream start")
            })?,
        };

        if target < self.base {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek below the shipped window",
            ));
        }
        let window_end = self.base + self.buf.len() as u64;
        if target > window_end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek past the end of written data",
            ));
        }

        self.pos = target;
        Ok(target)
    }
}
