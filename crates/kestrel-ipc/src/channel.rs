//! Shared notification channel.
//!
//! A one-slot, overwrite-on-publish region of shared memory used in both
//! directions between the compositor and the taskbar. Readers poll once per
//! frame tick; there is no push path.
//!
//! # Region layout
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | magic (`KSTL`)                          |
//! | 4      | 4    | payload length                          |
//! | 8      | 8    | sequence (seqlock, odd while writing)   |
//! | 16     | ..   | payload: one JSON encoded [`Record`]    |
//!
//! Every publish advances the sequence by two, so a reader can tell how many
//! records it never saw.

use crate::Record;
use memmap2::{MmapMut, MmapOptions};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

const MAGIC: u32 = u32::from_le_bytes(*b"KSTL");
const MAGIC_OFFSET: usize = 0;
const LEN_OFFSET: usize = 4;
const SEQ_OFFSET: usize = 8;

/// Bytes reserved ahead of the payload
pub const HEADER_LEN: usize = 16;

/// Spins before a writer assumes the previous writer died mid-publish
const WRITE_SPIN_LIMIT: u32 = 1 << 16;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("record of {len} bytes exceeds channel capacity of {capacity} bytes")]
    PayloadTooLarge { len: usize, capacity: usize },

    #[error("channel capacity of {0} bytes leaves no room after the header")]
    CapacityTooSmall(usize),

    #[error("{0} is not a kestrel notification channel")]
    BadMagic(PathBuf),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle on a mapped notification region.
///
/// Each handle tracks the last sequence it has seen (or written), so polling
/// never hands a process back its own record.
pub struct SharedChannel {
    map: MmapMut,
    base: *mut u8,
    capacity: usize,
    last_seq: u64,
    /// Records overwritten before this handle could poll them
    dropped: u64,
    path: Option<PathBuf>,
    owner: bool,
}

impl SharedChannel {
    /// Create a fresh region file at `path`, replacing any stale one.
    ///
    /// The creating handle owns the file and unlinks it on drop.
    pub fn create(path: impl AsRef<Path>, capacity: usize) -> Result<Self, ChannelError> {
        let path = path.as_ref();
        if capacity <= HEADER_LEN {
            return Err(ChannelError::CapacityTooSmall(capacity));
        }

        if path.exists() {
            fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(capacity as u64)?;

        // SAFETY: the file was just created by us and sized to `capacity`;
        // concurrent access from the peer goes through the seqlock below.
        let map = unsafe { MmapOptions::new().len(capacity).map_mut(&file)? };

        let mut channel = Self::from_map(map, Some(path.to_path_buf()), true);
        channel.magic().store(MAGIC, Ordering::Relaxed);
        channel.len_word().store(0, Ordering::Relaxed);
        channel.seq().store(0, Ordering::Release);
        channel.last_seq = 0;

        debug!("Created notification channel at {:?} ({} bytes)", path, capacity);
        Ok(channel)
    }

    /// Attach to a region created by another process.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChannelError> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let capacity = file.metadata()?.len() as usize;
        if capacity <= HEADER_LEN {
            return Err(ChannelError::BadMagic(path.to_path_buf()));
        }

        // SAFETY: see `create`; the region is only touched through atomics
        // and seqlock-guarded copies.
        let map = unsafe { MmapOptions::new().len(capacity).map_mut(&file)? };
        let channel = Self::from_map(map, Some(path.to_path_buf()), false);

        if channel.magic().load(Ordering::Relaxed) != MAGIC {
            return Err(ChannelError::BadMagic(path.to_path_buf()));
        }

        debug!("Attached to notification channel at {:?}", path);
        Ok(channel)
    }

    /// Process-private region, for running without a taskbar.
    pub fn anonymous(capacity: usize) -> Result<Self, ChannelError> {
        if capacity <= HEADER_LEN {
            return Err(ChannelError::CapacityTooSmall(capacity));
        }
        let map = MmapMut::map_anon(capacity)?;
        let channel = Self::from_map(map, None, false);
        channel.magic().store(MAGIC, Ordering::Relaxed);
        Ok(channel)
    }

    fn from_map(mut map: MmapMut, path: Option<PathBuf>, owner: bool) -> Self {
        let capacity = map.len();
        let base = map.as_mut_ptr();
        Self {
            map,
            base,
            capacity,
            last_seq: 0,
            dropped: 0,
            path,
            owner,
        }
    }

    /// Largest payload a single record may occupy
    pub fn payload_capacity(&self) -> usize {
        self.capacity - HEADER_LEN
    }

    /// Region file backing this channel, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Sequence of the record currently in the slot
    pub fn sequence(&self) -> u64 {
        self.seq().load(Ordering::Acquire)
    }

    /// Number of peer records this handle never saw
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Overwrite the slot with `record`.
    ///
    /// Oversized records are rejected and the previous record stays in place.
    /// Returns the sequence assigned to the new record.
    pub fn publish(&mut self, record: &Record) -> Result<u64, ChannelError> {
        let payload = record.encode()?;
        if payload.len() > self.payload_capacity() {
            return Err(ChannelError::PayloadTooLarge {
                len: payload.len(),
                capacity: self.payload_capacity(),
            });
        }

        let base_seq = self.begin_write();
        self.len_word().store(payload.len() as u32, Ordering::Relaxed);
        // SAFETY: payload fits behind the header (checked above) and the
        // odd sequence keeps readers from trusting a partial copy.
        unsafe {
            ptr::copy_nonoverlapping(payload.as_ptr(), self.base.add(HEADER_LEN), payload.len());
        }
        let seq = base_seq + 2;
        self.seq().store(seq, Ordering::Release);

        if base_seq != self.last_seq {
            debug!(
                "Overwrote unread record (seq {}) with {:?}",
                base_seq, record.action
            );
        }
        self.last_seq = seq;

        Ok(seq)
    }

    /// Read the slot if it changed since the last poll or publish.
    ///
    /// Returns `None` when nothing new is there, when a write is in progress,
    /// or when the payload cannot be decoded.
    pub fn poll(&mut self) -> Option<Record> {
        let before = self.seq().load(Ordering::Acquire);
        if before == self.last_seq || before % 2 == 1 {
            return None;
        }

        let len = self.len_word().load(Ordering::Relaxed) as usize;
        if len > self.payload_capacity() {
            return None;
        }
        let mut payload = vec![0u8; len];
        // SAFETY: `len` is bounded by the payload capacity.
        unsafe {
            ptr::copy_nonoverlapping(self.base.add(HEADER_LEN), payload.as_mut_ptr(), len);
        }
        fence(Ordering::Acquire);
        if self.seq().load(Ordering::Relaxed) != before {
            // Torn read, pick it up on the next tick
            return None;
        }

        let skipped = (before.wrapping_sub(self.last_seq) / 2).saturating_sub(1);
        if skipped > 0 {
            self.dropped += skipped;
            warn!("Notification channel dropped {} unread record(s)", skipped);
        }
        self.last_seq = before;

        match Record::decode(&payload) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Ignoring undecodable notification: {}", e);
                None
            }
        }
    }

    /// Claim the slot; returns the even sequence the write started from.
    fn begin_write(&self) -> u64 {
        let seq = self.seq();
        let mut spins = 0;
        loop {
            let current = seq.load(Ordering::Acquire);
            if current % 2 == 0 {
                if seq
                    .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    return current;
                }
            } else if spins >= WRITE_SPIN_LIMIT {
                // Previous writer never finished; take the slot over.
                if seq
                    .compare_exchange(current, current + 2, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    warn!("Recovered notification channel from an interrupted write");
                    return current + 1;
                }
            }
            spins += 1;
            std::hint::spin_loop();
        }
    }

    fn magic(&self) -> &AtomicU32 {
        // SAFETY: the mapping is page aligned and longer than the header.
        unsafe { AtomicU32::from_ptr(self.base.add(MAGIC_OFFSET).cast()) }
    }

    fn len_word(&self) -> &AtomicU32 {
        // SAFETY: as for `magic`.
        unsafe { AtomicU32::from_ptr(self.base.add(LEN_OFFSET).cast()) }
    }

    fn seq(&self) -> &AtomicU64 {
        // SAFETY: as for `magic`; offset 8 keeps the word 8-byte aligned.
        unsafe { AtomicU64::from_ptr(self.base.add(SEQ_OFFSET).cast()) }
    }
}

impl Drop for SharedChannel {
    fn drop(&mut self) {
        if let Err(e) = self.map.flush() {
            debug!("Failed to flush notification channel: {}", e);
        }
        if self.owner {
            if let Some(path) = &self.path {
                if let Err(e) = fs::remove_file(path) {
                    debug!("Failed to remove channel file {:?}: {}", path, e);
                }
            }
        }
    }
}

impl std::fmt::Debug for SharedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedChannel")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("last_seq", &self.last_seq)
            .field("dropped", &self.dropped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, COMPOSITOR_CLIENT, TASKBAR_CLIENT};

    fn pair(capacity: usize) -> (tempfile::TempDir, SharedChannel, SharedChannel) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bar.shm");
        let writer = SharedChannel::create(&path, capacity).unwrap();
        let reader = SharedChannel::open(&path).unwrap();
        (dir, writer, reader)
    }

    fn add(id: u64) -> Record {
        Record::from_compositor(Action::AddWindow {
            window_id: id,
            app_id: "foot".into(),
            title: "Terminal".into(),
        })
    }

    #[test]
    fn test_poll_sees_peer_publish() {
        let (_dir, mut compositor, mut bar) = pair(4096);

        assert!(bar.poll().is_none());
        compositor.publish(&add(1)).unwrap();

        let record = bar.poll().unwrap();
        assert!(record.is_from(COMPOSITOR_CLIENT));
        assert_eq!(record, add(1));
        // Unchanged slot yields nothing
        assert!(bar.poll().is_none());
    }

    #[test]
    fn test_own_publish_is_not_polled_back() {
        let (_dir, mut compositor, mut bar) = pair(4096);

        bar.publish(&Record::from_taskbar(Action::FocusWindow { window_id: 3 }))
            .unwrap();
        assert!(bar.poll().is_none());

        let record = compositor.poll().unwrap();
        assert!(record.is_from(TASKBAR_CLIENT));
    }

    #[test]
    fn test_second_publish_overwrites_first() {
        let (_dir, mut compositor, mut bar) = pair(4096);

        compositor.publish(&add(9)).unwrap();
        compositor
            .publish(&Record::from_compositor(Action::RemoveWindow { window_id: 9 }))
            .unwrap();

        let record = bar.poll().unwrap();
        assert_eq!(record.action, Action::RemoveWindow { window_id: 9 });
        assert!(bar.poll().is_none());
    }

    #[test]
    fn test_sequence_advances_by_two() {
        let (_dir, mut compositor, _bar) = pair(4096);
        assert_eq!(compositor.publish(&add(1)).unwrap(), 2);
        assert_eq!(compositor.publish(&add(2)).unwrap(), 4);
        assert_eq!(compositor.sequence(), 4);
    }

    #[test]
    fn test_oversized_record_keeps_previous() {
        let (_dir, mut compositor, mut bar) = pair(128);

        compositor.publish(&add(1)).unwrap();
        let huge = Record::from_compositor(Action::AddWindow {
            window_id: 2,
            app_id: "x".repeat(200),
            title: String::new(),
        });

        match compositor.publish(&huge) {
            Err(ChannelError::PayloadTooLarge { capacity, .. }) => {
                assert_eq!(capacity, 128 - HEADER_LEN)
            }
            other => panic!("expected PayloadTooLarge, got {:?}", other),
        }
        assert_eq!(bar.poll().unwrap(), add(1));
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk");
        fs::write(&path, vec![0u8; 64]).unwrap();

        assert!(matches!(
            SharedChannel::open(&path),
            Err(ChannelError::BadMagic(_))
        ));
    }

    #[test]
    fn test_creator_unlinks_region_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bar.shm");
        {
            let _channel = SharedChannel::create(&path, 4096).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_capacity_must_exceed_header() {
        assert!(matches!(
            SharedChannel::anonymous(HEADER_LEN),
            Err(ChannelError::CapacityTooSmall(_))
        ));
        let channel = SharedChannel::anonymous(4096).unwrap();
        assert_eq!(channel.payload_capacity(), 4096 - HEADER_LEN);
    }

    #[test]
    fn test_poll_counts_overwritten_records() {
        let (_dir, mut compositor, mut bar) = pair(4096);
        for id in 1..=3 {
            compositor.publish(&add(id)).unwrap();
        }

        assert_eq!(bar.poll().unwrap(), add(3));
        assert_eq!(bar.dropped(), 2);

        compositor.publish(&add(4)).unwrap();
        bar.poll().unwrap();
        assert_eq!(bar.dropped(), 2);
    }

    #[test]
    fn test_write_in_progress_is_not_read() {
        let (_dir, mut compositor, mut bar) = pair(4096);
        compositor.publish(&add(1)).unwrap();
        assert_eq!(bar.poll().unwrap(), add(1));

        // A writer that died after claiming the slot leaves the sequence odd
        compositor.seq().store(3, Ordering::Release);
        compositor.len_word().store(5, Ordering::Relaxed);
        assert!(bar.poll().is_none());
        assert!(bar.poll().is_none());

        // The next writer takes the slot over after spinning
        let seq = compositor.publish(&add(2)).unwrap();
        assert_eq!(seq % 2, 0);
        assert!(seq > 3);
        assert_eq!(bar.poll().unwrap(), add(2));
    }

    #[test]
    fn test_concurrent_publish_never_yields_torn_record() {
        const RECORDS: u64 = 2000;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stress.shm");
        let _owner = SharedChannel::create(&path, 4096).unwrap();
        let mut reader = SharedChannel::open(&path).unwrap();

        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            let mut channel = SharedChannel::open(&writer_path).unwrap();
            for id in 0..RECORDS {
                let record = Record::from_compositor(Action::AddWindow {
                    window_id: id,
                    app_id: format!("app-{}", id),
                    title: "t".repeat((id % 97) as usize),
                });
                channel.publish(&record).unwrap();
            }
        });

        let mut last_seen = None;
        let mut polls = 0u64;
        while last_seen != Some(RECORDS - 1) {
            polls += 1;
            assert!(polls < 50_000_000, "reader never saw the final record");
            let Some(record) = reader.poll() else {
                std::hint::spin_loop();
                continue;
            };
            match record.action {
                Action::AddWindow {
                    window_id,
                    app_id,
                    title,
                } => {
                    assert_eq!(app_id, format!("app-{}", window_id));
                    assert_eq!(title.len() as u64, window_id % 97);
                    if let Some(previous) = last_seen {
                        assert!(window_id > previous);
                    }
                    last_seen = Some(window_id);
                }
                other => panic!("unexpected record {:?}", other),
            }
        }

        writer.join().unwrap();
    }
}
