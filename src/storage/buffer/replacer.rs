use std::sync::Mutex;

use log::warn;

use crate::storage::page::FrameId;

/// Replacer tracks the frames that are candidates for eviction in case the
/// buffer pool is full.
pub trait Replacer: Send + Sync {
    /// Remove and return an eviction candidate picked by the replacement
    /// policy. Return None when no frame is currently evictable.
    fn victim(&self) -> Option<FrameId>;

    /// Take the frame out of the candidate set, after the buffer pool
    /// pinned a page into it. Untracked frames are a no-op; an out-of-range
    /// frame id is logged and ignored.
    fn pin(&self, frame_id: FrameId);

    /// Add the frame to the candidate set, after its pin count dropped to
    /// zero, and mark it as recently referenced. If the frame is already
    /// tracked, only the reference mark is refreshed. An out-of-range frame
    /// id is logged and ignored.
    fn unpin(&self, frame_id: FrameId);

    /// Number of frames currently tracked as eviction candidates.
    fn size(&self) -> usize;
}

/// ClockReplacer implements the reference-bit clock (second chance) policy.
///
/// A clock hand sweeps circularly over the frames. A candidate whose
/// reference bit is set has the bit cleared and is passed over once; the
/// first candidate found with a clear reference bit is the victim. At most
/// two full sweeps are needed: the first clears every set bit, the second
/// must find a clear one.
pub struct ClockReplacer {
    members: Vec<bool>,
    referenced: Vec<bool>,
    hand: usize,
    size: usize,
}

impl ClockReplacer {
    pub fn new(num_frames: usize) -> Self {
        ClockReplacer {
            members: vec![false; num_frames],
            referenced: vec![false; num_frames],
            hand: 0,
            size: 0,
        }
    }

    /// Sweep the hand until it rests on a member with a clear reference
    /// bit, then evict that frame. The hand stays on the evicted slot, so
    /// the next sweep continues from there.
    fn victim(&mut self) -> Option<FrameId> {
        if self.size == 0 {
            return None;
        }
        while !(self.members[self.hand] && !self.referenced[self.hand]) {
            if self.referenced[self.hand] {
                self.referenced[self.hand] = false;
            }
            self.hand = (self.hand + 1) % self.members.len();
        }
        self.members[self.hand] = false;
        self.size -= 1;
        Some(self.hand)
    }

    fn pin(&mut self, frame_id: FrameId) {
        if frame_id >= self.members.len() {
            warn!("clock replacer: pin of invalid frame id {}", frame_id);
            return;
        }
        if self.members[frame_id] {
            self.members[frame_id] = false;
            self.referenced[frame_id] = false;
            self.size -= 1;
        }
    }

    fn unpin(&mut self, frame_id: FrameId) {
        if frame_id >= self.members.len() {
            warn!("clock replacer: unpin of invalid frame id {}", frame_id);
            return;
        }
        if !self.members[frame_id] {
            self.members[frame_id] = true;
            self.size += 1;
        }
        self.referenced[frame_id] = true;
    }

    fn size(&self) -> usize {
        self.size
    }
}

/// SyncClockReplacer is the thread-safe version of ClockReplacer, basically
/// all the heavy lifting happens in the ClockReplacer.
pub struct SyncClockReplacer {
    inner: Mutex<ClockReplacer>,
}

impl SyncClockReplacer {
    pub fn new(num_frames: usize) -> Self {
        SyncClockReplacer { inner: Mutex::new(ClockReplacer::new(num_frames)) }
    }
}

impl Replacer for SyncClockReplacer {
    fn victim(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock().unwrap();
        guard.victim()
    }

    fn pin(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.pin(frame_id)
    }

    fn unpin(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.unpin(frame_id)
    }

    fn size(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.size()
    }
}
