use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use crate::common::types::FrameId;

/// Timestamp drawn from the replacer's monotonic access counter
pub type AccessTimestamp = u64;

/// Misuse of the replacer API. These indicate a protocol violation by the
/// caller and are surfaced loudly rather than swallowed.
#[derive(Error, Debug)]
pub enum ReplacerError {
    #[error("Frame {0} is out of range or not tracked by the replacer")]
    InvalidFrame(FrameId),
    #[error("Frame {0} is not evictable and cannot be removed")]
    NotEvictable(FrameId),
}

/// Per-frame access bookkeeping
struct LruKNode {
    /// Access timestamps, newest first; never longer than K
    history: VecDeque<AccessTimestamp>,
    is_evictable: bool,
}

impl LruKNode {
    fn new(ts: AccessTimestamp) -> Self {
        let mut history = VecDeque::new();
        history.push_front(ts);
        Self {
            history,
            is_evictable: false,
        }
    }

    /// Oldest retained timestamp. Once the history holds K entries this is
    /// the K-th most recent access, i.e. the backward K-distance anchor.
    fn k_th_timestamp(&self) -> AccessTimestamp {
        *self.history.back().unwrap()
    }
}

/// LRU-K page replacement policy.
///
/// The victim is the frame with the largest backward K-distance: the time
/// elapsed since its K-th most recent access. Frames with fewer than K
/// recorded accesses have infinite distance and are victimized first, in
/// order of their first access; among frames with a full history the one
/// with the oldest K-th timestamp loses.
pub struct LruKReplacer {
    nodes: HashMap<FrameId, LruKNode>,
    /// Frames with fewer than K accesses, in first-access order
    less_k: VecDeque<FrameId>,
    /// Frames with at least K accesses, ascending by K-th most recent timestamp
    over_k: VecDeque<FrameId>,
    current_timestamp: AccessTimestamp,
    evictable_count: usize,
    replacer_size: usize,
    k: usize,
}

impl LruKReplacer {
    pub fn new(replacer_size: usize, k: usize) -> Self {
        assert!(k >= 1, "LRU-K requires k >= 1");
        Self {
            nodes: HashMap::new(),
            less_k: VecDeque::new(),
            over_k: VecDeque::new(),
            current_timestamp: 0,
            evictable_count: 0,
            replacer_size,
            k,
        }
    }

    /// Record an access to a frame, creating its node on first sight.
    /// New frames start out non-evictable.
    pub fn record_access(&mut self, frame_id: FrameId) -> Result<(), ReplacerError> {
        if frame_id >= self.replacer_size {
            return Err(ReplacerError::InvalidFrame(frame_id));
        }
        self.current_timestamp += 1;
        let ts = self.current_timestamp;

        if !self.nodes.contains_key(&frame_id) {
            self.nodes.insert(frame_id, LruKNode::new(ts));
            if self.k == 1 {
                // A single access already fills the history.
                self.insert_by_k_distance(frame_id);
            } else {
                self.less_k.push_back(frame_id);
            }
            return Ok(());
        }

        let mut was_full = false;
        let mut now_full = false;
        if let Some(node) = self.nodes.get_mut(&frame_id) {
            was_full = node.history.len() == self.k;
            node.history.push_front(ts);
            if was_full {
                node.history.pop_back();
            }
            now_full = node.history.len() == self.k;
        }

        if was_full {
            // The K-th timestamp advanced; reposition among the
            // full-history frames.
            self.detach(frame_id, true);
            self.insert_by_k_distance(frame_id);
        } else if now_full {
            self.detach(frame_id, false);
            self.insert_by_k_distance(frame_id);
        }
        Ok(())
    }

    /// Toggle whether a frame may be chosen as a victim.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) -> Result<(), ReplacerError> {
        let node = self
            .nodes
            .get_mut(&frame_id)
            .ok_or(ReplacerError::InvalidFrame(frame_id))?;

        if node.is_evictable && !evictable {
            self.evictable_count -= 1;
        } else if !node.is_evictable && evictable {
            self.evictable_count += 1;
        }
        node.is_evictable = evictable;
        Ok(())
    }

    /// Choose, remove, and return the eviction victim: the first evictable
    /// frame of the less-than-K list, else of the full-history list.
    /// Returns None when nothing is evictable.
    pub fn evict(&mut self) -> Option<FrameId> {
        let victim = self
            .less_k
            .iter()
            .chain(self.over_k.iter())
            .copied()
            .find(|f| self.nodes[f].is_evictable)?;
        self.forget(victim);
        Some(victim)
    }

    /// Explicitly drop a tracked frame, e.g. when its page is deleted.
    pub fn remove(&mut self, frame_id: FrameId) -> Result<(), ReplacerError> {
        let node = self
            .nodes
            .get(&frame_id)
            .ok_or(ReplacerError::InvalidFrame(frame_id))?;
        if !node.is_evictable {
            return Err(ReplacerError::NotEvictable(frame_id));
        }
        self.forget(frame_id);
        Ok(())
    }

    /// Number of evictable frames currently tracked
    pub fn size(&self) -> usize {
        self.evictable_count
    }

    /// Drop a frame from the map and from whichever list holds it.
    fn forget(&mut self, frame_id: FrameId) {
        if let Some(node) = self.nodes.remove(&frame_id) {
            if node.is_evictable {
                self.evictable_count -= 1;
            }
            self.detach(frame_id, node.history.len() == self.k);
        }
    }

    fn detach(&mut self, frame_id: FrameId, from_over_k: bool) {
        let list = if from_over_k { &mut self.over_k } else { &mut self.less_k };
        if let Some(pos) = list.iter().position(|&f| f == frame_id) {
            list.remove(pos);
        }
    }

    /// Insert a frame into the full-history list, keeping it sorted by
    /// ascending K-th timestamp.
    fn insert_by_k_distance(&mut self, frame_id: FrameId) {
        let k_th = self.nodes[&frame_id].k_th_timestamp();
        let pos = self
            .over_k
            .iter()
            .position(|f| self.nodes[f].k_th_timestamp() > k_th)
            .unwrap_or(self.over_k.len());
        self.over_k.insert(pos, frame_id);
    }
}
