use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};

/// In-flight reassembly state for one parent.
#[derive(Debug, Clone)]
struct PartialMessage<T> {
    expected: u32,
    /// Slices keyed by their 1-based chunk index.
    chunks: BTreeMap<u32, Vec<T>>,
}

/// Reassembles chunked messages, one buffer per parent id.
///
/// Chunks may arrive in any order; the payload is released in ascending index
/// order once every index in `1..=expected` has been seen. A sequence with a
/// permanently missing chunk stays buffered until a message with a different
/// `chunk_count` or an error for the same parent replaces it.
#[derive(Debug, Clone)]
pub struct ChunkBuffer<T> {
    buffers: HashMap<String, PartialMessage<T>>,
}

impl<T> Default for ChunkBuffer<T> {
    fn default() -> Self {
        Self {
            buffers: HashMap::new(),
        }
    }
}

impl<T> ChunkBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts one slice and returns the complete payload when available.
    ///
    /// Messages without chunk metadata, or declaring at most one chunk, pass
    /// straight through. `None` means the caller has nothing to apply yet.
    pub fn merge_chunk(
        &mut self,
        parent_id: &str,
        chunk_index: Option<u32>,
        chunk_count: Option<u32>,
        slice: Vec<T>,
    ) -> Option<Vec<T>> {
        let (index, expected) = match (chunk_index, chunk_count) {
            (Some(index), Some(count)) if count > 1 => (index, count),
            _ => return Some(slice),
        };

        if index == 0 || index > expected {
            warn!(
                "Ignoring chunk {}/{} for {}: index out of range",
                index, expected, parent_id
            );
            return None;
        }

        let buffer = self
            .buffers
            .entry(parent_id.to_string())
            .or_insert_with(|| PartialMessage {
                expected,
                chunks: BTreeMap::new(),
            });

        if buffer.expected != expected {
            debug!(
                "Chunk count for {} changed from {} to {}, discarding {} buffered chunk(s)",
                parent_id,
                buffer.expected,
                expected,
                buffer.chunks.len()
            );
            buffer.expected = expected;
            buffer.chunks.clear();
        }

        buffer.chunks.insert(index, slice);

        if buffer.chunks.len() < expected as usize {
            return None;
        }

        let complete = self.buffers.remove(parent_id)?;
        debug!(
            "Reassembled {} chunk(s) for {}",
            complete.expected, parent_id
        );
        Some(complete.chunks.into_values().flatten().collect())
    }

    /// Drops any partial sequence for `parent_id`.
    ///
    /// Returns whether a buffer was discarded.
    pub fn discard(&mut self, parent_id: &str) -> bool {
        self.buffers.remove(parent_id).is_some()
    }

    pub fn is_buffering(&self, parent_id: &str) -> bool {
        self.buffers.contains_key(parent_id)
    }

    /// Parents with an incomplete sequence, sorted by id.
    pub fn pending_parents(&self) -> Vec<String> {
        let mut parents: Vec<String> = self.buffers.keys().cloned().collect();
        parents.sort();
        parents
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}
