//! Chunk reassembly for fragmented position updates.

mod chunk_buffer;

pub use chunk_buffer::ChunkBuffer;
