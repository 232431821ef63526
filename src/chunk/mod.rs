pub mod writer;
pub mod reader;

pub use writer::HalaChunkWriter;
pub use reader::{
  HalaChunkReader,
  HalaDecodedBatch,
  HalaDecodedPrimitive,
};

/// Four-byte chunk tag, the last byte is the chunk version.
pub type HalaChunkMagic = [u8; 4];

pub const CHUNK_MAGIC_VB: HalaChunkMagic = [b'V', b'B', b' ', 0x1];
pub const CHUNK_MAGIC_VBC: HalaChunkMagic = [b'V', b'B', b'C', 0x0];
pub const CHUNK_MAGIC_IB: HalaChunkMagic = [b'I', b'B', b' ', 0x0];
pub const CHUNK_MAGIC_IBC: HalaChunkMagic = [b'I', b'B', b'C', 0x1];
pub const CHUNK_MAGIC_PRI: HalaChunkMagic = [b'P', b'R', b'I', 0x0];

/// Bytes in front of every chunk payload: magic and payload size.
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Printable form of a chunk magic.
/// param magic: The magic.
/// return: The text.
pub fn magic_to_string(magic: &HalaChunkMagic) -> String {
  format!("{}{}{}/{}", magic[0] as char, magic[1] as char, magic[2] as char, magic[3])
}
