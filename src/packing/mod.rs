pub mod packer;

pub use packer::{batch_size, pack_all, pop_batch, BatchPacker};
