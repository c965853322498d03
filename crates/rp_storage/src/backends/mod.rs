pub mod memory;

pub use memory::MemoryPendingStore;
