//! 具体展示端实现

pub mod local_file;
pub mod memory;

pub use local_file::LocalFileSink;
pub use memory::MemorySink;
