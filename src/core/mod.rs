pub mod capture_source;
pub mod finalize;
pub mod marker;
pub mod pipeline;
pub mod ring_buffer;
pub mod session;
pub mod write_queue;
pub mod writer_task;
