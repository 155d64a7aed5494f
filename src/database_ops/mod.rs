//! Target side: connection, page sinks and the batch writer.
pub mod db;
pub mod memory;
pub mod postgres;
pub mod sink;
pub mod writer;

pub use db::Db;
pub use memory::MemorySink;
pub use postgres::PostgresSink;
pub use sink::{PageInsert, PageSink};
pub use writer::{BatchWriter, TableReport, WriteReport};
