// Batch encodings
//
// Materialized batches leave the process as an Arrow IPC stream or a Parquet file.

pub mod ipc;
pub mod parquet;

pub use self::ipc::{deserialize_batch, serialize_batch};
pub use self::parquet::{write_parquet, write_parquet_into};
