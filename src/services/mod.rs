pub mod interface_batch;
pub mod usage_sync;
