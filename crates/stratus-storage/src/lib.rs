pub mod azure;
pub mod factory;
pub mod gcs;
pub mod local;
pub mod provider;
pub mod s3;
pub mod storage;
pub mod transfer;

pub use provider::{ContainerApi, StagedBlock, TransferAdapter, UploadTicket};
pub use storage::{StorageInstance, StorageProvider};
pub use transfer::{BlockError, BlockSink, BlockSource, TransferReport};
