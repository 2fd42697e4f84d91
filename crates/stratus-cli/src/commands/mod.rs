pub mod buckets;
pub mod config;
pub mod init;
pub mod objects;
pub mod providers;
pub mod transfer;
