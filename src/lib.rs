pub mod cli;
pub mod host;
pub mod metadata;
pub mod nodes;
pub mod storage;
