pub mod app;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod fs_util;
pub mod ncbi;
pub mod output;
pub mod transport;
pub mod uniprot;
