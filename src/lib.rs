//! Library crate for the disk report tool

pub mod aggregator;
pub mod boundary;
pub mod config;
pub mod error;
pub mod extract;
pub mod formats;
pub mod observer;
pub mod plugins;
pub mod publish;
pub mod report;
pub mod target;

// CLI modules
pub mod cli {
    pub mod args;
}
