//! Word clouds from the lyrics of a listener's top tracks.

pub mod analysis;
pub mod batch;
pub mod config;
pub mod job;
pub mod lyrics;
pub mod publish;
pub mod render;
pub mod storage;
pub mod tracks;
