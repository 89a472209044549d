//! Per-file checks: archive integrity and checksums.

pub mod checksum;
pub mod integrity;
