//! Inferring samples from read filenames and bringing those filenames into
//! the canonical convention.

pub mod mapper;
pub mod normalize;
pub mod pattern;
pub mod record;
