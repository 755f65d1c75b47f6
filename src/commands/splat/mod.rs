pub mod batch;
pub mod convert;
pub mod splat_utils;
