pub mod cache;
pub mod compile;
pub mod doctor;
pub mod fingerprint;
pub mod schedule;
pub mod validate;
