//! Test support shared by the platform crates: the per-binary logging
//! initializer and an in-memory JSON log capture for assertions on log output.

pub mod test_logging;
