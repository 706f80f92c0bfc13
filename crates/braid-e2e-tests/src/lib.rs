//! End-to-end tests for the braid compiler live in `tests/`.
//!
//! The shared harness (`tests/common/mod.rs`) forges IR the way the
//! pass-builder facade would and executes compiled plans against
//! host-side buffer storage.
