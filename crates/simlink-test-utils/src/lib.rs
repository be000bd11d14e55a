//! Test utilities for simlink development.
//!
//! Provides [`MockEngine`], an engine stand-in that runs on a thread and
//! speaks the shared-memory protocol over an in-process namespace, plus
//! agent and session fixtures.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod mock;

pub use fixtures::{connect, sphere_definition, test_config, uav_definition, Harness};
pub use mock::{FillMode, MockCommand, MockEngine, WorldSettings};
