//! Test suites for the plexus server core.

mod behaviour;
pub(crate) mod support;
