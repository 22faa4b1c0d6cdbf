//! No library surface of its own — this crate exists to host the
//! end-to-end scenario tests under `tests/`, run against the public
//! `ratectl_core` API the way `crates/cli` wires it together.
