//! Purpose: Kernel-side bridge between notebook data and a browser signal plotter.
//! Exports: `core` (path expansion, staging, fetching, array model) and `api` (sessions).
//! Role: Library backing the `sigplot-bridge` binary and any embedding kernel.
//! Invariants: All work is synchronous on the caller's thread.
//! Invariants: The staging directory is shared; staging is idempotent per basename.
pub mod api;
pub mod core;
