//! Headless driver for streamed site builds.
//!
//! ## Provider bootstrap
//!
//! The provider is chosen by `BUILDER_PROVIDER`:
//!
//! - `mock` (default) replays a scripted React project with demo delays;
//! - `http` talks to the backend at `BUILDER_BACKEND_URL`
//!   (default `http://localhost:3000`), optionally bounded by
//!   `BUILDER_REQUEST_TIMEOUT_SECS`.
//!
//! ## Session contract
//!
//! [`session::BuildSession`] is the only owner of transcript, steps and tree.
//! [`runtime::SessionRuntime`] runs provider calls on worker threads and
//! applies their events on the caller's thread, so every published snapshot
//! is consistent. A failed or cancelled turn restores the steps and tree from
//! the turn start; earlier turns are never touched.

pub mod config;
pub mod logging;
pub mod providers;
pub mod runtime;
pub mod session;
