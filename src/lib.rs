//! korekushon library.
//!
//! A categorized link directory ("コレクション") with threaded comments and
//! per-user favorite collections. Persistence, identity and file storage are
//! delegated to a hosted data platform; this crate is the web UI, the
//! in-process prefetch cache and the request/response glue around the
//! platform's HTTP API.

pub mod comments;
pub mod components;
pub mod config;
pub mod favorites;
pub mod platform;
pub mod prefetch;
pub mod store;
pub mod watch;
pub mod web;
