//! # Revtrack Architecture
//!
//! Revtrack keeps a revision history for hand-edited text documents, stored beside them in
//! a `.revtrack/` folder as plain text. It is a library with a thin CLI on top, not a CLI
//! with some helpers: the watcher, the binary and the tests all drive the same API.
//!
//! ## The Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (main.rs, args.rs, print.rs)                     │
//! │  - Parses arguments, formats reports, handles signals       │
//! │  - The ONLY place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)               Watcher (watch/)          │
//! │  - Thin facade over commands  ◀── notify + poller threads   │
//! │  - Normalizes paths → keys        liveness marker, session  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - Save pipeline, reconciliation, bumps, archives           │
//! │  - Operates on Rust types, returns serializable reports     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - StorageBackend trait over areas of `.revtrack/`          │
//! │  - FsBackend (production), MemBackend (testing)             │
//! │  - Everything persisted goes through the markup codec       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Documents, Records and Snapshots
//!
//! A tracked document carries a header (a `meta` markup block) with its revision id,
//! e.g. `av1r3`. For each document the store keeps:
//!
//! - a **snapshot**: the content as of the last recorded save, the base of the next diff
//! - a **record**: version, pending save count, referenced documents and the history of
//!   labelled entries (`save:N`, `bumped av1r3`, `renamed ./a -> ./b`, ...)
//!
//! Records are keyed by [`model::StorageKey`], a reversible encoding of the document's
//! path relative to the folder. Histories past the archive threshold are moved to side
//! files under `archive/`, and the record keeps a pointer to each.
//!
//! ## Key Principle: No I/O Assumptions in Core
//!
//! From `api.rs` inward, code:
//! - Takes paths and targets, returns structured reports
//! - **Never** writes to stdout/stderr (diagnostics go through `tracing`)
//! - **Never** calls `std::process::exit`
//!
//! ## Testing Strategy
//!
//! 1. **Commands** (`commands/*.rs`): thorough unit tests over `MemBackend`, with documents
//!    in a temporary folder. This is where most of the testing lives.
//! 2. **Codec and model** (`markup/`, `revision.rs`, `diff.rs`, `header.rs`): pure unit tests.
//! 3. **Engine scenarios** (`tests/engine_scenarios.rs`): `FsBackend` on a real folder.
//! 4. **CLI** (`tests/cli.rs`): the binary, driven through `assert_cmd`.
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade, entry point for all operations
//! - [`commands`]: Business logic for each operation
//! - [`store`]: Storage abstraction, backends and the record codec
//! - [`markup`]: The block/field markup used by every persisted artifact
//! - [`model`]: Records, history entries, storage keys
//! - [`revision`]: Revision ids and their bump rules
//! - [`header`]: Reading and editing a document's header block
//! - [`diff`]: Line diffs between snapshot and document
//! - [`folder`]: The tracked folder, candidate documents and fingerprints
//! - [`watch`]: The watcher controller, marker, session log and registry
//! - [`context`]: Locating the tracked folder for the binary
//! - [`config`]: Per-folder configuration
//! - [`locks`]: Per-key locks
//! - [`error`]: Error types

pub mod api;
pub mod commands;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod folder;
pub mod header;
pub mod locks;
pub mod markup;
pub mod model;
pub mod revision;
pub mod store;
pub mod watch;
