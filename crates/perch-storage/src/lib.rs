// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Perch post scheduler.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread; migrations are embedded via refinery and run on open. Each
//! query function commits independently; the engine's per-unit commit
//! discipline depends on that.

pub mod database;
pub mod migrations;
pub mod queries;
pub mod store;

pub use database::Database;
pub use store::SqliteStore;
