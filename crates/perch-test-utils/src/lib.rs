// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles for the Perch engine: a scriptable [`MockAgent`], a
//! [`ManualClock`], and fixture builders.

pub mod clock;
pub mod fixtures;
pub mod mock_agent;

pub use clock::ManualClock;
pub use fixtures::{scraped_record, sync_outcome};
pub use mock_agent::MockAgent;
