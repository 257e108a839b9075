//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own session state, access decisions and persistence
//! concerns so route handlers can stay focused on protocol translation and
//! cookie plumbing.

pub mod guard;
pub mod profile;
pub mod quiz_section;
pub mod session;
pub mod sweeper;
