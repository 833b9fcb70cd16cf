//! Test doubles for the portal's remote collaborators.
//!
//! `MemoryAuth`, `MemoryTable` and `MemoryStorage` implement the ports
//! directly; `FakeBackend` serves the same state over HTTP for adapter tests.
//! Use from integration tests only, never from production code.

pub mod auth;
pub mod backend;
pub mod storage;
pub mod table;

pub use auth::MemoryAuth;
pub use backend::FakeBackend;
pub use storage::MemoryStorage;
pub use table::{Fault, MemoryTable, TableOp};
