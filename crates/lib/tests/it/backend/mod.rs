//! Backend integration tests
//!
//! Plain lookups and deletion run against the backend selected by
//! TEST_BACKEND. Tests that keep a scope transaction open while reading
//! through the backend use InMemory directly.

mod basic_operations;
mod scope_transactions;
