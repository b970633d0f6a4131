//! Reorderer integration tests
//!
//! End-to-end placement of lists and cards: neighbour resolution, reindex on
//! collision, target validation, access control and concurrent moves.

mod concurrency;
mod create_operations;
mod reindex;
