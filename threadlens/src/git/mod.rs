//! Git integration.
//!
//! The diff worker runs on a dedicated `std::thread` that holds the
//! `git2::Repository` for its lifetime. History reads for reference discovery
//! open their own handle on a blocking task.
pub mod fetcher;
pub mod types;
pub mod worker;
