//! End-to-end tests at the index API level.
//!
//! Each test file covers a specific scenario, using deterministic inputs
//! (fixed key sequences or seeded shuffles) to exercise the whole insert,
//! split, flush and reopen cycle.

#![cfg(test)]

mod helpers;

mod test_corrupt_files;
mod test_degree_four;
mod test_descending_inserts;
mod test_determinism;
mod test_file_growth;
mod test_many_inserts;
mod test_reopen;
mod test_split_factor;
mod test_update_overwrites;
