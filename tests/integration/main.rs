//! Integration test suite entry point.

mod cli_tests;
mod end_to_end;
mod fixture;
