//! Property test suite entry point.

mod normalizer_props;
mod reducer_props;
