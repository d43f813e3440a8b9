//! Integration tests for the composition engine.

mod helpers;

mod engine_test;
mod preload_test;
