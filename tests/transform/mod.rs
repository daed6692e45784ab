//! Integration tests for compiled parameter transformations

mod explicit_tests;
mod implicit_tests;
