//! Integration tests for the composition operators

mod objective_tests;
mod operator_tests;
