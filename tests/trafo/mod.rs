//! Integration tests for building Trafos with define, insert and branch

mod verbs_tests;
