//! Error type tests.

mod aggregate_tests;
