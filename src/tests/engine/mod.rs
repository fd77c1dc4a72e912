//! Engine lifecycle tests.

mod lifecycle_tests;
mod growth_tests;
