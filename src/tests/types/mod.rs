//! Element type, shape and cast tests.

mod cast_tests;
mod shape_tests;
