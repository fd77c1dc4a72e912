//! Element tests.
