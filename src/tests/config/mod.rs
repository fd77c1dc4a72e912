//! Configuration and value-scope tests.
