//! Tests for the ecache-client crate.

mod helpers;
