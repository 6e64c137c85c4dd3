//! Tests for commit coordinators, builders and the registry

mod registry_tests;
