//! Unit tests for stratus CLI

mod activation_chain;
mod property_tests;
mod stack_scenarios;
