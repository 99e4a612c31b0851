//! Scenario-based tests for nightwatch

mod helpers;

mod cancellation;
mod command_tasks;
mod failure_handling;
mod sentinel;
