//! Models and scenario documents shared by the end-to-end tests.

pub mod models;
mod scenario;

pub use scenario::{Scenario, ScenarioError};
