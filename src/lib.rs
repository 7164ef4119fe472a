//! Client onboarding: customer registration workflow with pluggable
//! identity, auth, storage, scanner and camera backends.

pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod onboarding;
pub mod scanner;
pub mod store;
pub mod validation;
