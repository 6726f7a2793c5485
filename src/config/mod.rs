//! Configuration module for the template deployer.
//!
//! This module handles run-wide settings:
//! - Registry connection settings and `.env` loading
//! - CI provenance and the per-run deployment stamp

mod provenance;
mod settings;

pub use provenance::{
    DeploymentStamp, Provenance, GITHUB_RUN_ID_ENV, GITHUB_SHA_ENV, GIT_SHA_ENV, TIMESTAMP_FORMAT,
};
pub use settings::{
    access_token, load_dotenv, RegistryConfig, ACCESS_TOKEN_ENV, DEFAULT_LOCATION,
    DEFAULT_TIMEOUT_SECS,
};
