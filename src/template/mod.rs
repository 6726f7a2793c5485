//! Local template handling.
//!
//! This module covers the desired-state side of a run:
//! - Decoding template files (YAML or JSON) into [`LocalTemplate`]s
//! - Fingerprinting raw file bytes for change detection
//! - Offline validation of the loaded set

mod fingerprint;
mod loader;
mod spec;
mod validator;

pub use fingerprint::{fingerprint, Fingerprinter, FINGERPRINT_LEN};
pub use loader::{LoadFailure, LoadReport, TemplateLoader};
pub use spec::{
    LocalTemplate, TemplateFormat, LABEL_DEPLOYMENT_TS, LABEL_FINGERPRINT, LABEL_GIT_RUN_ID,
    LABEL_GIT_SHA, RESERVED_LABELS,
};
pub use validator::{
    TemplateValidator, ValidationIssue, ValidationResult, MAX_DISPLAY_NAME_LEN, MAX_LABEL_LEN,
    MAX_USER_LABELS,
};
