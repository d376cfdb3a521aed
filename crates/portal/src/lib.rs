pub mod api;
pub mod config;
pub mod domain;
pub mod infra;
pub mod startup;
pub mod templates;

pub use config::*;
pub use domain::{
    PaymentOutcome, PaymentSession, Phase, RegistrationSession, SessionManager,
    Error as WorkflowError,
};
pub use infra::{
    ApiError, BackendClient, CompetitionCatalog, EventBackend, RegistrationRecord,
    RegistrationService, SubmitAck, SubmitError,
};
pub use startup::*;
