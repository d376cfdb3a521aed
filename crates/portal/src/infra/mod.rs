pub mod backend;
pub mod cache;
pub mod catalog;
pub mod registrations;

pub use backend::{
    ApiError, BackendClient, EventBackend, FilePart, ProgressObserver, RegistrationRecord,
    SubmitAck, SubmitError, SubmitRequest,
};
pub use cache::FreshCache;
pub use catalog::CompetitionCatalog;
pub use registrations::RegistrationService;
