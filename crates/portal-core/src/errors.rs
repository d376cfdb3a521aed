//! Shared error types

use thiserror::Error;

/// Core errors raised by the domain rules. Messages double as the
/// user-facing form notices, hence the Indonesian.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("tim sudah penuh: maksimal {cap} orang (termasuk ketua) untuk {competition}")]
    TeamFull { cap: usize, competition: String },
}
