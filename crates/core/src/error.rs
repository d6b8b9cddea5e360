use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid generation status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("A generation session is already running")]
    AlreadyGenerating,

    #[error("Side-channel identifiers are already bound for this session")]
    SideChannelAlreadyBound,

    #[error("Side-channel identifiers carry no application reference")]
    MissingApplicationRef,

    #[error("Cannot complete: processed {last_processed_unit} of {total_units} units")]
    Incomplete {
        last_processed_unit: u64,
        total_units: u64,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
