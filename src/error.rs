use thiserror::Error;

/// Problems found while turning raw JSON into revenue records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("record {index} has no owner_email")]
    MissingOwner { index: usize },

    #[error("revenue for {owner} in {month_key} is not a number: {value}")]
    InvalidAmount {
        owner: String,
        month_key: String,
        value: String,
    },

    #[error("revenue for {owner} in {month_key} is negative: {amount}")]
    NegativeAmount {
        owner: String,
        month_key: String,
        amount: f64,
    },

    #[error("revenue payload must be an array of records")]
    NotAnArray,
}

/// Failures reported by a revenue source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("backend returned an error: {0}")]
    Backend(String),

    #[error("failed to update data: {0}")]
    UpdateFailed(String),

    #[error("unexpected response shape from {endpoint}")]
    UnexpectedResponse { endpoint: String },

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Invalid `owner=amount` style input.
#[derive(Debug, Error, PartialEq)]
pub enum OverrideError {
    #[error("expected OWNER=VALUE, got `{0}`")]
    MissingSeparator(String),

    #[error("owner is empty in `{0}`")]
    EmptyOwner(String),

    #[error("goal for {owner} is not a number: `{value}`")]
    InvalidAmount { owner: String, value: String },

    #[error("goal for {owner} must not be negative")]
    Negative { owner: String },
}
