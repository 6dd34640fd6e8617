use thiserror::Error;

pub const SCHEMA_ERROR_MESSAGE: &str = "The required columns are not found in the data.";

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("failed to fetch roster from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("roster CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AttendanceError {
    pub fn is_schema(&self) -> bool {
        matches!(self, AttendanceError::Schema { .. })
    }
}

pub type AttendanceResult<T> = Result<T, AttendanceError>;
