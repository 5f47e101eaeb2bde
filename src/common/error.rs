use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, ScraperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_convert_into_their_variants() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        assert!(matches!(ScraperError::from(toml_err), ScraperError::Toml(_)));

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ScraperError::from(io_err);
        assert_eq!(err.to_string(), "I/O error: gone");
    }
}
