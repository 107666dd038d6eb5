use thiserror::Error;

#[derive(Error, Debug)]
pub enum StupidError {
    /// A setting is missing, unparseable, or out of range.
    #[error("Config error: {0}")]
    Config(String),
}
