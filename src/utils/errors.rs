#![forbid(unsafe_code)]

use poem_openapi::Object;
use thiserror::Error;

/// Error enumerates the errors returned by this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("swc_server input parameters:\n{}", .0)]
    InputParms(String),

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Inaccessible logger configuration file.
    #[error("Unable to access the Log4rs configuration file: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),

    // Outbound SWAPI call failures, one variant per stage so callers can
    // report exactly which stage failed.
    #[error("Request to {} failed: {}", .0, .1)]
    UpstreamRequestError(String, String),

    #[error("Request to {} returned status {}", .0, .1)]
    UpstreamStatusError(String, u16),

    #[error("Unable to read response body from {}: {}", .0, .1)]
    UpstreamBodyError(String, String),

    #[error("Unable to parse response body from {}: {}", .0, .1)]
    UpstreamDecodeError(String, String),

    // Page template failures.
    #[error("Unable to load page template {}: {}", .0, .1)]
    TemplateLoadError(String, String),

    #[error("Unable to render page template {}: {}", .0, .1)]
    TemplateRenderError(String, String),
}

// ***************************************************************************
//                               HTTP Result
// ***************************************************************************
/// The response body used by all non-200 outcomes.
#[derive(Debug, Object)]
pub struct HttpResult {
    pub result_code: String,
    pub result_msg: String,
}

impl HttpResult {
    pub fn new(result_code: String, result_msg: String) -> Self {
        HttpResult { result_code, result_msg }
    }
}
