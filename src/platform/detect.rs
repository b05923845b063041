//! Platform selection
//!
//! The target platform is either named explicitly or detected from an
//! environment snapshot the caller passes in. Nothing here reads the
//! process environment implicitly; [`from_process_env`] is the one place
//! that takes the snapshot.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Deployment surface the dispatcher is fronted by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Platform {
    /// Plain HTTP server, `(req, res)` style
    #[default]
    Http,
    /// Google Cloud Functions, same `(req, res)` shape as plain HTTP
    GoogleCloud,
    /// AWS Lambda behind API Gateway proxy integration
    Aws,
    /// Azure Functions HTTP trigger
    Azure,
}

impl Platform {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::GoogleCloud => "gcloud",
            Self::Aws => "aws",
            Self::Azure => "azure",
        }
    }

    /// Whether requests arrive as single events rather than a connection
    pub const fn is_event_driven(self) -> bool {
        matches!(self, Self::Aws | Self::Azure)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform type: {0:?} (expected http, gcloud, aws or azure)")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "express" | "connect" => Ok(Self::Http),
            "gcloud" | "google" | "google-cloud" => Ok(Self::GoogleCloud),
            "aws" | "lambda" => Ok(Self::Aws),
            "azure" => Ok(Self::Azure),
            _ => Err(UnknownPlatform(s.to_string())),
        }
    }
}

impl TryFrom<String> for Platform {
    type Error = UnknownPlatform;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

const AWS_MARKERS: &[&str] = &["AWS_LAMBDA_FUNCTION_NAME", "LAMBDA_TASK_ROOT"];
const AZURE_MARKERS: &[&str] = &["FUNCTIONS_WORKER_RUNTIME", "AzureWebJobsScriptRoot"];
const GCLOUD_MARKERS: &[&str] = &["FUNCTION_NAME", "K_SERVICE", "GCP_PROJECT"];

/// Detect the platform from an environment snapshot
///
/// AWS and Azure are checked before Google Cloud because `FUNCTION_NAME`
/// is generic enough to show up elsewhere.
pub fn detect(env: &HashMap<String, String>) -> Platform {
    let has_any = |markers: &[&str]| {
        markers
            .iter()
            .any(|key| env.get(*key).is_some_and(|value| !value.is_empty()))
    };

    if has_any(AWS_MARKERS) {
        Platform::Aws
    } else if has_any(AZURE_MARKERS) {
        Platform::Azure
    } else if has_any(GCLOUD_MARKERS) {
        Platform::GoogleCloud
    } else {
        Platform::Http
    }
}

/// Snapshot the process environment and detect from it
pub fn from_process_env() -> Platform {
    let env: HashMap<String, String> = std::env::vars().collect();
    detect(&env)
}
