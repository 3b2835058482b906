//! Per-invocation test parameters

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// How results are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ResultsFormat {
    #[default]
    Json,
    Human,
}

impl ResultsFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultsFormat::Json => "json",
            ResultsFormat::Human => "human",
        }
    }

    /// Extension of the archived results copy
    pub fn extension(&self) -> &'static str {
        match self {
            ResultsFormat::Json => "json",
            ResultsFormat::Human => "txt",
        }
    }
}

impl fmt::Display for ResultsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultsFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ResultsFormat::Json),
            "human" => Ok(ResultsFormat::Human),
            _ => Err(format!("Invalid results format: {}", s)),
        }
    }
}

/// Which measured value is compared against `expected_result`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ExpectedResultType {
    /// Total elapsed seconds
    Time,
    /// Elapsed seconds per unit of work
    #[cfg_attr(feature = "cli", value(name = "time_unit"))]
    TimeUnit,
    /// No failed operations
    #[cfg_attr(feature = "cli", value(name = "no_errors"))]
    NoErrors,
}

impl ExpectedResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpectedResultType::Time => "time",
            ExpectedResultType::TimeUnit => "time_unit",
            ExpectedResultType::NoErrors => "no_errors",
        }
    }

    /// Whether a numeric threshold is needed
    pub fn needs_threshold(&self) -> bool {
        !matches!(self, ExpectedResultType::NoErrors)
    }
}

impl fmt::Display for ExpectedResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpectedResultType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "time" => Ok(ExpectedResultType::Time),
            "time_unit" => Ok(ExpectedResultType::TimeUnit),
            "no_errors" => Ok(ExpectedResultType::NoErrors),
            _ => Err(format!("Invalid expected result type: {}", s)),
        }
    }
}

/// Resolved parameters of one test run.
///
/// Built once from command-line input and handed to every stage by shared
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Registered test name, e.g. `EnrollmentTest`
    pub test: String,
    pub client_image: Option<String>,
    pub server_image: Option<String>,
    /// Workload size; clients or commands depending on the test
    pub amount: u32,
    pub replicas: u32,
    pub threads: Option<u32>,
    pub ad_threads: u32,
    pub sizelimit: Option<u32>,
    pub disable_selinux: bool,
    /// API command template, `{id}` is replaced per invocation
    pub command: Option<String>,
    pub results_format: ResultsFormat,
    /// Standard output when unset
    pub results_output_file: Option<PathBuf>,
    pub custom_repo_url: Option<String>,
    /// Provider name, resolved when the run starts
    pub provider: String,
    pub private_key: Option<PathBuf>,
    pub sequential: bool,
    /// Reservation lifetime in hours
    pub idmci_lifetime: u32,
    /// Minutes over which authentication start times are spread
    pub auth_spread: u32,
    pub expected_result_type: Option<ExpectedResultType>,
    pub expected_result: Option<f64>,
    pub number_of_subgroups: u32,
    pub cert_requests: u32,
    pub wsgi_processes: Option<u32>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            test: "EnrollmentTest".to_string(),
            client_image: None,
            server_image: None,
            amount: 1,
            replicas: 0,
            threads: None,
            ad_threads: 0,
            sizelimit: None,
            disable_selinux: false,
            command: None,
            results_format: ResultsFormat::default(),
            results_output_file: None,
            custom_repo_url: None,
            provider: "vagrant".to_string(),
            private_key: None,
            sequential: false,
            idmci_lifetime: 8,
            auth_spread: 0,
            expected_result_type: None,
            expected_result: None,
            number_of_subgroups: 0,
            cert_requests: 1,
            wsgi_processes: None,
        }
    }
}

impl ExecutionContext {
    /// Context for `test` with every other parameter at its default
    pub fn for_test(test: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            ..Default::default()
        }
    }

    /// Thread count, or `default` when none was given
    pub fn threads_or(&self, default: u32) -> u32 {
        self.threads.unwrap_or(default)
    }

    /// Image name usable inside a file name
    pub fn server_image_label(&self, fallback: &str) -> String {
        self.server_image
            .as_deref()
            .unwrap_or(fallback)
            .replace('/', "")
    }
}

impl Validatable for ExecutionContext {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.test, "test", self.domain_name())?;
        validate_required_string(&self.provider, "provider", self.domain_name())?;

        if self.ad_threads > 0 && self.ad_threads > self.threads.unwrap_or(0) {
            return Err(self.validation_error(format!(
                "ad-threads ({}) cannot exceed threads ({})",
                self.ad_threads,
                self.threads.unwrap_or(0)
            )));
        }

        if let Some(expected) = self.expected_result {
            if !expected.is_finite() || expected < 0.0 {
                return Err(self.validation_error(format!(
                    "expected-result must be a non-negative number, got {}",
                    expected
                )));
            }
        }

        if let Some(kind) = self.expected_result_type {
            if kind.needs_threshold() && self.expected_result.is_none() {
                return Err(self.validation_error(format!(
                    "expected-result is required when expected-result-type is {}",
                    kind
                )));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "context"
    }
}
