//! CLI argument parsing definitions

use clap::builder::PossibleValuesParser;
use clap::Parser;
use perftest_config::{ExecutionContext, ExpectedResultType, ResultsFormat};
use perftest_plugins::TEST_NAMES;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ipa-perftest", author, version, about = "Run performance tests against IPA topologies", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Test to execute
    #[arg(long, default_value = "EnrollmentTest", value_parser = PossibleValuesParser::new(TEST_NAMES))]
    pub test: String,

    /// Image to use for clients
    #[arg(long, value_name = "IMAGE")]
    pub client_image: Option<String>,

    /// Image to use for the server and replicas
    #[arg(long, value_name = "IMAGE")]
    pub server_image: Option<String>,

    /// Size of the test
    #[arg(long, default_value_t = 1)]
    pub amount: u32,

    /// Number of replicas to create
    #[arg(long, default_value_t = 0)]
    pub replicas: u32,

    /// Threads per client, or users in the group for GroupSizeTest
    #[arg(long)]
    pub threads: Option<u32>,

    /// Threads authenticating through the trust peer
    #[arg(long, default_value_t = 0)]
    pub ad_threads: u32,

    /// Search size limit set on the server
    #[arg(long)]
    pub sizelimit: Option<u32>,

    /// Put SELinux in permissive mode on the server
    #[arg(long)]
    pub disable_selinux: bool,

    /// Command to execute during APITest, `{id}` is replaced per run
    #[arg(long)]
    pub command: Option<String>,

    /// Format of the rendered results
    #[arg(long, value_enum, default_value_t = ResultsFormat::Json)]
    pub results_format: ResultsFormat,

    /// Write results to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub results_output_file: Option<PathBuf>,

    /// Extra package repository for the IPA hosts
    #[arg(long, value_name = "URL")]
    pub custom_repo_url: Option<String>,

    /// Provisioning backend: local (vagrant) or pooled (idmci)
    #[arg(long, default_value = "vagrant")]
    pub provider: String,

    /// Private key to access the hosts when the provider default is not enough
    #[arg(long, value_name = "PATH")]
    pub private_key: Option<PathBuf>,

    /// Install clients one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Lifetime of pooled hosts, in hours
    #[arg(long, default_value_t = 8)]
    pub idmci_lifetime: u32,

    /// Minutes over which authentication start times are spread
    #[arg(long, default_value_t = 0)]
    pub auth_spread: u32,

    /// Which measurement is compared against --expected-result
    #[arg(long, value_enum)]
    pub expected_result_type: Option<ExpectedResultType>,

    /// Threshold for the measurement, in seconds
    #[arg(long)]
    pub expected_result: Option<f64>,

    /// Subgroups nested in the big group for GroupSizeTest
    #[arg(long, default_value_t = 0)]
    pub number_of_subgroups: u32,

    /// Certificates requested by each client
    #[arg(long, default_value_t = 1)]
    pub cert_requests: u32,

    /// WSGI processes on the server for CertIssuanceTest
    #[arg(long)]
    pub wsgi_processes: Option<u32>,
}

impl Cli {
    /// Resolved parameters of this invocation
    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext {
            test: self.test.clone(),
            client_image: self.client_image.clone(),
            server_image: self.server_image.clone(),
            amount: self.amount,
            replicas: self.replicas,
            threads: self.threads,
            ad_threads: self.ad_threads,
            sizelimit: self.sizelimit,
            disable_selinux: self.disable_selinux,
            command: self.command.clone(),
            results_format: self.results_format,
            results_output_file: self.results_output_file.clone(),
            custom_repo_url: self.custom_repo_url.clone(),
            provider: self.provider.clone(),
            private_key: self.private_key.clone(),
            sequential: self.sequential,
            idmci_lifetime: self.idmci_lifetime,
            auth_spread: self.auth_spread,
            expected_result_type: self.expected_result_type,
            expected_result: self.expected_result,
            number_of_subgroups: self.number_of_subgroups,
            cert_requests: self.cert_requests,
            wsgi_processes: self.wsgi_processes,
        }
    }
}
