//! Resolve a test by name, run it and report

use perftest_config::{ExecutionContext, PerftestConfig};
use perftest_core::{ResultCollection, TestResult};
use perftest_output::{FileSink, ResultSink, ResultWriter};
use perftest_provider::{CommandRunner, SystemCommandRunner};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::archive::create_archive;
use crate::catalog::ProviderCatalog;
use crate::error::{failure_trace, PluginResult};
use crate::lifecycle::Lifecycle;
use crate::registry::TestRegistry;
use crate::stage::Stage;
use crate::transport::{SystemTransport, Transport};

/// Outcome of one dispatched run
#[derive(Debug)]
pub struct RunReport {
    pub results: ResultCollection,
    /// Written only when every stage completed
    pub archive: Option<PathBuf>,
    /// Stage that stopped the run early
    pub failed_stage: Option<Stage>,
}

impl RunReport {
    /// 0 when every result is SUCCESS, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.results.all_success() {
            0
        } else {
            1
        }
    }
}

/// Runs registered tests inside a single failure boundary.
///
/// A stage error becomes one CRITICAL result carrying the failure trace;
/// nothing after the failing stage runs, but what was recorded before is
/// still rendered.
pub struct Dispatcher {
    registry: TestRegistry,
    config: PerftestConfig,
    providers: ProviderCatalog,
    runner: Arc<dyn CommandRunner>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    /// Real processes, ssh and Ansible, with the built-in providers
    pub fn new(registry: TestRegistry, config: PerftestConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new());
        Self {
            registry,
            config,
            providers: ProviderCatalog::with_defaults(),
            transport: Arc::new(SystemTransport::new(runner.clone())),
            runner,
        }
    }

    /// Local command runner handed to providers and the dependency clone
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_providers(mut self, providers: ProviderCatalog) -> Self {
        self.providers = providers;
        self
    }

    pub fn registry(&self) -> &TestRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PerftestConfig {
        &self.config
    }

    /// Run the test named in `ctx` and render its results to `sink`.
    ///
    /// Results are also written to the metadata directory. The run archive
    /// is only created when no stage failed. An unknown test name, or a
    /// failure to render or archive, is returned as an error.
    pub async fn dispatch(
        &self,
        ctx: &ExecutionContext,
        sink: &dyn ResultSink,
    ) -> PluginResult<RunReport> {
        let mut plugin = self.registry.create(&ctx.test, ctx)?;
        info!(test = %ctx.test, "Dispatching test");

        let mut lifecycle = Lifecycle::new(
            &self.config,
            &self.providers,
            self.runner.clone(),
            self.transport.as_ref(),
        );
        let mut results = ResultCollection::new();

        let (summary, failed_stage) = match lifecycle.run(plugin.as_mut(), ctx, &mut results).await {
            Ok(summary) => (Some(summary), None),
            Err(e) => {
                let trace = failure_trace(&e);
                error!(test = %ctx.test, error = %trace, "Test run aborted");

                let mut critical = TestResult::critical(plugin.as_ref(), trace);
                if let Some(stage) = e.stage() {
                    critical = critical.with_kw("stage", stage.name());
                }
                results.add(critical);
                (None, e.stage())
            }
        };

        let writer = ResultWriter::new(ctx.results_format);
        writer.render(&results, sink).await?;

        let copy = lifecycle
            .layout()
            .metadata
            .join(format!("results.{}", ctx.results_format.extension()));
        writer.render(&results, &FileSink::new(copy)).await?;

        let archive = match summary {
            Some(summary) => Some(
                create_archive(
                    &lifecycle.layout().root,
                    &summary.archive_name,
                    &summary.archive_entries,
                )
                .await?,
            ),
            None => {
                warn!("Run did not complete, artifacts are not archived");
                None
            }
        };

        let report = RunReport {
            results,
            archive,
            failed_stage,
        };
        info!(
            test = %ctx.test,
            results = report.results.len(),
            exit_code = report.exit_code(),
            "Test run finished"
        );
        Ok(report)
    }
}
