//! Rendering of result collections
//!
//! A [`Renderer`] turns records into text, a [`ResultSink`] writes that
//! text to a file or standard output, and [`ResultWriter`] ties the two
//! together for one output format.

pub mod errors;
pub mod python_json;
pub mod renderer;
pub mod sink;

pub use errors::{OutputError, OutputResult};
pub use renderer::{format_message, renderer_for, HumanRenderer, JsonRenderer, Renderer};
pub use sink::{sink_for, FileSink, ResultSink, StdoutSink};

use perftest_config::ResultsFormat;
use perftest_core::{ResultCollection, ResultRecord};
use tracing::debug;

/// Renders a collection in one format to any sink
pub struct ResultWriter {
    renderer: Box<dyn Renderer>,
}

impl ResultWriter {
    pub fn new(format: ResultsFormat) -> Self {
        Self {
            renderer: renderer_for(format),
        }
    }

    pub fn format(&self) -> ResultsFormat {
        self.renderer.format()
    }

    /// Text that would be written to `sink`
    pub fn generate(&self, collection: &ResultCollection, to_stdout: bool) -> OutputResult<String> {
        let records: Vec<ResultRecord> = collection.to_records().collect();
        self.renderer.generate(&records, to_stdout)
    }

    pub async fn render(
        &self,
        collection: &ResultCollection,
        sink: &dyn ResultSink,
    ) -> OutputResult<()> {
        let output = self.generate(collection, sink.is_stdout())?;
        debug!(
            format = %self.format(),
            sink = %sink.describe(),
            results = collection.len(),
            "Rendering results"
        );
        sink.write(&output).await
    }
}
