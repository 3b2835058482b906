use perftest_config::ResultsFormat;
use perftest_core::{Level, Producer, ResultCollection, ResultRecord, TestResult};
use perftest_output::{FileSink, ResultSink, ResultWriter};

struct AuthProbe;

impl Producer for AuthProbe {
    fn source(&self) -> &str {
        "perftest_plugins::authentication"
    }

    fn test(&self) -> &str {
        "AuthenticationTest"
    }
}

fn sample() -> ResultCollection {
    let mut results = ResultCollection::new();
    results.add(TestResult::success(&AuthProbe, "Client client000 succeeded 100%"));
    results.add(
        TestResult::builder(Level::Error)
            .producer(&AuthProbe)
            .key("client001")
            .msg("{key} failed {failed} of {total}")
            .kw("failed", 2)
            .kw("total", 10)
            .build()
            .unwrap(),
    );
    results.add(TestResult::critical(&AuthProbe, "Stage run failed\nCaused by: ssh exited 255"));
    results
}

#[tokio::test]
async fn test_json_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let results = sample();

    ResultWriter::new(ResultsFormat::Json)
        .render(&results, &FileSink::new(&path))
        .await
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.ends_with('\n'));

    let records: Vec<ResultRecord> = serde_json::from_str(&text).unwrap();
    let parsed: Vec<TestResult> = records
        .into_iter()
        .map(|r| TestResult::try_from(r).unwrap())
        .collect();
    let original: Vec<&TestResult> = results.iter().collect();

    assert_eq!(parsed.len(), original.len());
    for (back, orig) in parsed.iter().zip(original) {
        assert_eq!(back.source(), orig.source());
        assert_eq!(back.test(), orig.test());
        assert_eq!(back.level(), orig.level());
        assert_eq!(back.uuid(), orig.uuid());
        assert_eq!(back.kw(), orig.kw());
    }
}

#[test]
fn test_file_and_stdout_variants() {
    let results = sample();
    let writer = ResultWriter::new(ResultsFormat::Json);
    let file = writer.generate(&results, false).unwrap();
    let stdout = writer.generate(&results, true).unwrap();
    assert_eq!(format!("{}\n", file), stdout);

    let human = ResultWriter::new(ResultsFormat::Human);
    assert_eq!(
        human.generate(&results, false).unwrap(),
        human.generate(&results, true).unwrap()
    );
}

#[tokio::test]
async fn test_human_file_output() {
    let dir = tempfile::tempdir().unwrap();
    let sink = FileSink::new(dir.path().join("results.txt"));
    ResultWriter::new(ResultsFormat::Human)
        .render(&sample(), &sink)
        .await
        .unwrap();

    let text = std::fs::read_to_string(dir.path().join("results.txt")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[1],
        "ERROR: perftest_plugins::authentication.AuthenticationTest.client001: client001 failed 2 of 10"
    );
    assert_eq!(lines[3], "Caused by: ssh exited 255");
    assert_eq!(sink.describe(), dir.path().join("results.txt").display().to_string());
}

#[test]
fn test_empty_collection_renders() {
    let empty = ResultCollection::new();
    assert_eq!(
        ResultWriter::new(ResultsFormat::Human).generate(&empty, true).unwrap(),
        "No issues found.\n"
    );
    assert_eq!(
        ResultWriter::new(ResultsFormat::Json).generate(&empty, false).unwrap(),
        "[]"
    );
}
