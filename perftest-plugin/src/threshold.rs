//! Measured-vs-expected comparison for `check_results`

use perftest_config::{ExecutionContext, ExpectedResultType};
use perftest_core::{Producer, ResultCollection, TestResult};
use tracing::info;

use crate::core::Measurement;

/// One SUCCESS or ERROR result for the requested threshold.
///
/// Nothing is produced when no threshold type was requested.
pub fn evaluate_threshold<P: Producer + ?Sized>(
    producer: &P,
    ctx: &ExecutionContext,
    measurement: Option<Measurement>,
) -> ResultCollection {
    let mut results = ResultCollection::new();
    let Some(kind) = ctx.expected_result_type else {
        return results;
    };

    let Some(measurement) = measurement else {
        results.add(
            TestResult::error(producer, "No measurement available to compare")
                .with_kw("expected_result_type", kind.as_str()),
        );
        return results;
    };

    let expected = ctx.expected_result.unwrap_or(0.0);
    let result = match kind {
        ExpectedResultType::Time => compare(
            producer,
            kind,
            measurement.execution_time_secs,
            expected,
            "Execution time",
        ),
        ExpectedResultType::TimeUnit => {
            if measurement.units == 0 {
                TestResult::error(producer, "No units of work were measured")
                    .with_kw("expected_result_type", kind.as_str())
            } else {
                let per_unit = measurement.execution_time_secs / measurement.units as f64;
                compare(producer, kind, per_unit, expected, "Execution time per unit")
                    .with_kw("units", measurement.units)
            }
        }
        ExpectedResultType::NoErrors => {
            let result = if measurement.errors == 0 {
                TestResult::success(producer, "No errors were recorded")
            } else {
                TestResult::error(
                    producer,
                    format!("{} errors were recorded", measurement.errors),
                )
            };
            result
                .with_kw("expected_result_type", kind.as_str())
                .with_kw("errors", measurement.errors)
        }
    };

    info!(
        expected_result_type = kind.as_str(),
        passed = result.is_success(),
        "Threshold evaluated"
    );
    results.add(result);
    results
}

fn compare<P: Producer + ?Sized>(
    producer: &P,
    kind: ExpectedResultType,
    measured: f64,
    expected: f64,
    what: &str,
) -> TestResult {
    let result = if measured <= expected {
        TestResult::success(
            producer,
            format!("{} {:.2}s within expected {:.2}s", what, measured, expected),
        )
    } else {
        TestResult::error(
            producer,
            format!("{} {:.2}s exceeds expected {:.2}s", what, measured, expected),
        )
    };
    result
        .with_kw("expected_result_type", kind.as_str())
        .with_kw("measured", measured)
        .with_kw("expected", expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use perftest_core::Level;

    struct Enrollment;

    impl Producer for Enrollment {
        fn source(&self) -> &str {
            "perftest_plugins::enrollment"
        }

        fn test(&self) -> &str {
            "EnrollmentTest"
        }
    }

    fn ctx(kind: Option<ExpectedResultType>, expected: Option<f64>) -> ExecutionContext {
        ExecutionContext {
            expected_result_type: kind,
            expected_result: expected,
            ..ExecutionContext::for_test("EnrollmentTest")
        }
    }

    fn measured(secs: f64, units: u64, errors: u64) -> Option<Measurement> {
        Some(Measurement {
            execution_time_secs: secs,
            units,
            errors,
        })
    }

    fn only_level(results: &ResultCollection) -> Level {
        assert_eq!(results.len(), 1);
        results.iter().next().unwrap().level()
    }

    #[test]
    fn test_nothing_requested() {
        let results = evaluate_threshold(&Enrollment, &ctx(None, None), measured(1.0, 1, 0));
        assert!(results.is_empty());
    }

    #[test]
    fn test_time() {
        let c = ctx(Some(ExpectedResultType::Time), Some(60.0));
        assert_eq!(only_level(&evaluate_threshold(&Enrollment, &c, measured(59.5, 10, 0))), Level::Success);
        assert_eq!(only_level(&evaluate_threshold(&Enrollment, &c, measured(60.0, 10, 0))), Level::Success);

        let results = evaluate_threshold(&Enrollment, &c, measured(75.0, 10, 0));
        assert_eq!(only_level(&results), Level::Error);
        let result = results.iter().next().unwrap();
        assert_eq!(result.kw()["measured"], 75.0);
        assert_eq!(result.kw()["expected"], 60.0);
    }

    #[test]
    fn test_time_unit() {
        let c = ctx(Some(ExpectedResultType::TimeUnit), Some(2.0));
        assert_eq!(only_level(&evaluate_threshold(&Enrollment, &c, measured(30.0, 20, 0))), Level::Success);
        assert_eq!(only_level(&evaluate_threshold(&Enrollment, &c, measured(30.0, 10, 0))), Level::Error);
        assert_eq!(only_level(&evaluate_threshold(&Enrollment, &c, measured(30.0, 0, 0))), Level::Error);
    }

    #[test]
    fn test_no_errors() {
        let c = ctx(Some(ExpectedResultType::NoErrors), None);
        assert_eq!(only_level(&evaluate_threshold(&Enrollment, &c, measured(1.0, 5, 0))), Level::Success);
        let results = evaluate_threshold(&Enrollment, &c, measured(1.0, 5, 2));
        assert_eq!(only_level(&results), Level::Error);
        assert_eq!(results.iter().next().unwrap().kw()["errors"], 2);
    }

    #[test]
    fn test_missing_measurement() {
        let c = ctx(Some(ExpectedResultType::Time), Some(10.0));
        assert_eq!(only_level(&evaluate_threshold(&Enrollment, &c, None)), Level::Error);
    }
}
