//! Ordered collection of results

use crate::level::Level;
use crate::result::{ResultRecord, TestResult};

/// Ordered sequence of results; insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultCollection {
    results: Vec<TestResult>,
}

impl ResultCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: TestResult) {
        self.results.push(result);
    }

    /// Append every result of `other`, keeping its order
    pub fn extend(&mut self, other: ResultCollection) {
        self.results.extend(other.results);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestResult> {
        self.results.iter()
    }

    /// Record view in insertion order; the iterator can be cloned and
    /// consumed more than once.
    pub fn to_records(&self) -> Records<'_> {
        Records {
            inner: self.results.iter(),
        }
    }

    /// True when nothing above SUCCESS was recorded
    pub fn all_success(&self) -> bool {
        self.results.iter().all(TestResult::is_success)
    }

    /// Highest level recorded, `None` when empty
    pub fn worst_level(&self) -> Option<Level> {
        self.results.iter().map(TestResult::level).max()
    }
}

impl From<Vec<TestResult>> for ResultCollection {
    fn from(results: Vec<TestResult>) -> Self {
        Self { results }
    }
}

impl FromIterator<TestResult> for ResultCollection {
    fn from_iter<I: IntoIterator<Item = TestResult>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResultCollection {
    type Item = TestResult;
    type IntoIter = std::vec::IntoIter<TestResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultCollection {
    type Item = &'a TestResult;
    type IntoIter = std::slice::Iter<'a, TestResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Iterator of [`ResultRecord`]s over a collection
#[derive(Debug, Clone)]
pub struct Records<'a> {
    inner: std::slice::Iter<'a, TestResult>,
}

impl Iterator for Records<'_> {
    type Item = ResultRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(TestResult::to_record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Records<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Producer;

    struct Lifecycle;

    impl Producer for Lifecycle {
        fn source(&self) -> &str {
            "perftest_plugin::lifecycle"
        }

        fn test(&self) -> &str {
            "APITest"
        }
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut collection = ResultCollection::new();
        collection.add(TestResult::success(&Lifecycle, "first"));
        collection.add(TestResult::warning(&Lifecycle, "second"));

        let mut more = ResultCollection::new();
        more.add(TestResult::error(&Lifecycle, "third"));
        collection.extend(more);

        let messages: Vec<_> = collection
            .to_records()
            .map(|r| {
                r.kw.get("msg")
                    .or_else(|| r.kw.get("error"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert_eq!(collection.len(), 3);
    }

    #[test]
    fn test_records_consumable_twice() {
        let collection: ResultCollection = vec![
            TestResult::success(&Lifecycle, "a"),
            TestResult::success(&Lifecycle, "b"),
        ]
        .into();

        let records = collection.to_records();
        assert_eq!(records.clone().count(), 2);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_worst_level() {
        let mut collection = ResultCollection::new();
        assert!(collection.all_success());
        assert_eq!(collection.worst_level(), None);

        collection.add(TestResult::success(&Lifecycle, "ok"));
        assert!(collection.all_success());

        collection.add(TestResult::critical(&Lifecycle, "boom"));
        collection.add(TestResult::warning(&Lifecycle, "meh"));
        assert!(!collection.all_success());
        assert_eq!(collection.worst_level(), Some(Level::Critical));
    }
}
