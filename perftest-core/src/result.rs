//! Single observed outcome of one step of a test run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::level::Level;

/// Anything that can own results: a test plugin, or the engine on its behalf.
pub trait Producer {
    /// Component identifier, rendered as `source`
    fn source(&self) -> &str;

    /// Test-type identifier, rendered as `test`
    fn test(&self) -> &str;
}

/// One observed outcome.
///
/// Constructed through [`ResultBuilder`]; only `duration` can change after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    level: Level,
    source: String,
    test: String,
    uuid: String,
    when: Option<String>,
    duration: Option<String>,
    kw: Map<String, Value>,
}

impl TestResult {
    /// Start building a result with the given level
    pub fn builder(level: Level) -> ResultBuilder {
        ResultBuilder::new(level)
    }

    /// Result owned by `producer` with a `msg` attribute
    pub fn with_message<P: Producer + ?Sized>(
        producer: &P,
        level: Level,
        msg: impl Into<String>,
    ) -> Self {
        Self::from_producer(producer, level).with_kw("msg", msg.into())
    }

    /// SUCCESS result with a message
    pub fn success<P: Producer + ?Sized>(producer: &P, msg: impl Into<String>) -> Self {
        Self::with_message(producer, Level::Success, msg)
    }

    /// WARNING result with a message
    pub fn warning<P: Producer + ?Sized>(producer: &P, msg: impl Into<String>) -> Self {
        Self::with_message(producer, Level::Warning, msg)
    }

    /// ERROR result carrying an `error` attribute
    pub fn error<P: Producer + ?Sized>(producer: &P, error: impl Into<String>) -> Self {
        Self::from_producer(producer, Level::Error).with_kw("error", error.into())
    }

    /// CRITICAL result carrying a captured failure trace
    pub fn critical<P: Producer + ?Sized>(producer: &P, exception: impl Into<String>) -> Self {
        Self::from_producer(producer, Level::Critical).with_kw("exception", exception.into())
    }

    fn from_producer<P: Producer + ?Sized>(producer: &P, level: Level) -> Self {
        Self {
            level,
            source: producer.source().to_string(),
            test: producer.test().to_string(),
            uuid: Uuid::new_v4().to_string(),
            when: None,
            duration: None,
            kw: Map::new(),
        }
    }

    /// Add an attribute; only used while a result is being assembled
    pub fn with_kw(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kw.insert(key.into(), value.into());
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn test(&self) -> &str {
        &self.test
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn when(&self) -> Option<&str> {
        self.when.as_deref()
    }

    pub fn duration(&self) -> Option<&str> {
        self.duration.as_deref()
    }

    pub fn kw(&self) -> &Map<String, Value> {
        &self.kw
    }

    /// String attribute lookup
    pub fn kw_str(&self, key: &str) -> Option<&str> {
        self.kw.get(key).and_then(Value::as_str)
    }

    pub fn is_success(&self) -> bool {
        self.level.is_success()
    }

    /// Compute `duration` retroactively as the time elapsed since `start`
    pub fn set_duration_since(&mut self, start: DateTime<Utc>) {
        self.duration = Some(format_elapsed(start));
    }

    /// Flat record form used by every renderer
    pub fn to_record(&self) -> ResultRecord {
        ResultRecord {
            source: self.source.clone(),
            test: self.test.clone(),
            result: self.level.name().to_string(),
            uuid: self.uuid.clone(),
            when: self.when.clone(),
            duration: self.duration.clone(),
            kw: self.kw.clone(),
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({}): {}",
            self.source,
            self.test,
            Value::Object(self.kw.clone()),
            self.level
        )
    }
}

/// Seconds since `start`, six decimals
fn format_elapsed(start: DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(start);
    let micros = elapsed.num_microseconds().unwrap_or(i64::MAX);
    format!("{:6.6}", micros as f64 / 1_000_000.0)
}

/// Builder enforcing the origin rule: either a producer, or both `source`
/// and `test`, never a mix.
#[derive(Debug, Clone)]
pub struct ResultBuilder {
    level: Level,
    producer: Option<(String, String)>,
    source: Option<String>,
    test: Option<String>,
    start: Option<DateTime<Utc>>,
    when: Option<String>,
    duration: Option<String>,
    kw: Map<String, Value>,
}

impl ResultBuilder {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            producer: None,
            source: None,
            test: None,
            start: None,
            when: None,
            duration: None,
            kw: Map::new(),
        }
    }

    /// Build from a level name such as `"WARNING"`
    pub fn from_level_name(name: &str) -> CoreResult<Self> {
        Ok(Self::new(name.parse()?))
    }

    /// Derive `source` and `test` from the producing component
    pub fn producer<P: Producer + ?Sized>(mut self, producer: &P) -> Self {
        self.producer = Some((producer.source().to_string(), producer.test().to_string()));
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn test(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }

    /// Start time; `duration` is computed from it at build time
    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn when(mut self, when: impl Into<String>) -> Self {
        self.when = Some(when.into());
        self
    }

    pub fn duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    /// Message template; `{name}` placeholders are filled from other attributes
    pub fn msg(self, msg: impl Into<String>) -> Self {
        self.kw("msg", msg.into())
    }

    /// Disambiguator for tests that report several results
    pub fn key(self, key: impl Into<String>) -> Self {
        self.kw("key", key.into())
    }

    pub fn error(self, error: impl Into<String>) -> Self {
        self.kw("error", error.into())
    }

    pub fn exception(self, exception: impl Into<String>) -> Self {
        self.kw("exception", exception.into())
    }

    pub fn kw(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kw.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> CoreResult<TestResult> {
        let (source, test) = match (self.producer, self.source, self.test) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(CoreError::invalid_argument(
                    "give either a producer or source and test, not both",
                ))
            }
            (Some(origin), None, None) => origin,
            (None, Some(source), Some(test)) => (source, test),
            (None, _, _) => {
                return Err(CoreError::invalid_argument(
                    "source and test or producer must be provided",
                ))
            }
        };

        let duration = match self.start {
            Some(start) => Some(format_elapsed(start)),
            None => self.duration,
        };

        Ok(TestResult {
            level: self.level,
            source,
            test,
            uuid: Uuid::new_v4().to_string(),
            when: self.when,
            duration,
            kw: self.kw,
        })
    }
}

/// Flat structured form of a result.
///
/// Field order is the rendered order; the level is carried by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub source: String,
    pub test: String,
    pub result: String,
    pub uuid: String,
    pub when: Option<String>,
    pub duration: Option<String>,
    pub kw: Map<String, Value>,
}

impl TryFrom<ResultRecord> for TestResult {
    type Error = CoreError;

    fn try_from(record: ResultRecord) -> Result<Self, Self::Error> {
        Ok(TestResult {
            level: record.result.parse()?,
            source: record.source,
            test: record.test,
            uuid: record.uuid,
            when: record.when,
            duration: record.duration,
            kw: record.kw,
        })
    }
}
