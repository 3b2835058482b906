//! Result model for performance test runs
//!
//! Every stage of a run reports what it observed as [`TestResult`] values
//! collected into an ordered [`ResultCollection`]. The collection is what
//! gets rendered at the end of a run and what decides the process exit code.

pub mod collection;
pub mod error;
pub mod level;
pub mod result;

pub use collection::{Records, ResultCollection};
pub use error::{CoreError, CoreResult};
pub use level::Level;
pub use result::{Producer, ResultBuilder, ResultRecord, TestResult};
