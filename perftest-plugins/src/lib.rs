//! Concrete IPA performance workloads
//!
//! Each test is a [`perftest_plugin::TestPlugin`] registered under the name
//! accepted by `--test`:
//!
//! | Name | Workload |
//! |---|---|
//! | `EnrollmentTest` | enroll `amount` clients at one synchronised moment |
//! | `APITest` | run `amount` API commands, 25 per client, through `at` |
//! | `AuthenticationTest` | concurrent PAM logins from every client |
//! | `CertIssuanceTest` | burst of service certificate requests |
//! | `GroupSizeTest` | add one member to a group of `threads` users |

pub mod api;
pub mod authentication;
pub mod cert_issuance;
pub mod enrollment;
pub mod group_size;
pub mod templates;

pub use api::ApiTest;
pub use authentication::AuthenticationTest;
pub use cert_issuance::CertIssuanceTest;
pub use enrollment::EnrollmentTest;
pub use group_size::GroupSizeTest;

use perftest_plugin::{PluginResult, TestRegistry};

/// Names of the built-in tests, in registration order
pub const TEST_NAMES: [&str; 5] = [
    "EnrollmentTest",
    "APITest",
    "AuthenticationTest",
    "CertIssuanceTest",
    "GroupSizeTest",
];

/// Register every built-in test
pub fn register_all(registry: &mut TestRegistry) -> PluginResult<()> {
    registry.register("EnrollmentTest", |_| Box::new(EnrollmentTest::new()))?;
    registry.register("APITest", |_| Box::new(ApiTest::new()))?;
    registry.register("AuthenticationTest", |_| Box::new(AuthenticationTest::new()))?;
    registry.register("CertIssuanceTest", |_| Box::new(CertIssuanceTest::new()))?;
    registry.register("GroupSizeTest", |_| Box::new(GroupSizeTest::new()))?;
    Ok(())
}

/// Registry holding every built-in test
pub fn default_registry() -> PluginResult<TestRegistry> {
    let mut registry = TestRegistry::new();
    register_all(&mut registry)?;
    Ok(registry)
}
