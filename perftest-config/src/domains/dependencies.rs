//! External automation repositories

use crate::error::ConfigResult;
use crate::validation::{validate_repository_url, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DependenciesConfig {
    /// Role collection used to install servers, replicas and clients
    pub ansible_freeipa_url: String,

    /// Pinned tag of the role collection
    pub ansible_freeipa_tag: String,

    /// Reservation helper used by the pooled provider
    pub idmci_url: String,
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            ansible_freeipa_url: "https://github.com/freeipa/ansible-freeipa.git".to_string(),
            ansible_freeipa_tag: "v0.3.8".to_string(),
            idmci_url: "https://gitlab.cee.redhat.com/identity-management/idm-ci.git".to_string(),
        }
    }
}

impl Validatable for DependenciesConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_repository_url(
            &self.ansible_freeipa_url,
            "ansible_freeipa_url",
            self.domain_name(),
        )?;
        validate_required_string(
            &self.ansible_freeipa_tag,
            "ansible_freeipa_tag",
            self.domain_name(),
        )?;
        validate_repository_url(&self.idmci_url, "idmci_url", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "dependencies"
    }
}
