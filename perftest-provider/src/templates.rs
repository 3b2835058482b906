//! Handlebars rendering for generated files

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{ProviderError, ProviderResult};

/// Template engine for machine descriptions, inventories and playbooks.
///
/// Strict mode makes a missing variable an error. Output is not HTML, so
/// escaping is disabled; literal `{{` for Jinja is written as `\{{`.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }

    /// Render `template` with serializable data; `name` is used in errors
    pub fn render<T: Serialize>(
        &self,
        name: &str,
        template: &str,
        data: &T,
    ) -> ProviderResult<String> {
        self.handlebars
            .render_template(template, data)
            .map_err(|e| ProviderError::TemplateRender {
                template: name.to_string(),
                error: e.to_string(),
            })
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Local machine description
pub const VAGRANTFILE_TEMPLATE: &str = r#"Vagrant.configure("2") do |config|
    config.vm.synced_folder ".", "/vagrant", disabled: true
    config.vm.provider :libvirt do |libvirt|
        # QEMU session mode breaks the private network
        libvirt.qemu_use_session = false
        libvirt.management_network_address = "192.168.3.0/16"
    end
{{#if private_key}}
    config.ssh.insert_key = false
    config.ssh.private_key_path = ["~/.vagrant.d/insecure_private_key", "{{private_key}}"]
{{/if}}
{{#each machines}}

    config.vm.define :{{name}} do |{{name}}|
        {{name}}.vm.provider "libvirt" do |v|
            v.memory = {{memory}}
            v.cpus = {{cpus}}
        end
        {{name}}.vm.box = "{{box}}"
        {{name}}.vm.hostname = "{{hostname}}"
        {{name}}.vm.network "private_network", libvirt__netmask: "255.255.0.0", ip: "{{ip}}"
{{#if winrm}}
        {{name}}.vm.network :forwarded_port, guest: 3389, host: 3389, id: "rdp", auto_correct: true
        {{name}}.vm.network :forwarded_port, guest: 5986, host: 5986, id: "winrm-ssl", auto_correct: true
        {{name}}.vm.communicator = "winrm"
        {{name}}.winrm.communicator = "winrm"
        {{name}}.winrm.username = "Administrator"
        {{name}}.winrm.retry_limit = 50
        {{name}}.winrm.retry_delay = 10
{{/if}}
    end
{{/each}}
end
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_html_escaping() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("t", "cmd: {{cmd}}", &json!({"cmd": "a && b > 'c'"}))
            .unwrap();
        assert_eq!(out, "cmd: a && b > 'c'");
    }

    #[test]
    fn test_missing_variable_is_error() {
        let engine = TemplateEngine::new();
        let err = engine.render("inventory", "{{domain}}", &json!({})).unwrap_err();
        assert!(matches!(err, ProviderError::TemplateRender { template, .. } if template == "inventory"));
    }

    #[test]
    fn test_escaped_jinja_is_literal() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("t", r#"dest: "{{cwd}}/\{{ ansible_hostname }}/""#, &json!({"cwd": "/w"}))
            .unwrap();
        assert_eq!(out, r#"dest: "/w/{{ ansible_hostname }}/""#);
    }
}
