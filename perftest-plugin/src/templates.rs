//! Inventory, Ansible configuration and playbooks shared by every test
//!
//! Rendered with [`perftest_provider::TemplateEngine`]; Jinja expressions
//! meant for Ansible are written as `\{{ ... }}`.

/// Ansible configuration; `cwd` is the absolute metadata directory
pub const ANSIBLE_CFG_TEMPLATE: &str = r#"[defaults]
deprecation_warnings = False
host_key_checking = False
roles_path   = {{cwd}}/ansible-freeipa/roles
library      = {{cwd}}/ansible-freeipa/plugins/modules
module_utils = {{cwd}}/ansible-freeipa/plugins/module_utils
gathering = smart
fact_caching = jsonfile
fact_caching_connection = {{cwd}}/facts
"#;

pub const INVENTORY_TEMPLATE: &str = r#"[ipaserver]
{{server.name}} ansible_host={{server.address}}

[ipaserver:vars]
ipaadmin_password={{password}}
ipadm_password={{password}}
ipaserver_domain={{domain}}
ipaserver_realm={{realm}}
ipaserver_setup_dns=yes
ipaserver_auto_forwarders=yes
ipaserver_auto_reverse=yes

{{#each tiers}}
[ipareplicas_tier{{tier}}]
{{#each hosts}}
{{name}} ansible_host={{address}} ipareplica_servers={{parent}}
{{/each}}

{{/each}}
[ipareplicas:children]
{{#each tiers}}
ipareplicas_tier{{tier}}
{{/each}}

[ipareplicas:vars]
ipaadmin_password={{password}}
ipadm_password={{password}}
ipareplica_domain={{domain}}
ipaserver_realm={{realm}}
ipareplica_setup_dns=yes
ipareplica_auto_forwarders=yes
ipareplica_auto_reverse=yes

[ipaclients]
{{#each clients}}
{{name}} ansible_host={{address}}
{{/each}}

[ipaclients:vars]
ipaadmin_password={{password}}
ipaserver_domain={{domain}}
ipaserver_realm={{realm}}
{{#if ad}}

[ad]
{{ad.name}} ansible_host={{ad.address}}

[ad:vars]
ansible_user=Administrator
ansible_password={{ad_password}}
ansible_connection=winrm
ansible_winrm_transport=ntlm
ansible_winrm_server_cert_validation=ignore
{{/if}}
"#;

/// Extra package repository on every IPA host
pub const ADD_REPO_PLAYBOOK: &str = r#"---
- name: Add custom repository
  hosts: ipaserver, ipareplicas
  become: true
  tasks:
    - name: Configure repository
      yum_repository:
        name: perftest-custom
        description: Custom repository
        baseurl: "{{repo_url}}"
        gpgcheck: no
"#;

pub const SERVER_CONFIG_PLAYBOOK: &str = r#"---
- name: Configure IPA server
  hosts: ipaserver
  become: true
  tasks:
    - name: Enable IPv6
      sysctl:
        name: net.ipv6.conf.all.disable_ipv6
        value: "0"
        state: present
    - name: Resolve the server name to its private address
      shell: sed -i 's/127.*.*.*\s*server/{{server_ip}} server.{{domain}} server/' /etc/hosts
    - name: Install monitoring tools
      package:
        name: sysstat
        state: present
{{#if disable_selinux}}
    - name: Put SELinux in permissive mode
      command: setenforce 0
{{/if}}
"#;

pub const REPLICA_CONFIG_PLAYBOOK: &str = r#"---
- name: Configure replica {{replica_name}}
  hosts: {{replica_name}}
  become: true
  tasks:
    - name: Add the server to /etc/hosts
      shell: echo '{{server_ip}} server.{{domain}} server' >> /etc/hosts
    - name: Use the server as name server
      shell: rm -f /etc/resolv.conf && echo 'nameserver {{server_ip}}' > /etc/resolv.conf
    - name: Drop the loopback entry for the replica
      shell: sed -i '/127.*.*.*\s*replica*/d' /etc/hosts
    - name: Resolve the replica name to its private address
      shell: echo '{{replica_ip}} {{replica_name}}.{{domain}} {{replica_name}}' >> /etc/hosts
    - name: Install monitoring tools
      package:
        name: sysstat
        state: present
"#;

/// Pull standard and test-declared logs into `sync/<host>/`
pub const FETCH_LOGS_PLAYBOOK: &str = r#"---
- name: Fetch IPA server log files
  hosts: ipaserver, ipareplicas
  become: true
  tasks:
    - synchronize:
        src: "\{{ item }}"
        dest: "{{sync_dir}}/\{{ inventory_hostname }}/"
        mode: pull
        use_ssh_args: yes
      with_items:
        - "/var/log/ipaserver-install.log"
        - "/var/log/ipareplica-install.log"
        - "/var/log/ipaclient-install.log"
        - "/var/log/httpd"
        - "/var/log/dirsrv"
        - "/var/log/krb5kdc.log"
        - "/var/log/pki/pki-tomcat/ca"
        - "~/saroutput"
{{#each custom_logs}}
        - "{{this}}"
{{/each}}
      ignore_errors: true

- name: Fetch IPA clients log files
  hosts: ipaclients
  become: true
  tasks:
    - synchronize:
        src: "\{{ item }}"
        dest: "{{sync_dir}}/\{{ inventory_hostname }}/"
        mode: pull
        use_ssh_args: yes
      with_items:
        - "/var/log/ipaclient-install.log"
{{#each custom_logs}}
        - "{{this}}"
{{/each}}
      ignore_errors: true
"#;
