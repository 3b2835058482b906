//! Playbooks used by the workloads
//!
//! Rendered through the stage context; Jinja expressions meant for Ansible
//! are written as `\{{ ... }}`.

/// Resolver and hosts file on every client, pointing at the server
pub const CLIENT_CONFIG_PLAYBOOK: &str = r#"---
- name: Point clients at the IPA server
  hosts: ipaclients
  become: true
  tasks:
    - name: Keep NetworkManager away from resolv.conf
      copy:
        dest: /etc/NetworkManager/conf.d/90-dns-none.conf
        content: |
          [main]
          dns=none
    - name: Use the server as name server
      copy:
        dest: /etc/resolv.conf
        content: |
          search {{domain}}
          nameserver {{server_ip}}
    - name: Resolve the server without DNS
      lineinfile:
        path: /etc/hosts
        line: "{{server_ip}} server.{{domain}} server"
"#;

/// Count hosts known to IPA into the cacheable `host_find_output` fact
pub const COUNT_HOSTS_PLAYBOOK: &str = r#"---
- name: Count hosts registered in IPA
  hosts: ipaserver
  become: true
  tasks:
    - name: Obtain an admin ticket
      shell: echo {{password}} | kinit admin
    - name: Count registered hosts
      shell: ipa host-find --sizelimit=0 | grep 'Host name:' | wc -l
      register: host_find
    - name: Keep the count
      set_fact:
        host_find_output: "\{{ host_find.stdout }}"
        cacheable: yes
"#;

/// Service principals `service<i>/client<nnn>` managed by their clients
pub const CERT_SERVER_CONFIG_PLAYBOOK: &str = r#"---
- name: Prepare certificate services
  hosts: ipaserver
  become: true
  vars:
    clients: {{amount}}
    services: {{services}}
  tasks:
    - name: Obtain an admin ticket
      shell: echo {{password}} | kinit admin
    - name: Add service principals
      shell: >
        ipa service-add service\{{ item[1] }}/client\{{ '%03d' | format(item[0]) }}.{{domain}} --force
        && ipa service-add-host service\{{ item[1] }}/client\{{ '%03d' | format(item[0]) }}.{{domain}}
        --hosts client\{{ '%03d' | format(item[0]) }}.{{domain}}
      with_nested:
        - "\{{ range(0, clients) | list }}"
        - "\{{ range(0, services) | list }}"
"#;

/// WSGI process count and open-file limits for the request burst
pub const CERT_SERVER_TUNING_PLAYBOOK: &str = r#"---
- name: Tune the server for certificate bursts
  hosts: ipaserver
  become: true
  tasks:
    - name: Set WSGI process count
      replace:
        path: /etc/httpd/conf.d/ipa.conf
        regexp: 'processes=\d+'
        replace: 'processes={{wsgi_processes}}'
    - name: Raise directory server file limit
      lineinfile:
        path: /etc/sysconfig/dirsrv.systemd
        line: LimitNOFILE=16384
        create: yes
    - name: Restart IPA services
      shell: ipactl restart
"#;

/// Active Directory forest on the trust peer
pub const AD_SETUP_PLAYBOOK: &str = r#"---
- name: Install the Active Directory peer
  hosts: ad
  gather_facts: false
  tasks:
    - name: Install domain services
      win_feature:
        name: AD-Domain-Services
        include_management_tools: yes
    - name: Create the forest
      win_domain:
        dns_domain_name: ad.{{domain}}
        safe_mode_password: {{ad_password}}
      register: forest
    - name: Reboot after promotion
      win_reboot:
      when: forest.reboot_required
"#;

/// `threads` users in `allusers`, optionally nested through subgroups
pub const GROUPSIZE_SERVER_CONFIG_PLAYBOOK: &str = r#"---
- name: Populate users and groups
  hosts: ipaserver
  become: true
  vars:
    subgroups: {{number_of_subgroups}}
  tasks:
    - name: Install data generator dependencies
      dnf:
        name: python3-click
        state: present
    - name: Upload data generator
      copy:
        src: {{resources}}/create-test-data.py
        dest: /root/create-test-data.py
    - name: Generate users
      shell: python3 /root/create-test-data.py --hosts 1 --users-per-host {{threads}} --outfile /root/groupsize.ldif
    - name: Obtain an admin ticket
      shell: echo {{password}} | kinit admin
    - name: Load users
      shell: >
        ipa config-mod --enable-migration=true
        && ldapadd -x -D 'cn=Directory Manager' -w {{password}} -f /root/groupsize.ldif
        && ipa config-mod --enable-migration=false
{{#if sizelimit}}
    - name: Set search size limit
      shell: ipa config-mod --searchrecordslimit={{sizelimit}}
      failed_when: false
{{/if}}
    - name: Create the group
      shell: ipa group-add allusers
    - name: Add every user to the group
      shell: >
        ipa user-find --sizelimit=0 --pkey-only
        | awk '/User login:/ && $3 != "admin" {print "--users=" $3}'
        | xargs -r -n 500 ipa group-add-member allusers
    - name: Create subgroups
      shell: ipa group-add group\{{ item }} && ipa group-add-member allusers --groups group\{{ item }}
      with_items: "\{{ range(0, subgroups) | list }}"
"#;
