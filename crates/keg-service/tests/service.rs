use std::path::PathBuf;

use keg_resource::{InstallationPrefix, PackageSpec, RestartPolicy, ServiceTemplate};
use keg_service::{ServiceDescriptor, ServiceDescriptorBuilder, ServiceError};
use keg_verify::Checksum;

fn fixture() -> (PackageSpec, InstallationPrefix, ServiceTemplate) {
    let spec = PackageSpec::archive("search", "1.5.2", "file:///x.tgz", Checksum::of(b""));
    let prefix = InstallationPrefix::new("/opt/keg", &spec).unwrap();

    let mut template = ServiceTemplate::new("bin/search");
    template.args = vec!["--config={config_root}/search.yml".into()];
    template
        .env
        .insert("JAVA_OPTS".into(), "-Xss200000 -Dcluster={cluster_name}".into());
    (spec, prefix, template)
}

#[test]
fn descriptor_fields() {
    let (spec, prefix, template) = fixture();
    let descriptor = ServiceDescriptorBuilder::new(&template)
        .var("cluster_name", "search_alice")
        .build(&prefix, &spec, "production")
        .unwrap();

    assert_eq!(descriptor.label, "keg.search.production");
    assert_eq!(descriptor.program, PathBuf::from("/opt/keg/cellar/search/1.5.2/bin/search"));
    assert_eq!(descriptor.args, vec!["--config=/opt/keg/etc/search/search.yml"]);
    assert_eq!(
        descriptor.env.get("JAVA_OPTS").map(String::as_str),
        Some("-Xss200000 -Dcluster=search_alice")
    );
    assert_eq!(descriptor.working_dir, PathBuf::from("/opt/keg/var/search"));
    assert_eq!(descriptor.restart, RestartPolicy::Always);
    assert!(descriptor.run_at_load);
    assert_eq!(descriptor.stdout, None);
}

#[test]
fn building_is_pure() {
    let (spec, prefix, template) = fixture();
    let builder = ServiceDescriptorBuilder::new(&template).var("cluster_name", "c");
    let a = builder.build(&prefix, &spec, "production").unwrap();
    let b = builder.build(&prefix, &spec, "production").unwrap();
    assert_eq!(a, b);

    let staging = builder.build(&prefix, &spec, "staging").unwrap();
    assert_eq!(staging.label, "keg.search.staging");
}

#[test]
fn missing_variable_names_the_field() {
    let (spec, prefix, template) = fixture();
    let err = ServiceDescriptorBuilder::new(&template)
        .build(&prefix, &spec, "production")
        .unwrap_err();
    match err {
        ServiceError::Template { field, .. } => assert_eq!(field, "env.JAVA_OPTS"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn launchd_plist_discards_output_by_default() {
    let (spec, prefix, template) = fixture();
    let plist = ServiceDescriptorBuilder::new(&template)
        .var("cluster_name", "c")
        .build(&prefix, &spec, "production")
        .unwrap()
        .to_launchd_plist();

    assert!(plist.contains("<key>Label</key>\n    <string>keg.search.production</string>"));
    assert!(plist.contains("<key>KeepAlive</key>\n    <true/>"));
    assert!(plist.contains("<key>RunAtLoad</key>\n    <true/>"));
    assert!(plist.contains("<string>/opt/keg/cellar/search/1.5.2/bin/search</string>"));
    assert!(plist.contains("<key>StandardOutPath</key>\n    <string>/dev/null</string>"));
    assert!(plist.contains("<key>StandardErrorPath</key>\n    <string>/dev/null</string>"));
    assert!(plist.ends_with("</plist>\n"));
}

#[test]
fn systemd_unit_reflects_policy_and_logs() {
    let (spec, prefix, mut template) = fixture();
    template.restart = RestartPolicy::OnFailure;
    template.run_at_load = false;
    template.stdout = Some("{log_dir}/search.log".into());

    let unit = ServiceDescriptorBuilder::new(&template)
        .var("cluster_name", "c")
        .build(&prefix, &spec, "production")
        .unwrap()
        .to_systemd_unit();

    assert!(unit.contains(
        "ExecStart=/opt/keg/cellar/search/1.5.2/bin/search --config=/opt/keg/etc/search/search.yml\n"
    ));
    assert!(unit.contains("Environment=\"JAVA_OPTS=-Xss200000 -Dcluster=c\"\n"));
    assert!(unit.contains("Restart=on-failure\n"));
    assert!(unit.contains("StandardOutput=append:/opt/keg/var/search/log/search.log\n"));
    assert!(unit.contains("StandardError=null\n"));
    assert!(!unit.contains("[Install]"));
}

#[test]
fn json_document_is_readable_back() {
    let (spec, prefix, template) = fixture();
    let descriptor = ServiceDescriptorBuilder::new(&template)
        .var("cluster_name", "c")
        .build(&prefix, &spec, "production")
        .unwrap();
    let json = descriptor.to_json().unwrap();
    assert!(json.contains("\"restart\": \"always\""));
    assert_eq!(ServiceDescriptor::from_json(&json).unwrap(), descriptor);
}
