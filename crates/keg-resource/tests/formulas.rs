use std::path::Path;

use keg_resource::{
    Anchor, Context, FileClass, Formula, InstallationPrefix, RestartPolicy, Source, Stage,
};

const RELEASE: &str = include_str!("../../../demos/elasticsearch.toml");
const HEAD: &str = include_str!("../../../demos/elasticsearch-head.toml");

#[test]
fn release_formula_parses() {
    let formula = Formula::from_toml_str(RELEASE).unwrap();
    let spec = &formula.package;
    assert_eq!(spec.name, "elasticsearch");
    assert_eq!(spec.version, "1.5.2");
    assert!(matches!(spec.source, Source::Archive { .. }));
    assert_eq!(spec.strip_components(), 1);
    assert_eq!(spec.runtime_dependencies().count(), 1);

    assert_eq!(
        formula.layout[0].class,
        FileClass::Excluded("windows".into())
    );
    assert_eq!(formula.layout[2].class, FileClass::PluginLibrary);
    assert_eq!(formula.layout[2].into, "libexec/sigar");

    assert_eq!(formula.rewrite.len(), 9);
    assert!(formula.rewrite.iter().all(|r| r.mandatory));
    assert_eq!(formula.rewrite[0].root, Anchor::Config);
    assert_eq!(formula.rewrite[5].root, Anchor::Prefix);
    assert_eq!(formula.rewrite[5].pattern, "#!/bin/sh\n");

    let service = formula.service.as_ref().unwrap();
    assert_eq!(service.restart, RestartPolicy::Always);
    assert_eq!(service.env["ES_JAVA_OPTS"], "-Xss200000");
}

#[test]
fn head_formula_builds_with_maven() {
    let formula = Formula::from_toml_str(HEAD).unwrap();
    let Source::Vcs {
        repository,
        reference,
        build,
    } = &formula.package.source
    else {
        panic!("expected a vcs source");
    };
    assert!(repository.ends_with("elasticsearch.git"));
    assert_eq!(reference, "master");
    assert_eq!(build.program, "mvn");
    assert_eq!(
        build.artifact.as_deref(),
        Some("target/releases/elasticsearch-*.tar.gz")
    );

    let build_deps: Vec<_> = formula.package.build_dependencies().collect();
    assert_eq!(build_deps.len(), 1);
    assert_eq!(build_deps[0].stage, Stage::Build);
    assert!(formula.post_install.link_config);
}

#[test]
fn caveats_render_with_cluster_name() {
    let formula = Formula::from_toml_str(RELEASE).unwrap();
    let prefix = InstallationPrefix::new("/opt/keg", &formula.package).unwrap();
    let ctx = Context::for_install(&formula.package, &prefix, "production")
        .with("cluster_name", "elasticsearch_alice");

    let caveats = ctx.expand(formula.caveats.as_deref().unwrap()).unwrap();
    let data = prefix.data_dir().join("elasticsearch_alice");
    assert!(caveats.contains(&format!("Data:    {}/", data.display())));
    assert!(caveats.contains(&format!("Config:  {}/", prefix.config_root().display())));

    let missing = Context::for_install(&formula.package, &prefix, "production");
    assert!(missing.expand(formula.caveats.as_deref().unwrap()).is_err());
}

#[test]
fn prefix_is_versioned_under_cellar() {
    let formula = Formula::from_toml_str(RELEASE).unwrap();
    let prefix = InstallationPrefix::new("/opt/keg", &formula.package).unwrap();
    assert_eq!(
        prefix.prefix(),
        Path::new("/opt/keg/cellar/elasticsearch/1.5.2")
    );
}
