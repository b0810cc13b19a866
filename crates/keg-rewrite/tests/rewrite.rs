use std::path::{Path, PathBuf};

use keg_resource::{Anchor, Context, InstallationPrefix, PackageSpec, RewriteRuleSpec};
use keg_rewrite::{RewriteError, RuleOutcome, TemplateRewriter};
use keg_verify::Checksum;

const SERVER_YML: &str = "\
# cluster.name: elasticsearch
# path.data: /path/to/data
# path.logs: /path/to/logs
#network.host: 192.168.0.1
";

const PLUGIN: &str = "#!/bin/sh\n\nSCRIPT=\"$0\"\n\nexec java -cp \"$ES_HOME/lib/*\" Plugin\n";

struct Fixture {
    _dir: tempfile::TempDir,
    prefix: PathBuf,
    config: PathBuf,
    ctx: Context,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let spec = PackageSpec::archive("search", "1.5", "file:///x.tgz", Checksum::of(b""));
        let layout = InstallationPrefix::new(dir.path().join("keg"), &spec).unwrap();
        let ctx = Context::for_install(&spec, &layout, "production")
            .extend([("cluster_name", "search_alice")]);

        let prefix = dir.path().join("stage/prefix");
        let config = dir.path().join("stage/config");
        std::fs::create_dir_all(prefix.join("bin")).unwrap();
        std::fs::create_dir_all(&config).unwrap();
        std::fs::write(config.join("search.yml"), SERVER_YML).unwrap();
        std::fs::write(prefix.join("bin/plugin"), PLUGIN).unwrap();

        Self {
            _dir: dir,
            prefix,
            config,
            ctx,
        }
    }

    fn roots(&self) -> impl Fn(Anchor) -> PathBuf + '_ {
        move |anchor| match anchor {
            Anchor::Prefix => self.prefix.clone(),
            Anchor::Config => self.config.clone(),
        }
    }

    fn read(&self, path: impl AsRef<Path>) -> String {
        std::fs::read_to_string(path).unwrap()
    }
}

fn rule(root: Anchor, file: &str, pattern: &str, replace: &str) -> RewriteRuleSpec {
    RewriteRuleSpec {
        root,
        file: file.into(),
        pattern: pattern.into(),
        regex: false,
        replace: replace.into(),
        all: false,
        mandatory: true,
    }
}

fn server_rules() -> Vec<RewriteRuleSpec> {
    vec![
        RewriteRuleSpec {
            regex: true,
            ..rule(
                Anchor::Config,
                "search.yml",
                r"(?m)^#\s*cluster\.name:.*$",
                "cluster.name: {cluster_name}",
            )
        },
        RewriteRuleSpec {
            regex: true,
            ..rule(
                Anchor::Config,
                "search.yml",
                r"(?m)^#\s*path\.data:.*$",
                "path.data: {data_dir}",
            )
        },
        rule(Anchor::Config, "search.yml", "#network.host: 192.168.0.1", "network.host: 127.0.0.1"),
        rule(
            Anchor::Prefix,
            "bin/plugin",
            "SCRIPT=\"$0\"",
            "SCRIPT=\"$0\"\nES_CLASSPATH=\"{libexec}\"",
        ),
        RewriteRuleSpec {
            all: true,
            ..rule(Anchor::Prefix, "bin/plugin", "$ES_HOME/lib/", "$ES_CLASSPATH/")
        },
    ]
}

#[test]
fn rules_render_context_values() {
    let fx = Fixture::new();
    let rewriter = TemplateRewriter::new(&server_rules()).unwrap();
    let report = rewriter.apply(fx.roots(), &fx.ctx).unwrap();

    assert_eq!(report.changed.len(), 2);
    let yml = fx.read(fx.config.join("search.yml"));
    assert!(yml.contains("cluster.name: search_alice\n"));
    assert!(yml.contains(&format!("path.data: {}\n", fx.ctx.get("data_dir").unwrap())));
    assert!(yml.contains("network.host: 127.0.0.1\n"));
    assert!(yml.contains("# path.logs: /path/to/logs\n"));

    let plugin = fx.read(fx.prefix.join("bin/plugin"));
    assert!(plugin.contains(&format!(
        "SCRIPT=\"$0\"\nES_CLASSPATH=\"{}\"\n",
        fx.ctx.get("libexec").unwrap()
    )));
    assert!(plugin.contains("\"$ES_CLASSPATH/*\""));
}

#[test]
fn reapplying_is_byte_identical() {
    let fx = Fixture::new();
    let rewriter = TemplateRewriter::new(&server_rules()).unwrap();
    rewriter.apply(fx.roots(), &fx.ctx).unwrap();

    let yml = std::fs::read(fx.config.join("search.yml")).unwrap();
    let plugin = std::fs::read(fx.prefix.join("bin/plugin")).unwrap();

    let report = rewriter.apply(fx.roots(), &fx.ctx).unwrap();
    assert!(report.is_noop());
    assert!(
        report
            .rules
            .iter()
            .all(|r| r.outcome == RuleOutcome::AlreadyApplied)
    );
    assert_eq!(std::fs::read(fx.config.join("search.yml")).unwrap(), yml);
    assert_eq!(std::fs::read(fx.prefix.join("bin/plugin")).unwrap(), plugin);
}

#[test]
fn replacement_that_quotes_its_pattern_is_applied_once() {
    let fx = Fixture::new();
    let rules = vec![rule(
        Anchor::Config,
        "search.yml",
        "#network.host: 192.168.0.1",
        "network.host: 127.0.0.1 # was #network.host: 192.168.0.1",
    )];
    let rewriter = TemplateRewriter::new(&rules).unwrap();

    let first = rewriter.apply(fx.roots(), &fx.ctx).unwrap();
    assert_eq!(first.rules[0].outcome, RuleOutcome::Applied(1));
    let once = fx.read(fx.config.join("search.yml"));
    assert!(once.ends_with("network.host: 127.0.0.1 # was #network.host: 192.168.0.1\n"));

    let second = rewriter.apply(fx.roots(), &fx.ctx).unwrap();
    assert!(second.is_noop());
    assert_eq!(second.rules[0].outcome, RuleOutcome::AlreadyApplied);
    assert_eq!(fx.read(fx.config.join("search.yml")), once);
}

#[test]
fn missing_mandatory_pattern_names_file_and_rule() {
    let fx = Fixture::new();
    let mut rules = server_rules();
    rules.insert(1, rule(Anchor::Config, "search.yml", "http.port: 9200", "http.port: 9201"));

    let err = TemplateRewriter::new(&rules)
        .unwrap()
        .apply(fx.roots(), &fx.ctx)
        .unwrap_err();
    match err {
        RewriteError::PatternNotFound { file, rule, .. } => {
            assert_eq!(file, PathBuf::from("search.yml"));
            assert_eq!(rule, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    // Rule 0 matched, but nothing is written when a later rule fails.
    assert_eq!(fx.read(fx.config.join("search.yml")), SERVER_YML);
}

#[test]
fn optional_rules_are_skipped_quietly() {
    let fx = Fixture::new();
    let rules = vec![
        RewriteRuleSpec {
            mandatory: false,
            ..rule(Anchor::Config, "search.yml", "http.port: 9200", "http.port: 9201")
        },
        RewriteRuleSpec {
            mandatory: false,
            ..rule(Anchor::Config, "absent.yml", "a", "b")
        },
    ];

    let report = TemplateRewriter::new(&rules)
        .unwrap()
        .apply(fx.roots(), &fx.ctx)
        .unwrap();
    assert!(report.is_noop());
    assert!(report.rules.iter().all(|r| r.outcome == RuleOutcome::Skipped));
}

#[test]
fn unknown_template_variable_is_an_error() {
    let fx = Fixture::new();
    let rules = vec![rule(Anchor::Config, "search.yml", "#network.host: 192.168.0.1", "{nope}")];
    let err = TemplateRewriter::new(&rules)
        .unwrap()
        .apply(fx.roots(), &fx.ctx)
        .unwrap_err();
    assert!(matches!(err, RewriteError::Template { rule: 0, .. }));
}

#[cfg(unix)]
#[test]
fn rewritten_scripts_keep_their_mode() {
    use std::os::unix::fs::PermissionsExt;

    let fx = Fixture::new();
    let script = fx.prefix.join("bin/plugin");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    TemplateRewriter::new(&server_rules())
        .unwrap()
        .apply(fx.roots(), &fx.ctx)
        .unwrap();
    let mode = std::fs::metadata(&script).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}
