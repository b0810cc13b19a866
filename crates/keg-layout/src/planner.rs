use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use keg_resource::{Anchor, FileClass, LayoutRuleSpec, check_relative};
use walkdir::WalkDir;

use crate::error::{LayoutError, Result};
use crate::plan::{DropReason, DroppedFile, LayoutPlan, PlannedFile};

/// What to do with a staged file no rule matches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnmatchedPolicy {
    /// Fail the plan with [`LayoutError::Unclassified`].
    Strict,
    /// Record the file as dropped and log a warning.
    #[default]
    Drop,
}

#[derive(Clone, Debug)]
struct Rule {
    class: FileClass,
    into: PathBuf,
    strip: usize,
    flatten: bool,
}

/// Compiled, ordered set of layout rules. The first matching rule wins.
#[derive(Clone, Debug)]
pub struct LayoutPlanner {
    rules: Vec<Rule>,
    patterns: GlobSet,
    policy: UnmatchedPolicy,
    reserved: Vec<(Anchor, PathBuf)>,
}

impl LayoutPlanner {
    pub fn new(specs: &[LayoutRuleSpec]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut rules = Vec::with_capacity(specs.len());

        for (index, spec) in specs.iter().enumerate() {
            let glob = GlobBuilder::new(&spec.pattern)
                .literal_separator(true)
                .build()
                .map_err(|source| LayoutError::InvalidPattern {
                    pattern: spec.pattern.clone(),
                    source,
                })?;
            builder.add(glob);

            let into = PathBuf::from(&spec.into);
            if !spec.into.is_empty() && check_relative(&into).is_err() {
                return Err(LayoutError::InvalidTarget {
                    rule: index,
                    into: spec.into.clone(),
                });
            }
            rules.push(Rule {
                class: spec.class.clone(),
                into,
                strip: spec.strip,
                flatten: spec.flatten,
            });
        }

        let patterns = builder.build().map_err(|source| LayoutError::InvalidPattern {
            pattern: specs
                .iter()
                .map(|s| s.pattern.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            source,
        })?;

        Ok(Self {
            rules,
            patterns,
            policy: UnmatchedPolicy::default(),
            reserved: Vec::new(),
        })
    }

    /// Rules covering the conventional layout of a prebuilt server distribution.
    pub fn standard_rules() -> Vec<LayoutRuleSpec> {
        vec![
            LayoutRuleSpec::new("**/*.{bat,cmd,exe}", FileClass::Excluded("windows".into())),
            LayoutRuleSpec::new("bin/**", FileClass::Executable),
            LayoutRuleSpec::new("{config,conf,etc}/**", FileClass::Configuration).strip(1),
            LayoutRuleSpec::new("plugins/**", FileClass::PluginLibrary),
            LayoutRuleSpec::new("lib/**", FileClass::Library),
            LayoutRuleSpec::new("{doc,docs,man}/**", FileClass::Documentation),
            LayoutRuleSpec::new("{README,LICENSE,NOTICE,CHANGELOG}*", FileClass::Documentation),
        ]
    }

    pub fn standard() -> Result<Self> {
        Self::new(&Self::standard_rules())
    }

    pub fn policy(mut self, policy: UnmatchedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn strict(self, strict: bool) -> Self {
        self.policy(if strict {
            UnmatchedPolicy::Strict
        } else {
            UnmatchedPolicy::Drop
        })
    }

    /// Refuse plans that would place a file at or below `path` under `anchor`.
    pub fn reserve(mut self, anchor: Anchor, path: impl Into<PathBuf>) -> Self {
        self.reserved.push((anchor, path.into()));
        self
    }

    /// Index of the first rule matching `relative`.
    pub fn classify(&self, relative: &Path) -> Option<usize> {
        self.patterns.matches(relative).into_iter().min()
    }

    /// Plan the placement of every non-directory entry under `staging`.
    pub fn plan(&self, staging: &Path) -> Result<LayoutPlan> {
        let mut plan = LayoutPlan::default();
        let mut targets: BTreeMap<(Anchor, PathBuf), PathBuf> = BTreeMap::new();

        let walker = WalkDir::new(staging)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let Ok(source) = entry.path().strip_prefix(staging) else {
                continue;
            };
            let source = source.to_path_buf();

            let Some(index) = self.classify(&source) else {
                match self.policy {
                    UnmatchedPolicy::Strict => return Err(LayoutError::Unclassified(source)),
                    UnmatchedPolicy::Drop => {
                        tracing::warn!(file = %source.display(), "no layout rule matches, dropping");
                        plan.dropped.push(DroppedFile {
                            source,
                            reason: DropReason::Unclassified,
                        });
                        continue;
                    }
                }
            };

            let rule = &self.rules[index];
            if let FileClass::Excluded(platform) = &rule.class {
                tracing::debug!(file = %source.display(), %platform, "excluded");
                plan.dropped.push(DroppedFile {
                    source,
                    reason: DropReason::Excluded(platform.clone()),
                });
                continue;
            }
            let anchor = rule.class.anchor().unwrap_or(Anchor::Prefix);

            let target = rule.target_for(&source, index)?;
            self.check_reserved(&source, anchor, &target)?;
            if let Some(first) = targets.insert((anchor, target.clone()), source.clone()) {
                return Err(LayoutError::Collision {
                    target,
                    first,
                    second: source,
                });
            }

            tracing::debug!(file = %source.display(), class = ?rule.class, ?anchor, target = %target.display(), "planned");
            plan.files.push(PlannedFile {
                source,
                class: rule.class.clone(),
                anchor,
                target,
                rule: index,
            });
        }

        Ok(plan)
    }

    fn check_reserved(&self, source: &Path, anchor: Anchor, target: &Path) -> Result<()> {
        let hit = self
            .reserved
            .iter()
            .any(|(a, reserved)| *a == anchor && target.starts_with(reserved));
        if hit {
            return Err(LayoutError::Reserved {
                source_path: source.to_path_buf(),
                target: target.to_path_buf(),
            });
        }
        Ok(())
    }
}

impl Rule {
    fn target_for(&self, source: &Path, index: usize) -> Result<PathBuf> {
        let tail: PathBuf = if self.flatten {
            source.file_name().map(PathBuf::from).unwrap_or_default()
        } else {
            source
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .skip(self.strip)
                .collect()
        };

        if tail.as_os_str().is_empty() {
            return Err(LayoutError::StripTooFar {
                source_path: source.to_path_buf(),
                rule: index,
                strip: self.strip,
            });
        }
        Ok(self.into.join(tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner(rules: Vec<LayoutRuleSpec>) -> LayoutPlanner {
        LayoutPlanner::new(&rules).unwrap()
    }

    #[test]
    fn first_matching_rule_wins() {
        let planner = planner(vec![
            LayoutRuleSpec::new("lib/sigar/*", FileClass::Library).into_dir("libexec/sigar").flatten(),
            LayoutRuleSpec::new("lib/*.jar", FileClass::Library).into_dir("libexec").flatten(),
            LayoutRuleSpec::new("**", FileClass::Payload),
        ]);

        assert_eq!(planner.classify(Path::new("lib/sigar/libsigar.dylib")), Some(0));
        assert_eq!(planner.classify(Path::new("lib/core.jar")), Some(1));
        assert_eq!(planner.classify(Path::new("NOTICE.txt")), Some(2));
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let planner = planner(vec![LayoutRuleSpec::new("lib/*.jar", FileClass::Library)]);
        assert_eq!(planner.classify(Path::new("lib/core.jar")), Some(0));
        assert_eq!(planner.classify(Path::new("lib/sigar/sigar.jar")), None);
    }

    #[test]
    fn target_paths() {
        let strip = Rule {
            class: FileClass::Configuration,
            into: PathBuf::new(),
            strip: 1,
            flatten: false,
        };
        assert_eq!(
            strip.target_for(Path::new("config/nested/app.yml"), 0).unwrap(),
            PathBuf::from("nested/app.yml")
        );

        let flat = Rule {
            class: FileClass::Library,
            into: PathBuf::from("libexec"),
            strip: 0,
            flatten: true,
        };
        assert_eq!(
            flat.target_for(Path::new("lib/deep/x.jar"), 0).unwrap(),
            PathBuf::from("libexec/x.jar")
        );

        assert!(matches!(
            strip.target_for(Path::new("config"), 3),
            Err(LayoutError::StripTooFar { rule: 3, .. })
        ));
    }

    #[test]
    fn escaping_target_directory_is_rejected() {
        let err = LayoutPlanner::new(&[
            LayoutRuleSpec::new("**", FileClass::Payload).into_dir("../outside")
        ])
        .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidTarget { rule: 0, .. }));
    }

    #[test]
    fn bad_glob_is_reported() {
        let err = LayoutPlanner::new(&[LayoutRuleSpec::new("bin/[", FileClass::Executable)])
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidPattern { .. }));
    }

    #[test]
    fn standard_rules_compile() {
        let planner = LayoutPlanner::standard().unwrap();
        assert_eq!(planner.classify(Path::new("bin/plugin.bat")), Some(0));
        assert_eq!(planner.classify(Path::new("bin/plugin")), Some(1));
        assert_eq!(planner.classify(Path::new("config/app.yml")), Some(2));
        assert_eq!(planner.classify(Path::new("LICENSE.txt")), Some(6));
    }
}
