use std::collections::BTreeMap;
use std::path::PathBuf;

use keg_fs::AtomicWriteOptions;
use keg_resource::{Anchor, Context, RewriteRuleSpec};

use crate::error::{Result, RewriteError};
use crate::rule::{RewriteRule, RuleOutcome};

/// Result of one rule during [`TemplateRewriter::apply`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedRule {
    pub rule: usize,
    pub file: PathBuf,
    pub outcome: RuleOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub rules: Vec<AppliedRule>,
    /// Files whose content changed, in write order.
    pub changed: Vec<PathBuf>,
}

impl RewriteReport {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

struct Buffer {
    text: String,
    dirty: bool,
}

/// Applies an ordered list of [`RewriteRule`]s to files under the prefix and
/// config roots.
#[derive(Clone, Debug, Default)]
pub struct TemplateRewriter {
    rules: Vec<RewriteRule>,
}

impl TemplateRewriter {
    pub fn new(specs: &[RewriteRuleSpec]) -> Result<Self> {
        let rules = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| RewriteRule::compile(index, spec))
            .collect::<Result<_>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order. `root` maps an anchor to the directory that
    /// currently holds that tree, which is a staging copy during installation.
    ///
    /// Nothing is written unless every rule succeeds. Rules targeting the same
    /// file see each other's output.
    pub fn apply(&self, root: impl Fn(Anchor) -> PathBuf, ctx: &Context) -> Result<RewriteReport> {
        let mut buffers: BTreeMap<PathBuf, Buffer> = BTreeMap::new();
        let mut order: Vec<PathBuf> = Vec::new();
        let mut report = RewriteReport::default();

        for rule in &self.rules {
            let relative = rule.file(ctx)?;
            let path = root(rule.root()).join(&relative);
            let replacement = rule.replacement(ctx)?;

            if !buffers.contains_key(&path) {
                match std::fs::read_to_string(&path) {
                    Ok(text) => {
                        buffers.insert(path.clone(), Buffer { text, dirty: false });
                        order.push(path.clone());
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound && !rule.is_mandatory() => {
                        tracing::debug!(rule = rule.index(), file = %relative.display(), "optional rewrite target missing");
                        report.rules.push(AppliedRule {
                            rule: rule.index(),
                            file: relative,
                            outcome: RuleOutcome::Skipped,
                        });
                        continue;
                    }
                    Err(source) => {
                        return Err(RewriteError::Read {
                            rule: rule.index(),
                            path,
                            source,
                        });
                    }
                }
            }
            let Some(buffer) = buffers.get_mut(&path) else {
                continue;
            };

            let outcome = match rule.rewrite(&buffer.text, &replacement) {
                Some((Some(text), outcome)) => {
                    buffer.text = text;
                    buffer.dirty = true;
                    outcome
                }
                Some((None, outcome)) => outcome,
                None if rule.is_mandatory() => {
                    return Err(RewriteError::PatternNotFound {
                        file: relative,
                        rule: rule.index(),
                        pattern: rule.pattern().to_string(),
                    });
                }
                None => RuleOutcome::Skipped,
            };

            tracing::debug!(rule = rule.index(), file = %relative.display(), ?outcome, "rewrite rule");
            report.rules.push(AppliedRule {
                rule: rule.index(),
                file: relative,
                outcome,
            });
        }

        for path in order {
            let Some(buffer) = buffers.remove(&path) else {
                continue;
            };
            if buffer.dirty {
                keg_fs::atomic_write(
                    &path,
                    buffer.text.as_bytes(),
                    AtomicWriteOptions::new().mode_of(&path),
                )?;
                report.changed.push(path);
            }
        }

        Ok(report)
    }
}
