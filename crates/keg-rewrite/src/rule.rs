use std::path::PathBuf;

use keg_resource::{Anchor, Context, RewriteRuleSpec, check_relative};
use regex::Regex;

use crate::error::{Result, RewriteError};

#[derive(Clone, Debug)]
enum Matcher {
    Literal(String),
    Regex(Regex),
}

/// A compiled substitution.
///
/// The replacement is inserted verbatim (no capture-group expansion) at each
/// match, except where the match lies inside an occurrence of the rendered
/// replacement. That check is what makes re-application a no-op.
#[derive(Clone, Debug)]
pub struct RewriteRule {
    index: usize,
    root: Anchor,
    file: String,
    matcher: Matcher,
    replace: String,
    all: bool,
    mandatory: bool,
}

/// Effect of one rule on one text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleOutcome {
    /// This many matches were replaced.
    Applied(usize),
    /// Every relevant match, or the file itself, already carries the replacement.
    AlreadyApplied,
    /// Optional rule with nothing to do.
    Skipped,
}

impl RewriteRule {
    pub fn compile(index: usize, spec: &RewriteRuleSpec) -> Result<Self> {
        if spec.pattern.is_empty() {
            return Err(RewriteError::EmptyPattern { rule: index });
        }
        let matcher = if spec.regex {
            Matcher::Regex(
                Regex::new(&spec.pattern)
                    .map_err(|source| RewriteError::InvalidPattern { rule: index, source })?,
            )
        } else {
            Matcher::Literal(spec.pattern.clone())
        };
        Ok(Self {
            index,
            root: spec.root,
            file: spec.file.clone(),
            matcher,
            replace: spec.replace.clone(),
            all: spec.all,
            mandatory: spec.mandatory,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn root(&self) -> Anchor {
        self.root
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn pattern(&self) -> &str {
        match &self.matcher {
            Matcher::Literal(s) => s,
            Matcher::Regex(re) => re.as_str(),
        }
    }

    /// Target file relative to the rule's root, rendered with `ctx`.
    pub fn file(&self, ctx: &Context) -> Result<PathBuf> {
        let rendered = self.render(&self.file, ctx)?;
        let path = PathBuf::from(rendered);
        check_relative(&path).map_err(|source| RewriteError::Template {
            rule: self.index,
            source,
        })?;
        Ok(path)
    }

    pub fn replacement(&self, ctx: &Context) -> Result<String> {
        self.render(&self.replace, ctx)
    }

    fn render(&self, template: &str, ctx: &Context) -> Result<String> {
        ctx.expand(template).map_err(|source| RewriteError::Template {
            rule: self.index,
            source,
        })
    }

    fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        match &self.matcher {
            Matcher::Literal(needle) => text
                .match_indices(needle.as_str())
                .map(|(start, m)| (start, start + m.len()))
                .collect(),
            Matcher::Regex(re) => re.find_iter(text).map(|m| (m.start(), m.end())).collect(),
        }
    }

    /// Apply the rule to `text` with an already rendered `replacement`.
    ///
    /// Returns the new text when anything changed, or `None` when the pattern
    /// is absent and the replacement is nowhere in the text. A deletion (empty
    /// replacement) whose pattern is gone counts as already applied.
    pub(crate) fn rewrite(&self, text: &str, replacement: &str) -> Option<(Option<String>, RuleOutcome)> {
        let spans = self.spans(text);
        if spans.is_empty() {
            if replacement.is_empty() || text.contains(replacement) {
                return Some((None, RuleOutcome::AlreadyApplied));
            }
            return None;
        }

        let existing = occurrences(text, replacement);
        let mut out = String::with_capacity(text.len() + replacement.len());
        let mut last = 0;
        let mut replaced = 0;
        for (start, end) in spans {
            if start < last {
                continue;
            }
            // a match that sits inside an earlier replacement was produced by this rule
            let applied = existing.iter().any(|&(s, e)| s <= start && end <= e);
            if !applied {
                out.push_str(&text[last..start]);
                out.push_str(replacement);
                last = end;
                replaced += 1;
            }
            if !self.all {
                break;
            }
        }

        if replaced == 0 {
            return Some((None, RuleOutcome::AlreadyApplied));
        }
        out.push_str(&text[last..]);
        Some((Some(out), RuleOutcome::Applied(replaced)))
    }
}

/// Byte ranges of every occurrence of `needle`, overlapping ones included.
fn occurrences(text: &str, needle: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    if needle.is_empty() {
        return out;
    }
    let mut from = 0;
    while let Some(pos) = text[from..].find(needle) {
        let start = from + pos;
        out.push((start, start + needle.len()));
        from = start + text[start..].chars().next().map_or(1, char::len_utf8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, regex: bool, all: bool) -> RewriteRule {
        RewriteRule::compile(
            0,
            &RewriteRuleSpec {
                root: Anchor::Config,
                file: "app.yml".into(),
                pattern: pattern.into(),
                regex,
                replace: String::new(),
                all,
                mandatory: true,
            },
        )
        .unwrap()
    }

    fn apply_twice(rule: &RewriteRule, text: &str, replacement: &str) -> String {
        let (once, _) = rule.rewrite(text, replacement).unwrap();
        let once = once.unwrap_or_else(|| text.to_string());
        let (twice, outcome) = rule.rewrite(&once, replacement).unwrap();
        assert_eq!(twice, None, "second application changed the text");
        assert_eq!(outcome, RuleOutcome::AlreadyApplied);
        once
    }

    #[test]
    fn literal_replacement_is_idempotent() {
        let out = apply_twice(&rule("#host: 0.0.0.0", false, false), "a\n#host: 0.0.0.0\n", "host: 127.0.0.1");
        assert_eq!(out, "a\nhost: 127.0.0.1\n");
    }

    #[test]
    fn insertion_after_anchor_line_is_idempotent() {
        let text = "#!/bin/sh\n\nSCRIPT=\"$0\"\nexec java\n";
        let r = rule("SCRIPT=\"$0\"", false, false);
        let out = apply_twice(&r, text, "SCRIPT=\"$0\"\nES_CLASSPATH=/opt/libexec");
        assert_eq!(out, "#!/bin/sh\n\nSCRIPT=\"$0\"\nES_CLASSPATH=/opt/libexec\nexec java\n");
    }

    #[test]
    fn replacement_quoting_the_pattern_is_idempotent() {
        let r = rule("port: 9200", false, false);
        let out = apply_twice(&r, "http.port: 9200\n", "port: 19200 # was port: 9200");
        assert_eq!(out, "http.port: 19200 # was port: 9200\n");

        let r = rule("9200", false, true);
        let out = apply_twice(&r, "a: 9200\nb: 9200\n", "19200 (9200)");
        assert_eq!(out, "a: 19200 (9200)\nb: 19200 (9200)\n");
    }

    #[test]
    fn overlapping_occurrences_are_found() {
        assert_eq!(occurrences("aaa", "aa"), vec![(0, 2), (1, 3)]);
        assert!(occurrences("abc", "").is_empty());
    }

    #[test]
    fn regex_replacement_is_verbatim() {
        let r = rule(r"(?m)^#?\s*cluster\.name:.*$", true, false);
        let out = apply_twice(&r, "# cluster.name: elasticsearch\n", "cluster.name: $USER_${1}");
        assert_eq!(out, "cluster.name: $USER_${1}\n");
    }

    #[test]
    fn all_replaces_every_match() {
        let r = rule("lib/", false, true);
        let (out, outcome) = r
            .rewrite("CP=$HOME/lib/a.jar:$HOME/lib/b.jar", "libexec/")
            .unwrap();
        assert_eq!(out.unwrap(), "CP=$HOME/libexec/a.jar:$HOME/libexec/b.jar");
        assert_eq!(outcome, RuleOutcome::Applied(2));
    }

    #[test]
    fn first_only_touches_one_match() {
        let r = rule("x", false, false);
        let (out, _) = r.rewrite("x x x", "y").unwrap();
        assert_eq!(out.unwrap(), "y x x");
    }

    #[test]
    fn absent_pattern_without_replacement_is_an_error() {
        let r = rule("#host: 0.0.0.0", false, false);
        assert!(r.rewrite("port: 9200\n", "host: 127.0.0.1").is_none());
    }

    #[test]
    fn deletion_is_idempotent() {
        let r = rule("\r", false, true);
        let out = apply_twice(&r, "a\r\nb\r\n", "");
        assert_eq!(out, "a\nb\n");
    }

    #[test]
    fn invalid_regex_names_the_rule() {
        let err = RewriteRule::compile(
            4,
            &RewriteRuleSpec {
                root: Anchor::Prefix,
                file: "bin/x".into(),
                pattern: "(".into(),
                regex: true,
                replace: String::new(),
                all: false,
                mandatory: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, RewriteError::InvalidPattern { rule: 4, .. }));
    }
}
