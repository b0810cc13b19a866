//! Idempotent, ordered text substitutions.
//!
//! Each rule names a file under the prefix or config root, a literal or
//! regular-expression pattern and a replacement template rendered from the
//! install [`Context`](keg_resource::Context). Re-running a rule set over
//! already rewritten files leaves them byte-identical.

mod error;
mod rewriter;
mod rule;

pub use error::{Result, RewriteError};
pub use rewriter::{AppliedRule, RewriteReport, TemplateRewriter};
pub use rule::{RewriteRule, RuleOutcome};
