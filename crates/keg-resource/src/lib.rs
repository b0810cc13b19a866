//! Declarative description types for keg.
//!
//! Everything here is plain data: a [`PackageSpec`] says what to fetch, an
//! [`InstallationPrefix`] says where it lands, a [`Formula`] bundles the rules
//! for laying it out, rewriting its templates and running it as a service.

mod context;
mod error;
mod formula;
mod package;
mod prefix;

pub use context::Context;
pub use error::{ResourceError, Result};
pub use formula::{
    FileClass, Formula, LayoutRuleSpec, PostInstallSpec, RestartPolicy, RewriteRuleSpec,
    ServiceTemplate,
};
pub use package::{BuildRecipe, Dependency, PackageSpec, Source, Stage};
pub use prefix::{Anchor, InstallationPrefix, check_relative};
