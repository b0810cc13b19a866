use std::collections::BTreeMap;

use uuid::Uuid;

use crate::{InstallationPrefix, PackageSpec, ResourceError, Result};

/// Named values available to `{placeholder}` templates in formulas.
///
/// Built once per install from explicit inputs only; nothing is read from the
/// process environment, so rendering is a pure function of the context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Context {
    vars: BTreeMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard variables for `spec` installed at `prefix` in environment `env`.
    ///
    /// `{install_id}` is a UUIDv5 of the package name and prefix path: unique
    /// per installation and identical on every re-run.
    pub fn for_install(spec: &PackageSpec, prefix: &InstallationPrefix, env: &str) -> Self {
        let install_id = Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            format!("keg://{}/{}", spec.name, prefix.prefix().display()).as_bytes(),
        );
        let display = |p: &std::path::Path| p.display().to_string();

        Self::new()
            .with("name", &spec.name)
            .with("version", &spec.version)
            .with("env", env)
            .with("install_id", install_id.to_string())
            .with("root", display(prefix.root()))
            .with("prefix", display(prefix.prefix()))
            .with("bin", display(&prefix.bin()))
            .with("libexec", display(&prefix.libexec()))
            .with("config_root", display(prefix.config_root()))
            .with("var_root", display(prefix.var_root()))
            .with("data_dir", display(&prefix.data_dir()))
            .with("log_dir", display(&prefix.log_dir()))
            .with("plugins_dir", display(&prefix.plugins_dir()))
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Add user variables. Built-in names are not overridden.
    pub fn extend<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.vars.entry(k.into()).or_insert_with(|| v.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Substitute every `{name}` in `template`. `{{` and `}}` produce literal braces.
    pub fn expand(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if tail.starts_with("{{") {
                out.push('{');
                rest = &tail[2..];
            } else if tail.starts_with("}}") {
                out.push('}');
                rest = &tail[2..];
            } else if tail.starts_with('}') {
                out.push('}');
                rest = &tail[1..];
            } else {
                let end = tail
                    .find('}')
                    .ok_or_else(|| ResourceError::UnclosedPlaceholder(template.to_owned()))?;
                let name = &tail[1..end];
                let value = self.get(name).ok_or_else(|| ResourceError::UnknownVariable {
                    name: name.to_owned(),
                    template: template.to_owned(),
                })?;
                out.push_str(value);
                rest = &tail[end + 1..];
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keg_verify::Checksum;

    fn ctx() -> Context {
        let spec = PackageSpec::archive("demo", "1.0", "file:///d.tgz", Checksum::of(b"x"));
        let prefix = InstallationPrefix::new("/opt/keg", &spec).unwrap();
        Context::for_install(&spec, &prefix, "development").extend([("cluster_name", "demo_alice")])
    }

    #[test]
    fn expands_known_variables() {
        let out = ctx()
            .expand("path.data: {data_dir}/{cluster_name}")
            .unwrap();
        assert_eq!(out, "path.data: /opt/keg/var/demo/data/demo_alice");
    }

    #[test]
    fn escaped_braces_survive() {
        assert_eq!(ctx().expand("{{literal}} {name}").unwrap(), "{literal} demo");
    }

    #[test]
    fn unknown_and_unclosed_fail() {
        assert!(matches!(
            ctx().expand("{nope}"),
            Err(ResourceError::UnknownVariable { .. })
        ));
        assert!(matches!(
            ctx().expand("{name"),
            Err(ResourceError::UnclosedPlaceholder(_))
        ));
    }

    #[test]
    fn install_id_is_stable() {
        let a = ctx().get("install_id").unwrap().to_owned();
        let b = ctx().get("install_id").unwrap().to_owned();
        assert_eq!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn user_vars_do_not_shadow_builtins() {
        let ctx = ctx().extend([("prefix", "/elsewhere")]);
        assert_eq!(ctx.get("prefix"), Some("/opt/keg/cellar/demo/1.0"));
    }
}
