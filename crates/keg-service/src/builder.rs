use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use keg_resource::{Context, InstallationPrefix, PackageSpec, ServiceTemplate};

use crate::descriptor::ServiceDescriptor;
use crate::error::{Result, ServiceError};

/// Pure derivation of a [`ServiceDescriptor`] from a template.
///
/// Values that would otherwise come from the ambient environment (a cluster
/// name derived from the invoking user, say) must be passed in with
/// [`var`](Self::var).
#[derive(Clone, Debug)]
pub struct ServiceDescriptorBuilder<'a> {
    template: &'a ServiceTemplate,
    vars: BTreeMap<String, String>,
}

impl<'a> ServiceDescriptorBuilder<'a> {
    pub fn new(template: &'a ServiceTemplate) -> Self {
        Self {
            template,
            vars: BTreeMap::new(),
        }
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn build(
        &self,
        prefix: &InstallationPrefix,
        spec: &PackageSpec,
        env: &str,
    ) -> Result<ServiceDescriptor> {
        let ctx = Context::for_install(spec, prefix, env).extend(self.vars.clone());
        let t = self.template;

        let program = render(&ctx, "program", &t.program)?;
        if program.is_empty() {
            return Err(ServiceError::EmptyProgram);
        }

        let args = t
            .args
            .iter()
            .enumerate()
            .map(|(i, arg)| render(&ctx, &format!("args[{i}]"), arg))
            .collect::<Result<Vec<_>>>()?;

        let env_map = t
            .env
            .iter()
            .map(|(k, v)| Ok((k.clone(), render(&ctx, &format!("env.{k}"), v)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        let log = |field: &str, template: &Option<String>| -> Result<Option<PathBuf>> {
            template
                .as_deref()
                .map(|s| render(&ctx, field, s).map(|p| anchored(prefix.prefix(), &p)))
                .transpose()
        };

        Ok(ServiceDescriptor {
            label: format!("keg.{}.{}", spec.name, env),
            name: spec.name.clone(),
            version: spec.version.clone(),
            program: anchored(prefix.prefix(), &program),
            args,
            env: env_map,
            working_dir: anchored(prefix.prefix(), &render(&ctx, "working_dir", &t.working_dir)?),
            restart: t.restart,
            run_at_load: t.run_at_load,
            stdout: log("stdout", &t.stdout)?,
            stderr: log("stderr", &t.stderr)?,
        })
    }
}

fn render(ctx: &Context, field: &str, template: &str) -> Result<String> {
    ctx.expand(template).map_err(|source| ServiceError::Template {
        field: field.to_string(),
        source,
    })
}

/// Relative paths are taken relative to the prefix.
fn anchored(prefix: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        prefix.join(path)
    }
}
