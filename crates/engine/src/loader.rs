//! Plugin resolution.

use crate::exec::ExecPlugin;
use crate::plugin::Plugin;
use rebundle_common::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Turns a `--plugin` argument into a plugin.
pub trait PluginLoader {
    fn load(&self, spec: &str) -> Result<Arc<dyn Plugin>>;

    /// Load several plugins, keeping their order.
    fn load_all(&self, specs: &[String]) -> Result<Vec<Arc<dyn Plugin>>> {
        specs.iter().map(|spec| self.load(spec)).collect()
    }
}

/// In-process registry of plugins by name.
#[derive(Default, Clone)]
pub struct StaticPluginLoader {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl StaticPluginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under a name.
    pub fn register(&mut self, name: impl Into<String>, plugin: Arc<dyn Plugin>) -> &mut Self {
        self.plugins.insert(name.into(), plugin);
        self
    }

    pub fn with(mut self, name: impl Into<String>, plugin: impl Plugin + 'static) -> Self {
        self.register(name, Arc::new(plugin));
        self
    }
}

impl PluginLoader for StaticPluginLoader {
    fn load(&self, spec: &str) -> Result<Arc<dyn Plugin>> {
        self.plugins
            .get(spec)
            .cloned()
            .ok_or_else(|| Error::PluginLoad {
                spec: spec.to_string(),
                reason: "no plugin registered under this name".to_string(),
            })
    }
}

/// Loads executables as plugins, resolving paths against a working directory.
#[derive(Debug, Clone)]
pub struct ExecPluginLoader {
    cwd: PathBuf,
}

impl ExecPluginLoader {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }
}

impl PluginLoader for ExecPluginLoader {
    fn load(&self, spec: &str) -> Result<Arc<dyn Plugin>> {
        let load_error = |reason: String| Error::PluginLoad {
            spec: spec.to_string(),
            reason,
        };

        let path = self.cwd.join(spec);
        let metadata = std::fs::metadata(&path)
            .map_err(|e| load_error(format!("{}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(load_error(format!("{} is not a file", path.display())));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(load_error(format!("{} is not executable", path.display())));
            }
        }

        debug!("Loaded plugin {} from {:?}", spec, path);
        Ok(Arc::new(ExecPlugin::new(spec, path)))
    }
}
