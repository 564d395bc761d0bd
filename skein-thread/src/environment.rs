use std::sync::Arc;

use skein_interpret::{Interpreter, InterpreterConfig, PackageConfig};

use crate::bindings;
use crate::config::ThreadConfig;
use crate::error::EnvironmentError;

/// Builds the fresh interpreter each worker runs its task in.
#[derive(Clone, Debug)]
pub struct EnvironmentFactory {
    config: Arc<ThreadConfig>,
}

impl EnvironmentFactory {
    pub fn new(config: Arc<ThreadConfig>) -> Self {
        Self { config }
    }

    /// A new interpreter with the given module-search strings, the thread
    /// and queue modules, and a traceback-appending message handler.
    pub fn build(&self, package: &PackageConfig) -> Result<Interpreter, EnvironmentError> {
        package.separators().map_err(|e| EnvironmentError { detail: e.to_string() })?;

        let mut interp = Interpreter::new(InterpreterConfig {
            max_call_depth: self.config.max_call_depth,
            package: package.clone(),
            capture_output: false,
        });
        bindings::install(&mut interp, Arc::clone(&self.config));
        interp.set_message_handler(|err| err.with_traceback());

        tracing::trace!(path = %package.path, cpath = %package.cpath, "built worker environment");
        Ok(interp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_package_strings_verbatim() {
        let package = PackageConfig::new("/srv/?.sk", "/srv/?.so", "/\n;\n?\n");
        let interp = EnvironmentFactory::new(Arc::default()).build(&package).unwrap();
        assert_eq!(interp.package_config(), package);
    }

    #[test]
    fn rejects_malformed_config() {
        let package = PackageConfig::new("", "", "//\n;\n?\n");
        let err = EnvironmentFactory::new(Arc::default()).build(&package).unwrap_err();
        assert!(
            err.to_string()
                .starts_with("environment construction failed: invalid package.config")
        );
    }
}
