use std::path::{MAIN_SEPARATOR, PathBuf};

/// The module-search configuration of one interpreter.
///
/// These are the three strings stored in the script-visible `package` map.
/// Thread workers receive a verbatim copy of the spawner's values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageConfig {
    pub path: String,
    pub cpath: String,
    pub config: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            path: "./?.sk;./?/init.sk".to_string(),
            cpath: "./?.so".to_string(),
            config: format!("{MAIN_SEPARATOR}\n;\n?\n!\n-\n"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Separators {
    pub dir: char,
    pub template: char,
    pub mark: char,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
#[error("invalid package.config: {reason}")]
#[diagnostic(code(skein::package::config))]
pub struct PackageConfigError {
    pub reason: String,
}

impl PackageConfig {
    pub fn new(
        path: impl Into<String>,
        cpath: impl Into<String>,
        config: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            cpath: cpath.into(),
            config: config.into(),
        }
    }

    /// Parse the first three lines of `config`: directory separator,
    /// template separator, substitution mark. Each must be one character.
    pub fn separators(&self) -> Result<Separators, PackageConfigError> {
        const ROLES: [&str; 3] = ["directory separator", "template separator", "substitution mark"];

        let mut lines = self.config.lines();
        let mut chars = ['\0'; 3];
        for (slot, role) in chars.iter_mut().zip(ROLES) {
            let line = lines.next().ok_or_else(|| PackageConfigError {
                reason: format!("missing {role} line"),
            })?;
            let mut it = line.chars();
            match (it.next(), it.next()) {
                (Some(c), None) => *slot = c,
                _ => {
                    return Err(PackageConfigError {
                        reason: format!("{role} must be a single character, got {line:?}"),
                    });
                }
            }
        }

        Ok(Separators {
            dir: chars[0],
            template: chars[1],
            mark: chars[2],
        })
    }
}

/// Expand every template of `path` for `name` and return the first existing
/// file, along with the candidates that were tried.
pub fn search_path(name: &str, path: &str, seps: Separators) -> (Option<PathBuf>, Vec<String>) {
    let name_path = name.replace('.', &seps.dir.to_string());
    let mut tried = Vec::new();

    for template in path.split(seps.template).filter(|t| !t.is_empty()) {
        let candidate = template.replace(seps.mark, &name_path);
        let file = PathBuf::from(&candidate);
        if file.is_file() {
            return (Some(file), tried);
        }
        tried.push(candidate);
    }

    (None, tried)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let seps = PackageConfig::default().separators().unwrap();
        assert_eq!(seps.dir, MAIN_SEPARATOR);
        assert_eq!(seps.template, ';');
        assert_eq!(seps.mark, '?');
    }

    #[test]
    fn config_lines_must_be_single_characters() {
        let cfg = PackageConfig::new("", "", "/\n;;\n?\n");
        let err = cfg.separators().unwrap_err();
        assert!(err.reason.contains("template separator"));

        let short = PackageConfig::new("", "", "/\n;");
        assert!(short.separators().unwrap_err().reason.contains("substitution mark"));
    }

    #[test]
    fn search_maps_dots_to_directories() {
        let seps = Separators {
            dir: '/',
            template: ';',
            mark: '?',
        };
        let (found, tried) = search_path("a.b", "/nonexistent/?.sk;;/nope/?/init.sk", seps);
        assert!(found.is_none());
        assert_eq!(tried, vec!["/nonexistent/a/b.sk", "/nope/a/b/init.sk"]);
    }
}
