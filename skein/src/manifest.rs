#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use skein_interpret::PackageConfig;
use skein_thread::ThreadConfig;
use thiserror::Error;

pub const MANIFEST_NAME: &str = "skein.toml";

#[derive(Debug, Error, Diagnostic)]
#[error("manifest error: {message}")]
#[diagnostic(code(skein::manifest))]
pub struct ManifestError {
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedManifest {
    pub manifest_path: Option<PathBuf>,
    pub project_root: PathBuf,
    pub package: PackageConfig,
    pub threads: ThreadConfig,
    pub max_call_depth: usize,
}

impl ResolvedManifest {
    pub fn empty(project_root: PathBuf) -> Self {
        Self {
            manifest_path: None,
            project_root,
            package: PackageConfig::default(),
            threads: ThreadConfig::default(),
            max_call_depth: ThreadConfig::default().max_call_depth,
        }
    }

    /// `SKEIN_PATH` and `SKEIN_CPATH` replace the manifest's search paths.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("SKEIN_PATH") {
            self.package.path = path;
        }
        if let Some(cpath) = lookup("SKEIN_CPATH") {
            self.package.cpath = cpath;
        }
    }
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    package: Option<Package>,

    #[serde(default)]
    threads: Option<ThreadConfig>,

    #[serde(default)]
    interpreter: Option<InterpreterSection>,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct Package {
    /// Templates relative to the manifest directory, searched in order.
    #[serde(default)]
    path: Option<Vec<String>>,

    #[serde(default)]
    cpath: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct InterpreterSection {
    #[serde(default)]
    max_call_depth: Option<usize>,
}

pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    let mut cur = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start.to_path_buf()
    };

    loop {
        let candidate = cur.join(MANIFEST_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
        match cur.parent() {
            Some(p) => cur = p.to_path_buf(),
            None => return None,
        }
    }
}

/// Find `skein.toml` above `start` and load it. No manifest means defaults.
pub fn load_resolved_manifest(start: &Path) -> Result<ResolvedManifest, ManifestError> {
    let project_root = if start.is_file() {
        start.parent().unwrap_or_else(|| Path::new(".")).to_path_buf()
    } else {
        start.to_path_buf()
    };

    match find_manifest(&project_root) {
        Some(manifest_path) => load_manifest_file(&manifest_path),
        None => Ok(ResolvedManifest::empty(project_root)),
    }
}

pub fn load_manifest_file(manifest_path: &Path) -> Result<ResolvedManifest, ManifestError> {
    let manifest_dir = manifest_path
        .parent()
        .ok_or_else(|| ManifestError {
            message: "manifest has no parent directory".to_string(),
        })?
        .to_path_buf();

    let raw = fs::read_to_string(manifest_path).map_err(|e| ManifestError {
        message: format!("failed to read {}: {e}", manifest_path.display()),
    })?;

    let parsed: Manifest = toml::from_str(&raw).map_err(|e| ManifestError {
        message: format!("failed to parse {}: {e}", manifest_path.display()),
    })?;

    let mut out = ResolvedManifest::empty(manifest_dir.clone());
    out.manifest_path = Some(manifest_path.to_path_buf());

    if let Some(package) = parsed.package {
        if let Some(path) = package.path {
            out.package.path = join_templates(&manifest_dir, &path);
        }
        if let Some(cpath) = package.cpath {
            out.package.cpath = join_templates(&manifest_dir, &cpath);
        }
    }

    if let Some(threads) = parsed.threads {
        if threads.queue_capacity == 0 {
            return Err(ManifestError {
                message: "threads.queue_capacity must be at least 1".to_string(),
            });
        }
        out.threads = threads;
    }

    out.max_call_depth = out.threads.max_call_depth;
    if let Some(depth) = parsed.interpreter.and_then(|i| i.max_call_depth) {
        out.max_call_depth = depth;
    }

    Ok(out)
}

fn join_templates(base: &Path, templates: &[String]) -> String {
    templates
        .iter()
        .map(|t| resolve_path(base, t).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(";")
}

fn resolve_path(base: &Path, p: &str) -> PathBuf {
    let pb = PathBuf::from(p);
    if pb.is_absolute() { pb } else { base.join(pb) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_thread::DropPolicy;

    fn write_manifest(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(MANIFEST_NAME);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_manifest_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_resolved_manifest(dir.path()).unwrap();
        assert!(resolved.manifest_path.is_none());
        assert_eq!(resolved.package, PackageConfig::default());
        assert_eq!(resolved.threads, ThreadConfig::default());
    }

    #[test]
    fn sections_are_read_and_paths_resolved() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"
[package]
path = ["lib/?.sk", "/opt/skein/?.sk"]

[threads]
drop_policy = "detach"
queue_capacity = 4

[interpreter]
max_call_depth = 50
"#,
        );
        let nested = dir.path().join("src");
        fs::create_dir(&nested).unwrap();

        let resolved = load_resolved_manifest(&nested).unwrap();
        let lib = dir.path().join("lib/?.sk");
        assert_eq!(resolved.package.path, format!("{};/opt/skein/?.sk", lib.display()));
        assert_eq!(resolved.package.cpath, PackageConfig::default().cpath);
        assert_eq!(resolved.threads.drop_policy, DropPolicy::Detach);
        assert_eq!(resolved.threads.queue_capacity, 4);
        assert_eq!(resolved.threads.name_prefix, "skein-worker");
        assert_eq!(resolved.max_call_depth, 50);
    }

    #[test]
    fn unknown_keys_and_zero_capacity_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), "[threads]\nstack = 1\n");
        let err = load_manifest_file(&path).unwrap_err();
        assert!(err.message.contains("failed to parse"), "{}", err.message);

        write_manifest(dir.path(), "[threads]\nqueue_capacity = 0\n");
        let err = load_manifest_file(&path).unwrap_err();
        assert!(err.message.contains("queue_capacity"));
    }

    #[test]
    fn environment_overrides_search_paths() {
        let mut resolved = ResolvedManifest::empty(PathBuf::from("."));
        resolved.apply_env(|key| (key == "SKEIN_PATH").then(|| "/env/?.sk".to_string()));
        assert_eq!(resolved.package.path, "/env/?.sk");
        assert_eq!(resolved.package.cpath, PackageConfig::default().cpath);
    }
}
