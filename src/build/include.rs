//! Include directories and symbolic-include materialisation.
//!
//! A symbolic include gives a real directory a stable logical name: it is
//! exposed to the compiler as `<build_dir>/sym_links/<name>`, a symlink
//! created on demand with `ln -sfn`.

use crate::error::{BuildError, BuildResult};
use crate::paths::PathResolver;
use crate::process::{self, Command};
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeSpec {
    /// Passed to the compiler as-is.
    Direct { path: PathBuf },
    /// Reached through `sym_links/<logical_name>`.
    Symbolic {
        real_path: PathBuf,
        logical_name: String,
    },
}

impl IncludeSpec {
    pub fn direct(path: impl Into<PathBuf>) -> Self {
        Self::Direct { path: path.into() }
    }

    pub fn symbolic(real_path: impl Into<PathBuf>, logical_name: impl Into<String>) -> Self {
        Self::Symbolic {
            real_path: real_path.into(),
            logical_name: logical_name.into(),
        }
    }

    /// The same include with every path made absolute.
    pub(crate) fn canonicalised(self, resolver: &PathResolver) -> Self {
        match self {
            Self::Direct { path } => Self::Direct {
                path: resolver.canonicalise(path),
            },
            Self::Symbolic {
                real_path,
                logical_name,
            } => Self::Symbolic {
                real_path: resolver.canonicalise(real_path),
                logical_name,
            },
        }
    }
}

/// Owns the `sym_links` directory of a build.
#[derive(Debug, Clone)]
pub struct SymlinkIncludeManager {
    root: PathBuf,
}

impl SymlinkIncludeManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory to pass after `-I` for `include`.
    ///
    /// Symbolic includes are linked on first use. A link that already points
    /// at the requested directory is left alone; one that points elsewhere is
    /// re-pointed, so reusing a logical name for another directory silently
    /// moves it.
    pub fn resolve(&self, include: &IncludeSpec) -> BuildResult<PathBuf> {
        match include {
            IncludeSpec::Direct { path } => Ok(path.clone()),
            IncludeSpec::Symbolic {
                real_path,
                logical_name,
            } => {
                let link = self.link_path(logical_name)?;

                // Linking a path onto itself would create a loop.
                if *real_path == link {
                    return Ok(link);
                }

                match fs::read_link(&link) {
                    Ok(current) if current == *real_path => return Ok(link),
                    Ok(current) => log::warn!(
                        "Re-pointing {} from {} to {}",
                        link.display(),
                        current.display(),
                        real_path.display()
                    ),
                    Err(_) => {}
                }

                let cmd = Command::in_dir(
                    &self.root,
                    [
                        "ln".to_string(),
                        "-sfn".to_string(),
                        real_path.to_string_lossy().into_owned(),
                        link.to_string_lossy().into_owned(),
                    ],
                );
                let code = process::run(&cmd)?;
                if code != 0 {
                    return Err(BuildError::Symlink {
                        link,
                        target: real_path.clone(),
                        code,
                    });
                }
                Ok(link)
            }
        }
    }

    /// `sym_links/<name>`, for names that are exactly one plain component.
    fn link_path(&self, logical_name: &str) -> BuildResult<PathBuf> {
        let mut components = Path::new(logical_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.root.join(name)),
            _ => Err(BuildError::InvalidLogicalName(logical_name.to_string())),
        }
    }

    /// `-I <dir>` pairs for every include, in order.
    pub fn include_args(&self, includes: &[IncludeSpec]) -> BuildResult<Vec<String>> {
        let mut args = Vec::with_capacity(includes.len() * 2);
        for include in includes {
            args.push("-I".to_string());
            args.push(self.resolve(include)?.to_string_lossy().into_owned());
        }
        Ok(args)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, PathResolver, SymlinkIncludeManager) {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(dir.path());
        let links = resolver.cwd().join(".build/sym_links");
        fs::create_dir_all(&links).unwrap();
        (dir, resolver, SymlinkIncludeManager::new(links))
    }

    #[test]
    fn test_direct_include_is_unchanged() {
        let (_dir, resolver, manager) = setup();
        let include = IncludeSpec::direct("include").canonicalised(&resolver);
        let path = manager.resolve(&include).unwrap();
        assert_eq!(path, resolver.cwd().join("include"));
    }

    #[test]
    fn test_symbolic_include_creates_link() {
        let (_dir, resolver, manager) = setup();
        let real = resolver.cwd().join("vendor/lib/include");
        fs::create_dir_all(&real).unwrap();

        let include = IncludeSpec::symbolic(&real, "lib").canonicalised(&resolver);
        let link = manager.resolve(&include).unwrap();

        assert_eq!(link, manager.root().join("lib"));
        assert_eq!(fs::read_link(&link).unwrap(), real);
    }

    #[test]
    fn test_symbolic_include_is_idempotent() {
        let (_dir, resolver, manager) = setup();
        let real = resolver.cwd().join("vendor/lib/include");
        fs::create_dir_all(&real).unwrap();
        let include = IncludeSpec::symbolic(&real, "lib").canonicalised(&resolver);

        let first = manager.resolve(&include).unwrap();
        let second = manager.resolve(&include).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_link(&second).unwrap(), real);
    }

    #[test]
    fn test_reused_name_is_repointed() {
        let (_dir, resolver, manager) = setup();
        let old = resolver.cwd().join("old");
        let new = resolver.cwd().join("new");
        fs::create_dir_all(&old).unwrap();
        fs::create_dir_all(&new).unwrap();

        manager.resolve(&IncludeSpec::symbolic(&old, "lib")).unwrap();
        let link = manager.resolve(&IncludeSpec::symbolic(&new, "lib")).unwrap();
        assert_eq!(fs::read_link(link).unwrap(), new);
    }

    #[test]
    fn test_self_referencing_include_does_not_loop() {
        let (_dir, resolver, manager) = setup();
        let include =
            IncludeSpec::symbolic(manager.root().join("lib"), "lib").canonicalised(&resolver);

        let path = manager.resolve(&include).unwrap();
        assert_eq!(path, manager.root().join("lib"));
        assert!(fs::symlink_metadata(&path).is_err());
    }

    #[test]
    fn test_logical_name_must_stay_in_sym_links() {
        let (dir, resolver, manager) = setup();
        let real = resolver.cwd().join("vendor/lib/include");
        fs::create_dir_all(&real).unwrap();

        for name in ["../../escaped", "a/b", "/abs", "", ".", ".."] {
            let include = IncludeSpec::symbolic(&real, name);
            let result = manager.resolve(&include);
            assert!(
                matches!(result, Err(BuildError::InvalidLogicalName(_))),
                "{:?} was accepted",
                name
            );
        }
        assert!(fs::symlink_metadata(dir.path().join("escaped")).is_err());
        assert_eq!(fs::read_dir(manager.root()).unwrap().count(), 0);
    }

    #[test]
    fn test_include_args_are_paired() {
        let (_dir, resolver, manager) = setup();
        let includes = vec![
            IncludeSpec::direct("a").canonicalised(&resolver),
            IncludeSpec::direct("b").canonicalised(&resolver),
        ];
        let args = manager.include_args(&includes).unwrap();
        assert_eq!(args.len(), 4);
        assert_eq!(args[0], "-I");
        assert!(args[1].ends_with("/a"));
        assert_eq!(args[2], "-I");
        assert!(args[3].ends_with("/b"));
    }
}
