use std::path::{Path, PathBuf};

use crate::dispatch::RepositoryPath;

/// A repository that exists on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub directory: PathBuf,
    /// Logical path of the directory that was found, e.g. `git/project.git`.
    /// Every spelling of a request that finds the same directory yields the
    /// same path.
    pub repository: RepositoryPath,
}

/// Maps logical repository paths such as `/git/group/project.git` onto Git
/// directories below a root directory.
///
/// The first path segment names the repository type and must match the
/// configured one; it is not part of the physical path.
#[derive(Clone, Debug)]
pub struct RepositoryResolver {
    root: PathBuf,
    repository_type: String,
}

fn is_git_dir(path: &Path) -> bool {
    path.join("HEAD").is_file() && path.join("objects").is_dir()
}

impl RepositoryResolver {
    pub fn new(root: impl Into<PathBuf>, repository_type: &str) -> RepositoryResolver {
        RepositoryResolver {
            root: root.into(),
            repository_type: repository_type.to_string(),
        }
    }

    /// Strip the type prefix and return the remaining segments, without
    /// empty and `.` segments.
    fn segments<'a>(&self, repository: &'a RepositoryPath) -> Option<Vec<&'a str>> {
        let mut segments = repository
            .as_str()
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".");
        if segments.next()? != self.repository_type {
            return None;
        }
        let rest: Vec<&str> = segments.collect();
        if rest.is_empty() {
            return None;
        }
        Some(rest)
    }

    /// Find the Git directory for `repository`.
    ///
    /// With `strict` the path must name the Git directory exactly. Otherwise
    /// `<path>.git` and `<path>/.git` are tried as well.
    pub fn resolve(&self, repository: &RepositoryPath, strict: bool) -> Option<Resolved> {
        let rest = crate::some_or!(self.segments(repository), {
            tracing::debug!(%repository, "missing repository type prefix");
            return None;
        });
        let rest = rest.join("/");

        let mut candidates = vec![rest.clone()];
        if !strict {
            candidates.push(format!("{}.git", rest));
            candidates.push(format!("{}/.git", rest));
        }

        let found = candidates
            .into_iter()
            .find(|c| is_git_dir(&self.root.join(c)));
        let relative = crate::some_or!(found, {
            tracing::debug!(%repository, strict, "no git directory found");
            return None;
        });

        Some(Resolved {
            directory: self.root.join(&relative),
            repository: RepositoryPath::new(&format!("{}/{}", self.repository_type, relative))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_git_dir(path: &Path) {
        std::fs::create_dir_all(path.join("objects")).unwrap();
        std::fs::write(path.join("HEAD"), "ref: refs/heads/master\n").unwrap();
    }

    fn repo(p: &str) -> RepositoryPath {
        RepositoryPath::new(p).unwrap()
    }

    fn found(resolver: &RepositoryResolver, p: &str, strict: bool) -> Option<(PathBuf, String)> {
        resolver
            .resolve(&repo(p), strict)
            .map(|r| (r.directory, r.repository.as_str().to_string()))
    }

    fn at(root: &Path, directory: &str, logical: &str) -> Option<(PathBuf, String)> {
        Some((root.join(directory), logical.to_string()))
    }

    #[test]
    fn test_resolve() {
        let td = tempdir::TempDir::new("scm-ssh-repos").unwrap();
        let root = td.path();
        make_git_dir(&root.join("bare.git"));
        make_git_dir(&root.join("group/plain"));
        make_git_dir(&root.join("work/.git"));
        std::fs::create_dir_all(root.join("empty")).unwrap();

        let resolver = RepositoryResolver::new(root, "git");

        assert_eq!(
            found(&resolver, "/git/bare.git", true),
            at(root, "bare.git", "git/bare.git")
        );
        assert_eq!(
            found(&resolver, "git/group/plain/", true),
            at(root, "group/plain", "git/group/plain")
        );

        assert_eq!(found(&resolver, "/git/bare", true), None);
        assert_eq!(
            found(&resolver, "/git/bare", false),
            at(root, "bare.git", "git/bare.git")
        );

        assert_eq!(found(&resolver, "/git/work", true), None);
        assert_eq!(
            found(&resolver, "/git/work", false),
            at(root, "work/.git", "git/work/.git")
        );

        assert_eq!(found(&resolver, "/git/empty", false), None);
        assert_eq!(found(&resolver, "/git/missing", false), None);
    }

    #[test]
    fn test_resolve_same_repository_same_path() {
        let td = tempdir::TempDir::new("scm-ssh-repos").unwrap();
        let root = td.path();
        make_git_dir(&root.join("group/project.git"));
        let resolver = RepositoryResolver::new(root, "git");

        for p in [
            "/git/group/project",
            "/git/group/project.git",
            "/git/group/project.git/",
            "git//group/./project.git",
            "//git/group/project",
        ] {
            assert_eq!(
                found(&resolver, p, false),
                at(root, "group/project.git", "git/group/project.git"),
                "{}",
                p
            );
        }
        assert_eq!(
            found(&resolver, "/git/group/project.git/", true),
            at(root, "group/project.git", "git/group/project.git")
        );
    }

    #[test]
    fn test_resolve_requires_type_prefix() {
        let td = tempdir::TempDir::new("scm-ssh-repos").unwrap();
        make_git_dir(&td.path().join("bare.git"));
        let resolver = RepositoryResolver::new(td.path(), "git");

        assert_eq!(found(&resolver, "bare.git", false), None);
        assert_eq!(found(&resolver, "/hg/bare.git", false), None);
        assert_eq!(found(&resolver, "/gitbare.git", false), None);
        assert_eq!(found(&resolver, "/git", false), None);
        assert_eq!(found(&resolver, "/git/", false), None);
    }

    #[test]
    fn test_resolve_stays_below_root() {
        let td = tempdir::TempDir::new("scm-ssh-repos").unwrap();
        let resolver = RepositoryResolver::new(td.path().join("repos"), "git");
        make_git_dir(&td.path().join("outside.git"));
        make_git_dir(&td.path().join("repos/inside.git"));

        assert_eq!(found(&resolver, "/git//outside.git", true), None);
        assert_eq!(
            found(&resolver, "/git//inside.git", true),
            at(&td.path().join("repos"), "inside.git", "git/inside.git")
        );
    }
}
