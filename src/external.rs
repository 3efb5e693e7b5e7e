use crate::command::ExitCode;
use crate::env::Environment;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// Resolve a program name the way a typical shell would, relative to the
/// session's working directory rather than the process one.
///
/// Behavior:
/// - Absolute path: returns it if it is a file.
/// - `./foo` or any relative path with several components (e.g. `bin/sh`):
///   joined onto `cwd` and returned if it is a file.
/// - Single component: each directory of `PATH` is searched in order.
/// - Empty name: `None`.
pub fn resolve_program(name: &str, cwd: &Path, env: &Environment) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return find_by_path(path);
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        // Empty path -> not found
        (None, _) => None,
        (Some(_), None) if !name.starts_with("./") => {
            let search_paths = env.get_var("PATH")?;
            find_in_path(OsStr::new(&search_paths), path.as_os_str())
        }
        // `./foo` or multiple components -> relative to the working directory
        _ => find_by_path(&cwd.join(path)),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths).find_map(|dir| find_by_path(&dir.join(cmd)))
}

fn find_by_path(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        Some(path.to_path_buf())
    } else {
        None
    }
}

/// Collapse an exit status into a shell-style code.
pub fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(x) => x,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> ExitCode {
    -1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::fs::File;
    use tempfile::TempDir;

    fn path_env(path: &str) -> Environment {
        let mut env = Environment::default();
        env.set_var("PATH", path);
        env
    }

    #[test]
    #[cfg(unix)]
    fn absolute_existing_true() {
        let res = resolve_program("/bin/sh", Path::new("/"), &path_env("/bin"));
        assert_eq!(res.as_deref(), Some(Path::new("/bin/sh")));
    }

    #[test]
    #[cfg(unix)]
    fn absolute_nonexisting() {
        let res = resolve_program("/bin/nonexisting", Path::new("/"), &path_env("/bin"));
        assert!(
            res.is_none(),
            "Expected not to find /bin/nonexisting via absolute path"
        );
    }

    #[test]
    #[cfg(unix)]
    fn single_component_found_in_path() {
        let found = resolve_program("sh", Path::new("/"), &path_env("/nowhere:/bin"))
            .expect("Expected to find 'sh' in /bin via PATH search");
        assert_eq!(found, Path::new("/bin/sh"));
    }

    #[test]
    #[cfg(unix)]
    fn single_component_not_found_in_path() {
        let res = resolve_program("nonexisting", Path::new("/"), &path_env("/bin"));
        assert!(res.is_none(), "Expected not to find 'nonexisting' in PATH");
    }

    #[test]
    fn single_component_without_path_var() {
        let res = resolve_program("sh", Path::new("/"), &Environment::default());
        assert!(res.is_none());
    }

    #[test]
    fn multiple_components_relative_to_session_dir() {
        let tmp = TempDir::new().expect("temp dir");
        fs::create_dir_all(tmp.path().join("bin")).expect("create temp bin dir");
        File::create(tmp.path().join("bin").join("tool")).expect("touch bin/tool");

        let found = resolve_program("bin/tool", tmp.path(), &path_env("/does/not/matter"))
            .expect("Expected to find relative 'bin/tool' in session dir");
        assert_eq!(found, tmp.path().join("bin/tool"));
    }

    #[test]
    fn dot_prefix_is_resolved_against_session_dir() {
        let tmp = TempDir::new().expect("temp dir");
        File::create(tmp.path().join("foo")).expect("touch foo");

        let found = resolve_program("./foo", tmp.path(), &path_env("/bin"))
            .expect("Expected to find './foo' in session dir");
        assert_eq!(found, tmp.path().join("./foo"));
    }

    #[test]
    fn directories_are_not_programs() {
        let tmp = TempDir::new().expect("temp dir");
        fs::create_dir(tmp.path().join("dir")).unwrap();
        assert!(resolve_program("./dir", tmp.path(), &Environment::default()).is_none());
    }

    #[test]
    fn empty_path_is_none() {
        let res = resolve_program("", Path::new("/"), &path_env("/bin"));
        assert!(res.is_none(), "Empty path should not resolve to anything");
    }
}
