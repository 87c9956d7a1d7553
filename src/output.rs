//! Writing the bundle to disk, and the path helpers it needs.

use std::fs;
use std::io;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Normalize a path, removing things like `.` and `..`.
///
/// CAUTION: This does not resolve symlinks (unlike [`std::fs::canonicalize`]).
/// This may cause incorrect or surprising behavior at times. This should be
/// used carefully. Unfortunately, [`std::fs::canonicalize`] can be hard to use
/// correctly, since it can often fail, or on Windows returns annoying device
/// paths.
///
/// Adapted from
/// <https://github.com/rust-lang/cargo/blob/f7acf448fc127df9a77c52cc2bba027790ac4931/crates/cargo-util/src/paths.rs#L76-L116>
pub(crate) fn normalize_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut components = path.components().peekable();
    let mut ret = if let Some(c @ Utf8Component::Prefix(..)) = components.peek().cloned() {
        components.next();
        Utf8PathBuf::from(c.as_str())
    } else {
        Utf8PathBuf::new()
    };

    for component in components {
        match component {
            Utf8Component::Prefix(..) => unreachable!(),
            Utf8Component::RootDir => {
                ret.push(Utf8Component::RootDir);
            }
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if ret.ends_with(Utf8Component::ParentDir) {
                    ret.push(Utf8Component::ParentDir);
                } else {
                    let popped = ret.pop();
                    if !popped && !ret.has_root() {
                        ret.push(Utf8Component::ParentDir);
                    }
                }
            }
            Utf8Component::Normal(c) => {
                ret.push(c);
            }
        }
    }
    ret
}

/// Join a relative path onto the current directory. Absolute paths, and
/// every path when the current directory is unavailable or not UTF-8, are
/// returned unchanged.
pub(crate) fn absolute_path(path: &Utf8Path) -> Utf8PathBuf {
    if path.has_root() {
        return path.to_path_buf();
    }

    match std::env::current_dir().map(Utf8PathBuf::try_from) {
        Ok(Ok(cwd)) => cwd.join(path),
        _ => path.to_path_buf(),
    }
}

/// The path of `to` as seen from the directory `from`. Relative inputs are
/// resolved against the current directory first, symlinks are not followed.
///
/// - `relative_path("out/preview", "out/fonts")` -> `../fonts`
/// - `relative_path("out", "out")` -> `` (empty)
pub(crate) fn relative_path(from: &Utf8Path, to: &Utf8Path) -> Utf8PathBuf {
    let from = normalize_path(&absolute_path(from));
    let to = normalize_path(&absolute_path(to));

    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();

    let common = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let mut ret = Utf8PathBuf::new();
    for _ in common..from.len() {
        ret.push(Utf8Component::ParentDir);
    }
    for component in &to[common..] {
        ret.push(component);
    }
    ret
}

/// Write `data` to `path`, creating any missing parent directories.
pub(crate) fn write_file(path: &Utf8Path, data: impl AsRef<[u8]>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(path, data)
}
