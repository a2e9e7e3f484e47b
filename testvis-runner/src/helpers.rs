// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};

/// Strips `root` from `path`, yielding the repository-relative form used for
/// suite identifiers and coverage files.
///
/// Paths outside the root (or already-relative paths) are passed through
/// unchanged; the backend treats unknown prefixes as opaque identifiers, so
/// mangling them would be worse than keeping them.
pub(crate) fn rel_path_from_root(root: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    match path.strip_prefix(root) {
        Ok(rel) => convert_rel_path_to_forward_slash(rel),
        Err(_) if path.is_relative() => convert_rel_path_to_forward_slash(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(windows)]
pub(crate) fn convert_rel_path_to_forward_slash(rel_path: &Utf8Path) -> Utf8PathBuf {
    if !rel_path.is_relative() {
        panic!("path for conversion to forward slash '{rel_path}' is not relative");
    }
    rel_path.as_str().replace('\\', "/").into()
}

#[cfg(not(windows))]
pub(crate) fn convert_rel_path_to_forward_slash(rel_path: &Utf8Path) -> Utf8PathBuf {
    rel_path.to_path_buf()
}

pub(crate) mod plural {
    pub(crate) fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    pub(crate) fn suites_str(count: usize) -> &'static str {
        if count == 1 { "suite" } else { "suites" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rel_path_strips_root() {
        let root = Utf8Path::new("/home/ci/repo");
        assert_eq!(
            rel_path_from_root(root, Utf8Path::new("/home/ci/repo/cypress/e2e/spec.js")),
            Utf8PathBuf::from("cypress/e2e/spec.js")
        );
    }

    #[test]
    fn rel_path_keeps_relative_input() {
        let root = Utf8Path::new("/home/ci/repo");
        assert_eq!(
            rel_path_from_root(root, Utf8Path::new("cypress/e2e/spec.js")),
            Utf8PathBuf::from("cypress/e2e/spec.js")
        );
    }

    #[test]
    fn rel_path_passes_through_foreign_absolute() {
        let root = Utf8Path::new("/home/ci/repo");
        assert_eq!(
            rel_path_from_root(root, Utf8Path::new("/usr/lib/node/internal.js")),
            Utf8PathBuf::from("/usr/lib/node/internal.js")
        );
    }
}
