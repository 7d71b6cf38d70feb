// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Key helpers

/// Join a key prefix and an object name with a single `/`
///
/// Trailing slashes on the prefix and leading slashes on the name are
/// dropped, so `join_key("dst/", "/a.bin")` is `dst/a.bin`. An empty
/// prefix leaves the name untouched apart from its leading slashes.
pub fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let name = name.trim_start_matches('/');

    if prefix.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Parent "directory" of a raw key prefix, used to list by string prefix
///
/// `backup/2024-` lists under `backup`; a prefix without a slash lists the
/// whole bucket.
pub(crate) fn listing_root(prefix: &str) -> &str {
    match prefix.rsplit_once('/') {
        Some((parent, _)) => parent,
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_with_prefix() {
        assert_eq!(join_key("dst", "a.bin"), "dst/a.bin");
        assert_eq!(join_key("dst/", "a.bin"), "dst/a.bin");
        assert_eq!(join_key("dst//", "//a/b.bin"), "dst/a/b.bin");
    }

    #[test]
    fn join_without_prefix() {
        assert_eq!(join_key("", "a.bin"), "a.bin");
        assert_eq!(join_key("", "/data/a.bin"), "data/a.bin");
        assert_eq!(join_key("/", "a.bin"), "a.bin");
    }

    #[test]
    fn join_empty_name() {
        assert_eq!(join_key("dst", ""), "dst");
    }

    #[test]
    fn listing_root_of_prefix() {
        assert_eq!(listing_root("backup/2024-"), "backup");
        assert_eq!(listing_root("backup/"), "backup");
        assert_eq!(listing_root("a/b/c"), "a/b");
        assert_eq!(listing_root("sealed"), "");
        assert_eq!(listing_root(""), "");
    }
}
