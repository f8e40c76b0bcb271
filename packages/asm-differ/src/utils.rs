// Copyright (c) 2026 Asm-Differ Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::env;
use std::path::Path;
use urlencoding::decode;

/// Normalizes a source file path into the canonical form used as cache and
/// grouping key: URI prefixes stripped, relative paths resolved, forward
/// slashes throughout. Debug info records paths in whatever shape the
/// compiler invocation used, so two references to the same file rarely
/// agree byte-for-byte without this.
pub fn canonicalize_path(source_path: &str) -> String {
    let mut path_str = source_path.to_string();

    // Handle file:// URIs
    if path_str.starts_with("file://") {
        let decoded = decode(&path_str[7..]).unwrap_or_else(|_| path_str[7..].into());
        path_str = decoded.into_owned();

        // On Windows, file:///C:/... becomes /C:/... so we need to strip the leading /
        if cfg!(windows) && path_str.starts_with('/') && path_str.chars().nth(2) == Some(':') {
            path_str.remove(0);
        }
    }

    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().unwrap_or_default().join(path)
    };

    // dunce resolves . and .. and strips Windows \\?\ prefixes
    let canonical = dunce::canonicalize(&absolute).unwrap_or(absolute);

    let mut final_path = canonical.to_string_lossy().replace('\\', "/");

    // Windows drive letter normalization (C:/ not c:/)
    if cfg!(windows) && final_path.chars().nth(1) == Some(':') {
        let drive = final_path.chars().next().unwrap().to_uppercase();
        final_path = format!("{}:{}", drive, &final_path[1..]);
    }

    final_path
}

/// Parses "0x"-prefixed hex or plain decimal.
pub fn parse_hex_or_dec(s: &str) -> Option<u64> {
    if s.starts_with("0x") || s.starts_with("0X") {
        u64::from_str_radix(&s[2..], 16).ok()
    } else {
        s.parse::<u64>().ok()
    }
}

/// File name portion of a path, e.g. "dir/code.cpp" -> "code.cpp".
pub fn file_basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_and_decimal() {
        assert_eq!(parse_hex_or_dec("0x1000"), Some(0x1000));
        assert_eq!(parse_hex_or_dec("0X20"), Some(0x20));
        assert_eq!(parse_hex_or_dec("4096"), Some(4096));
        assert_eq!(parse_hex_or_dec("junk"), None);
    }

    #[test]
    fn basename_extraction() {
        assert_eq!(file_basename("src/dir/code.cpp"), "code.cpp");
        assert_eq!(file_basename("code.cpp"), "code.cpp");
    }

    #[test]
    fn canonical_paths_use_forward_slashes() {
        let canonical = canonicalize_path("some/relative/file.c");
        assert!(!canonical.contains('\\'));
        assert!(canonical.ends_with("some/relative/file.c"));
    }
}
