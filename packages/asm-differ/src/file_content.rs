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

use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader};

/// A loaded source file split into lines.
#[derive(Debug, Clone)]
pub struct TextFileContent {
    pub filename: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadResult {
    Loaded,
    AlreadyLoaded,
    Failed,
}

/// Caches file contents for frequent access. Lookups during rendering hit
/// the same file for every consecutive instruction, so a single-entry MRU
/// hint sits in front of the map.
#[derive(Debug, Default)]
pub struct FileContentStorage {
    contents: Vec<TextFileContent>,
    index_by_name: HashMap<String, usize>,
    last_index: Cell<Option<usize>>,
}

impl FileContentStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_content(&self, name: &str) -> Option<&TextFileContent> {
        if name.is_empty() {
            return None;
        }

        // Fast path lookup.
        if let Some(idx) = self.last_index.get() {
            let content = &self.contents[idx];
            if content.filename == name {
                return Some(content);
            }
        }

        let idx = *self.index_by_name.get(name)?;
        self.last_index.set(Some(idx));
        Some(&self.contents[idx])
    }

    pub fn load_content(&mut self, name: &str) -> LoadResult {
        if name.is_empty() {
            return LoadResult::Failed;
        }
        if self.index_by_name.contains_key(name) {
            return LoadResult::AlreadyLoaded;
        }

        let Ok(file) = fs::File::open(name) else {
            return LoadResult::Failed;
        };
        let reader = BufReader::new(file);
        let mut lines = Vec::new();
        for line in reader.lines() {
            match line {
                Ok(line) => lines.push(line),
                Err(_) => return LoadResult::Failed,
            }
        }

        let idx = self.contents.len();
        self.contents.push(TextFileContent {
            filename: name.to_string(),
            lines,
        });
        self.index_by_name.insert(name.to_string(), idx);
        self.last_index.set(Some(idx));
        LoadResult::Loaded
    }

    pub fn size(&self) -> usize {
        self.contents.len()
    }

    pub fn clear(&mut self) {
        self.contents.clear();
        self.index_by_name.clear();
        self.last_index.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_and_find() {
        let dir = std::env::temp_dir().join("asm-differ-file-content-test");
        fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("sample.c");
        let mut file = fs::File::create(&path).expect("create file");
        writeln!(file, "int main()").expect("write");
        writeln!(file, "{{ return 0; }}").expect("write");
        drop(file);

        let name = path.to_string_lossy().to_string();
        let mut storage = FileContentStorage::new();
        assert_eq!(storage.load_content(&name), LoadResult::Loaded);
        assert_eq!(storage.load_content(&name), LoadResult::AlreadyLoaded);
        assert_eq!(storage.size(), 1);

        let content = storage.find_content(&name).expect("cached content");
        assert_eq!(content.lines.len(), 2);
        assert_eq!(content.lines[0], "int main()");

        // Repeated lookups hit the MRU entry.
        assert!(storage.find_content(&name).is_some());
        assert!(storage.find_content("missing.c").is_none());

        storage.clear();
        assert_eq!(storage.size(), 0);
        assert!(storage.find_content(&name).is_none());
    }

    #[test]
    fn missing_file_fails() {
        let mut storage = FileContentStorage::new();
        assert_eq!(storage.load_content("/no/such/file.c"), LoadResult::Failed);
        assert_eq!(storage.load_content(""), LoadResult::Failed);
    }
}
