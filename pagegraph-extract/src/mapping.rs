//! Mapping tables between saved HTML files and the URLs they were saved from.
//!
//! A table is a comma-separated text file, one entry per line: the HTML file
//! path first, the URL second. Further fields are ignored.

use crate::error::Result;
use pagegraph_core::urls::{add_url_index, strip_url_index};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub const DEFAULT_REWRITE_OUTPUT: &str = "final_url_to_modified_html_filepath_mapping_AE.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub html_path: String,
    pub url: String,
}

impl MappingEntry {
    /// File name of the HTML path without its extension.
    pub fn html_stem(&self) -> Option<&str> {
        Path::new(&self.html_path).file_stem()?.to_str()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    entries: Vec<MappingEntry>,
}

impl MappingTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let table = Self::parse(&contents);
        debug!(
            "Loaded {} mapping entries from {}",
            table.entries.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn parse(contents: &str) -> Self {
        let mut entries = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split(',');
            match (fields.next(), fields.next()) {
                (Some(html_path), Some(url)) => entries.push(MappingEntry {
                    html_path: html_path.to_string(),
                    url: url.to_string(),
                }),
                _ => warn!("Ignoring mapping line {}: expected at least 2 fields", line_no + 1),
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// URL of the first entry whose HTML file stem equals `stem`.
    pub fn url_for_stem(&self, stem: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.html_stem() == Some(stem))
            .map(|entry| entry.url.as_str())
    }

    /// Page URL of a graph file, matched on file stems. For modified corpora
    /// the injected index segment is stripped again.
    pub fn resolve_target_url(&self, graph_path: &Path, modified: bool) -> Option<String> {
        let stem = graph_path.file_stem()?.to_str()?;
        let url = self.url_for_stem(stem)?;
        if modified {
            Some(strip_url_index(url))
        } else {
            Some(url.to_string())
        }
    }
}

/// Splits `name_<idx>` for modified files. Unmodified files always have
/// index `0`.
pub fn split_index(stem: &str, modified: bool) -> Option<(&str, &str)> {
    if !modified {
        return Some((stem, "0"));
    }
    stem.rsplit_once('_')
}

/// Maps every file in `html_dir` to the URL of the original page it was
/// derived from, with the file's index injected into the URL when modified.
pub fn rewrite(table: &MappingTable, html_dir: &Path, modified: bool) -> Result<Vec<MappingEntry>> {
    let mut files: Vec<_> = fs::read_dir(html_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let mut rewritten = Vec::new();
    for file in files {
        let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some((name, idx)) = split_index(stem, modified) else {
            warn!("Skipping {}: no index suffix in file name", file.display());
            continue;
        };

        for entry in table.entries() {
            if entry.html_stem() != Some(name) {
                continue;
            }
            let url = if modified {
                add_url_index(&entry.url, idx)
            } else {
                entry.url.clone()
            };
            rewritten.push(MappingEntry {
                html_path: file.to_string_lossy().into_owned(),
                url,
            });
        }
    }
    Ok(rewritten)
}

pub fn write_mapping(entries: &[MappingEntry], path: &Path) -> Result<()> {
    let contents = entries
        .iter()
        .map(|entry| format!("{},{}", entry.html_path, entry.url))
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(path, contents)?;
    Ok(())
}
