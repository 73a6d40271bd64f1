//! Entry discovery.
//!
//! A template is any file named `<name>.<type>.<ext>` whose `<type>` has a
//! registered renderer. `pages/about.html.js` is the entry `pages/about` of type
//! `html` and renders to `pages/about.html`.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use indexmap::IndexMap;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{Error, Result};

/// Script extensions a template module may use.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs"];

/// One discovered template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Logical path relative to the source root, without type and extension.
    pub name: String,
    /// Renderer type suffix (`html`, `xml`, ...).
    pub template_type: String,
    pub source_path: PathBuf,
}

impl Entry {
    /// Output path of the rendered template, relative to the output directory.
    pub fn output_file(&self) -> String {
        format!("{}.{}", self.name, self.template_type)
    }
}

/// A compiled glob recognising one template type.
#[derive(Debug, Clone)]
pub struct EntryPattern {
    pub template_type: String,
    pub glob: String,
    matcher: GlobMatcher,
}

impl EntryPattern {
    pub fn new(template_type: impl Into<String>, glob: &str) -> Result<Self> {
        let matcher = Glob::new(glob)
            .map_err(|e| Error::InvalidConfig(format!("invalid entry pattern `{glob}`: {e}")))?
            .compile_matcher();
        Ok(Self {
            template_type: template_type.into(),
            glob: glob.to_string(),
            matcher,
        })
    }

    /// Default pattern for a template type: `**/*.<type>.{js,jsx,ts,tsx,mjs}`.
    pub fn for_type(template_type: &str) -> Result<Self> {
        let glob = format!(
            "**/*.{template_type}.{{{}}}",
            TEMPLATE_EXTENSIONS.join(",")
        );
        Self::new(template_type, &glob)
    }

    pub fn is_match(&self, relative: &Path) -> bool {
        self.matcher.is_match(relative)
    }

    /// Logical name of a matching file, if its name carries this type suffix.
    fn logical_name(&self, relative: &str) -> Option<String> {
        let (stem, extension) = relative.rsplit_once('.')?;
        if !TEMPLATE_EXTENSIONS.contains(&extension) {
            return None;
        }
        let name = stem.strip_suffix(&format!(".{}", self.template_type))?;
        (!name.is_empty() && !name.ends_with('/')).then(|| name.to_string())
    }
}

/// One pattern per registered renderer, in registration order.
pub fn patterns_for(renderers: &IndexMap<String, String>) -> Result<Vec<EntryPattern>> {
    renderers
        .keys()
        .map(|template_type| EntryPattern::for_type(template_type))
        .collect()
}

/// Walk `root_dir` and map every template to its logical name.
///
/// Files are visited in sorted order so the result is deterministic. When two
/// patterns produce the same name the later pattern wins and a warning is
/// logged.
pub fn find_entries(root_dir: &Path, patterns: &[EntryPattern]) -> Result<IndexMap<String, Entry>> {
    if !root_dir.is_dir() {
        return Err(Error::Config(islet_config::ConfigError::SourceDirNotFound {
            path: root_dir.to_path_buf(),
        }));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_ignored(entry.file_name()));
    for entry in walker {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    let mut entries: IndexMap<String, Entry> = IndexMap::new();
    for pattern in patterns {
        for path in &files {
            let Ok(relative) = path.strip_prefix(root_dir) else {
                continue;
            };
            if !pattern.is_match(relative) {
                continue;
            }
            let relative_str = relative.to_string_lossy().replace('\\', "/");
            let Some(name) = pattern.logical_name(&relative_str) else {
                continue;
            };

            let entry = Entry {
                name: name.clone(),
                template_type: pattern.template_type.clone(),
                source_path: path.clone(),
            };
            if let Some(previous) = entries.insert(name.clone(), entry) {
                warn!(
                    entry = %name,
                    shadowed = %previous.source_path.display(),
                    by = %path.display(),
                    "two templates map to the same entry name; the later one wins"
                );
            }
        }
    }

    debug!(count = entries.len(), root = %root_dir.display(), "discovered entries");
    Ok(entries)
}

fn is_ignored(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || name == "node_modules"
}
