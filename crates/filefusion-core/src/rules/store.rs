//! Rule document lookup and loading.
//!
//! A rule document is `<identifier>.json`. Identifiers are resolved against
//! an ordered list of search directories; the rules directory is always the
//! last one searched and is the one `list`, `import` and `remove` manage.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FileFusionError, Result};

use super::table::RuleTable;

const RULE_EXTENSION: &str = "json";

/// A rule document found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDocument {
    pub identifier: String,
    pub path: PathBuf,
}

/// Outcome of loading several documents. Failed documents are reported in
/// `warnings` and left out of `table`.
#[derive(Debug, Default)]
pub struct LoadedRules {
    pub table: RuleTable,
    pub loaded: Vec<RuleDocument>,
    pub warnings: Vec<FileFusionError>,
}

pub struct RuleStore {
    rules_dir: PathBuf,
    search_dirs: Vec<PathBuf>,
}

impl RuleStore {
    pub fn new(rules_dir: PathBuf) -> Self {
        Self {
            search_dirs: vec![rules_dir.clone()],
            rules_dir,
        }
    }

    /// Search `dir` before every directory added so far.
    pub fn with_search_dir(mut self, dir: PathBuf) -> Self {
        self.search_dirs.insert(0, dir);
        self
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Find the file behind `identifier`. An identifier that already names an
    /// existing `.json` file is used as is.
    pub fn resolve(&self, identifier: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(identifier);
        if direct.extension().is_some_and(|ext| ext == RULE_EXTENSION) && direct.is_file() {
            return Some(direct);
        }

        let file_name = format!("{}.{}", identifier, RULE_EXTENSION);
        self.search_dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file())
    }

    /// Load and parse a single document.
    pub fn load_document(&self, identifier: &str) -> Result<(RuleDocument, RuleTable)> {
        let path = self
            .resolve(identifier)
            .ok_or_else(|| FileFusionError::RuleLoad {
                identifier: identifier.to_string(),
                message: format!(
                    "{}.{} not found in {}",
                    identifier,
                    RULE_EXTENSION,
                    self.search_path_display()
                ),
            })?;

        let content = fs::read_to_string(&path).map_err(|e| FileFusionError::RuleLoad {
            identifier: identifier.to_string(),
            message: format!("{}: {}", path.display(), e),
        })?;
        let table = RuleTable::from_json(identifier, &content)?;

        Ok((
            RuleDocument {
                identifier: identifier.to_string(),
                path,
            },
            table,
        ))
    }

    /// Load every identifier in order and merge them; later documents win.
    /// A document that fails to load is skipped with a warning.
    pub fn load<S: AsRef<str>>(&self, identifiers: &[S]) -> LoadedRules {
        let mut loaded = LoadedRules::default();

        for identifier in identifiers {
            let identifier = identifier.as_ref();
            match self.load_document(identifier) {
                Ok((document, table)) => {
                    for (rule, condition) in table.invalid_conditions() {
                        warn!(
                            document = identifier,
                            rule, %condition, "condition does not parse and will never match"
                        );
                    }
                    debug!(
                        document = identifier,
                        path = %document.path.display(),
                        rules = table.len(),
                        "loaded rule document"
                    );
                    loaded.table.merge(table);
                    loaded.loaded.push(document);
                }
                Err(e) => {
                    debug!(document = identifier, error = %e, "skipping rule document");
                    loaded.warnings.push(e);
                }
            }
        }

        loaded
    }

    /// All documents in the rules directory, sorted by identifier.
    pub fn list(&self) -> Result<Vec<RuleDocument>> {
        if !self.rules_dir.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for entry in fs::read_dir(&self.rules_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == RULE_EXTENSION) {
                if let Some(stem) = path.file_stem() {
                    documents.push(RuleDocument {
                        identifier: stem.to_string_lossy().to_string(),
                        path,
                    });
                }
            }
        }

        documents.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(documents)
    }

    /// Copy a document into the rules directory after checking it parses.
    pub fn import(&self, identifier: &str, source_file: &Path) -> Result<RuleDocument> {
        validate_identifier(identifier)?;

        let content = fs::read_to_string(source_file)?;
        RuleTable::from_json(identifier, &content)?;

        let path = self.document_path(identifier);
        if path.exists() {
            return Err(FileFusionError::RuleLoad {
                identifier: identifier.to_string(),
                message: format!("{} already exists", path.display()),
            });
        }

        fs::create_dir_all(&self.rules_dir)?;
        fs::write(&path, content)?;

        Ok(RuleDocument {
            identifier: identifier.to_string(),
            path,
        })
    }

    pub fn remove(&self, identifier: &str) -> Result<()> {
        validate_identifier(identifier)?;
        let path = self.document_path(identifier);
        if !path.is_file() {
            return Err(FileFusionError::RuleLoad {
                identifier: identifier.to_string(),
                message: format!("{} not found", path.display()),
            });
        }
        fs::remove_file(&path)?;
        Ok(())
    }

    fn document_path(&self, identifier: &str) -> PathBuf {
        self.rules_dir
            .join(format!("{}.{}", identifier, RULE_EXTENSION))
    }

    fn search_path_display(&self) -> String {
        self.search_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn validate_identifier(identifier: &str) -> Result<()> {
    let invalid = |message: &str| FileFusionError::RuleLoad {
        identifier: identifier.to_string(),
        message: message.to_string(),
    };

    if identifier.is_empty() || identifier.len() > 64 {
        return Err(invalid("identifier must be 1-64 characters"));
    }

    if !identifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(
            "identifier may only contain alphanumerics, hyphen, underscore",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_doc(dir: &Path, identifier: &str, content: &str) -> PathBuf {
        let path = dir.join(format!("{}.json", identifier));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_merges_in_order() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "media", r#"{"Videos": ["type == '.mp4'"]}"#);
        write_doc(
            temp.path(),
            "overrides",
            r#"{"Videos": ["type == '.mkv'"], "_duplicate_check": true}"#,
        );

        let store = RuleStore::new(temp.path().to_path_buf());
        let loaded = store.load(&["media", "overrides"]);

        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.loaded.len(), 2);
        assert_eq!(loaded.table.len(), 1);
        assert_eq!(
            loaded.table.get("Videos").unwrap().conditions[0].to_string(),
            "type == '.mkv'"
        );
        assert!(loaded.table.duplicate_check());
    }

    #[test]
    fn test_bad_documents_do_not_block_others() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "broken", r#"{"Docs": ["type == '.pdf'""#);
        write_doc(temp.path(), "images", r#"{"Images": ["type == '.png'"]}"#);

        let store = RuleStore::new(temp.path().to_path_buf());
        let loaded = store.load(&["missing", "broken", "images"]);

        assert_eq!(loaded.warnings.len(), 2);
        assert!(loaded
            .warnings
            .iter()
            .all(|w| matches!(w, FileFusionError::RuleLoad { .. })));
        assert_eq!(loaded.table.len(), 1);
        assert!(loaded.table.get("Images").is_some());
    }

    #[test]
    fn test_resolve_search_order() {
        let work = TempDir::new().unwrap();
        let rules = TempDir::new().unwrap();
        let local = write_doc(work.path(), "shared", "{}");
        write_doc(rules.path(), "shared", "{}");
        let only_rules = write_doc(rules.path(), "global", "{}");

        let store =
            RuleStore::new(rules.path().to_path_buf()).with_search_dir(work.path().to_path_buf());

        assert_eq!(store.resolve("shared"), Some(local));
        assert_eq!(store.resolve("global"), Some(only_rules.clone()));
        assert_eq!(
            store.resolve(only_rules.to_str().unwrap()),
            Some(only_rules)
        );
        assert_eq!(store.resolve("nope"), None);
    }

    #[test]
    fn test_list_import_remove() {
        let temp = TempDir::new().unwrap();
        let rules_dir = temp.path().join("rules");
        let store = RuleStore::new(rules_dir.clone());
        assert!(store.list().unwrap().is_empty());

        let source = write_doc(temp.path(), "incoming", r#"{"Music": ["type == '.mp3'"]}"#);
        store.import("music", &source).unwrap();
        store.import("beta", &source).unwrap();

        let ids: Vec<_> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|d| d.identifier)
            .collect();
        assert_eq!(ids, vec!["beta", "music"]);

        assert!(store.import("music", &source).is_err());
        assert!(store.import("bad name", &source).is_err());

        store.remove("beta").unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(store.remove("beta").is_err());
    }

    #[test]
    fn test_import_rejects_malformed() {
        let temp = TempDir::new().unwrap();
        let store = RuleStore::new(temp.path().join("rules"));
        let source = write_doc(temp.path(), "bad", "[1, 2]");

        assert!(matches!(
            store.import("bad", &source),
            Err(FileFusionError::RuleLoad { .. })
        ));
        assert!(!temp.path().join("rules").join("bad.json").exists());
    }
}
