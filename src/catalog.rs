//! Document catalog: the plain-text corpus and the favorites list.
//!
//! Documents are the `*.txt` files of one directory; a document's id is its
//! file name and its title the file stem. Favorites live in
//! `favorites.json` next to the documents.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const FAVORITES_FILE: &str = "favorites.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub content_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub created_at: u64,
}

pub trait DocumentCatalog {
    fn list_documents(&self) -> Result<Vec<DocumentSummary>>;
    fn fetch_document_content(&self, id: &str) -> Result<String>;
    fn list_favorites(&self) -> Result<Vec<Favorite>>;
    fn add_favorite(&self, id: &str, title: &str) -> Result<Favorite>;
    fn remove_favorite(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FsCatalog {
    root: PathBuf,
}

impl FsCatalog {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Creating corpus dir {}", root.display()))?;
        debug!(root = %root.display(), "Opened document catalog");
        Ok(Self { root })
    }

    fn document_path(&self, id: &str) -> Result<PathBuf> {
        let name = Path::new(id);
        let is_plain_name = name.file_name().is_some_and(|file| file == name.as_os_str());
        if id.is_empty() || !is_plain_name {
            bail!("Invalid document id {id:?}");
        }
        Ok(self.root.join(name))
    }

    fn favorites_path(&self) -> PathBuf {
        self.root.join(FAVORITES_FILE)
    }

    fn write_favorites(&self, favorites: &[Favorite]) -> Result<()> {
        let path = self.favorites_path();
        let data = serde_json::to_string_pretty(favorites).context("Encoding favorites")?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, data).with_context(|| format!("Writing {}", temp.display()))?;
        fs::rename(&temp, &path).with_context(|| format!("Replacing {}", path.display()))
    }
}

impl DocumentCatalog for FsCatalog {
    fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Listing {}", self.root.display()))?;
        let mut documents: Vec<DocumentSummary> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "txt"))
            .filter_map(|path| {
                let id = path.file_name()?.to_str()?.to_string();
                let title = path.file_stem()?.to_str()?.to_string();
                Some(DocumentSummary {
                    id,
                    title,
                    content_path: path,
                })
            })
            .collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(count = documents.len(), "Listed documents");
        Ok(documents)
    }

    fn fetch_document_content(&self, id: &str) -> Result<String> {
        let path = self.document_path(id)?;
        if !path.is_file() {
            bail!("Document not found: {id}");
        }
        fs::read_to_string(&path).with_context(|| format!("Reading {}", path.display()))
    }

    fn list_favorites(&self) -> Result<Vec<Favorite>> {
        let path = self.favorites_path();
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err).with_context(|| format!("Reading {}", path.display())),
        };
        match serde_json::from_str(&data) {
            Ok(favorites) => Ok(favorites),
            Err(err) => {
                warn!(path = %path.display(), "Ignoring unparsable favorites: {err}");
                Ok(Vec::new())
            }
        }
    }

    fn add_favorite(&self, id: &str, title: &str) -> Result<Favorite> {
        if id.trim().is_empty() || title.trim().is_empty() {
            bail!("Favorite id and title must not be empty");
        }
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let favorite = Favorite {
            id: id.to_string(),
            title: title.to_string(),
            created_at,
        };
        let mut favorites = self.list_favorites()?;
        favorites.retain(|existing| existing.id != id);
        favorites.push(favorite.clone());
        self.write_favorites(&favorites)?;
        info!(id, title, "Added favorite");
        Ok(favorite)
    }

    fn remove_favorite(&self, id: &str) -> Result<()> {
        let mut favorites = self.list_favorites()?;
        let before = favorites.len();
        favorites.retain(|existing| existing.id != id);
        if favorites.len() == before {
            return Err(anyhow!("Favorite not found: {id}"));
        }
        self.write_favorites(&favorites)?;
        info!(id, "Removed favorite");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("txt-reader-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn lists_only_text_documents() {
        let dir = scratch("catalog-list");
        let catalog = FsCatalog::open(&dir).expect("open catalog");
        fs::write(dir.join("b.txt"), "second").expect("write");
        fs::write(dir.join("a.txt"), "first").expect("write");
        fs::write(dir.join("cover.png"), [0u8; 4]).expect("write");

        let documents = catalog.list_documents().expect("list");
        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt", "b.txt"]);
        assert_eq!(documents[0].title, "a");
        assert_eq!(catalog.fetch_document_content("b.txt").expect("fetch"), "second");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_ids_outside_the_corpus() {
        let dir = scratch("catalog-escape");
        let catalog = FsCatalog::open(&dir).expect("open catalog");
        assert!(catalog.fetch_document_content("../etc/passwd").is_err());
        assert!(catalog.fetch_document_content("").is_err());
        assert!(catalog.fetch_document_content("missing.txt").is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn favorites_add_and_remove() {
        let dir = scratch("catalog-favorites");
        let catalog = FsCatalog::open(&dir).expect("open catalog");
        assert!(catalog.list_favorites().expect("list").is_empty());
        assert!(catalog.add_favorite("", "title").is_err());
        assert!(catalog.add_favorite("a.txt", " ").is_err());

        let added = catalog.add_favorite("a.txt", "a").expect("add");
        assert!(added.created_at > 0);
        catalog.add_favorite("a.txt", "a").expect("re-add");
        assert_eq!(catalog.list_favorites().expect("list").len(), 1);

        catalog.remove_favorite("a.txt").expect("remove");
        assert!(catalog.remove_favorite("a.txt").is_err());
        assert!(catalog.list_favorites().expect("list").is_empty());
        let _ = fs::remove_dir_all(&dir);
    }
}
