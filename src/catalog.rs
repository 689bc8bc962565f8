//! Catalog records and the synopsis-filtered view the index is aligned with.

use std::path::Path;

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};

/// One recommendable title. Identified only by its position in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub title: String,
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub genres: Option<String>,
    #[serde(default)]
    pub themes: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, alias = "image_jpg_large_url")]
    pub image_url: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl CatalogItem {
    pub fn new(title: impl Into<String>, synopsis: Option<&str>) -> Self {
        Self {
            title: title.into(),
            synopsis: synopsis.map(str::to_string),
            ..Default::default()
        }
    }

    /// Text that gets embedded, if the item has a non-blank synopsis.
    pub fn indexable_synopsis(&self) -> Option<&str> {
        self.synopsis
            .as_deref()
            .filter(|synopsis| !synopsis.trim().is_empty())
    }

    pub fn has_synopsis(&self) -> bool {
        self.indexable_synopsis().is_some()
    }
}

/// The full catalog in its original order, plus the positions of the items
/// that have a synopsis.
///
/// `indexed[row]` is the catalog position of index row `row`. It is always
/// re-derived with a stable filter and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    indexed: Vec<usize>,
}

/// Outcome of a title lookup against the full catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleMatch {
    /// Title matched an item that has an index row.
    Indexed { position: usize, row: usize },
    /// Title matched an item without a synopsis.
    NotIndexed { position: usize },
    NotFound,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        let indexed = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.has_synopsis())
            .map(|(position, _)| position)
            .collect();
        Self { items, indexed }
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items with a synopsis, i.e. the expected index size.
    pub fn indexed_len(&self) -> usize {
        self.indexed.len()
    }

    /// Items with a synopsis, in index row order.
    pub fn indexed_items(&self) -> impl Iterator<Item = &CatalogItem> {
        self.indexed.iter().map(|&position| &self.items[position])
    }

    /// Synopses to embed, in index row order.
    pub fn synopses(&self) -> Vec<String> {
        self.indexed_items()
            .filter_map(|item| item.indexable_synopsis().map(str::to_string))
            .collect()
    }

    /// The item behind index row `row`.
    pub fn item_for_row(&self, row: usize) -> Option<&CatalogItem> {
        self.indexed
            .get(row)
            .and_then(|&position| self.items.get(position))
    }

    /// Case-insensitive exact title match; the first match in catalog order wins.
    pub fn find_title(&self, title: &str) -> TitleMatch {
        let wanted = title.to_lowercase();
        let Some(position) = self
            .items
            .iter()
            .position(|item| item.title.to_lowercase() == wanted)
        else {
            return TitleMatch::NotFound;
        };

        match self.indexed.binary_search(&position) {
            Ok(row) => TitleMatch::Indexed { position, row },
            Err(_) => TitleMatch::NotIndexed { position },
        }
    }
}

/// Read catalog records from a `.csv` or `.json` file.
///
/// CSV files need a header row; empty fields are read as missing. JSON files
/// hold an array of objects.
pub fn load_catalog(path: &Path) -> anyhow::Result<Vec<CatalogItem>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    let items = match extension.as_deref() {
        Some("csv") => read_csv(path)?,
        Some("json") => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Failed to open catalog {}", path.display()))?;
            serde_json::from_reader(std::io::BufReader::new(file))
                .with_context(|| format!("Malformed JSON catalog {}", path.display()))?
        }
        _ => bail!(
            "unsupported catalog format for {}: expected .csv or .json",
            path.display()
        ),
    };

    log::info!("Read {} catalog items from {}", items.len(), path.display());
    Ok(items)
}

fn read_csv(path: &Path) -> anyhow::Result<Vec<CatalogItem>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open catalog {}", path.display()))?;

    let mut items = vec![];
    for (line, record) in reader.deserialize::<CatalogItem>().enumerate() {
        let item = record.map_err(|e| anyhow!("catalog record {}: {}", line + 1, e))?;
        items.push(item);
    }
    Ok(items)
}
