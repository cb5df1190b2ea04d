// Toxicity category taxonomy: the closed set of categories every judge reports in.
//
// The taxonomy is loaded once at startup from a JSON document (a built-in copy
// ships with the crate in data/toxic_keywords.json) and never changes afterwards.
// Keywords and intensifiers are normalized at load time with the same routine the
// lexical judge applies to input text, so matching is a plain substring check.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_text;

/// The default taxonomy bundled with the crate.
const BUILTIN_TAXONOMY: &str = include_str!("../data/toxic_keywords.json");

/// One of the six fixed toxicity categories.
///
/// Declaration order is the taxonomy order used for tie-breaking, from most
/// to least severe in intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    SevereToxicity,
    HateSpeech,
    Violence,
    SexualContent,
    Discrimination,
    MildToxicity,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::SevereToxicity,
        Category::HateSpeech,
        Category::Violence,
        Category::SexualContent,
        Category::Discrimination,
        Category::MildToxicity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::SevereToxicity => "severe-toxicity",
            Category::HateSpeech => "hate-speech",
            Category::Violence => "violence",
            Category::SexualContent => "sexual-content",
            Category::Discrimination => "discrimination",
            Category::MildToxicity => "mild-toxicity",
        }
    }

    /// Parse a category name as reported by a remote judge.
    ///
    /// LLM judges are inconsistent about naming, so this accepts the kebab-case
    /// identifier, snake_case, a few short forms, and the Japanese labels our
    /// prompts use. Returns `None` for anything outside the taxonomy.
    pub fn from_label(label: &str) -> Option<Self> {
        let key = label.trim().to_lowercase().replace('_', "-");
        let category = match key.as_str() {
            "severe-toxicity" | "severe" | "重度の毒性" => Category::SevereToxicity,
            "hate-speech" | "hate" | "ヘイトスピーチ" => Category::HateSpeech,
            "violence" | "violent" | "暴力的表現" => Category::Violence,
            "sexual-content" | "sexual" | "性的な内容" => Category::SexualContent,
            "discrimination" | "差別的表現" => Category::Discrimination,
            "mild-toxicity" | "mild" | "軽度の毒性" => Category::MildToxicity,
            _ => return None,
        };
        Some(category)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static configuration for one category.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySpec {
    pub display_name: String,
    /// Severity weight, 0.0 to 1.0. Higher means a single hit matters more.
    pub weight: f64,
    pub keywords: Vec<String>,
}

/// On-disk shape of the taxonomy document.
#[derive(Deserialize)]
struct TaxonomyDocument {
    categories: BTreeMap<Category, CategorySpec>,
    #[serde(default)]
    intensifiers: Vec<String>,
}

/// The loaded, validated, immutable category taxonomy.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    /// Indexed by `Category as usize`; always holds all six categories.
    specs: Vec<CategorySpec>,
    intensifiers: Vec<String>,
}

impl Taxonomy {
    /// The taxonomy bundled with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_TAXONOMY).context("Built-in taxonomy is malformed")
    }

    /// Load a taxonomy document from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read taxonomy file {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("Invalid taxonomy file {}", path.display()))
    }

    /// Parse and validate a taxonomy document.
    ///
    /// Every category must be present, weights must lie in [0, 1], and keyword
    /// and intensifier strings must be non-empty after normalization.
    pub fn from_json(raw: &str) -> Result<Self> {
        let doc: TaxonomyDocument =
            serde_json::from_str(raw).context("Failed to parse taxonomy JSON")?;

        let mut specs = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let Some(spec) = doc.categories.get(&category) else {
                anyhow::bail!("Taxonomy is missing category '{category}'");
            };
            if !(0.0..=1.0).contains(&spec.weight) {
                anyhow::bail!(
                    "Category '{category}' has weight {} outside [0, 1]",
                    spec.weight
                );
            }
            let keywords = normalize_all(&spec.keywords)
                .with_context(|| format!("Category '{category}' has an empty keyword"))?;
            specs.push(CategorySpec {
                display_name: spec.display_name.clone(),
                weight: spec.weight,
                keywords,
            });
        }

        let intensifiers =
            normalize_all(&doc.intensifiers).context("Taxonomy has an empty intensifier")?;

        Ok(Self {
            specs,
            intensifiers,
        })
    }

    pub fn spec(&self, category: Category) -> &CategorySpec {
        &self.specs[category.index()]
    }

    /// Human-readable label from the taxonomy document.
    pub fn display_name(&self, category: Category) -> &str {
        &self.spec(category).display_name
    }

    pub fn weight(&self, category: Category) -> f64 {
        self.spec(category).weight
    }

    pub fn intensifiers(&self) -> &[String] {
        &self.intensifiers
    }

    /// Iterate categories in taxonomy order with their specs.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &CategorySpec)> {
        Category::ALL.into_iter().zip(self.specs.iter())
    }
}

/// Normalize a list of configured terms, rejecting blanks and dropping duplicates.
fn normalize_all(terms: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        let normalized = normalize_text(term);
        if normalized.is_empty() {
            anyhow::bail!("blank term {term:?}");
        }
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    Ok(out)
}
