//! Keyword index using Tantivy (BM25)
//!
//! Sparse side of hybrid retrieval. Catalog item text is indexed with a
//! lowercasing (optionally stemming) analyzer; queries score documents
//! with BM25. Raw BM25 scores are unbounded and only become comparable
//! to the dense side after normalization in the retriever.

use parking_lot::RwLock;
use std::path::Path;
use tantivy::{
    collector::TopDocs,
    query::QueryParser,
    schema::{Field, OwnedValue, Schema, TextFieldIndexing, TextOptions, STORED, STRING},
    tokenizer::{Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer},
    Index, IndexReader, IndexWriter, TantivyDocument,
};

use ordermatch_core::{CatalogItem, Error, Result};

/// Keyword index configuration
#[derive(Debug, Clone)]
pub struct KeywordConfig {
    /// Index path (RAM directory if None)
    pub index_path: Option<String>,
    /// Language for analysis
    pub language: String,
    /// Enable stemming
    pub stemming: bool,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            index_path: None,
            language: "en".to_string(),
            stemming: true,
        }
    }
}

impl From<&ordermatch_config::KeywordIndexSettings> for KeywordConfig {
    fn from(s: &ordermatch_config::KeywordIndexSettings) -> Self {
        Self {
            index_path: s.index_path.clone(),
            language: s.language.clone(),
            stemming: s.stemming,
        }
    }
}

/// Keyword search hit
#[derive(Debug, Clone)]
pub struct KeywordHit {
    /// Catalog item identity key
    pub identity_key: String,
    /// Raw BM25 score (unbounded)
    pub score: f32,
    /// Indexed text
    pub text: String,
}

/// BM25 keyword index over catalog item text
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    writer: RwLock<Option<IndexWriter>>,
    id_field: Field,
    text_field: Field,
}

impl KeywordIndex {
    /// Create a new keyword index
    pub fn new(config: KeywordConfig) -> Result<Self> {
        let mut schema_builder = Schema::builder();

        let text_options = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer("catalog")
                    .set_index_option(tantivy::schema::IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();

        let id_field = schema_builder.add_text_field("identity_key", STRING | STORED);
        let text_field = schema_builder.add_text_field("text", text_options);

        let schema = schema_builder.build();

        let index = if let Some(ref path) = config.index_path {
            let dir = tantivy::directory::MmapDirectory::open(Path::new(path))
                .map_err(|e| Error::KeywordIndex(e.to_string()))?;
            Index::open_or_create(dir, schema.clone())
                .map_err(|e| Error::KeywordIndex(e.to_string()))?
        } else {
            Index::create_in_ram(schema.clone())
        };

        index
            .tokenizers()
            .register("catalog", Self::build_tokenizer(&config));

        let reader = index
            .reader()
            .map_err(|e| Error::KeywordIndex(e.to_string()))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| Error::KeywordIndex(e.to_string()))?;

        tracing::info!(
            "Keyword index created with language={}, stemming={}",
            config.language,
            config.stemming
        );

        Ok(Self {
            index,
            reader,
            writer: RwLock::new(Some(writer)),
            id_field,
            text_field,
        })
    }

    fn build_tokenizer(config: &KeywordConfig) -> TextAnalyzer {
        let base = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(100))
            .filter(LowerCaser);

        if config.stemming && config.language == "en" {
            base.filter(Stemmer::new(Language::English)).build()
        } else {
            if config.language != "en" {
                tracing::warn!(
                    "Language '{}' has no stemmer, using simple tokenization",
                    config.language
                );
            }
            base.build()
        }
    }

    /// Index catalog items
    ///
    /// Existing entries with the same identity key are replaced, so the
    /// index never holds two documents for one catalog item.
    pub fn index_items(&self, items: &[CatalogItem]) -> Result<()> {
        let mut writer = self.writer.write();
        let writer = writer
            .as_mut()
            .ok_or_else(|| Error::KeywordIndex("Writer not available".to_string()))?;

        for item in items {
            let term = tantivy::Term::from_field_text(self.id_field, &item.identity_key);
            writer.delete_term(term);

            let mut doc = TantivyDocument::default();
            doc.add_text(self.id_field, &item.identity_key);
            doc.add_text(self.text_field, &item.text);

            writer
                .add_document(doc)
                .map_err(|e| Error::KeywordIndex(e.to_string()))?;
        }

        writer
            .commit()
            .map_err(|e| Error::KeywordIndex(e.to_string()))?;

        self.reader
            .reload()
            .map_err(|e| Error::KeywordIndex(e.to_string()))?;

        Ok(())
    }

    /// Search with BM25, best hits first
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<KeywordHit>> {
        let searcher = self.reader.searcher();
        let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);

        // Queries are free-text order requests, not a query language;
        // lenient parsing keeps stray punctuation from erroring out.
        let (parsed, _errors) = query_parser.parse_query_lenient(query);

        let top_docs = searcher
            .search(&parsed, &TopDocs::with_limit(top_k))
            .map_err(|e| Error::KeywordIndex(e.to_string()))?;

        let mut results = Vec::with_capacity(top_docs.len());

        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| Error::KeywordIndex(e.to_string()))?;

            let identity_key = doc
                .get_first(self.id_field)
                .and_then(|v| match v {
                    OwnedValue::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .unwrap_or("")
                .to_string();

            let text = doc
                .get_first(self.text_field)
                .and_then(|v| match v {
                    OwnedValue::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .unwrap_or("")
                .to_string();

            results.push(KeywordHit {
                identity_key,
                score,
                text,
            });
        }

        Ok(results)
    }

    /// Delete items by identity key
    pub fn delete(&self, identity_keys: &[String]) -> Result<()> {
        let mut writer = self.writer.write();
        let writer = writer
            .as_mut()
            .ok_or_else(|| Error::KeywordIndex("Writer not available".to_string()))?;

        for key in identity_keys {
            let term = tantivy::Term::from_field_text(self.id_field, key);
            writer.delete_term(term);
        }

        writer
            .commit()
            .map_err(|e| Error::KeywordIndex(e.to_string()))?;

        self.reader
            .reload()
            .map_err(|e| Error::KeywordIndex(e.to_string()))?;

        Ok(())
    }

    /// Get document count
    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(key: &str, text: &str) -> CatalogItem {
        CatalogItem::new(key, text, vec![0.0; 4])
    }

    #[test]
    fn test_keyword_index_create() {
        let index = KeywordIndex::new(KeywordConfig::default()).unwrap();
        assert_eq!(index.doc_count(), 0);
    }

    #[test]
    fn test_index_and_search() {
        let index = KeywordIndex::new(KeywordConfig::default()).unwrap();

        index
            .index_items(&[
                item("T-100", "Black Cotton Woven Tag"),
                item("L-200", "White Polyester Printed Label"),
            ])
            .unwrap();
        assert_eq!(index.doc_count(), 2);

        let results = index.search("black cotton tag", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].identity_key, "T-100");
        assert!(results[0].score > 0.0);
    }

    #[test]
    fn test_no_overlap_is_empty() {
        let index = KeywordIndex::new(KeywordConfig::default()).unwrap();
        index
            .index_items(&[item("T-100", "Black Cotton Woven Tag")])
            .unwrap();

        let results = index.search("holographic chip", 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_reindex_replaces_entry() {
        let index = KeywordIndex::new(KeywordConfig::default()).unwrap();
        index
            .index_items(&[item("T-100", "Black Cotton Woven Tag")])
            .unwrap();
        index
            .index_items(&[item("T-100", "Black Cotton Woven Tag v2")])
            .unwrap();

        assert_eq!(index.doc_count(), 1);
    }

    #[test]
    fn test_delete() {
        let index = KeywordIndex::new(KeywordConfig::default()).unwrap();
        index
            .index_items(&[
                item("T-100", "Black Cotton Woven Tag"),
                item("L-200", "White Polyester Printed Label"),
            ])
            .unwrap();

        index.delete(&["T-100".to_string()]).unwrap();
        assert_eq!(index.doc_count(), 1);
        assert!(index.search("cotton tag", 10).unwrap().is_empty());
    }

    #[test]
    fn test_persistent_index_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = KeywordConfig {
            index_path: Some(dir.path().to_string_lossy().into_owned()),
            ..KeywordConfig::default()
        };

        let index = KeywordIndex::new(config).unwrap();
        index
            .index_items(&[item("T-100", "Black Cotton Woven Tag")])
            .unwrap();
        assert_eq!(index.doc_count(), 1);
        assert_eq!(index.search("cotton", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_query_punctuation_tolerated() {
        let index = KeywordIndex::new(KeywordConfig::default()).unwrap();
        index
            .index_items(&[item("T-100", "Black Cotton Woven Tag")])
            .unwrap();

        // Free text with query-syntax characters must not error
        let results = index.search("black cotton tag (urgent!!)", 10);
        assert!(results.is_ok());
    }
}
