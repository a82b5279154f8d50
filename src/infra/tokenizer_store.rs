// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Builds, saves and loads a word-level tokenizer.
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper, so the vocabulary is counted here and
// written out as a HuggingFace tokenizer JSON, which is then
// loaded with Tokenizer::from_file.
//
// Fixed special ids:
//   [PAD] = 0   padding for classifier batches
//   [UNK] = 1   out-of-vocabulary words
//   [BOS] = 2   start-of-sequence sentinel
//   [EOS] = 3   end-of-sequence sentinel / document separator
//
// Words follow from id 4, most frequent first, ties broken
// alphabetically so the same corpus always gives the same ids.
//
// Reference: HuggingFace tokenizers JSON format (WordLevel model)

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tokenizers::Tokenizer;

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const BOS_ID: u32 = 2;
pub const EOS_ID: u32 = 3;

const SPECIAL_TOKENS: [&str; 4] = ["[PAD]", "[UNK]", "[BOS]", "[EOS]"];
const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load the saved tokenizer, or build one from `texts`.
    pub fn load_or_build<S: AsRef<str>>(&self, texts: &[S], vocab_size: usize) -> Result<Tokenizer> {
        if self.path().exists() {
            tracing::info!("Loading existing tokenizer from '{}'", self.path().display());
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(texts, vocab_size)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        load_file(&self.path())
    }

    fn build_and_save<S: AsRef<str>>(&self, texts: &[S], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let mut vocab = serde_json::Map::new();
        for (id, tok) in SPECIAL_TOKENS.iter().enumerate() {
            vocab.insert(tok.to_string(), serde_json::json!(id));
        }
        for (i, word) in top_words(texts, vocab_size.saturating_sub(SPECIAL_TOKENS.len()))
            .into_iter()
            .enumerate()
        {
            vocab.insert(word, serde_json::json!(SPECIAL_TOKENS.len() + i));
        }
        let n_words = vocab.len();

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .enumerate()
            .map(|(id, tok)| serde_json::json!({
                "id": id, "content": tok, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        let path = self.path();
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .context("Cannot write tokenizer JSON")?;
        tracing::info!("Tokenizer built with {} entries, saved to '{}'", n_words, path.display());

        load_file(&path)
    }
}

fn load_file(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
}

/// The `limit` most frequent lowercase words of `texts`.
fn top_words<S: AsRef<str>>(texts: &[S], limit: usize) -> Vec<String> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for word in text.as_ref().split_whitespace() {
            let w = word.to_lowercase();
            let w = w.trim_matches(|c: char| !c.is_alphanumeric());
            if !w.is_empty() {
                *freq.entry(w.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut words: Vec<(String, usize)> = freq.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(limit);
    words.into_iter().map(|(w, _)| w).collect()
}

/// Token ids of `text`, without special tokens.
pub fn encode(tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>> {
    let enc = tokenizer
        .encode(text, false)
        .map_err(|e| anyhow::anyhow!("Tokenisation failed: {e}"))?;
    Ok(enc.get_ids().to_vec())
}

/// Encode documents into one stream, closing each with [EOS].
pub fn encode_stream<S: AsRef<str>>(tokenizer: &Tokenizer, texts: &[S]) -> Result<Vec<u32>> {
    let mut stream = Vec::new();
    for text in texts {
        stream.extend(encode(tokenizer, text.as_ref())?);
        stream.push(EOS_ID);
    }
    Ok(stream)
}
