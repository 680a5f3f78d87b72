//! Fixed-window character splitter with overlap

use serde_json::Value;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::document::{
    Chunk, Document, CATEGORY_KEY, CHUNK_INDEX_KEY, SOURCE_PATH_KEY, START_INDEX_KEY,
};

/// Splits text into windows of `chunk_size` characters.
///
/// Windows start every `chunk_size - chunk_overlap` characters. The final
/// window is pulled back to end exactly at the end of the text, so it may
/// share more than `chunk_overlap` characters with its predecessor. A text of
/// length `L > chunk_size` yields `ceil((L - overlap) / (chunk_size - overlap))`
/// chunks; any non-empty text up to `chunk_size` yields one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Create a splitter; the overlap must be smaller than the chunk size
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Chunk size in characters
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap in characters
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Character ranges `(start, end)` of each window over a text of `len` chars
    pub fn windows(&self, len: usize) -> Vec<(usize, usize)> {
        if len == 0 {
            return Vec::new();
        }
        let step = self.chunk_size - self.chunk_overlap;
        let mut windows = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(len);
            windows.push((start, end));
            if end == len {
                break;
            }
            start += step;
            if start + self.chunk_size > len {
                start = len - self.chunk_size;
            }
        }

        windows
    }

    /// Split raw text
    pub fn split_text<'a>(&self, text: &'a str) -> Vec<(usize, &'a str)> {
        // byte offset of every char boundary, including the end
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let len = offsets.len() - 1;

        self.windows(len)
            .into_iter()
            .map(|(start, end)| (start, &text[offsets[start]..offsets[end]]))
            .collect()
    }

    /// Split a document into chunks.
    ///
    /// Every chunk carries the parent's metadata unchanged, `category` and
    /// `source_path` when the parent lacks them, plus `chunk_index` and
    /// `start_index` (character offset into the parent).
    pub fn split(&self, doc: &Document, category: &str, source_path: &Path) -> Vec<Chunk> {
        let mut base = doc.metadata.clone();
        base.entry(CATEGORY_KEY.to_string())
            .or_insert_with(|| Value::from(category));
        base.entry(SOURCE_PATH_KEY.to_string())
            .or_insert_with(|| Value::from(source_path.display().to_string()));

        self.split_text(&doc.content)
            .into_iter()
            .enumerate()
            .map(|(index, (start, text))| {
                let mut metadata = base.clone();
                metadata.insert(CHUNK_INDEX_KEY.to_string(), Value::from(index));
                metadata.insert(START_INDEX_KEY.to_string(), Value::from(start));
                Chunk::new(text.to_string(), metadata)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
        match len {
            0 => 0,
            l if l <= size => 1,
            l => (l - overlap).div_ceil(size - overlap),
        }
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(100, 150).is_err());
        assert!(TextSplitter::new(100, 99).is_ok());
        assert!(TextSplitter::new(1, 0).is_ok());
    }

    #[test]
    fn test_short_document_is_one_chunk() {
        let splitter = TextSplitter::new(800, 150).unwrap();
        let doc = Document::new("宿舍报修电话 88308888");
        let chunks = splitter.split(&doc, "日常生活相关", Path::new("x.docx"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, doc.content);
    }

    #[test]
    fn test_empty_document_has_no_chunks() {
        let splitter = TextSplitter::new(10, 2).unwrap();
        assert!(splitter.split(&Document::new(""), "c", Path::new("e.pdf")).is_empty());
    }

    #[test]
    fn test_windows_layout() {
        let splitter = TextSplitter::new(10, 4).unwrap();
        assert_eq!(splitter.windows(10), vec![(0, 10)]);
        assert_eq!(splitter.windows(16), vec![(0, 10), (6, 16)]);
        // last window pulled back to end at 20
        assert_eq!(splitter.windows(20), vec![(0, 10), (6, 16), (10, 20)]);
    }

    #[test]
    fn test_multibyte_text() {
        let splitter = TextSplitter::new(4, 1).unwrap();
        let parts = splitter.split_text("西北大学长安校区");
        let texts: Vec<&str> = parts.iter().map(|(_, t)| *t).collect();
        assert_eq!(texts, vec!["西北大学", "学长安校", "长安校区"]);
        assert_eq!(parts[2].0, 4);
    }

    #[test]
    fn test_metadata_propagation() {
        let splitter = TextSplitter::new(5, 1).unwrap();
        let doc = Document::new("0123456789")
            .with_metadata("page", 3)
            .with_metadata(CATEGORY_KEY, "竞赛相关");
        let chunks = splitter.split(&doc, "ignored", Path::new("数据集/竞赛相关/a.pdf"));

        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata["page"], 3);
            assert_eq!(chunk.metadata[CATEGORY_KEY], "竞赛相关");
            assert_eq!(chunk.metadata[SOURCE_PATH_KEY], "数据集/竞赛相关/a.pdf");
            assert_eq!(chunk.chunk_index(), Some(i as u64));
        }
        assert_eq!(chunks[1].metadata[START_INDEX_KEY], 4);
    }

    proptest! {
        #[test]
        fn prop_chunk_count_and_bounds(
            text in "[a-z西北大学 ]{0,400}",
            size in 1usize..60,
            overlap_frac in 0.0f64..1.0,
        ) {
            let overlap = ((size as f64) * overlap_frac) as usize % size;
            let splitter = TextSplitter::new(size, overlap).unwrap();
            let len = text.chars().count();
            let parts = splitter.split_text(&text);

            prop_assert_eq!(parts.len(), expected_count(len, size, overlap));
            for (_, part) in &parts {
                prop_assert!(part.chars().count() <= size);
            }
        }

        #[test]
        fn prop_chunks_reconstruct_text(
            text in "[a-z0-9校园 ]{1,300}",
            size in 2usize..40,
            overlap in 0usize..20,
        ) {
            prop_assume!(overlap < size);
            let splitter = TextSplitter::new(size, overlap).unwrap();
            let parts = splitter.split_text(&text);

            let mut rebuilt = String::new();
            let mut covered = 0usize;
            for (start, part) in &parts {
                prop_assert!(*start <= covered);
                rebuilt.extend(part.chars().skip(covered - start));
                covered = start + part.chars().count();
            }
            prop_assert_eq!(rebuilt, text);
        }
    }
}
