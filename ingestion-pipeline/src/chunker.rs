use common::{error::AppError, utils::config::RagTuning};

/// Validated chunking parameters. Constructing these is the only way to run
/// the chunker, so an overlap at or above the chunk size cannot reach the
/// cursor arithmetic.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerSettings {
    chunk_size: usize,
    overlap: usize,
    max_chunks: usize,
}

impl ChunkerSettings {
    pub fn new(chunk_size: usize, overlap: usize, max_chunks: usize) -> Result<Self, AppError> {
        if chunk_size == 0 {
            return Err(AppError::Validation("chunk_size must be positive".into()));
        }
        if overlap >= chunk_size {
            return Err(AppError::Validation(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        if max_chunks == 0 {
            return Err(AppError::Validation("max_chunks must be positive".into()));
        }
        Ok(Self {
            chunk_size,
            overlap,
            max_chunks,
        })
    }

    pub fn from_tuning(tuning: &RagTuning) -> Result<Self, AppError> {
        Self::new(tuning.chunk_size, tuning.chunk_overlap, tuning.max_chunks)
    }
}

/// Splits text into overlapping fixed-size windows: window i+1 starts
/// `overlap` characters before the end of window i. Stops at the end of the
/// text or after `max_chunks` windows, whichever comes first; text beyond the
/// cap is dropped. Windows are measured in characters, never split a code
/// point, and are never empty.
pub fn chunk(text: &str, settings: ChunkerSettings) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() && chunks.len() < settings.max_chunks {
        let end = (start + settings.chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        // overlap < chunk_size, so the cursor always advances
        start = end - settings.overlap;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(chunk_size: usize, overlap: usize, max_chunks: usize) -> ChunkerSettings {
        ChunkerSettings::new(chunk_size, overlap, max_chunks).expect("valid settings")
    }

    #[test]
    fn rejects_overlap_at_or_above_chunk_size() {
        assert!(ChunkerSettings::new(10, 10, 5).is_err());
        assert!(ChunkerSettings::new(10, 15, 5).is_err());
        assert!(ChunkerSettings::new(0, 0, 5).is_err());
        assert!(ChunkerSettings::new(10, 9, 5).is_ok());
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk("", settings(10, 2, 5)).is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk("hello", settings(10, 2, 5));
        assert_eq!(chunks, vec!["hello".to_string()]);
    }

    #[test]
    fn windows_overlap_and_cover_the_text() {
        let text: String = ('a'..='z').collect();
        let chunks = chunk(&text, settings(10, 3, 100));

        // Consecutive windows share their overlap region.
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let next: Vec<char> = pair[1].chars().collect();
            assert_eq!(&prev[prev.len() - 3..], &next[..3]);
        }

        // Stitching the windows back together (skipping each overlap)
        // reproduces the input: coverage with no gaps.
        let mut rebuilt = chunks[0].clone();
        for piece in &chunks[1..] {
            rebuilt.extend(piece.chars().skip(3));
        }
        assert_eq!(rebuilt, text);

        // The final window ends exactly at the end of the text.
        assert!(text.ends_with(chunks.last().expect("at least one chunk")));
    }

    #[test]
    fn chunk_count_is_capped() {
        let text = "x".repeat(1000);
        let chunks = chunk(&text, settings(10, 2, 3));
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn no_chunk_is_empty() {
        let text = "abcdefghij";
        for (size, overlap) in [(3, 1), (5, 4), (10, 0), (11, 5)] {
            let chunks = chunk(text, settings(size, overlap, 100));
            assert!(chunks.iter().all(|c| !c.is_empty()));
        }
    }

    #[test]
    fn multibyte_text_is_not_split_mid_character() {
        let text = "金融市場rust🎈".repeat(20);
        let chunks = chunk(&text, settings(7, 2, 100));
        let expected: usize = text.chars().count();
        // Character coverage accounting for overlap between windows.
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        let overlaps = (chunks.len() - 1) * 2;
        assert_eq!(total - overlaps, expected);
    }
}
