use serde::{Deserialize, Serialize};

use crate::channel::messages::ResultFrame;

/// One transcribed word. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub is_final: bool,
}

/// The accumulated transcription result.
///
/// `words` is a prefix of finalized words followed by at most one
/// contiguous run of non-final words. Each merged result frame replaces
/// the non-final run wholesale and appends newly finalized words; final
/// words are never revised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub words: Vec<Word>,
    pub final_proc_time_ms: u64,
    pub total_proc_time_ms: u64,
}

impl Transcript {
    /// Merge one result frame from the service.
    pub fn merge(&mut self, frame: &ResultFrame) {
        while matches!(self.words.last(), Some(word) if !word.is_final) {
            self.words.pop();
        }

        for raw in &frame.final_words {
            self.words.push(Word {
                text: raw.text.clone(),
                start_ms: raw.start_ms,
                duration_ms: raw.duration_ms,
                is_final: true,
            });
        }
        for raw in &frame.nonfinal_words {
            self.words.push(Word {
                text: raw.text.clone(),
                start_ms: raw.start_ms,
                duration_ms: raw.duration_ms,
                is_final: false,
            });
        }

        self.final_proc_time_ms = frame.final_proc_time_ms;
        self.total_proc_time_ms = frame.total_proc_time_ms;
    }

    /// Concatenated text of all words, final and non-final.
    pub fn text(&self) -> String {
        self.words.iter().map(|w| w.text.as_str()).collect()
    }
}
