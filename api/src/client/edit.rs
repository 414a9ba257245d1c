//! Edit sessions: an immutable loaded baseline plus a pending patch.
//!
//! The pending patch records whatever the user typed; [`EditSession::changes`]
//! compares it against the baseline field by field, so typing a value back to
//! its loaded value leaves nothing to save.

use crate::models::{PartOfSpeech, PopulatedWord, Sentence, SentenceUpdate, WordUpdate};

/// A value that can be edited through a patch of optional fields.
pub trait Editable {
    type Patch: Clone + Default + PartialEq;

    /// The subset of `pending` whose fields differ from `self`.
    fn diff(&self, pending: &Self::Patch) -> Self::Patch;
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditSession<T: Editable> {
    baseline: T,
    pending: T::Patch,
}

impl<T: Editable> EditSession<T> {
    pub fn new(baseline: T) -> Self {
        EditSession {
            baseline,
            pending: T::Patch::default(),
        }
    }

    pub fn baseline(&self) -> &T {
        &self.baseline
    }

    pub fn pending(&self) -> &T::Patch {
        &self.pending
    }

    pub fn edit(&mut self, apply: impl FnOnce(&mut T::Patch)) {
        apply(&mut self.pending);
    }

    /// Only the fields that differ from the baseline.
    pub fn changes(&self) -> T::Patch {
        self.baseline.diff(&self.pending)
    }

    pub fn has_changes(&self) -> bool {
        self.changes() != T::Patch::default()
    }

    /// Drop pending edits and adopt a freshly loaded baseline.
    pub fn reset(&mut self, baseline: T) {
        self.baseline = baseline;
        self.pending = T::Patch::default();
    }
}

fn changed<V: PartialEq + Clone>(pending: &Option<V>, current: &V) -> Option<V> {
    pending.as_ref().filter(|v| *v != current).cloned()
}

/// The editable fields of a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordFields {
    pub text: String,
    pub part_of_speech: PartOfSpeech,
    pub definition: Option<String>,
}

impl From<&PopulatedWord> for WordFields {
    fn from(word: &PopulatedWord) -> Self {
        WordFields {
            text: word.text.clone(),
            part_of_speech: word.part_of_speech,
            definition: word.definition.clone(),
        }
    }
}

impl Editable for WordFields {
    type Patch = WordUpdate;

    fn diff(&self, pending: &WordUpdate) -> WordUpdate {
        WordUpdate {
            text: changed(&pending.text, &self.text),
            part_of_speech: changed(&pending.part_of_speech, &self.part_of_speech),
            definition: changed(&pending.definition, &self.definition),
            ..Default::default()
        }
    }
}

/// The editable text of a sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceFields {
    pub english: String,
    pub paiute: String,
}

impl From<&Sentence> for SentenceFields {
    fn from(sentence: &Sentence) -> Self {
        SentenceFields {
            english: sentence.english.clone(),
            paiute: sentence.paiute.clone(),
        }
    }
}

impl Editable for SentenceFields {
    type Patch = SentenceUpdate;

    fn diff(&self, pending: &SentenceUpdate) -> SentenceUpdate {
        SentenceUpdate {
            english: changed(&pending.english, &self.english),
            paiute: changed(&pending.paiute, &self.paiute),
            ..Default::default()
        }
    }
}
