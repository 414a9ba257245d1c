use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Embedded binary asset: base64 payload plus the name it was uploaded under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub data: String,
    pub filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartOfSpeech {
    Noun,
    ProperNoun,
    Pronoun,
    Verb,
    Adjective,
    Adverb,
    Postposition,
    Conjunction,
    Interjection,
    Particle,
    Numeral,
    Determiner,
    Other,
}

impl PartOfSpeech {
    pub const ALL: [PartOfSpeech; 13] = [
        PartOfSpeech::Noun,
        PartOfSpeech::ProperNoun,
        PartOfSpeech::Pronoun,
        PartOfSpeech::Verb,
        PartOfSpeech::Adjective,
        PartOfSpeech::Adverb,
        PartOfSpeech::Postposition,
        PartOfSpeech::Conjunction,
        PartOfSpeech::Interjection,
        PartOfSpeech::Particle,
        PartOfSpeech::Numeral,
        PartOfSpeech::Determiner,
        PartOfSpeech::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartOfSpeech::Noun => "NOUN",
            PartOfSpeech::ProperNoun => "PROPER_NOUN",
            PartOfSpeech::Pronoun => "PRONOUN",
            PartOfSpeech::Verb => "VERB",
            PartOfSpeech::Adjective => "ADJECTIVE",
            PartOfSpeech::Adverb => "ADVERB",
            PartOfSpeech::Postposition => "POSTPOSITION",
            PartOfSpeech::Conjunction => "CONJUNCTION",
            PartOfSpeech::Interjection => "INTERJECTION",
            PartOfSpeech::Particle => "PARTICLE",
            PartOfSpeech::Numeral => "NUMERAL",
            PartOfSpeech::Determiner => "DETERMINER",
            PartOfSpeech::Other => "OTHER",
        }
    }

    /// Human-facing label, e.g. `proper noun`.
    pub fn label(&self) -> String {
        self.as_str().to_lowercase().replace('_', " ")
    }

    /// Inverse of [`PartOfSpeech::label`]; also accepts the wire form.
    pub fn from_label(label: &str) -> Option<Self> {
        label
            .trim()
            .to_uppercase()
            .replace(' ', "_")
            .parse()
            .ok()
    }
}

impl fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown part of speech: {0}")]
pub struct UnknownPartOfSpeech(pub String);

impl FromStr for PartOfSpeech {
    type Err = UnknownPartOfSpeech;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PartOfSpeech::ALL
            .into_iter()
            .find(|pos| pos.as_str() == s)
            .ok_or_else(|| UnknownPartOfSpeech(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    #[serde(rename = "_id")]
    pub id: String,
    pub english: String,
    pub paiute: String,
    #[serde(default)]
    pub image: Option<Asset>,
    #[serde(default)]
    pub audio: Option<Asset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub image: Option<Asset>,
    #[serde(default)]
    pub audio: Option<Asset>,
    pub part_of_speech: PartOfSpeech,
    #[serde(default)]
    pub words: Vec<String>,
    #[serde(default)]
    pub sentences: Vec<String>,
}

/// A word with its reference lists resolved to the referenced documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulatedWord {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub image: Option<Asset>,
    #[serde(default)]
    pub audio: Option<Asset>,
    pub part_of_speech: PartOfSpeech,
    #[serde(default)]
    pub words: Vec<Word>,
    #[serde(default)]
    pub sentences: Vec<Sentence>,
}

/// Which reference list of a [`Word`] an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceList {
    Words,
    Sentences,
}

impl ReferenceList {
    pub fn column(&self) -> &'static str {
        match self {
            ReferenceList::Words => "words",
            ReferenceList::Sentences => "sentences",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("A word cannot reference itself")]
    SelfReference,
}

impl Word {
    /// Appends `target` to the chosen list unless it is already there.
    /// Returns whether the list changed.
    pub fn add_reference(
        &mut self,
        list: ReferenceList,
        target: &str,
    ) -> Result<bool, ReferenceError> {
        if list == ReferenceList::Words && target == self.id {
            return Err(ReferenceError::SelfReference);
        }
        let refs = self.references_mut(list);
        if refs.iter().any(|id| id == target) {
            return Ok(false);
        }
        refs.push(target.to_string());
        Ok(true)
    }

    /// Removes every occurrence of `target`. Returns whether the list changed.
    pub fn remove_reference(&mut self, list: ReferenceList, target: &str) -> bool {
        let refs = self.references_mut(list);
        let before = refs.len();
        refs.retain(|id| id != target);
        refs.len() != before
    }

    pub fn references(&self, list: ReferenceList) -> &[String] {
        match list {
            ReferenceList::Words => &self.words,
            ReferenceList::Sentences => &self.sentences,
        }
    }

    fn references_mut(&mut self, list: ReferenceList) -> &mut Vec<String> {
        match list {
            ReferenceList::Words => &mut self.words,
            ReferenceList::Sentences => &mut self.sentences,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSentence {
    pub english: String,
    pub paiute: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWord {
    pub text: String,
    pub part_of_speech: PartOfSpeech,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Asset>,
}

/// Partial sentence update. Absent fields are left untouched; an explicit
/// `null` on `image`/`audio` clears the asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paiute: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<Option<Asset>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub audio: Option<Option<Asset>>,
}

impl SentenceUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub definition: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<PartOfSpeech>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<Option<Asset>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub audio: Option<Option<Asset>>,
}

impl WordUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Distinguishes a present `null` (`Some(None)`) from an absent key (`None`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Uniform response body: `{success, result}` plus `total` on searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub result: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl<T> Envelope<T> {
    pub fn ok(result: T) -> Self {
        Envelope {
            success: true,
            result,
            total: None,
        }
    }

    pub fn page(result: T, total: u64) -> Self {
        Envelope {
            success: true,
            result,
            total: Some(total),
        }
    }

    pub fn failure(result: T) -> Self {
        Envelope {
            success: false,
            result,
            total: None,
        }
    }
}

/// One page of search results and the unpaginated match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage<T> {
    pub result: Vec<T>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn word(id: &str) -> Word {
        Word {
            id: id.to_string(),
            text: "tuhu".to_string(),
            definition: None,
            image: None,
            audio: None,
            part_of_speech: PartOfSpeech::Adjective,
            words: Vec::new(),
            sentences: Vec::new(),
        }
    }

    #[rstest]
    #[case(PartOfSpeech::Noun, "noun")]
    #[case(PartOfSpeech::ProperNoun, "proper noun")]
    #[case(PartOfSpeech::Postposition, "postposition")]
    fn part_of_speech_labels(#[case] pos: PartOfSpeech, #[case] label: &str) {
        assert_eq!(pos.label(), label);
        assert_eq!(PartOfSpeech::from_label(label), Some(pos));
    }

    #[test]
    fn part_of_speech_wire_form() {
        let value = serde_json::to_value(PartOfSpeech::ProperNoun).unwrap();
        assert_eq!(value, json!("PROPER_NOUN"));
        assert!("proper noun".parse::<PartOfSpeech>().is_err());
        assert_eq!(PartOfSpeech::from_label("gerund"), None);
    }

    #[test]
    fn add_reference_is_idempotent() {
        let mut w = word("w1");
        assert_eq!(w.add_reference(ReferenceList::Words, "w2"), Ok(true));
        assert_eq!(w.add_reference(ReferenceList::Words, "w2"), Ok(false));
        assert_eq!(w.add_reference(ReferenceList::Words, "w3"), Ok(true));
        assert_eq!(w.words, vec!["w2", "w3"]);
    }

    #[test]
    fn add_reference_rejects_self() {
        let mut w = word("w1");
        assert_eq!(
            w.add_reference(ReferenceList::Words, "w1"),
            Err(ReferenceError::SelfReference)
        );
        assert!(w.words.is_empty());
    }

    #[test]
    fn sentence_ids_may_equal_word_id() {
        let mut w = word("shared");
        assert_eq!(w.add_reference(ReferenceList::Sentences, "shared"), Ok(true));
    }

    #[test]
    fn remove_reference() {
        let mut w = word("w1");
        w.sentences = vec!["s1".into(), "s2".into()];
        assert!(w.remove_reference(ReferenceList::Sentences, "s1"));
        assert!(!w.remove_reference(ReferenceList::Sentences, "s1"));
        assert_eq!(w.references(ReferenceList::Sentences), ["s2".to_string()]);
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let update: SentenceUpdate =
            serde_json::from_value(json!({"english": "Hi", "image": null, "bogus": 1})).unwrap();
        assert_eq!(update.english.as_deref(), Some("Hi"));
        assert_eq!(update.paiute, None);
        assert_eq!(update.image, Some(None));
        assert_eq!(update.audio, None);

        let empty: WordUpdate = serde_json::from_value(json!({})).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn envelope_omits_total_unless_paged() {
        let body = serde_json::to_value(Envelope::ok("x")).unwrap();
        assert_eq!(body, json!({"success": true, "result": "x"}));
        let body = serde_json::to_value(Envelope::page(Vec::<u8>::new(), 0)).unwrap();
        assert_eq!(body, json!({"success": true, "result": [], "total": 0}));
    }
}
