//! Word detail/edit view.
//!
//! Lifecycle: [`DetailState::Unloaded`] until [`WordDetail::load`] resolves to
//! `Loaded` or `NotFound`. Every successful save re-fetches the word, which
//! replaces all baselines and clears pending edits.

use crate::client::edit::{EditSession, SentenceFields, WordFields};
use crate::client::{ApiClient, ClientError, SearchRequest, UserRole};
use crate::models::{NewSentence, PartOfSpeech, PopulatedWord, Sentence};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Paiute,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Unloaded,
    Loaded(Box<LoadedWord>),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedWord {
    pub word: PopulatedWord,
    /// Sentences whose Paiute text contains the word, minus attached ones.
    pub suggested: Vec<Sentence>,
    word_edits: EditSession<WordFields>,
    sentence_edits: BTreeMap<String, EditSession<SentenceFields>>,
    pending_delete: Option<Sentence>,
}

impl LoadedWord {
    fn new(word: PopulatedWord, suggested: Vec<Sentence>) -> Self {
        let suggested: Vec<Sentence> = suggested
            .into_iter()
            .filter(|s| !word.sentences.iter().any(|attached| attached.id == s.id))
            .collect();
        let sentence_edits = word
            .sentences
            .iter()
            .chain(&suggested)
            .map(|s| (s.id.clone(), EditSession::new(SentenceFields::from(s))))
            .collect();
        LoadedWord {
            word_edits: EditSession::new(WordFields::from(&word)),
            word,
            suggested,
            sentence_edits,
            pending_delete: None,
        }
    }

    pub fn word_edits(&self) -> &EditSession<WordFields> {
        &self.word_edits
    }

    pub fn sentence_edits(&self, sentence_id: &str) -> Option<&EditSession<SentenceFields>> {
        self.sentence_edits.get(sentence_id)
    }

    /// The sentence awaiting delete confirmation.
    pub fn pending_delete(&self) -> Option<&Sentence> {
        self.pending_delete.as_ref()
    }

    pub fn has_changes(&self) -> bool {
        self.word_edits.has_changes() || self.sentence_edits.values().any(EditSession::has_changes)
    }

    fn find_sentence(&self, sentence_id: &str) -> Option<&Sentence> {
        self.word
            .sentences
            .iter()
            .chain(&self.suggested)
            .find(|s| s.id == sentence_id)
    }
}

/// Strips ASCII punctuation and surrounding whitespace.
pub fn remove_punctuation(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .trim()
        .to_string()
}

pub struct WordDetail {
    client: ApiClient,
    word_id: String,
    role: UserRole,
    state: DetailState,
}

impl WordDetail {
    pub fn new(client: ApiClient, word_id: impl Into<String>, role: UserRole) -> Self {
        WordDetail {
            client,
            word_id: word_id.into(),
            role,
            state: DetailState::Unloaded,
        }
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn loaded(&self) -> Option<&LoadedWord> {
        match &self.state {
            DetailState::Loaded(loaded) => Some(loaded),
            _ => None,
        }
    }

    fn loaded_mut(&mut self) -> Option<&mut LoadedWord> {
        match &mut self.state {
            DetailState::Loaded(loaded) => Some(loaded),
            _ => None,
        }
    }

    pub fn can_edit(&self) -> bool {
        self.role.can_edit()
    }

    /// Fetches the word, then its suggested sentences. A missing word moves
    /// to `NotFound`; any other failure does too, and is returned.
    pub async fn load(&mut self) -> Result<(), ClientError> {
        let word = match self.client.get_populated_word(&self.word_id).await {
            Ok(word) => word,
            Err(error) => {
                self.state = DetailState::NotFound;
                if error.is_not_found() {
                    return Ok(());
                }
                tracing::error!(word = %self.word_id, %error, "failed to load word");
                return Err(error);
            }
        };

        let suggested = self.suggested_sentences(&word.text).await;
        self.state = DetailState::Loaded(Box::new(LoadedWord::new(word, suggested)));
        Ok(())
    }

    async fn suggested_sentences(&self, text: &str) -> Vec<Sentence> {
        let query = remove_punctuation(text);
        if query.is_empty() {
            return Vec::new();
        }
        let request = SearchRequest::contains(query).in_fields(["paiute"]);
        match self.client.search_sentences(&request).await {
            Ok(page) => page.result,
            Err(error) => {
                tracing::warn!(word = %self.word_id, %error, "failed to load suggested sentences");
                Vec::new()
            }
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if let Some(loaded) = self.loaded_mut() {
            loaded.word_edits.edit(|p| p.text = Some(text));
        }
    }

    pub fn set_part_of_speech(&mut self, part_of_speech: PartOfSpeech) {
        if let Some(loaded) = self.loaded_mut() {
            loaded
                .word_edits
                .edit(|p| p.part_of_speech = Some(part_of_speech));
        }
    }

    pub fn set_definition(&mut self, definition: impl Into<String>) {
        let definition = definition.into();
        if let Some(loaded) = self.loaded_mut() {
            loaded
                .word_edits
                .edit(|p| p.definition = Some(Some(definition)));
        }
    }

    /// Records an edit to one language of a shown sentence. Returns `false`
    /// when the sentence is not on this page.
    pub fn set_sentence_text(
        &mut self,
        sentence_id: &str,
        language: Language,
        value: impl Into<String>,
    ) -> bool {
        let value = value.into();
        let Some(session) = self
            .loaded_mut()
            .and_then(|loaded| loaded.sentence_edits.get_mut(sentence_id))
        else {
            return false;
        };
        session.edit(|p| match language {
            Language::English => p.english = Some(value),
            Language::Paiute => p.paiute = Some(value),
        });
        true
    }

    pub fn can_save_word(&self) -> bool {
        self.loaded()
            .is_some_and(|loaded| loaded.word_edits.has_changes())
    }

    pub fn can_save_sentence(&self, sentence_id: &str) -> bool {
        self.loaded()
            .and_then(|loaded| loaded.sentence_edits(sentence_id))
            .is_some_and(EditSession::has_changes)
    }

    /// Sends the changed word fields, then reloads. `Ok(false)` when there
    /// was nothing to send.
    pub async fn save_word(&mut self) -> Result<bool, ClientError> {
        self.require_editor()?;
        let Some(changes) = self.loaded().map(|l| l.word_edits.changes()) else {
            return Ok(false);
        };
        if changes.is_empty() {
            return Ok(false);
        }

        self.client.update_word(&self.word_id, &changes).await?;
        self.load().await?;
        Ok(true)
    }

    pub async fn save_sentence(&mut self, sentence_id: &str) -> Result<bool, ClientError> {
        self.require_editor()?;
        let Some(changes) = self
            .loaded()
            .and_then(|l| l.sentence_edits(sentence_id))
            .map(EditSession::changes)
        else {
            return Ok(false);
        };
        if changes.is_empty() {
            return Ok(false);
        }

        self.client.update_sentence(sentence_id, &changes).await?;
        self.load().await?;
        Ok(true)
    }

    /// Creates a blank sentence, attaches it to the word and reloads.
    pub async fn add_sentence(&mut self) -> Result<Sentence, ClientError> {
        self.require_editor()?;
        if self.loaded().is_none() {
            return Err(ClientError::InvalidForm(
                "cannot add a sentence to a word that is not loaded".to_string(),
            ));
        }

        let sentence = self
            .client
            .create_sentence(&NewSentence {
                english: String::new(),
                paiute: String::new(),
            })
            .await?;
        self.client
            .attach_sentence(&self.word_id, &sentence.id)
            .await?;
        self.load().await?;
        Ok(sentence)
    }

    /// First step of deletion: remember which sentence to delete.
    pub fn request_delete(&mut self, sentence_id: &str) -> bool {
        let Some(loaded) = self.loaded_mut() else {
            return false;
        };
        let Some(sentence) = loaded.find_sentence(sentence_id).cloned() else {
            return false;
        };
        loaded.pending_delete = Some(sentence);
        true
    }

    pub fn cancel_delete(&mut self) {
        if let Some(loaded) = self.loaded_mut() {
            loaded.pending_delete = None;
        }
    }

    /// Deletes the sentence chosen by [`WordDetail::request_delete`] and
    /// reloads. `Ok(None)` when nothing was pending.
    pub async fn confirm_delete(&mut self) -> Result<Option<Sentence>, ClientError> {
        self.require_editor()?;
        let Some(sentence) = self.loaded_mut().and_then(|l| l.pending_delete.take()) else {
            return Ok(None);
        };

        let deleted = self.client.delete_sentence(&sentence.id).await?;
        self.load().await?;
        Ok(Some(deleted))
    }

    fn require_editor(&self) -> Result<(), ClientError> {
        if self.can_edit() {
            Ok(())
        } else {
            tracing::error!(role = ?self.role, "this user cannot make edits");
            Err(ClientError::PermissionDenied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::spawn_client;
    use crate::models::{NewWord, Word};
    use pretty_assertions::assert_eq;

    async fn seeded() -> (ApiClient, Word, Sentence, Sentence) {
        let client = spawn_client().await;
        let word = client
            .create_word(&NewWord {
                text: "tuhu!".into(),
                part_of_speech: PartOfSpeech::Adjective,
                definition: Some("black".into()),
                image: None,
                audio: None,
            })
            .await
            .unwrap();
        let attached = client
            .create_sentence(&NewSentence {
                english: "The dog is black.".into(),
                paiute: "Sadi tuhu.".into(),
            })
            .await
            .unwrap();
        let suggested = client
            .create_sentence(&NewSentence {
                english: "The black horse.".into(),
                paiute: "Tuhu puku, tuhu.".into(),
            })
            .await
            .unwrap();
        client
            .create_sentence(&NewSentence {
                english: "Unrelated.".into(),
                paiute: "Pia.".into(),
            })
            .await
            .unwrap();
        client.attach_sentence(&word.id, &attached.id).await.unwrap();
        (client, word, attached, suggested)
    }

    #[test]
    fn strips_punctuation() {
        assert_eq!(remove_punctuation(" tuhu!? "), "tuhu");
        assert_eq!(remove_punctuation("..."), "");
    }

    #[tokio::test]
    async fn missing_word_is_not_found() {
        let client = spawn_client().await;
        let mut view = WordDetail::new(client, "missing", UserRole::Editor);
        assert_eq!(view.state(), &DetailState::Unloaded);
        view.load().await.unwrap();
        assert_eq!(view.state(), &DetailState::NotFound);
    }

    #[tokio::test]
    async fn load_populates_and_suggests() {
        let (client, word, attached, suggested) = seeded().await;
        // A second attached sentence that also matches must not be suggested.
        client.attach_sentence(&word.id, &suggested.id).await.unwrap();
        let extra = client
            .create_sentence(&NewSentence {
                english: "Black again.".into(),
                paiute: "tuhu".into(),
            })
            .await
            .unwrap();

        let mut view = WordDetail::new(client, &word.id, UserRole::Viewer);
        view.load().await.unwrap();
        let loaded = view.loaded().unwrap();
        assert_eq!(loaded.word.sentences, vec![attached, suggested]);
        assert_eq!(loaded.suggested, vec![extra]);
        assert!(!loaded.has_changes());
    }

    #[tokio::test]
    async fn save_is_enabled_only_for_real_changes() {
        let (client, word, _, _) = seeded().await;
        let mut view = WordDetail::new(client.clone(), &word.id, UserRole::Editor);
        view.load().await.unwrap();

        assert!(!view.can_save_word());
        view.set_text("tuhu!");
        assert!(!view.can_save_word());
        assert_eq!(view.save_word().await.unwrap(), false);

        view.set_definition("dark");
        assert!(view.can_save_word());
        assert_eq!(
            view.loaded().unwrap().word_edits().changes(),
            crate::models::WordUpdate {
                definition: Some(Some("dark".into())),
                ..Default::default()
            }
        );
        assert!(view.save_word().await.unwrap());

        let loaded = view.loaded().unwrap();
        assert_eq!(loaded.word.definition.as_deref(), Some("dark"));
        assert_eq!(loaded.word.text, "tuhu!");
        assert!(!view.can_save_word());

        let stored = client.get_word(&word.id).await.unwrap();
        assert_eq!(stored.definition.as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn viewers_cannot_save() {
        let (client, word, _, _) = seeded().await;
        let mut view = WordDetail::new(client, &word.id, UserRole::Viewer);
        view.load().await.unwrap();
        view.set_part_of_speech(PartOfSpeech::Noun);
        assert!(view.can_save_word());
        assert!(matches!(
            view.save_word().await,
            Err(ClientError::PermissionDenied)
        ));
        assert!(matches!(
            view.add_sentence().await,
            Err(ClientError::PermissionDenied)
        ));
    }

    #[tokio::test]
    async fn sentence_edits_are_tracked_per_sentence() {
        let (client, word, attached, suggested) = seeded().await;
        let mut view = WordDetail::new(client.clone(), &word.id, UserRole::Editor);
        view.load().await.unwrap();

        assert!(view.set_sentence_text(&suggested.id, Language::English, "A black horse."));
        assert!(!view.set_sentence_text("unknown", Language::English, "x"));
        assert!(view.can_save_sentence(&suggested.id));
        assert!(!view.can_save_sentence(&attached.id));

        assert!(view.save_sentence(&suggested.id).await.unwrap());
        let stored = client.get_sentence(&suggested.id).await.unwrap();
        assert_eq!(stored.english, "A black horse.");
        assert_eq!(stored.paiute, suggested.paiute);
        assert!(!view.can_save_sentence(&suggested.id));
    }

    #[tokio::test]
    async fn add_sentence_attaches_blank_sentence() {
        let (client, word, attached, _) = seeded().await;
        let mut view = WordDetail::new(client, &word.id, UserRole::Admin);
        view.load().await.unwrap();

        let added = view.add_sentence().await.unwrap();
        let loaded = view.loaded().unwrap();
        let ids: Vec<_> = loaded.word.sentences.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![attached.id, added.id]);
        assert_eq!(added.english, "");
    }

    #[tokio::test]
    async fn delete_needs_confirmation() {
        let (client, word, attached, _) = seeded().await;
        let mut view = WordDetail::new(client.clone(), &word.id, UserRole::Editor);
        view.load().await.unwrap();

        assert!(view.request_delete(&attached.id));
        view.cancel_delete();
        assert_eq!(view.confirm_delete().await.unwrap(), None);
        assert!(client.get_sentence(&attached.id).await.is_ok());

        assert!(view.request_delete(&attached.id));
        assert_eq!(
            view.loaded().unwrap().pending_delete().map(|s| s.id.as_str()),
            Some(attached.id.as_str())
        );
        let deleted = view.confirm_delete().await.unwrap().unwrap();
        assert_eq!(deleted.id, attached.id);
        assert!(view.loaded().unwrap().word.sentences.is_empty());
        assert!(client
            .get_sentence(&attached.id)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
