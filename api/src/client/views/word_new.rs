use super::word_route;
use crate::client::{ApiClient, ClientError};
use crate::models::{NewWord, PartOfSpeech};

/// The word creation form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordForm {
    pub text: String,
    pub part_of_speech: PartOfSpeech,
    pub definition: Option<String>,
    /// Ids of existing words to link as related.
    pub related: Vec<String>,
}

impl WordForm {
    pub fn new(text: impl Into<String>, part_of_speech: PartOfSpeech) -> Self {
        WordForm {
            text: text.into(),
            part_of_speech,
            definition: None,
            related: Vec::new(),
        }
    }

    /// Creates the word, then links related words one at a time, each call
    /// waiting for the previous. A failed link is logged and skipped.
    /// Returns the new word's route.
    pub async fn submit(&self, client: &ApiClient) -> Result<String, ClientError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(ClientError::InvalidForm("word text is required".to_string()));
        }

        let word = client
            .create_word(&NewWord {
                text: text.to_string(),
                part_of_speech: self.part_of_speech,
                definition: self.definition.clone().filter(|d| !d.trim().is_empty()),
                image: None,
                audio: None,
            })
            .await?;

        for related in &self.related {
            if let Err(error) = client.add_related_word(&word.id, related).await {
                tracing::warn!(word = %word.id, %related, %error, "failed to link related word");
            }
        }

        Ok(word_route(&word.id))
    }
}
