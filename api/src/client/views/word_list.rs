use super::word_route;
use crate::client::{ApiClient, ClientError, SearchRequest};
use crate::models::Word;

/// One row of the word list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordListItem {
    pub id: String,
    pub text: String,
    pub part_of_speech: String,
    pub href: String,
}

impl From<&Word> for WordListItem {
    fn from(word: &Word) -> Self {
        WordListItem {
            id: word.id.clone(),
            text: word.text.clone(),
            part_of_speech: word.part_of_speech.label(),
            href: word_route(&word.id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordList {
    pub items: Vec<WordListItem>,
    pub total: u64,
}

impl WordList {
    pub async fn load(client: &ApiClient, request: &SearchRequest) -> Result<Self, ClientError> {
        let page = client.search_words(request).await?;
        Ok(WordList {
            items: page.result.iter().map(WordListItem::from).collect(),
            total: page.total,
        })
    }
}
