//! View logic behind the dictionary front-end: listing, creating and
//! viewing/editing words.

pub mod word_detail;
pub mod word_list;
pub mod word_new;

pub use word_detail::{DetailState, LoadedWord, WordDetail};
pub use word_list::{WordList, WordListItem};
pub use word_new::WordForm;

/// Route of a word's detail page.
pub fn word_route(id: &str) -> String {
    format!("/word/{id}")
}
