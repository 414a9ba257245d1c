use crate::models::{
    Asset, NewSentence, NewWord, PartOfSpeech, PopulatedWord, ReferenceError, ReferenceList,
    SearchPage, Sentence, SentenceUpdate, Word, WordUpdate,
};
use crate::search::{SearchError, SearchPipeline};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DbError(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
    #[error("Store lock poisoned")]
    Poisoned,
}

/// A top-level record kind kept in its own table.
///
/// `COLUMNS` lists the selected columns in the order `from_row` reads them;
/// the first one is always `id`.
pub trait Document: Serialize + Sized {
    const TABLE: &'static str;
    /// Singular, lower case name used in messages (`sentence`).
    const NAME: &'static str;
    const COLUMNS: &'static [&'static str];
    const SEARCHABLE: &'static [&'static str];
    const DEFAULT_SEARCH: &'static [&'static str];

    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self>;
    fn image(&self) -> Option<&Asset>;
    fn audio(&self) -> Option<&Asset>;
}

impl Document for Sentence {
    const TABLE: &'static str = "sentences";
    const NAME: &'static str = "sentence";
    const COLUMNS: &'static [&'static str] = &["id", "english", "paiute", "image", "audio"];
    const SEARCHABLE: &'static [&'static str] = &["english", "paiute"];
    const DEFAULT_SEARCH: &'static [&'static str] = &["english", "paiute"];

    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Sentence {
            id: row.get(offset)?,
            english: row.get(offset + 1)?,
            paiute: row.get(offset + 2)?,
            image: json_column(row, offset + 3)?,
            audio: json_column(row, offset + 4)?,
        })
    }

    fn image(&self) -> Option<&Asset> {
        self.image.as_ref()
    }

    fn audio(&self) -> Option<&Asset> {
        self.audio.as_ref()
    }
}

impl Document for Word {
    const TABLE: &'static str = "words";
    const NAME: &'static str = "word";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "text",
        "definition",
        "part_of_speech",
        "image",
        "audio",
        "words",
        "sentences",
    ];
    const SEARCHABLE: &'static [&'static str] = &["text", "definition", "part_of_speech"];
    const DEFAULT_SEARCH: &'static [&'static str] = &["text", "definition"];

    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        let pos_idx = offset + 3;
        let pos: String = row.get(pos_idx)?;
        let part_of_speech = pos.parse::<PartOfSpeech>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(pos_idx, Type::Text, Box::new(e))
        })?;
        Ok(Word {
            id: row.get(offset)?,
            text: row.get(offset + 1)?,
            definition: row.get(offset + 2)?,
            part_of_speech,
            image: json_column(row, offset + 4)?,
            audio: json_column(row, offset + 5)?,
            words: json_column::<Vec<String>>(row, offset + 6)?.unwrap_or_default(),
            sentences: json_column::<Vec<String>>(row, offset + 7)?.unwrap_or_default(),
        })
    }

    fn image(&self) -> Option<&Asset> {
        self.image.as_ref()
    }

    fn audio(&self) -> Option<&Asset> {
        self.audio.as_ref()
    }
}

/// Reads a nullable TEXT column holding JSON.
fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn json_value<T: Serialize>(value: Option<&T>) -> Result<SqlValue, StoreError> {
    Ok(match value {
        Some(v) => SqlValue::Text(serde_json::to_string(v)?),
        None => SqlValue::Null,
    })
}

fn find_by_id<D: Document>(conn: &Connection, id: &str) -> Result<Option<D>, StoreError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        D::COLUMNS.join(", "),
        D::TABLE
    );
    let doc = conn
        .query_row(&sql, [id], |row| D::from_row(row, 0))
        .optional()?;
    Ok(doc)
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sentences (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        english TEXT NOT NULL,
        paiute TEXT NOT NULL,
        image TEXT,
        audio TEXT
    );
    CREATE TABLE IF NOT EXISTS words (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        text TEXT NOT NULL,
        definition TEXT,
        part_of_speech TEXT NOT NULL,
        image TEXT,
        audio TEXT,
        words TEXT NOT NULL DEFAULT '[]',
        sentences TEXT NOT NULL DEFAULT '[]'
    );
";

/// Embedded document store for words and sentences.
///
/// Each table keeps an autoincrement `seq` so reads that imply an order
/// return records in insertion order.
pub struct DictionaryStore {
    pub db_path: Option<PathBuf>,
    conn: Connection,
}

impl DictionaryStore {
    /// Opens (creating if needed) the store at `path`; `:memory:` opens a
    /// private in-memory store.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        if path == ":memory:" {
            return Self::open_in_memory();
        }

        let conn = Connection::open(path)?;

        // Optimize for local performance
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!(path, "opened dictionary store");
        Ok(DictionaryStore {
            db_path: Some(PathBuf::from(path)),
            conn,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(DictionaryStore {
            db_path: None,
            conn,
        })
    }

    pub fn create_sentence(&self, new: &NewSentence) -> Result<Sentence, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO sentences (id, english, paiute) VALUES (?1, ?2, ?3)",
            (&id, &new.english, &new.paiute),
        )?;
        tracing::debug!(%id, "created sentence");

        Ok(Sentence {
            id,
            english: new.english.clone(),
            paiute: new.paiute.clone(),
            image: None,
            audio: None,
        })
    }

    /// Applies a partial update. `Ok(None)` when no sentence has `id`.
    pub fn update_sentence(
        &self,
        id: &str,
        update: &SentenceUpdate,
    ) -> Result<Option<Sentence>, StoreError> {
        let mut sets: Vec<(&str, SqlValue)> = Vec::new();
        if let Some(english) = &update.english {
            sets.push(("english", SqlValue::Text(english.clone())));
        }
        if let Some(paiute) = &update.paiute {
            sets.push(("paiute", SqlValue::Text(paiute.clone())));
        }
        if let Some(image) = &update.image {
            sets.push(("image", json_value(image.as_ref())?));
        }
        if let Some(audio) = &update.audio {
            sets.push(("audio", json_value(audio.as_ref())?));
        }
        self.apply_update::<Sentence>(id, sets)
    }

    pub fn create_word(&self, new: &NewWord) -> Result<Word, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO words (id, text, definition, part_of_speech, image, audio)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (
                &id,
                &new.text,
                &new.definition,
                new.part_of_speech.as_str(),
                json_value(new.image.as_ref())?,
                json_value(new.audio.as_ref())?,
            ),
        )?;
        tracing::debug!(%id, "created word");

        Ok(Word {
            id,
            text: new.text.clone(),
            definition: new.definition.clone(),
            image: new.image.clone(),
            audio: new.audio.clone(),
            part_of_speech: new.part_of_speech,
            words: Vec::new(),
            sentences: Vec::new(),
        })
    }

    pub fn update_word(&self, id: &str, update: &WordUpdate) -> Result<Option<Word>, StoreError> {
        let mut sets: Vec<(&str, SqlValue)> = Vec::new();
        if let Some(text) = &update.text {
            sets.push(("text", SqlValue::Text(text.clone())));
        }
        if let Some(definition) = &update.definition {
            let value = match definition {
                Some(d) => SqlValue::Text(d.clone()),
                None => SqlValue::Null,
            };
            sets.push(("definition", value));
        }
        if let Some(pos) = &update.part_of_speech {
            sets.push(("part_of_speech", SqlValue::Text(pos.as_str().to_string())));
        }
        if let Some(image) = &update.image {
            sets.push(("image", json_value(image.as_ref())?));
        }
        if let Some(audio) = &update.audio {
            sets.push(("audio", json_value(audio.as_ref())?));
        }
        self.apply_update::<Word>(id, sets)
    }

    fn apply_update<D: Document>(
        &self,
        id: &str,
        sets: Vec<(&str, SqlValue)>,
    ) -> Result<Option<D>, StoreError> {
        if sets.is_empty() {
            return find_by_id(&self.conn, id);
        }

        let assignments = sets
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{column} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let id_idx = sets.len() + 1;
        let sql = format!("UPDATE {} SET {assignments} WHERE id = ?{id_idx}", D::TABLE);

        let mut params: Vec<SqlValue> = sets.into_iter().map(|(_, v)| v).collect();
        params.push(SqlValue::Text(id.to_string()));

        let changed = self.conn.execute(&sql, params_from_iter(params))?;
        if changed == 0 {
            return Ok(None);
        }
        tracing::debug!(id, table = D::TABLE, "updated record");
        find_by_id(&self.conn, id)
    }

    /// Adds `target` to a word's reference list unless already present.
    /// `Ok(None)` when the word does not exist.
    pub fn add_reference(
        &mut self,
        id: &str,
        list: ReferenceList,
        target: &str,
    ) -> Result<Option<Word>, StoreError> {
        self.modify_references(id, list, |word| {
            word.add_reference(list, target).map_err(StoreError::from)
        })
    }

    pub fn remove_reference(
        &mut self,
        id: &str,
        list: ReferenceList,
        target: &str,
    ) -> Result<Option<Word>, StoreError> {
        self.modify_references(id, list, |word| Ok(word.remove_reference(list, target)))
    }

    fn modify_references<F>(
        &mut self,
        id: &str,
        list: ReferenceList,
        apply: F,
    ) -> Result<Option<Word>, StoreError>
    where
        F: FnOnce(&mut Word) -> Result<bool, StoreError>,
    {
        let tx = self.conn.transaction()?;
        let Some(mut word) = find_by_id::<Word>(&tx, id)? else {
            return Ok(None);
        };
        if apply(&mut word)? {
            let sql = format!("UPDATE words SET {} = ?1 WHERE id = ?2", list.column());
            let refs = serde_json::to_string(word.references(list))?;
            tx.execute(&sql, (&refs, id))?;
            tracing::debug!(id, list = list.column(), "updated word references");
        }
        tx.commit()?;
        Ok(Some(word))
    }

    /// Resolves a word's reference lists, preserving list order and skipping
    /// ids that no longer resolve.
    pub fn populate(&self, word: Word) -> Result<PopulatedWord, StoreError> {
        let words = self.find_many::<Word>(&word.words)?;
        let sentences = self.find_many::<Sentence>(&word.sentences)?;
        Ok(PopulatedWord {
            id: word.id,
            text: word.text,
            definition: word.definition,
            image: word.image,
            audio: word.audio,
            part_of_speech: word.part_of_speech,
            words,
            sentences,
        })
    }

    fn find_many<D: Document>(&self, ids: &[String]) -> Result<Vec<D>, StoreError> {
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            match find_by_id::<D>(&self.conn, id)? {
                Some(doc) => docs.push(doc),
                None => tracing::debug!(%id, kind = D::NAME, "dangling reference skipped"),
            }
        }
        Ok(docs)
    }

    pub fn find<D: Document>(&self, id: &str) -> Result<Option<D>, StoreError> {
        find_by_id(&self.conn, id)
    }

    /// One uniformly sampled record, or `None` when the table is empty.
    pub fn sample<D: Document>(&self) -> Result<Option<D>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY random() LIMIT 1",
            D::COLUMNS.join(", "),
            D::TABLE
        );
        let doc = self
            .conn
            .query_row(&sql, [], |row| D::from_row(row, 0))
            .optional()?;
        Ok(doc)
    }

    /// Removes a record and returns it. References to it elsewhere are left
    /// in place.
    pub fn delete<D: Document>(&mut self, id: &str) -> Result<Option<D>, StoreError> {
        let tx = self.conn.transaction()?;
        let Some(doc) = find_by_id::<D>(&tx, id)? else {
            return Ok(None);
        };
        let sql = format!("DELETE FROM {} WHERE id = ?1", D::TABLE);
        tx.execute(&sql, [id])?;
        tx.commit()?;
        tracing::debug!(id, kind = D::NAME, "deleted record");
        Ok(Some(doc))
    }

    pub fn count<D: Document>(&self) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", D::TABLE);
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        u64::try_from(n).map_err(|_| StoreError::InvalidData(format!("negative count {n}")))
    }

    /// Runs a search pipeline: one page of matches plus the total match count.
    pub fn search<D: Document>(
        &self,
        pipeline: &SearchPipeline,
    ) -> Result<SearchPage<D>, StoreError> {
        let compiled = pipeline.compile(D::TABLE, D::COLUMNS, D::SEARCHABLE)?;
        let mut stmt = self.conn.prepare(&compiled.sql)?;
        let mut rows = stmt.query(params_from_iter(compiled.params))?;

        let mut total: i64 = 0;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            total = row.get(0)?;
            // An empty page still yields one row carrying the total.
            let id: Option<String> = row.get(1)?;
            if id.is_some() {
                result.push(D::from_row(row, 1)?);
            }
        }

        let total = u64::try_from(total)
            .map_err(|_| StoreError::InvalidData(format!("negative total {total}")))?;
        Ok(SearchPage { result, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{build_search_pipeline, Projection, SearchMode};
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    fn store() -> DictionaryStore {
        DictionaryStore::open_in_memory().unwrap()
    }

    fn sentence(store: &DictionaryStore, english: &str, paiute: &str) -> Sentence {
        store
            .create_sentence(&NewSentence {
                english: english.into(),
                paiute: paiute.into(),
            })
            .unwrap()
    }

    fn word(store: &DictionaryStore, text: &str) -> Word {
        store
            .create_word(&NewWord {
                text: text.into(),
                part_of_speech: PartOfSpeech::Noun,
                definition: Some(format!("definition of {text}")),
                image: None,
                audio: None,
            })
            .unwrap()
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_and_find_sentence() {
        let store = store();
        let created = sentence(&store, "Hello", "Hello in Paiute");
        let found: Sentence = store.find(&created.id).unwrap().unwrap();
        assert_eq!(found, created);
        assert!(store.find::<Sentence>("missing").unwrap().is_none());
    }

    #[test]
    fn test_open_file_store_persists() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_str().unwrap().to_string();
        let id = {
            let store = DictionaryStore::open(&path).unwrap();
            word(&store, "pia").id
        };
        let reopened = DictionaryStore::open(&path).unwrap();
        let found: Word = reopened.find(&id).unwrap().unwrap();
        assert_eq!(found.text, "pia");
        assert_eq!(reopened.db_path.as_deref(), Some(temp.path()));
    }

    #[test]
    fn test_update_sentence_partial() {
        let store = store();
        let created = sentence(&store, "Hello", "Paiute hello");
        let update = SentenceUpdate {
            paiute: Some("Changed".into()),
            audio: Some(Some(Asset {
                data: "AAAA".into(),
                filename: "a.mp3".into(),
            })),
            ..Default::default()
        };
        let updated = store.update_sentence(&created.id, &update).unwrap().unwrap();
        assert_eq!(updated.english, "Hello");
        assert_eq!(updated.paiute, "Changed");
        assert_eq!(updated.audio.unwrap().filename, "a.mp3");

        let cleared = store
            .update_sentence(
                &created.id,
                &SentenceUpdate {
                    audio: Some(None),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(cleared.audio, None);
    }

    #[test]
    fn test_update_missing_record() {
        let store = store();
        let update = WordUpdate {
            text: Some("x".into()),
            ..Default::default()
        };
        assert!(store.update_word("missing", &update).unwrap().is_none());
        assert!(store
            .update_word("missing", &WordUpdate::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_empty_word_update_returns_record() {
        let store = store();
        let created = word(&store, "pia");
        let same = store
            .update_word(&created.id, &WordUpdate::default())
            .unwrap()
            .unwrap();
        assert_eq!(same, created);
    }

    #[test]
    fn test_references_are_idempotent_and_ordered() {
        let mut store = store();
        let a = word(&store, "a");
        let b = word(&store, "b");
        let c = word(&store, "c");

        store.add_reference(&a.id, ReferenceList::Words, &c.id).unwrap();
        store.add_reference(&a.id, ReferenceList::Words, &b.id).unwrap();
        let w = store
            .add_reference(&a.id, ReferenceList::Words, &c.id)
            .unwrap()
            .unwrap();
        assert_eq!(w.words, vec![c.id.clone(), b.id.clone()]);

        let err = store
            .add_reference(&a.id, ReferenceList::Words, &a.id)
            .unwrap_err();
        assert!(matches!(err, StoreError::Reference(ReferenceError::SelfReference)));

        assert!(store
            .add_reference("missing", ReferenceList::Words, &a.id)
            .unwrap()
            .is_none());

        let w = store
            .remove_reference(&a.id, ReferenceList::Words, &c.id)
            .unwrap()
            .unwrap();
        assert_eq!(w.words, vec![b.id]);
    }

    #[test]
    fn test_populate_skips_dangling() {
        let mut store = store();
        let w = word(&store, "tuhu");
        let s1 = sentence(&store, "one", "sukutsi");
        let s2 = sentence(&store, "two", "waha");
        store.add_reference(&w.id, ReferenceList::Sentences, &s2.id).unwrap();
        store.add_reference(&w.id, ReferenceList::Sentences, &s1.id).unwrap();
        store.delete::<Sentence>(&s2.id).unwrap();

        let w: Word = store.find(&w.id).unwrap().unwrap();
        // Deleting a sentence leaves the reference in place.
        assert_eq!(w.sentences.len(), 2);
        let populated = store.populate(w).unwrap();
        assert_eq!(populated.sentences, vec![s1]);
    }

    #[test]
    fn test_delete_twice() {
        let mut store = store();
        let s = sentence(&store, "a", "b");
        let removed: Sentence = store.delete(&s.id).unwrap().unwrap();
        assert_eq!(removed, s);
        assert!(store.delete::<Sentence>(&s.id).unwrap().is_none());
    }

    #[test]
    fn test_sample() {
        let store = store();
        assert!(store.sample::<Sentence>().unwrap().is_none());
        let s = sentence(&store, "a", "b");
        assert_eq!(store.sample::<Sentence>().unwrap(), Some(s));
    }

    #[test]
    fn test_search_pages_with_total() {
        let store = store();
        for english in ["he", "hello", "the end", "nope", "HE"] {
            sentence(&store, english, "x");
        }

        let pipeline = build_search_pipeline(
            "he",
            SearchMode::Contains,
            &fields(&["english"]),
            2,
            1,
            Projection::all(),
        );
        let page: SearchPage<Sentence> = store.search(&pipeline).unwrap();
        assert_eq!(page.total, 3);
        let texts: Vec<_> = page.result.iter().map(|s| s.english.as_str()).collect();
        assert_eq!(texts, vec!["hello", "the end"]);
    }

    #[test]
    fn test_search_past_end_keeps_total() {
        let store = store();
        sentence(&store, "hello", "x");
        let pipeline = build_search_pipeline(
            "hello",
            SearchMode::Exact,
            &fields(&["english"]),
            10,
            5,
            Projection::all(),
        );
        let page: SearchPage<Sentence> = store.search(&pipeline).unwrap();
        assert_eq!(page.total, 1);
        assert!(page.result.is_empty());
    }

    #[test]
    fn test_search_words_by_part_of_speech() {
        let store = store();
        word(&store, "pia");
        let pipeline = build_search_pipeline(
            "NOUN",
            SearchMode::Exact,
            &fields(&["part_of_speech"]),
            10,
            0,
            Projection::all(),
        );
        let page: SearchPage<Word> = store.search(&pipeline).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(store.count::<Word>().unwrap(), 1);
    }
}
