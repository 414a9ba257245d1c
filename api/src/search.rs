//! Search pipeline construction.
//!
//! [`build_search_pipeline`] turns raw search parameters into a
//! [`SearchPipeline`]: a match stage (OR across fields), a page (skip/limit)
//! and an output projection. The pipeline compiles to one SQL statement that
//! yields the unpaginated match count next to the requested page, so a single
//! round trip answers both.

use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Case-sensitive substring match.
    #[default]
    Contains,
    Exact,
}

impl SearchMode {
    /// `contains` selects substring matching; any other value means exact.
    pub fn parse(mode: Option<&str>) -> Self {
        match mode {
            None | Some("contains") => SearchMode::Contains,
            Some(_) => SearchMode::Exact,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Contains => "contains",
            SearchMode::Exact => "exact",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Unknown search field: {0}")]
    UnknownField(String),
    #[error("No fields to search")]
    NoFields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchStage {
    pub query: String,
    pub mode: SearchMode,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u64,
    pub limit: u64,
}

/// Output field selection. `None` keeps every field; `_id` is always kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Projection {
    fields: Option<Vec<String>>,
}

impl Projection {
    pub fn all() -> Self {
        Projection { fields: None }
    }

    pub fn only<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection {
            fields: Some(fields.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_all(&self) -> bool {
        self.fields.is_none()
    }

    /// Drops every top-level key of an object not named by the projection.
    pub fn apply(&self, document: Value) -> Value {
        let Some(fields) = &self.fields else {
            return document;
        };
        match document {
            Value::Object(object) => {
                let kept: Map<String, Value> = object
                    .into_iter()
                    .filter(|(key, _)| key == "_id" || fields.iter().any(|f| f == key))
                    .collect();
                Value::Object(kept)
            }
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPipeline {
    pub filter: MatchStage,
    pub page: Page,
    pub projection: Projection,
}

/// SQL text plus positional parameters, ready for `rusqlite`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSearch {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

pub fn build_search_pipeline(
    query: &str,
    mode: SearchMode,
    search_fields: &[String],
    limit: u64,
    offset: u64,
    projection: Projection,
) -> SearchPipeline {
    SearchPipeline {
        filter: MatchStage {
            query: query.to_string(),
            mode,
            fields: search_fields.to_vec(),
        },
        page: Page {
            skip: offset,
            limit,
        },
        projection,
    }
}

impl SearchPipeline {
    /// Compiles against `table`, selecting `columns` (the first must be the
    /// id column). Search fields must all be in `searchable`; they are
    /// spliced into the SQL text, the query and page bounds are bound.
    pub fn compile(
        &self,
        table: &str,
        columns: &[&str],
        searchable: &[&str],
    ) -> Result<CompiledSearch, SearchError> {
        if self.filter.fields.is_empty() {
            return Err(SearchError::NoFields);
        }
        if let Some(unknown) = self
            .filter
            .fields
            .iter()
            .find(|field| !searchable.contains(&field.as_str()))
        {
            return Err(SearchError::UnknownField(unknown.clone()));
        }

        let condition = self
            .filter
            .fields
            .iter()
            .map(|field| match self.filter.mode {
                SearchMode::Contains => format!("instr({field}, ?1) > 0"),
                SearchMode::Exact => format!("{field} = ?1"),
            })
            .collect::<Vec<_>>()
            .join(" OR ");

        let inner = columns.join(", ");
        let outer = columns
            .iter()
            .map(|c| format!("page.{c}"))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "WITH matched AS (SELECT seq, {inner} FROM {table} WHERE {condition})
             SELECT (SELECT COUNT(*) FROM matched) AS total, {outer}
             FROM (SELECT 1) AS facet
             LEFT JOIN (SELECT * FROM matched ORDER BY seq LIMIT ?2 OFFSET ?3) AS page ON 1
             ORDER BY page.seq"
        );

        Ok(CompiledSearch {
            sql,
            params: vec![
                SqlValue::Text(self.filter.query.clone()),
                SqlValue::Integer(clamp_i64(self.page.limit)),
                SqlValue::Integer(clamp_i64(self.page.skip)),
            ],
        })
    }
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const COLUMNS: &[&str] = &["id", "english", "paiute"];
    const SEARCHABLE: &[&str] = &["english", "paiute"];

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mode_defaults_to_contains() {
        assert_eq!(SearchMode::parse(None), SearchMode::Contains);
        assert_eq!(SearchMode::parse(Some("contains")), SearchMode::Contains);
        assert_eq!(SearchMode::parse(Some("exact")), SearchMode::Exact);
        assert_eq!(SearchMode::parse(Some("anything")), SearchMode::Exact);
    }

    #[test]
    fn builder_maps_offset_to_skip() {
        let pipeline = build_search_pipeline(
            "he",
            SearchMode::Contains,
            &fields(&["english"]),
            5,
            10,
            Projection::all(),
        );
        assert_eq!(pipeline.page, Page { skip: 10, limit: 5 });
        assert_eq!(pipeline.filter.query, "he");
        assert_eq!(pipeline.filter.fields, vec!["english"]);
    }

    #[test]
    fn contains_compiles_to_instr_with_or() {
        let pipeline = build_search_pipeline(
            "he",
            SearchMode::Contains,
            &fields(&["english", "paiute"]),
            20,
            0,
            Projection::all(),
        );
        let compiled = pipeline.compile("sentences", COLUMNS, SEARCHABLE).unwrap();
        assert!(compiled
            .sql
            .contains("instr(english, ?1) > 0 OR instr(paiute, ?1) > 0"));
        assert!(compiled.sql.contains("LIMIT ?2 OFFSET ?3"));
        assert_eq!(
            compiled.params,
            vec![
                SqlValue::Text("he".into()),
                SqlValue::Integer(20),
                SqlValue::Integer(0)
            ]
        );
    }

    #[test]
    fn exact_compiles_to_equality() {
        let pipeline = build_search_pipeline(
            "Hello",
            SearchMode::Exact,
            &fields(&["paiute"]),
            1,
            0,
            Projection::all(),
        );
        let compiled = pipeline.compile("sentences", COLUMNS, SEARCHABLE).unwrap();
        assert!(compiled.sql.contains("WHERE paiute = ?1)"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let pipeline = build_search_pipeline(
            "x",
            SearchMode::Contains,
            &fields(&["english", "id; DROP TABLE sentences"]),
            1,
            0,
            Projection::all(),
        );
        assert_eq!(
            pipeline.compile("sentences", COLUMNS, SEARCHABLE),
            Err(SearchError::UnknownField("id; DROP TABLE sentences".into()))
        );

        let empty = build_search_pipeline("x", SearchMode::Contains, &[], 1, 0, Projection::all());
        assert_eq!(
            empty.compile("sentences", COLUMNS, SEARCHABLE),
            Err(SearchError::NoFields)
        );
    }

    #[test]
    fn projection_keeps_id_and_named_fields() {
        let doc = json!({"_id": "1", "english": "a", "paiute": "b", "image": null});
        assert_eq!(Projection::all().apply(doc.clone()), doc);
        assert_eq!(
            Projection::only(["paiute", "nonexistent"]).apply(doc),
            json!({"_id": "1", "paiute": "b"})
        );
    }
}
