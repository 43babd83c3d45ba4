//! Research items returned by tool calls, and the citation index built over them

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// One tool-result entry, keyed by its source label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Status line the agent wants shown for this result
    #[serde(
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub display: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: ResearchPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<ResultEntry>,
}

/// A retrieved document and the sentences that matched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub match_sentences: Vec<Snippet>,
}

/// Quoted evidence addressable by a citation marker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    /// Filled from the owning [`ResultEntry`] when indexed
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prefix_sentence: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sentence: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tail_sentence: String,
}

/// Strings arrive from agents as strings, numbers, or null. Numbers keep their
/// JSON text (`1` becomes `"1"`); null is empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_string(deserializer)?.unwrap_or_default())
}

pub(crate) fn lenient_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Citation id to snippet lookup.
///
/// Always rebuilt from the full research collection, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReferenceIndex {
    entries: BTreeMap<String, Snippet>,
}

/// A citation marker found in reply text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub id: String,
    pub snippet: Option<Snippet>,
}

impl ReferenceIndex {
    /// Walk every item in order; a later snippet with the same id wins.
    pub fn build<'a>(items: impl IntoIterator<Item = &'a ResearchItem>) -> Self {
        let mut entries = BTreeMap::new();
        for item in items {
            for entry in &item.data.data {
                for snippet in entry.match_sentences.iter().filter(|s| !s.id.is_empty()) {
                    let mut stamped = snippet.clone();
                    stamped.title.clone_from(&entry.title);
                    entries.insert(stamped.id.clone(), stamped);
                }
            }
        }
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&Snippet> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Snippet)> {
        self.entries.iter()
    }

    /// Every `[^id]` marker in `text`, in order of appearance
    pub fn resolve_markers(&self, text: &str) -> Vec<Citation> {
        marker_pattern()
            .captures_iter(text)
            .map(|caps| {
                let id = caps[1].to_string();
                let snippet = self.get(&id).cloned();
                Citation { id, snippet }
            })
            .collect()
    }
}

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[\^([^\]]+)\]").expect("citation marker pattern is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(name: &str, title: &str, snippets: &[(&str, &str)]) -> ResearchItem {
        ResearchItem {
            name: name.to_string(),
            display: None,
            data: ResearchPayload {
                data: vec![ResultEntry {
                    title: title.to_string(),
                    url: format!("http://{name}"),
                    match_sentences: snippets
                        .iter()
                        .map(|(id, sentence)| Snippet {
                            id: (*id).to_string(),
                            sentence: (*sentence).to_string(),
                            ..Snippet::default()
                        })
                        .collect(),
                }],
            },
        }
    }

    #[test]
    fn test_title_is_stamped_from_entry() {
        let raw: ResearchItem = serde_json::from_value(json!({
            "name": "arxiv",
            "data": { "data": [{
                "title": "Paper A",
                "url": "http://x",
                "match_sentences": [
                    { "id": "1", "sentence": "S", "prefix_sentence": "P", "tail_sentence": "T" }
                ]
            }]}
        }))
        .unwrap();

        let index = ReferenceIndex::build([&raw]);

        assert_eq!(
            index.get("1"),
            Some(&Snippet {
                id: "1".to_string(),
                title: "Paper A".to_string(),
                prefix_sentence: "P".to_string(),
                sentence: "S".to_string(),
                tail_sentence: "T".to_string(),
            })
        );
    }

    #[test]
    fn test_empty_collection_gives_empty_index() {
        let index = ReferenceIndex::build(std::iter::empty::<&ResearchItem>());
        assert!(index.is_empty());
    }

    #[test]
    fn test_later_snippet_wins_on_collision() {
        let first = item("a", "First", &[("7", "old")]);
        let second = item("b", "Second", &[("7", "new")]);

        let index = ReferenceIndex::build([&first, &second]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("7").unwrap().sentence, "new");
        assert_eq!(index.get("7").unwrap().title, "Second");
    }

    #[test]
    fn test_resolve_markers_in_order() {
        let index = ReferenceIndex::build([&item("a", "Doc", &[("2", "two")])]);

        let citations = index.resolve_markers("see [^2] and [^missing], again [^2].");

        let ids: Vec<_> = citations.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "missing", "2"]);
        assert!(citations[0].snippet.is_some());
        assert!(citations[1].snippet.is_none());
    }

    #[test]
    fn test_missing_nested_fields_default() {
        let raw: ResearchItem = serde_json::from_value(json!({ "name": "empty", "display": "0 hits" })).unwrap();
        assert!(raw.data.data.is_empty());
        assert_eq!(raw.display.as_deref(), Some("0 hits"));
    }

    #[test]
    fn test_numeric_ids_and_nulls_are_tolerated() {
        let raw: ResearchItem = serde_json::from_value(json!({
            "name": null,
            "display": 3,
            "data": { "data": [{
                "title": null,
                "url": "http://x",
                "match_sentences": [{ "id": 1, "sentence": "S", "tail_sentence": null }]
            }, {
                "title": "No matches",
                "match_sentences": null
            }]}
        }))
        .unwrap();

        assert_eq!(raw.name, "");
        assert_eq!(raw.display.as_deref(), Some("3"));
        assert!(raw.data.data[1].match_sentences.is_empty());

        let index = ReferenceIndex::build([&raw]);
        let snippet = index.get("1").unwrap();
        assert_eq!(snippet.sentence, "S");
        assert_eq!(snippet.title, "");
        assert_eq!(snippet.tail_sentence, "");
    }
}
