//! Property-based tests for classification, the store, and the citation index
//!
//! These tests verify key invariants hold across generated inputs.

use super::research::{ResearchPayload, ResultEntry};
use super::*;
use crate::a2a::{Part, StreamEvent, TaskUpdate};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn store_with_reply() -> (ConversationStore, String) {
    let mut store = ConversationStore::new();
    store.push_user_message("prompt");
    let id = store.open_agent_message();
    (store, id)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,]{1,24}"
}

fn arb_snippet() -> impl Strategy<Value = Snippet> {
    ("[0-9]{1,2}", arb_text(), arb_text(), arb_text()).prop_map(|(id, prefix, sentence, tail)| Snippet {
        id,
        title: String::new(),
        prefix_sentence: prefix,
        sentence,
        tail_sentence: tail,
    })
}

fn arb_entry() -> impl Strategy<Value = ResultEntry> {
    (arb_text(), proptest::collection::vec(arb_snippet(), 0..4)).prop_map(|(title, match_sentences)| {
        ResultEntry {
            url: format!("http://example.test/{}", title.len()),
            title,
            match_sentences,
        }
    })
}

fn arb_item() -> impl Strategy<Value = ResearchItem> {
    ("[a-z]{3,8}", proptest::collection::vec(arb_entry(), 0..3)).prop_map(|(name, data)| ResearchItem {
        name,
        display: None,
        data: ResearchPayload { data },
    })
}

/// Effects that never end streaming on their own
fn arb_open_effect(message_id: String) -> impl Strategy<Value = Effect> {
    let a = message_id.clone();
    let b = message_id.clone();
    let c = message_id;
    prop_oneof![
        arb_text().prop_map(move |text| Effect::append_thinking(&a, text)),
        arb_text().prop_map(move |text| Effect::append_status(&b, text)),
        (arb_text(), any::<bool>()).prop_map(move |(text, append)| Effect::update_text(&c, text, append)),
    ]
}

fn arb_terminal_effect(message_id: String) -> impl Strategy<Value = Effect> {
    let a = message_id.clone();
    let b = message_id.clone();
    let c = message_id;
    prop_oneof![
        Just(Effect::terminate(&a)),
        Just(Effect::AttachForm {
            message_id: b,
            form: FormSpec::default(),
        }),
        arb_text().prop_map(move |error| Effect::fail(&c, error)),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_thinking_trace_preserves_order(texts in proptest::collection::vec(arb_text(), 0..20)) {
        let (mut store, id) = store_with_reply();

        for text in &texts {
            store.apply_effect(Effect::append_thinking(&id, text.clone()));
        }

        prop_assert_eq!(store.thinking(&id), texts.as_slice());
    }

    #[test]
    fn prop_append_concatenates_replace_overwrites(
        existing in arb_text(),
        fragment in arb_text(),
        append in any::<bool>(),
    ) {
        let (mut store, id) = store_with_reply();
        store.apply_effect(Effect::update_text(&id, existing.clone(), false));

        store.apply_effect(Effect::update_text(&id, fragment.clone(), append));

        let expected = if append { format!("{existing}{fragment}") } else { fragment };
        prop_assert_eq!(&store.message(&id).unwrap().text, &expected);
    }

    #[test]
    fn prop_streaming_never_reopens(
        terminal in arb_terminal_effect("placeholder".to_string()),
        later in proptest::collection::vec(arb_open_effect("placeholder".to_string()), 0..10),
    ) {
        let (mut store, id) = store_with_reply();
        let retarget = |effect: Effect| match effect {
            Effect::AppendThinking { text, .. } => Effect::append_thinking(&id, text),
            Effect::AppendStatus { text, .. } => Effect::append_status(&id, text),
            Effect::UpdateText { text, append, .. } => Effect::update_text(&id, text, append),
            Effect::AttachForm { form, .. } => Effect::AttachForm { message_id: id.clone(), form },
            Effect::Fail { error, .. } => Effect::fail(&id, error),
            Effect::Terminate { .. } => Effect::terminate(&id),
            Effect::RecordResearch { items, .. } => Effect::RecordResearch { message_id: id.clone(), items },
        };

        store.apply_batch(vec![retarget(terminal)]);
        let closed = store.message(&id).unwrap().clone();

        for effect in later {
            store.apply_batch(vec![retarget(effect), Effect::terminate(&id)]);
        }

        let message = store.message(&id).unwrap();
        prop_assert!(!message.is_streaming);
        prop_assert_eq!(message, &closed);
        prop_assert!(store.status(&id).is_empty());
    }

    #[test]
    fn prop_index_is_deterministic(items in proptest::collection::vec(arb_item(), 0..5)) {
        let first = ReferenceIndex::build(&items);
        let second = ReferenceIndex::build(&items);

        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn prop_index_grows_or_later_wins(
        items in proptest::collection::vec(arb_item(), 0..5),
        extra in arb_item(),
    ) {
        let before = ReferenceIndex::build(&items);
        let after = ReferenceIndex::build(items.iter().chain(std::iter::once(&extra)));
        let extra_only = ReferenceIndex::build([&extra]);

        for (id, snippet) in before.iter() {
            let now = after.get(id).unwrap();
            match extra_only.get(id) {
                Some(newer) => prop_assert_eq!(now, newer),
                None => prop_assert_eq!(now, snippet),
            }
        }
        for (id, snippet) in extra_only.iter() {
            prop_assert_eq!(after.get(id), Some(snippet));
        }
    }

    #[test]
    fn prop_classified_artifact_stream_rebuilds_text(
        chunks in proptest::collection::vec(arb_text(), 1..10),
    ) {
        let (mut store, id) = store_with_reply();
        let last = chunks.len() - 1;

        for (i, chunk) in chunks.iter().enumerate() {
            let event = StreamEvent::new(TaskUpdate::artifact(vec![Part::text(chunk.clone())], i > 0, i == last));
            store.apply_batch(classify(&id, &event));
        }

        let message = store.message(&id).unwrap();
        prop_assert_eq!(&message.text, &chunks.concat());
        prop_assert!(!message.is_streaming);
    }
}
