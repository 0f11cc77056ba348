//! Integration tests for strict recognition.

use std::collections::HashSet;

use parlance::expand::{expand, SlotReplacements};
use parlance::graph::{compile, IntentGraph};
use parlance::jsgf::parse_sentence;
use parlance::recognize::{recognize, RecognizeOptions, Recognition};
use parlance::template::parse;
use serde_json::json;

fn build(text: &str) -> IntentGraph {
    build_with_slots(text, &SlotReplacements::new())
}

fn build_with_slots(text: &str, replacements: &SlotReplacements) -> IntentGraph {
    let grammar = parse(text).unwrap();
    let expanded = expand(&grammar, replacements).unwrap();
    compile(&expanded).unwrap()
}

fn strict() -> RecognizeOptions<'static> {
    RecognizeOptions {
        fuzzy: false,
        ..RecognizeOptions::default()
    }
}

fn texts(recognitions: &[Recognition]) -> Vec<&str> {
    recognitions.iter().map(|r| r.text.as_str()).collect()
}

#[test]
fn test_single_sentence() {
    let graph = build("[TestIntent]\nthis is a test\n");

    let recognitions = recognize(&graph, "this is a test", &strict());
    assert_eq!(recognitions.len(), 1);
    let recognition = &recognitions[0];
    assert_eq!(recognition.intent.name, "TestIntent");
    assert_eq!(recognition.intent.confidence, 1.0);
    assert_eq!(recognition.text, "this is a test");
    assert_eq!(recognition.raw_text, "this is a test");
    assert_eq!(recognition.tokens, vec![json!("this"), json!("is"), json!("a"), json!("test")]);
    assert_eq!(recognition.raw_tokens, vec!["this", "is", "a", "test"]);

    // Extra token fails
    assert!(recognize(&graph, "this is a bad test", &strict()).is_empty());

    // Missing token fails
    assert!(recognize(&graph, "this is a", &strict()).is_empty());
}

#[test]
fn test_multiple_intents_same_sentence() {
    let graph = build("[TestIntent1]\nthis is a test\n[TestIntent2]\nthis is a test\n");

    let recognitions = recognize(&graph, "this is a test", &strict());
    assert_eq!(recognitions.len(), 2);

    let mut intents: Vec<&str> = recognitions.iter().map(|r| r.intent.name.as_str()).collect();
    intents.sort_unstable();
    assert_eq!(intents, vec!["TestIntent1", "TestIntent2"]);
}

#[test]
fn test_stop_words_retry() {
    let graph = build("[TestIntent]\nthis is a test\n");

    // Failure without stop words
    assert!(recognize(&graph, "this is a abcd test", &strict()).is_empty());

    // Retry pass drops the stop word
    let options = RecognizeOptions {
        fuzzy: false,
        stop_words: HashSet::from(["abcd".to_string()]),
        ..RecognizeOptions::default()
    };
    let recognitions = recognize(&graph, "this is a abcd test", &options);
    assert_eq!(recognitions.len(), 1);
    assert_eq!(recognitions[0].intent.name, "TestIntent");
    assert_eq!(recognitions[0].text, "this is a test");
}

// Scenario: strict matching with a graph-side stop word
#[test]
fn test_stop_word_in_graph() {
    let graph = build("[SetColor]\nset light to (red | green | blue)\n");

    let options = RecognizeOptions {
        fuzzy: false,
        stop_words: HashSet::from(["that".to_string()]),
        ..RecognizeOptions::default()
    };
    let recognitions = recognize(&graph, "set that light to red", &options);
    assert_eq!(recognitions.len(), 1);
    assert_eq!(recognitions[0].intent.name, "SetColor");
}

#[test]
fn test_local_and_remote_rules() {
    let graph = build(
        "[Intent1]\n\
         rule = a test\n\
         this is <rule>\n\
         [Intent2]\n\
         rule = this is\n\
         <rule> <Intent1.rule>\n",
    );

    let recognitions = recognize(&graph, "this is a test", &strict());
    assert_eq!(recognitions.len(), 2);
    for recognition in &recognitions {
        assert_eq!(recognition.intent.confidence, 1.0);
        assert_eq!(recognition.text, "this is a test");
    }

    let mut intents: Vec<&str> = recognitions.iter().map(|r| r.intent.name.as_str()).collect();
    intents.sort_unstable();
    assert_eq!(intents, vec!["Intent1", "Intent2"]);
}

#[test]
fn test_word_converters() {
    let graph = build("[TestIntent]\nthis is a test!upper ten:10!int!square\n");

    let mut extra = parlance::recognize::ConverterTable::new();
    extra.insert("square", |values: &[serde_json::Value], _args: &[String]| {
        values
            .iter()
            .map(|v| {
                let n = v.as_i64().ok_or_else(|| {
                    parlance::error::ParlanceError::recognition("square expects integers")
                })?;
                Ok(serde_json::Value::from(n * n))
            })
            .collect()
    });

    let options = RecognizeOptions {
        fuzzy: false,
        extra_converters: Some(&extra),
        ..RecognizeOptions::default()
    };
    let recognitions = recognize(&graph, "this is a test ten", &options);
    assert_eq!(recognitions.len(), 1);
    let recognition = &recognitions[0];
    assert_eq!(recognition.text, "this is a TEST 100");
    assert_eq!(recognition.raw_text, "this is a test ten");
    assert_eq!(
        recognition.tokens,
        vec![json!("this"), json!("is"), json!("a"), json!("TEST"), json!(100)]
    );
}

#[test]
fn test_converter_args() {
    let graph = build("[TestIntent]\nthis is a test ten:10!int!pow,3\n");

    let mut extra = parlance::recognize::ConverterTable::new();
    extra.insert("pow", |values: &[serde_json::Value], args: &[String]| {
        let exponent: u32 = args.first().and_then(|a| a.parse().ok()).unwrap_or(1);
        values
            .iter()
            .map(|v| {
                let n = v.as_i64().ok_or_else(|| {
                    parlance::error::ParlanceError::recognition("pow expects integers")
                })?;
                Ok(serde_json::Value::from(n.pow(exponent)))
            })
            .collect()
    });

    let options = RecognizeOptions {
        fuzzy: false,
        extra_converters: Some(&extra),
        ..RecognizeOptions::default()
    };
    let recognitions = recognize(&graph, "this is a test ten", &options);
    assert_eq!(recognitions.len(), 1);
    assert_eq!(recognitions[0].text, "this is a test 1000");
    assert_eq!(recognitions[0].tokens.last(), Some(&json!(1000)));
}

#[test]
fn test_sequence_converters() {
    let graph = build("[TestIntent]\nthis (is a test)!upper\n");

    let recognitions = recognize(&graph, "this is a test", &strict());
    assert_eq!(recognitions.len(), 1);
    assert_eq!(recognitions[0].text, "this IS A TEST");
    assert_eq!(recognitions[0].raw_text, "this is a test");
}

#[test]
fn test_converters_in_entities() {
    let graph = build("[TestIntent]\nthis is a test (ten:10!int){number}\n");

    let recognitions = recognize(&graph, "this is a test ten", &strict());
    assert_eq!(recognitions.len(), 1);

    let entity = &recognitions[0].entities[0];
    assert_eq!(entity.entity, "number");
    assert_eq!(entity.value, json!(10));
    assert_eq!(entity.raw_tokens, vec!["ten"]);
}

#[test]
fn test_entity_converter() {
    let graph = build("[TestIntent]\nthis is a test (four: point: two:4.2){number!float}\n");

    let recognitions = recognize(&graph, "this is a test four point two", &strict());
    assert_eq!(recognitions.len(), 1);

    let entity = &recognitions[0].entities[0];
    assert_eq!(entity.entity, "number");
    assert_eq!(entity.value, json!(4.2));
    assert_eq!(entity.raw_value, "four point two");
}

#[test]
fn test_entity_converters_both() {
    let graph = build("[TestIntent]\nthis is a test (four:4 point: two:2){number!floatify}\n");

    let mut extra = parlance::recognize::ConverterTable::new();
    extra.insert("floatify", |values: &[serde_json::Value], _args: &[String]| {
        let joined = values
            .iter()
            .map(parlance::recognize::value_to_string)
            .collect::<Vec<_>>()
            .join(".");
        let number: f64 = joined.parse().map_err(|_| {
            parlance::error::ParlanceError::recognition("floatify expects digits")
        })?;
        Ok(vec![json!(number)])
    });

    let options = RecognizeOptions {
        fuzzy: false,
        extra_converters: Some(&extra),
        ..RecognizeOptions::default()
    };
    let recognitions = recognize(&graph, "this is a test four point two", &options);
    assert_eq!(recognitions.len(), 1);
    assert_eq!(recognitions[0].entities[0].value, json!(4.2));
}

#[test]
fn test_entity_inside_optional() {
    let mut replacements = SlotReplacements::new();
    replacements.insert(
        "audio-book-name".to_string(),
        vec![parse_sentence("the hound of the baskervilles").unwrap()],
    );
    replacements.insert(
        "assistant-zones".to_string(),
        vec![parse_sentence("bedroom").unwrap()],
    );

    let graph = build_with_slots(
        "[PlayBook]\nread me ($audio-book-name){book} in [the] [($assistant-zones){zone}]\n",
        &replacements,
    );

    let recognitions = recognize(
        &graph,
        "read me the hound of the baskervilles in the bedroom",
        &strict(),
    );
    assert_eq!(recognitions.len(), 1);

    let recognition = &recognitions[0];
    let book = recognition
        .entities
        .iter()
        .find(|e| e.entity == "book")
        .unwrap();
    assert_eq!(book.value, json!("the hound of the baskervilles"));

    let zone = recognition
        .entities
        .iter()
        .find(|e| e.entity == "zone")
        .unwrap();
    assert_eq!(zone.value, json!("bedroom"));
}

#[test]
fn test_intent_filter() {
    let graph = build("[TestIntent1]\nthis is a test\n[TestIntent2]\nthis is a test\n");

    let filter = |name: &str| name == "TestIntent1";
    let options = RecognizeOptions {
        fuzzy: false,
        intent_filter: Some(&filter),
        ..RecognizeOptions::default()
    };
    let recognitions = recognize(&graph, "this is a test", &options);
    assert_eq!(texts(&recognitions), vec!["this is a test"]);
    assert_eq!(recognitions[0].intent.name, "TestIntent1");
}

#[test]
fn test_word_transform() {
    let graph = build("[TestIntent]\nTurn On The Lamp\n");

    let lower = |word: &str| word.to_lowercase();
    let options = RecognizeOptions {
        fuzzy: false,
        word_transform: Some(&lower),
        ..RecognizeOptions::default()
    };
    let recognitions = recognize(&graph, "turn on the lamp", &options);
    assert_eq!(recognitions.len(), 1);
}

// Every sampled sentence must strict-match its own intent with confidence 1
#[test]
fn test_sampled_sentences_round_trip() {
    let graph = build(
        "[LightOn]\n\
         turn on [the] (living room lamp | kitchen light){name}\n\
         [SetColor]\n\
         set light to (red | green | blue)\n",
    );

    let sampled = parlance::recognize::sample_by_intent(&graph, None);
    let mut checked = 0;
    for (intent_name, sentences) in &sampled {
        for sentence in sentences {
            let recognitions = recognize(&graph, &sentence.raw_text, &strict());
            assert!(
                recognitions
                    .iter()
                    .any(|r| r.intent.name == *intent_name && r.intent.confidence == 1.0),
                "sampled sentence {:?} did not round-trip",
                sentence.raw_text
            );
            checked += 1;
        }
    }
    // 2 optional x 2 names, plus 3 colors
    assert_eq!(checked, 4 + 3);
}
