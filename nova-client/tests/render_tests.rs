//! Behaviour of the incremental renderer

use bytes::Bytes;
use futures::stream;
use nova_client::{IncrementalRenderer, RenderError};
use nova_core::protocol::StreamMode;
use proptest::prelude::*;
use std::sync::atomic::Ordering;
use std::time::Duration;
use test_case::test_case;

fn chunks(parts: &[&[u8]]) -> impl futures::Stream<Item = Result<Bytes, String>> {
    stream::iter(
        parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p)))
            .collect::<Vec<_>>(),
    )
}

fn renderer(mode: StreamMode) -> IncrementalRenderer {
    IncrementalRenderer::new(mode).with_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_word_mode_reveals_whole_words() {
    let mut updates = Vec::new();
    let rendered = renderer(StreamMode::Word)
        .render(chunks(&[b"hel", b"lo wor", b"ld"]), |text| {
            updates.push(text.to_string())
        })
        .await
        .unwrap();

    assert_eq!(rendered.display, "hello world");
    assert!(!rendered.cancelled);
    assert_eq!(updates, vec!["hello", "hello ", "hello world"]);

    // Some intermediate update is a strict prefix ending at a word boundary
    let final_text = &rendered.display;
    assert!(updates.iter().any(|u| {
        u.len() < final_text.len()
            && final_text.starts_with(u.as_str())
            && final_text[u.len()..].starts_with(char::is_whitespace)
    }));
}

#[tokio::test]
async fn test_chunk_mode_appends_each_chunk() {
    let mut updates = Vec::new();
    let rendered = renderer(StreamMode::Chunk)
        .render(chunks(&[b"He", b"llo"]), |text| updates.push(text.to_string()))
        .await
        .unwrap();

    assert_eq!(rendered.display, "Hello");
    assert_eq!(updates, vec!["He", "Hello"]);
}

#[tokio::test]
async fn test_character_mode_one_update_per_char() {
    let mut updates = Vec::new();
    renderer(StreamMode::Character)
        .render(chunks(&[b"abc"]), |text| updates.push(text.to_string()))
        .await
        .unwrap();

    assert_eq!(updates, vec!["a", "ab", "abc"]);
}

#[tokio::test]
async fn test_split_multibyte_character_is_reassembled() {
    let text = "héllo";
    let bytes = text.as_bytes();
    // 'é' is two bytes starting at index 1
    let mut updates = Vec::new();
    let rendered = renderer(StreamMode::Character)
        .render(chunks(&[&bytes[..2], &bytes[2..]]), |t| updates.push(t.to_string()))
        .await
        .unwrap();

    assert_eq!(rendered.display, text);
    assert_eq!(updates.len(), 5);
    assert!(updates.iter().all(|u| !u.contains('\u{FFFD}')));
}

#[tokio::test]
async fn test_cancel_before_read_emits_nothing() {
    let renderer = renderer(StreamMode::Word);
    renderer.cancel_handle().store(true, Ordering::SeqCst);

    let mut updates = 0;
    let rendered = renderer
        .render(chunks(&[b"never shown"]), |_| updates += 1)
        .await
        .unwrap();

    assert_eq!(updates, 0);
    assert!(rendered.cancelled);
    assert_eq!(rendered.display, "");
}

#[tokio::test]
async fn test_cancel_mid_stream_keeps_partial_text() {
    let renderer = renderer(StreamMode::Word);
    let cancel = renderer.cancel_handle();

    let mut updates = Vec::new();
    let rendered = renderer
        .render(chunks(&[b"one two ", b"three four"]), |text| {
            updates.push(text.to_string());
            if text == "one two" {
                cancel.store(true, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();

    assert!(rendered.cancelled);
    assert_eq!(rendered.display, "one two");
    assert_eq!(updates.last().map(String::as_str), Some("one two"));
}

#[tokio::test]
async fn test_stream_error_discards_partial_text() {
    let items: Vec<Result<Bytes, String>> =
        vec![Ok(Bytes::from_static(b"partial")), Err("connection reset".to_string())];

    let result = renderer(StreamMode::Chunk)
        .render(stream::iter(items), |_| {})
        .await;

    match result {
        Err(RenderError::Stream(message)) => assert!(message.contains("connection reset")),
        other => panic!("expected a stream error, got {:?}", other),
    }
}

#[test_case(StreamMode::Chunk ; "chunk")]
#[test_case(StreamMode::Word ; "word")]
#[test_case(StreamMode::Character ; "character")]
#[tokio::test]
async fn test_every_mode_ends_with_full_text(mode: StreamMode) {
    let rendered = renderer(mode)
        .render(chunks(&[b"Hi ", b"there,\n", b"  friend!"]), |_| {})
        .await
        .unwrap();

    assert_eq!(rendered.display, "Hi there,\n  friend!");
    assert_eq!(rendered.raw, rendered.display);
}

#[tokio::test]
async fn test_word_delay_is_applied_after_words() {
    let start = tokio::time::Instant::now();
    IncrementalRenderer::new(StreamMode::Word)
        .with_delay(Duration::from_millis(20))
        .render(chunks(&[b"a b c"]), |_| {})
        .await
        .unwrap();

    // Three words, two spaces: only the words pause
    assert!(start.elapsed() >= Duration::from_millis(60));
}

proptest! {
    #[test]
    fn prop_display_matches_input_for_any_chunking(
        text in "\\PC{0,40}",
        cuts in proptest::collection::vec(0usize..64, 0..6),
        mode_index in 0usize..3,
    ) {
        let mode = [StreamMode::Chunk, StreamMode::Word, StreamMode::Character][mode_index];
        let bytes = text.as_bytes();
        let mut points: Vec<usize> = cuts.into_iter().map(|c| c.min(bytes.len())).collect();
        points.push(0);
        points.push(bytes.len());
        points.sort_unstable();
        points.dedup();

        let parts: Vec<Result<Bytes, String>> = points
            .windows(2)
            .map(|w| Ok(Bytes::copy_from_slice(&bytes[w[0]..w[1]])))
            .collect();

        let rendered =
            tokio_test::block_on(renderer(mode).render(stream::iter(parts), |_| {})).unwrap();

        prop_assert_eq!(rendered.display, text);
    }
}
