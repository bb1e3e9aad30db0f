// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Property tests for segmented delivery split points

use proptest::prelude::*;

use chatbridge::bridge::delivery::{
    find_split_point, open_tag_start, segment_length, stream_content,
};
use chatbridge::bridge::state::{SessionSeed, SessionState};
use chatbridge::bridge::{SessionKey, StreamSettings};
use chatbridge::config::StreamModeSetting;
use chatbridge::gateway::{ChannelTarget, MockGateway};

/// Prose with sentence ends, paragraph breaks, CJK punctuation and tag
/// fragments mixed in.
fn prose() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[a-zA-Z]{1,8}",
            Just(" ".to_string()),
            Just(". ".to_string()),
            Just("! ".to_string()),
            Just("\n\n".to_string()),
            Just("好。".to_string()),
            Just("<img src='a.png'".to_string()),
            Just("/>".to_string()),
            Just("<audio".to_string()),
        ],
        0..40,
    )
    .prop_map(|pieces| pieces.concat())
}

fn without_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

proptest! {
    #[test]
    fn split_point_is_a_char_boundary_within_bounds(text in prose()) {
        if let Some(split) = find_split_point(&text) {
            prop_assert!(split <= text.len());
            prop_assert!(text.is_char_boundary(split));
        }
    }

    #[test]
    fn split_point_never_moves_back_as_text_grows(head in prose(), tail in prose()) {
        let grown = format!("{head}{tail}");
        if let Some(split) = find_split_point(&head) {
            let grown_split = find_split_point(&grown);
            prop_assert!(grown_split.is_some_and(|g| g >= split));
        }
    }

    #[test]
    fn segment_never_ends_inside_a_media_tag(text in prose()) {
        let take = segment_length(&text);
        prop_assert!(take <= text.len());
        prop_assert!(text.is_char_boundary(take));
        prop_assert_eq!(open_tag_start(&text[..take]), None);
    }

    #[test]
    fn segmented_stream_delivers_every_character_once(text in prose()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let gateway = MockGateway::new();
        let settings = StreamSettings {
            enabled: true,
            mode: StreamModeSetting::Segment,
            ..StreamSettings::default()
        };
        let mut state = SessionState::new(SessionSeed {
            key: SessionKey::new("test", "u1", "/w"),
            agent_session_id: "ses_1".to_string(),
            target: ChannelTarget::new("test", "c1"),
        });

        runtime.block_on(async {
            let boundaries: Vec<usize> = text
                .char_indices()
                .map(|(idx, _)| idx)
                .chain(std::iter::once(text.len()))
                .step_by(3)
                .collect();
            for end in boundaries {
                stream_content(&mut state, &gateway, &settings, "msg_1", &text[..end], false)
                    .await
                    .unwrap();
            }
            stream_content(&mut state, &gateway, &settings, "msg_1", &text, true)
                .await
                .unwrap();
        });

        let sent = gateway.sent_contents();
        prop_assert_eq!(without_whitespace(&sent.concat()), without_whitespace(&text));
        prop_assert!(sent.iter().all(|chunk| !chunk.is_empty()));
    }
}
