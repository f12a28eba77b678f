//! Frame boundary coverage: split byte streams must decode identically to
//! whole ones.

use bytes::BytesMut;
use htsp::{FrameAssembler, FrameCodec, Message};
use proptest::prelude::*;
use rstest::rstest;
use tokio_util::codec::Encoder;

fn fixture_messages() -> Vec<Message> {
    vec![
        Message::request("hello").with("htspversion", 34_i64),
        Message::request("channelAdd")
            .with("channelId", 7_i64)
            .with("channelName", "BBC One"),
        Message::new().with("seq", 3_i64).with("success", 1_i64),
    ]
}

fn stream_of(messages: &[Message]) -> Vec<u8> {
    let mut codec = FrameCodec::default();
    let mut wire = BytesMut::new();
    for msg in messages {
        codec.encode(msg.clone(), &mut wire).expect("encode");
    }
    wire.to_vec()
}

fn decode_in_chunks(stream: &[u8], chunk_len: usize) -> Vec<Message> {
    let mut assembler = FrameAssembler::default();
    let mut out = Vec::new();
    for chunk in stream.chunks(chunk_len.max(1)) {
        assembler.extend(chunk);
        while let Some(msg) = assembler.next_message().expect("decode") {
            out.push(msg);
        }
    }
    assert_eq!(assembler.buffered(), 0, "no residue after complete stream");
    out
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(5)]
#[case(usize::MAX)]
fn split_streams_decode_like_whole_streams(#[case] chunk_len: usize) {
    let messages = fixture_messages();
    let stream = stream_of(&messages);
    assert_eq!(decode_in_chunks(&stream, chunk_len), messages);
}

#[test]
fn single_byte_feed_holds_partial_frames() {
    let messages = fixture_messages();
    let stream = stream_of(&messages);
    let mut assembler = FrameAssembler::default();
    let mut decoded = 0;
    for &byte in &stream {
        assembler.extend(&[byte]);
        while assembler.next_message().expect("decode").is_some() {
            decoded += 1;
        }
    }
    assert_eq!(decoded, messages.len());
}

proptest! {
    #[test]
    fn any_split_offset_preserves_the_message_sequence(chunk_len in 1_usize..64) {
        let messages = fixture_messages();
        let stream = stream_of(&messages);
        prop_assert_eq!(decode_in_chunks(&stream, chunk_len), messages);
    }
}
