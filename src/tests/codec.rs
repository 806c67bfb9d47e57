use crate::codec::{decode, encode, FormatError};
use crate::eid::Eid;
use crate::entries::{self, Entry};

fn sample_entry() -> Entry {
    let now = entries::now();
    Entry {
        id: Eid::new(),
        title: "Grocery list".to_string(),
        content: "- apples\n- rye bread\n\n- oat milk".to_string(),
        created_at: now,
        updated_at: now,
        folder_id: None,
    }
}

#[test]
fn round_trip_preserves_entry() {
    let entry = sample_entry();
    let decoded = decode(&entry.id, encode(&entry).as_bytes()).unwrap();
    assert_eq!(decoded, entry);
}

#[test]
fn round_trip_preserves_folder_reference() {
    let mut entry = sample_entry();
    entry.folder_id = Some(Eid::new());

    let decoded = decode(&entry.id, encode(&entry).as_bytes()).unwrap();
    assert_eq!(decoded, entry);
}

#[test]
fn round_trip_preserves_empty_body() {
    let mut entry = sample_entry();
    entry.content = String::new();

    let decoded = decode(&entry.id, encode(&entry).as_bytes()).unwrap();
    assert_eq!(decoded, entry);
}

#[test]
fn round_trip_preserves_multiline_title() {
    let mut entry = sample_entry();
    entry.title = "first line\nsecond line".to_string();

    let decoded = decode(&entry.id, encode(&entry).as_bytes()).unwrap();
    assert_eq!(decoded.title, "first line\nsecond line");
    assert_eq!(decoded, entry);
}

#[test]
fn round_trip_preserves_literal_escape_sequences_in_title() {
    let mut entry = sample_entry();
    entry.title = r"already\nescaped \\ backslash".to_string();

    let decoded = decode(&entry.id, encode(&entry).as_bytes()).unwrap();
    assert_eq!(decoded, entry);
}

#[test]
fn multiline_title_cannot_forge_header_fields() {
    let mut entry = sample_entry();
    entry.title = "innocent\ncreatedAt: 1999-01-01T00:00:00.000Z".to_string();

    let decoded = decode(&entry.id, encode(&entry).as_bytes()).unwrap();
    assert_eq!(decoded.created_at, entry.created_at);
    assert_eq!(decoded.title, entry.title);
}

#[test]
fn round_trip_preserves_multibyte_body() {
    let mut entry = sample_entry();
    entry.title = "Überschrift".to_string();
    entry.content = "日本語のメモ\n\nлорем ипсум".to_string();

    let decoded = decode(&entry.id, encode(&entry).as_bytes()).unwrap();
    assert_eq!(decoded, entry);
}

#[test]
fn plain_body_takes_title_from_heading() {
    let id = Eid::new();
    let decoded = decode(&id, b"# My heading\n\nsome text").unwrap();

    assert_eq!(decoded.title, "My heading");
    assert_eq!(decoded.content, "# My heading\n\nsome text");
    assert_eq!(decoded.folder_id, None);
}

#[test]
fn plain_body_without_heading_falls_back_to_id() {
    let id = Eid::from("01ARZ3NDEKTSV4RRFFQ69G5FAV");
    let decoded = decode(&id, b"just some text").unwrap();

    assert_eq!(decoded.title, "01ARZ3NDEKTSV4RRFFQ69G5FAV");
}

#[test]
fn missing_metadata_fields_are_tolerated() {
    let id = Eid::new();
    let payload = "---\ntitle: Only a title\n---\n\nbody";
    let decoded = decode(&id, payload.as_bytes()).unwrap();

    assert_eq!(decoded.title, "Only a title");
    assert_eq!(decoded.content, "body");
}

#[test]
fn unknown_metadata_keys_are_ignored() {
    let id = Eid::new();
    let payload = "---\ntitle: T\ncustomField: whatever\n---\n\nbody";
    let decoded = decode(&id, payload.as_bytes()).unwrap();

    assert_eq!(decoded.title, "T");
    assert_eq!(decoded.content, "body");
}

#[test]
fn unterminated_metadata_block_is_an_error() {
    let id = Eid::new();
    let result = decode(&id, b"---\ntitle: never closed\n\nbody");
    assert!(matches!(result, Err(FormatError::UnterminatedHeader)));
}

#[test]
fn invalid_utf8_is_an_error() {
    let id = Eid::new();
    let result = decode(&id, &[0x2d, 0x2d, 0x2d, 0x0a, 0xff, 0xfe]);
    assert!(matches!(result, Err(FormatError::InvalidUtf8(_))));
}

#[test]
fn timestamps_survive_with_millisecond_precision() {
    let entry = sample_entry();
    let decoded = decode(&entry.id, encode(&entry).as_bytes()).unwrap();

    assert_eq!(decoded.created_at, entry.created_at);
    assert_eq!(decoded.updated_at, entry.updated_at);
}
