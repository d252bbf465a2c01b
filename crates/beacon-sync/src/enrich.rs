//! Enrichment pass: tool-result nesting and image extraction.
//!
//! A pure transform over a full message list, run once per load/finalize.
//! Never run during live streaming — it would discard partial content
//! mid-stream.

use std::collections::HashMap;

use beacon_core::message::{ChatMessage, ContentBlock, Role};
use serde_json::Value;

/// Tool input keys that name the file a result was written to. An image
/// result is indexed under this path so user messages referencing it can
/// have the payload lifted.
const PATH_KEYS: [&str; 2] = ["file_path", "path"];

/// Enrich a full message list:
///
/// 1. Drop messages whose content is entirely system-reserved markup.
/// 2. Map tool-invocation id → result payload in one scan.
/// 3. Attach each result to its invoking `ToolUse` block; drop the
///    now-redundant standalone result blocks.
/// 4. An image result (stringified JSON array whose first element carries
///    the image discriminator) stays a structured object.
/// 5. For user messages whose text references a result file path, lift the
///    matched image payload into `images` (pre-existing images stay
///    ahead), stripping the path substrings from the visible text.
/// 6. Drop messages whose content collapsed to an empty sequence with
///    nothing left to show.
pub fn enrich_messages(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = messages
        .into_iter()
        .filter(|msg| {
            !(!msg.content.is_empty() && msg.content.iter().all(ContentBlock::is_system_markup))
        })
        .collect();

    let results = collect_results(&messages);
    let mut images_by_path: HashMap<String, Vec<Value>> = HashMap::new();

    for msg in &mut messages {
        let mut kept = Vec::with_capacity(msg.content.len());
        for block in msg.content.drain(..) {
            match block {
                ContentBlock::ToolUse {
                    id,
                    name,
                    input,
                    result: existing,
                } => {
                    let result = results
                        .get(&id)
                        .map(|raw| {
                            let parsed = parse_image_payload(raw);
                            if let Some(ref images) = parsed {
                                if let Some(path) = input_path(&input) {
                                    images_by_path
                                        .entry(path)
                                        .or_default()
                                        .extend(image_elements(images));
                                }
                            }
                            parsed.unwrap_or_else(|| raw.clone())
                        })
                        .or(existing);
                    kept.push(ContentBlock::ToolUse {
                        id,
                        name,
                        input,
                        result,
                    });
                }
                ContentBlock::ToolResult { .. } => {}
                text @ ContentBlock::Text { .. } => kept.push(text),
            }
        }
        msg.content = kept;
    }

    if !images_by_path.is_empty() {
        for msg in &mut messages {
            if msg.role == Role::User {
                lift_referenced_images(msg, &images_by_path);
            }
        }
    }

    messages.retain(|msg| !msg.content.is_empty() || !msg.images.is_empty());
    messages
}

/// Scan all messages once, building the invocation-id → result-payload map.
fn collect_results(messages: &[ChatMessage]) -> HashMap<String, Value> {
    let mut results = HashMap::new();
    for msg in messages {
        for block in &msg.content {
            if let ContentBlock::ToolResult {
                tool_use_id,
                content,
            } = block
            {
                // First result for an invocation wins.
                let _ = results
                    .entry(tool_use_id.clone())
                    .or_insert_with(|| content.clone());
            }
        }
    }
    results
}

/// Parse a stringified image payload: a JSON array whose first element has
/// the image discriminator. Returns the structured array so downstream
/// renderers keep the object form.
fn parse_image_payload(raw: &Value) -> Option<Value> {
    let text = raw.as_str()?;
    let parsed: Value = serde_json::from_str(text).ok()?;
    let is_image = parsed
        .as_array()
        .and_then(|items| items.first())
        .and_then(|first| first.get("type"))
        .and_then(Value::as_str)
        == Some("image");
    is_image.then_some(parsed)
}

/// The image-typed elements of a parsed payload array.
fn image_elements(payload: &Value) -> Vec<Value> {
    payload
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("image"))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// The path argument of a tool invocation, if it has one.
fn input_path(input: &Value) -> Option<String> {
    PATH_KEYS
        .iter()
        .find_map(|key| input.get(key).and_then(Value::as_str))
        .map(str::to_owned)
}

/// Lift image payloads referenced by path from a user message's text,
/// stripping the matched path substrings. Multiple matches append in
/// encounter order; pre-existing images stay ahead of lifted ones.
fn lift_referenced_images(msg: &mut ChatMessage, images_by_path: &HashMap<String, Vec<Value>>) {
    let mut lifted = Vec::new();
    for block in &mut msg.content {
        let ContentBlock::Text { text } = block else {
            continue;
        };
        let mut found: Vec<(usize, &String)> = images_by_path
            .keys()
            .filter_map(|path| text.find(path.as_str()).map(|pos| (pos, path)))
            .collect();
        found.sort_by_key(|(pos, _)| *pos);
        for (_, path) in found {
            lifted.extend(images_by_path[path].iter().cloned());
            *text = text.replace(path.as_str(), "");
        }
        *text = text.trim().to_owned();
    }
    msg.content
        .retain(|block| !matches!(block, ContentBlock::Text { text } if text.is_empty()));
    msg.images.extend(lifted);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn assistant_with(content: Vec<ContentBlock>, secs: i64) -> ChatMessage {
        ChatMessage {
            role: Role::Assistant,
            content,
            ..ChatMessage::user(format!("m{secs}"), "", ts(secs))
        }
    }

    fn tool_use(id: &str, input: Value) -> ContentBlock {
        ContentBlock::ToolUse {
            id: id.into(),
            name: "read_file".into(),
            input,
            result: None,
        }
    }

    fn tool_result_carrier(id: &str, tool_use_id: &str, content: Value, secs: i64) -> ChatMessage {
        ChatMessage {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content,
            }],
            ..ChatMessage::user(id, "", ts(secs))
        }
    }

    #[test]
    fn result_nested_under_invocation_and_carrier_dropped() {
        let messages = vec![
            assistant_with(vec![tool_use("t1", json!({}))], 1),
            tool_result_carrier("m2", "t1", json!("file contents"), 2),
        ];
        let enriched = enrich_messages(messages);

        assert_eq!(enriched.len(), 1);
        let ContentBlock::ToolUse { result, .. } = &enriched[0].content[0] else {
            panic!("expected tool use block");
        };
        assert_eq!(result.as_ref().unwrap(), &json!("file contents"));
    }

    #[test]
    fn invocation_without_result_left_unattached() {
        let messages = vec![assistant_with(vec![tool_use("t1", json!({}))], 1)];
        let enriched = enrich_messages(messages);
        let ContentBlock::ToolUse { result, .. } = &enriched[0].content[0] else {
            panic!("expected tool use block");
        };
        assert!(result.is_none());
    }

    #[test]
    fn pure_system_markup_message_dropped() {
        let markup = ChatMessage::user(
            "m1",
            "<command-name>/clear</command-name>",
            ts(1),
        );
        let keep = ChatMessage::user("m2", "real text", ts(2));
        let enriched = enrich_messages(vec![markup, keep]);
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].id, "m2");
    }

    #[test]
    fn message_with_one_non_system_block_kept_in_full() {
        let mut msg = ChatMessage::user("m1", "<system-reminder>x</system-reminder>", ts(1));
        msg.content.push(ContentBlock::text("visible"));
        let enriched = enrich_messages(vec![msg]);
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].content.len(), 2, "kept in full, not stripped");
    }

    #[test]
    fn image_result_stays_structured() {
        let payload = json!([{"type": "image", "source": {"data": "abc", "mediaType": "image/png"}}]);
        let messages = vec![
            assistant_with(vec![tool_use("t1", json!({}))], 1),
            tool_result_carrier("m2", "t1", json!(payload.to_string()), 2),
        ];
        let enriched = enrich_messages(messages);

        let ContentBlock::ToolUse { result, .. } = &enriched[0].content[0] else {
            panic!("expected tool use block");
        };
        // Structured array, not the original string.
        assert_eq!(result.as_ref().unwrap(), &payload);
    }

    #[test]
    fn non_image_json_string_result_not_parsed() {
        let messages = vec![
            assistant_with(vec![tool_use("t1", json!({}))], 1),
            tool_result_carrier("m2", "t1", json!("[{\"type\":\"text\"}]"), 2),
        ];
        let enriched = enrich_messages(messages);
        let ContentBlock::ToolUse { result, .. } = &enriched[0].content[0] else {
            panic!("expected tool use block");
        };
        // Stays the raw string: only image payloads keep the parsed form.
        assert_eq!(result.as_ref().unwrap(), &json!("[{\"type\":\"text\"}]"));
    }

    #[test]
    fn user_path_reference_lifts_image_and_strips_path() {
        let path = "/tmp/captures/shot-1.png";
        let payload = json!([{"type": "image", "source": {"data": "abc"}}]);
        let messages = vec![
            ChatMessage::user("u1", format!("look at {path} please"), ts(1)),
            assistant_with(vec![tool_use("t1", json!({"file_path": path}))], 2),
            tool_result_carrier("m3", "t1", json!(payload.to_string()), 3),
        ];
        let enriched = enrich_messages(messages);

        let user = enriched.iter().find(|m| m.id == "u1").unwrap();
        assert_eq!(user.images.len(), 1);
        assert_eq!(user.images[0]["type"], "image");
        let text = user.visible_text();
        assert!(!text.contains(path));
        assert!(text.contains("look at"));
    }

    #[test]
    fn preexisting_images_stay_ahead_of_lifted_ones() {
        let path = "/tmp/out.png";
        let payload = json!([{"type": "image", "source": {"data": "new"}}]);
        let mut user = ChatMessage::user("u1", path, ts(1));
        user.images.push(json!({"type": "image", "source": {"data": "old"}}));
        let messages = vec![
            user,
            assistant_with(vec![tool_use("t1", json!({"path": path}))], 2),
            tool_result_carrier("m3", "t1", json!(payload.to_string()), 3),
        ];
        let enriched = enrich_messages(messages);

        let user = enriched.iter().find(|m| m.id == "u1").unwrap();
        assert_eq!(user.images.len(), 2);
        assert_eq!(user.images[0]["source"]["data"], "old");
        assert_eq!(user.images[1]["source"]["data"], "new");
    }

    #[test]
    fn path_only_message_kept_for_its_images() {
        // The text collapses to empty after stripping, but the message now
        // carries images and must not be dropped.
        let path = "/tmp/solo.png";
        let payload = json!([{"type": "image", "source": {"data": "abc"}}]);
        let messages = vec![
            ChatMessage::user("u1", path, ts(1)),
            assistant_with(vec![tool_use("t1", json!({"file_path": path}))], 2),
            tool_result_carrier("m3", "t1", json!(payload.to_string()), 3),
        ];
        let enriched = enrich_messages(messages);

        let user = enriched.iter().find(|m| m.id == "u1").unwrap();
        assert!(user.content.is_empty());
        assert_eq!(user.images.len(), 1);
    }

    #[test]
    fn multiple_path_matches_append_in_encounter_order() {
        let a = "/tmp/a.png";
        let b = "/tmp/b.png";
        let pa = json!([{"type": "image", "source": {"data": "a"}}]);
        let pb = json!([{"type": "image", "source": {"data": "b"}}]);
        let messages = vec![
            ChatMessage::user("u1", format!("second {b} then first {a}"), ts(1)),
            assistant_with(
                vec![
                    tool_use("t1", json!({"file_path": a})),
                    tool_use("t2", json!({"file_path": b})),
                ],
                2,
            ),
            tool_result_carrier("m3", "t1", json!(pa.to_string()), 3),
            tool_result_carrier("m4", "t2", json!(pb.to_string()), 4),
        ];
        let enriched = enrich_messages(messages);

        let user = enriched.iter().find(|m| m.id == "u1").unwrap();
        let order: Vec<&str> = user
            .images
            .iter()
            .map(|img| img["source"]["data"].as_str().unwrap())
            .collect();
        assert_eq!(order, vec!["b", "a"], "encounter order in the text");
    }

    #[test]
    fn empty_message_after_enrichment_dropped() {
        // A carrier whose only block was a tool result vanishes entirely.
        let messages = vec![
            assistant_with(vec![tool_use("t1", json!({}))], 1),
            tool_result_carrier("m2", "t1", json!("out"), 2),
        ];
        let enriched = enrich_messages(messages);
        assert!(enriched.iter().all(|m| m.id != "m2"));
    }

    #[test]
    fn first_result_wins_for_duplicate_tool_use_id() {
        let messages = vec![
            assistant_with(vec![tool_use("t1", json!({}))], 1),
            tool_result_carrier("m2", "t1", json!("first"), 2),
            tool_result_carrier("m3", "t1", json!("second"), 3),
        ];
        let enriched = enrich_messages(messages);
        let ContentBlock::ToolUse { result, .. } = &enriched[0].content[0] else {
            panic!("expected tool use block");
        };
        assert_eq!(result.as_ref().unwrap(), &json!("first"));
    }

    #[test]
    fn enrichment_is_idempotent_on_enriched_input() {
        let messages = vec![
            assistant_with(vec![tool_use("t1", json!({}))], 1),
            tool_result_carrier("m2", "t1", json!("out"), 2),
        ];
        let once = enrich_messages(messages);
        let twice = enrich_messages(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn plain_conversation_untouched() {
        let messages = vec![
            ChatMessage::user("u1", "question", ts(1)),
            assistant_with(vec![ContentBlock::text("answer")], 2),
        ];
        let enriched = enrich_messages(messages.clone());
        assert_eq!(enriched, messages);
    }
}
