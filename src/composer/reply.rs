use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneActionReply {
    pub scene: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Error)]
pub enum ReplyParseError {
    #[error("structured reply is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("structured reply is null")]
    Null,
}

// A key only counts when it carries a non-empty string.
fn present_text(object: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

// Valid JSON that is not an object (array, number, string) yields an empty
// reply rather than an error, so callers leave their fields untouched.
pub fn parse_scene_action(raw: &str) -> Result<SceneActionReply, ReplyParseError> {
    let value: Value = serde_json::from_str(raw.trim())?;
    match value {
        Value::Object(object) => Ok(SceneActionReply {
            scene: present_text(&object, "scene"),
            action: present_text(&object, "action"),
        }),
        Value::Null => Err(ReplyParseError::Null),
        _ => Ok(SceneActionReply::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_keys() {
        let reply = parse_scene_action(r#"{"scene":"neon rain","action":"samurai draws"}"#).unwrap();
        assert_eq!(reply.scene.as_deref(), Some("neon rain"));
        assert_eq!(reply.action.as_deref(), Some("samurai draws"));
    }

    #[test]
    fn missing_or_empty_keys_are_absent() {
        let reply = parse_scene_action(r#"{"scene":"fog","action":""}"#).unwrap();
        assert_eq!(reply.scene.as_deref(), Some("fog"));
        assert_eq!(reply.action, None);

        let reply = parse_scene_action(r#"{"action":"runs","extra":1}"#).unwrap();
        assert_eq!(reply.scene, None);
        assert_eq!(reply.action.as_deref(), Some("runs"));
    }

    #[test]
    fn non_string_values_are_ignored() {
        let reply = parse_scene_action(r#"{"scene":42,"action":null}"#).unwrap();
        assert_eq!(reply, SceneActionReply::default());
    }

    #[test]
    fn valid_non_object_json_is_an_empty_reply() {
        let reply = parse_scene_action(r#"["scene","action"]"#).unwrap();
        assert_eq!(reply, SceneActionReply::default());
    }

    #[test]
    fn prose_and_null_are_errors() {
        assert!(matches!(
            parse_scene_action("A moody alley at night"),
            Err(ReplyParseError::InvalidJson(_))
        ));
        assert!(matches!(parse_scene_action("null"), Err(ReplyParseError::Null)));
    }
}
