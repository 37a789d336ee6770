//! Reading node inputs from config and from upstream values.

use anyhow::Result;

use crate::host::types::Context;
use crate::storage::value_to_string;

/// A string config field, if present.
pub fn str_field<'a>(config: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    config.get(field).and_then(|v| v.as_str())
}

/// The node's main text input: the literal `field`, or else the upstream
/// value named by `source_key`. Non-string upstream values are rendered as
/// JSON.
pub fn text_input(
    node: &str,
    field: &str,
    config: &serde_json::Value,
    ctx: &Context,
) -> Result<String> {
    if let Some(literal) = str_field(config, field) {
        return Ok(literal.to_string());
    }
    if let Some(source_key) = str_field(config, "source_key") {
        let val = ctx
            .get(source_key)
            .ok_or_else(|| anyhow::anyhow!("Key '{}' not found in context", source_key))?;
        return Ok(value_to_string(val));
    }
    anyhow::bail!("{} requires either '{}' or 'source_key'", node, field);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_wins_over_source_key() {
        let mut ctx = Context::new();
        ctx.insert("upstream".into(), json!("from context"));
        let config = json!({"text": "literal", "source_key": "upstream"});
        assert_eq!(text_input("n", "text", &config, &ctx).unwrap(), "literal");
    }

    #[test]
    fn test_source_key_lookup() {
        let mut ctx = Context::new();
        ctx.insert("upstream".into(), json!({"steps": 3}));
        let config = json!({"source_key": "upstream"});
        assert_eq!(
            text_input("n", "text", &config, &ctx).unwrap(),
            "{\"steps\":3}"
        );

        let missing = json!({"source_key": "absent"});
        assert!(text_input("n", "text", &missing, &ctx).is_err());
        assert!(text_input("n", "text", &json!({}), &ctx).is_err());
    }
}
