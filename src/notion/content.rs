//! Helpers for reading fields out of Notion objects.

use serde_json::Value;

const UNTITLED: &str = "Untitled";

/// A page icon, normalized to what a UI needs to render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageIcon {
    Emoji(String),
    /// An external or Notion-hosted image.
    Url(String),
}

/// Concatenates the `plain_text` of every element of a rich text array.
///
/// Anything other than an array yields an empty string.
pub fn extract_plain_text(rich_text: &Value) -> String {
    let Some(parts) = rich_text.as_array() else {
        return String::new();
    };
    parts
        .iter()
        .filter_map(|part| part.get("plain_text").and_then(Value::as_str))
        .collect()
}

/// Returns the text of the `title` property in `properties`, or `"Untitled"`.
pub fn page_title(properties: &Value) -> String {
    let title = properties
        .as_object()
        .and_then(|props| {
            props
                .values()
                .find(|p| p.get("type").and_then(Value::as_str) == Some("title"))
        })
        .and_then(|prop| prop.get("title"))
        .map(extract_plain_text)
        .unwrap_or_default();

    if title.is_empty() {
        UNTITLED.to_owned()
    } else {
        title
    }
}

/// Returns the icon of `page`, if it has one of a known type.
pub fn page_icon(page: &Value) -> Option<PageIcon> {
    let icon = page.get("icon")?;
    let text = |pointer: &str| icon.pointer(pointer).and_then(Value::as_str).map(str::to_owned);

    match icon.get("type")?.as_str()? {
        "emoji" => text("/emoji").map(PageIcon::Emoji),
        "external" => text("/external/url").map(PageIcon::Url),
        "file" => text("/file/url").map(PageIcon::Url),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plain_text_joins_segments() {
        let rich = json!([
            { "plain_text": "Cell " },
            { "plain_text": "biology" },
            { "annotations": {} }
        ]);
        assert_eq!(extract_plain_text(&rich), "Cell biology");
        assert_eq!(extract_plain_text(&json!("not an array")), "");
    }

    #[test]
    fn title_is_found_by_property_type() {
        let properties = json!({
            "Tags": { "type": "multi_select", "multi_select": [] },
            "Name": { "type": "title", "title": [{ "plain_text": "Week 3 notes" }] }
        });
        assert_eq!(page_title(&properties), "Week 3 notes");
    }

    #[test]
    fn missing_or_empty_titles_are_untitled() {
        assert_eq!(page_title(&Value::Null), "Untitled");
        assert_eq!(page_title(&json!({ "Name": { "type": "rich_text" } })), "Untitled");
        assert_eq!(page_title(&json!({ "Name": { "type": "title", "title": [] } })), "Untitled");
    }

    #[test]
    fn icons() {
        assert_eq!(
            page_icon(&json!({ "icon": { "type": "emoji", "emoji": "📚" } })),
            Some(PageIcon::Emoji("📚".into()))
        );
        assert_eq!(
            page_icon(&json!({
                "icon": { "type": "external", "external": { "url": "https://x/i.png" } }
            })),
            Some(PageIcon::Url("https://x/i.png".into()))
        );
        assert_eq!(
            page_icon(&json!({
                "icon": { "type": "file", "file": { "url": "https://s3/i.png" } }
            })),
            Some(PageIcon::Url("https://s3/i.png".into()))
        );
        assert_eq!(page_icon(&json!({ "icon": { "type": "custom_emoji" } })), None);
        assert_eq!(page_icon(&json!({ "icon": null })), None);
        assert_eq!(page_icon(&json!({})), None);
    }
}
