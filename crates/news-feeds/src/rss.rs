use serde::{Deserialize, Serialize};

/// One headline pulled out of an RSS feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub pub_date: String,
    /// Feed name, e.g. "CoinDesk".
    pub source: String,
    /// "live" or "cache", filled in by the fetch layer.
    pub fetch_source: String,
}

/// Extract `<item>` entries from an RSS 2.0 document by scanning for the
/// item blocks. The crypto feeds this crate reads emit flat, attribute-less
/// tags, so a full XML parser is not needed. Items missing a title or link
/// are skipped, and a truncated document simply yields fewer items.
pub fn parse_items(xml: &str, source: &str) -> Vec<NewsItem> {
    let mut items = Vec::new();
    let mut rest = xml;

    while let Some(start) = rest.find("<item>") {
        let body_start = start + "<item>".len();
        let Some(end) = rest[body_start..].find("</item>") else {
            break;
        };
        let block = &rest[body_start..body_start + end];
        rest = &rest[body_start + end + "</item>".len()..];

        let title = tag_text(block, "title").unwrap_or_default();
        let link = tag_text(block, "link").unwrap_or_default();
        if title.is_empty() || link.is_empty() {
            continue;
        }
        let pub_date = tag_text(block, "pubDate").unwrap_or_default();

        items.push(NewsItem {
            title,
            link,
            pub_date,
            source: source.to_string(),
            fetch_source: String::new(),
        });
    }

    items
}

/// Text content of the first `<tag>...</tag>` pair in `block`. CDATA
/// wrappers are removed; plain text gets the predefined XML entities
/// decoded.
fn tag_text(block: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = block.find(&open)? + open.len();
    let end = block[start..].find(&close)? + start;
    let raw = block[start..end].trim();

    let text = match raw
        .strip_prefix("<![CDATA[")
        .and_then(|inner| inner.strip_suffix("]]>"))
    {
        Some(inner) => inner.trim().to_string(),
        None => unescape(raw),
    };
    Some(text)
}

/// Decode the five predefined XML entities. `&amp;` goes last so that
/// double-escaped text stays single-escaped, matching what a real XML
/// parser produces. Numeric character references are left alone.
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Feed</title>
    <item>
      <title><![CDATA[Bitcoin climbs past $60k]]></title>
      <link>https://example.com/btc-60k</link>
      <pubDate>Mon, 24 Aug 2026 09:15:00 +0000</pubDate>
    </item>
    <item>
      <title>Miners &amp; validators square off</title>
      <link>https://example.com/miners</link>
    </item>
    <item>
      <title>Orphaned headline with no link</title>
      <pubDate>Mon, 24 Aug 2026 10:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_and_strips_cdata() {
        let items = parse_items(FEED, "Example");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Bitcoin climbs past $60k");
        assert_eq!(items[0].link, "https://example.com/btc-60k");
        assert_eq!(items[0].pub_date, "Mon, 24 Aug 2026 09:15:00 +0000");
        assert_eq!(items[0].source, "Example");
    }

    #[test]
    fn decodes_entities_outside_cdata() {
        let items = parse_items(FEED, "Example");
        assert_eq!(items[1].title, "Miners & validators square off");
    }

    #[test]
    fn skips_items_missing_title_or_link() {
        let xml = "<rss><channel>\
            <item><title>no link here</title></item>\
            <item><link>https://example.com/no-title</link></item>\
            <item><title>  </title><link>https://example.com/blank</link></item>\
            </channel></rss>";
        assert!(parse_items(xml, "Example").is_empty());
    }

    #[test]
    fn missing_pub_date_becomes_empty_string() {
        let items = parse_items(FEED, "Example");
        assert_eq!(items[1].pub_date, "");
    }

    #[test]
    fn truncated_document_yields_the_complete_items_only() {
        let xml = "<rss><item><title>first</title>\
            <link>https://example.com/1</link></item>\
            <item><title>cut off mid-";
        let items = parse_items(xml, "Example");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "first");
    }

    #[test]
    fn non_xml_input_yields_nothing() {
        assert!(parse_items("504 Gateway Time-out", "Example").is_empty());
        assert!(parse_items("", "Example").is_empty());
    }
}
