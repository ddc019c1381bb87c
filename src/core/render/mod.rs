pub mod tokens;

use chrono::DateTime;

use crate::core::config::FeedConfig;
use crate::core::feed::types::{FeedItem, ParsedFeed};

#[derive(Debug, Clone, Default)]
pub struct RenderService;

impl RenderService {
    pub fn name(&self) -> &'static str {
        "render"
    }

    pub fn status(&self) -> &'static str {
        "ready"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unknown template token: {{{0}}}")]
    UnknownToken(String),
}

/// Render a parsed feed into its HTML fragment: substitute each of the first
/// `limit` entries into the entry template, then wrap the joined block in the
/// layout template's `{entries}` slot.
pub fn render_feed(config: &FeedConfig, feed: &ParsedFeed) -> Result<String, RenderError> {
    let mut entries_html = String::new();
    for item in feed.entries.iter().take(config.limit) {
        entries_html.push_str(&render_item(config, item)?);
    }
    substitute(&config.layout_template, |token| match token {
        "entries" => Ok(entries_html.clone()),
        other => Err(RenderError::UnknownToken(other.to_string())),
    })
}

fn render_item(config: &FeedConfig, item: &FeedItem) -> Result<String, RenderError> {
    substitute(&config.entry_template, |token| match token {
        "url" => Ok(item.link.clone()),
        "title" => Ok(item.title.clone()),
        "date" => Ok(format_date(item.published_at.as_deref(), &config.date_format)),
        "first_paragraph" => Ok(tokens::first_paragraph(
            item.content
                .as_deref()
                .or(item.summary.as_deref())
                .unwrap_or_default(),
        )),
        "categories" => Ok(tokens::category_links(
            &item.categories,
            config.category_base_url.as_deref().unwrap_or_default(),
        )),
        other => Err(RenderError::UnknownToken(other.to_string())),
    })
}

fn format_date(published_at: Option<&str>, date_format: &str) -> String {
    published_at
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|stamp| stamp.format(date_format).to_string())
        .unwrap_or_default()
}

fn substitute<F>(template: &str, resolve: F) -> Result<String, RenderError>
where
    F: Fn(&str) -> Result<String, RenderError>,
{
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                output.push_str(&resolve(&after[..end])?);
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated brace: emit it verbatim, nothing left to scan.
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    Ok(output)
}
