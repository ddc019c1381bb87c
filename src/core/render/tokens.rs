use std::sync::OnceLock;

use regex::Regex;

static TAG_PATTERN: OnceLock<Regex> = OnceLock::new();

fn tag_pattern() -> &'static Regex {
    // Matches any markup tag, including tags broken across lines.
    TAG_PATTERN.get_or_init(|| Regex::new(r"(?s)<.*?>").expect("tag pattern is a valid regex"))
}

/// Extract the lede from an HTML content blob.
///
/// Every tag is replaced with a newline, so inline markup splits its text
/// across lines while block boundaries leave blank lines behind. The first
/// paragraph is the leading run of non-empty lines, re-joined with single
/// spaces. Content without a paragraph break comes back whole.
pub fn first_paragraph(content: &str) -> String {
    let stripped = tag_pattern().replace_all(content, "\n");
    let mut words: Vec<&str> = Vec::new();
    for line in stripped.trim().lines() {
        if line.trim().is_empty() {
            if !words.is_empty() {
                break;
            }
            continue;
        }
        words.extend(line.split_whitespace());
    }
    words.join(" ")
}

/// Render category names as hashtag links against a category-archive base URL,
/// one anchor per name in iteration order, each followed by a single space.
pub fn category_links(categories: &[String], base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let links: Vec<String> = categories
        .iter()
        .map(|name| format!("<a class=\"hashtag\" href=\"{base}/category/{name}\">#{name}</a> "))
        .collect();
    links.concat()
}
