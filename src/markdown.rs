//! Converts post bodies from markdown to HTML.

use pulldown_cmark::{html, Options, Parser};

/// Renders `markdown` to an HTML string. Tables, footnotes, strikethrough,
/// task lists and smart punctuation are enabled; raw HTML passes through
/// untouched since the corpus is trusted, locally-authored content.
pub fn to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}
