//! Converts posts and listing views into [`Value`]s for templating, and
//! defines the [`Links`] schemes that decide what URLs those values carry.
//!
//! Templates don't escape anything, so every text field is HTML-escaped here.
//! The only raw HTML handed to templates is a post's rendered body.

use std::collections::HashMap;

use gtmpl::Value;
use pulldown_cmark::escape::{escape_href, escape_html};
use url::Url;

use crate::config::Config;
use crate::page::{PageLink, Pagination};
use crate::post::{Post, PostMetadata};
use crate::query::QueryState;
use crate::tag::Tag;

/// Decides the URL of each page of the site. The static build and the
/// preview server lay pages out differently.
pub trait Links {
    /// The URL of the post with id `id`.
    fn post(&self, id: &str) -> String;

    /// The URL of the listing view described by `state`.
    fn view(&self, state: &QueryState) -> String;

    /// The URL of a file in the static directory.
    fn asset(&self, path: &str) -> String;

    /// The URL of `path`, a path relative to the root of the site.
    fn site_path(&self, path: &str) -> String;

    fn feed(&self) -> String;

    fn home(&self) -> String {
        self.view(&QueryState::new())
    }

    fn tag(&self, tag: &str) -> String {
        self.view(&QueryState::new().with_tag(Some(tag)))
    }

    /// Whether views honour a search query.
    fn searchable(&self) -> bool;
}

/// URLs for the pre-rendered site under the configured site root. Index
/// pages are `index.html`, `pages/2.html`, ... and tag pages
/// `tags/<slug>/index.html`, `tags/<slug>/2.html`, ...; search is ignored.
pub struct StaticLinks {
    root: Url,
    slugs: HashMap<String, String>,
}

impl StaticLinks {
    pub fn new(root: &Url, tags: &[Tag]) -> StaticLinks {
        StaticLinks {
            root: root.clone(),
            slugs: tags
                .iter()
                .map(|tag| (tag.name.clone(), tag.slug.clone()))
                .collect(),
        }
    }

    /// The path of the page for `state` relative to the output directory.
    pub fn view_path(&self, state: &QueryState) -> String {
        let (dir, numbered) = match state.tag() {
            None => (String::new(), "pages/"),
            Some(tag) => {
                let slug = match self.slugs.get(tag) {
                    Some(slug) => slug.clone(),
                    None => Tag::new(tag).slug,
                };
                (format!("tags/{}/", slug), "")
            }
        };
        match state.page() {
            1 => format!("{}index.html", dir),
            n => format!("{}{}{}.html", dir, numbered, n),
        }
    }

    /// The path of a post page relative to the output directory.
    pub fn post_path(id: &str) -> String {
        format!("posts/{}.html", id)
    }
}

impl Links for StaticLinks {
    fn post(&self, id: &str) -> String {
        format!("{}posts/{}.html", self.root, urlencoding::encode(id))
    }

    fn view(&self, state: &QueryState) -> String {
        format!("{}{}", self.root, self.view_path(state))
    }

    fn asset(&self, path: &str) -> String {
        format!("{}static/{}", self.root, path)
    }

    fn site_path(&self, path: &str) -> String {
        format!("{}{}", self.root, path)
    }

    fn feed(&self) -> String {
        format!("{}feed.atom", self.root)
    }

    fn searchable(&self) -> bool {
        false
    }
}

/// URLs for the preview server, where listing views are addressed by their
/// canonical [`QueryState::to_href`].
pub struct ServeLinks;

impl Links for ServeLinks {
    fn post(&self, id: &str) -> String {
        format!("/posts/{}", urlencoding::encode(id))
    }

    fn view(&self, state: &QueryState) -> String {
        state.to_href()
    }

    fn asset(&self, path: &str) -> String {
        format!("/static/{}", path)
    }

    fn site_path(&self, path: &str) -> String {
        format!("/{}", path)
    }

    fn feed(&self) -> String {
        String::from("/feed.atom")
    }

    fn searchable(&self) -> bool {
        true
    }
}

/// The site-wide values every page gets under `.site`.
pub struct Site<'a> {
    pub config: &'a Config,
    pub links: &'a dyn Links,

    /// Every tag in the corpus, sorted.
    pub tags: &'a [String],
}

impl Site<'_> {
    fn to_value(&self) -> Value {
        object(vec![
            ("title", text(&self.config.title)),
            ("description", text(&self.config.description)),
            ("home", href(&self.links.home())),
            ("feed", href(&self.links.feed())),
            ("stylesheet", href(&self.links.asset("style.css"))),
        ])
    }

    /// The tag cloud, with `selected` marking the current tag.
    fn tag_cloud(&self, selected: Option<&str>) -> Value {
        Value::Array(
            self.tags
                .iter()
                .map(|tag| {
                    object(vec![
                        ("name", text(tag)),
                        ("url", href(&self.links.tag(tag))),
                        ("selected", Value::Bool(selected == Some(tag.as_str()))),
                    ])
                })
                .collect(),
        )
    }

    /// Converts a post's metadata into a summary [`Value`] with the fields
    /// `id`, `url`, `title`, `date`, `display_date`, `description`, `image`,
    /// and `tags` (each with `name` and `url`).
    pub fn summarize(&self, post: &PostMetadata) -> Value {
        object(vec![
            ("id", text(&post.id)),
            ("url", href(&self.links.post(&post.id))),
            ("title", text(&post.title)),
            ("date", text(post.date.raw())),
            ("display_date", text(&post.date.display())),
            ("description", text(&post.description)),
            ("image", href(&resolve_resource(self.links, &post.image))),
            (
                "tags",
                Value::Array(
                    post.tags
                        .iter()
                        .map(|tag| {
                            object(vec![
                                ("name", text(tag)),
                                ("url", href(&self.links.tag(tag))),
                            ])
                        })
                        .collect(),
                ),
            ),
        ])
    }

    /// Builds the value for a listing page: the home index, a tag index, or
    /// search results.
    pub fn index_page(&self, page: &Pagination<&PostMetadata>, state: &QueryState) -> Value {
        let searchable = self.links.searchable();
        let search = if searchable { state.search() } else { "" };
        let link_to = |number: usize| {
            href(&self.links.view(&state.clone().with_page(number)))
        };

        let title = match state.tag() {
            Some(tag) => format!("#{} | {}", tag, self.config.title),
            None => self.config.title.clone(),
        };
        let empty_message = match (state.tag(), search.is_empty()) {
            (Some(_), true) => "No posts found with this tag.",
            (_, false) => "No posts found matching your search.",
            (None, true) => "No posts yet.",
        };

        object(vec![
            ("site", self.to_value()),
            ("title", text(&title)),
            ("tag", state.tag().map(text).unwrap_or(Value::Nil)),
            ("count", text(&post_count(page.total_items))),
            ("search", text(search)),
            ("searchable", Value::Bool(searchable && state.tag().is_none())),
            ("search_action", href(&self.links.home())),
            (
                "posts",
                Value::Array(page.items.iter().map(|p| self.summarize(p)).collect()),
            ),
            ("empty_message", text(empty_message)),
            ("pager", Value::Bool(page.total_pages > 1)),
            (
                "prev",
                match page.has_previous_page {
                    true => link_to(page.current_page - 1),
                    false => Value::Nil,
                },
            ),
            (
                "next",
                match page.has_next_page {
                    true => link_to(page.current_page + 1),
                    false => Value::Nil,
                },
            ),
            (
                "pages",
                Value::Array(
                    page.visible_pages()
                        .into_iter()
                        .map(|link| match link {
                            PageLink::Ellipsis => {
                                object(vec![("ellipsis", Value::Bool(true))])
                            }
                            PageLink::Number(number) => object(vec![
                                ("ellipsis", Value::Bool(false)),
                                ("number", Value::String(number.to_string())),
                                ("url", link_to(number)),
                                ("current", Value::Bool(number == page.current_page)),
                            ]),
                        })
                        .collect(),
                ),
            ),
            ("summary", text(&results_summary(page, search))),
            ("tags", self.tag_cloud(state.tag())),
        ])
    }

    /// Builds the value for a post page. The summary fields are available
    /// under `.post` alongside `.post.body`, the rendered HTML.
    pub fn post_page(&self, post: &Post) -> Value {
        let mut summary = self.summarize(&post.metadata);
        if let Value::Object(fields) = &mut summary {
            fields.insert("body".to_owned(), Value::String(post.body.clone()));
        }
        object(vec![
            ("site", self.to_value()),
            (
                "title",
                text(&format!("{} | {}", post.metadata.title, self.config.title)),
            ),
            ("post", summary),
        ])
    }

    /// Builds the value for the page shown when a post doesn't exist.
    pub fn not_found_page(&self, id: &str) -> Value {
        object(vec![
            ("site", self.to_value()),
            ("title", text(&format!("Not found | {}", self.config.title))),
            ("id", text(id)),
        ])
    }
}

/// Resolves a URL written in frontmatter. Absolute URLs are kept as they are;
/// anything else is taken relative to the root of the site, so
/// `/static/cover.png` and `static/cover.png` name the same file.
pub fn resolve_resource(links: &dyn Links, url: &str) -> String {
    if url.is_empty() || url.starts_with("//") || Url::parse(url).is_ok() {
        return url.to_owned();
    }
    links.site_path(url.trim_start_matches('/'))
}

fn post_count(n: usize) -> String {
    match n {
        1 => String::from("1 post found"),
        n => format!("{} posts found", n),
    }
}

/// E.g. `Showing 12 of 14 posts for "docker"`; empty when nothing matched.
fn results_summary(page: &Pagination<&PostMetadata>, search: &str) -> String {
    if page.total_items == 0 {
        return String::new();
    }
    let mut summary = format!(
        "Showing {} of {} posts",
        page.items.len(),
        page.total_items
    );
    if !search.is_empty() {
        summary.push_str(&format!(" for \"{}\"", search));
    }
    summary
}

fn object(fields: Vec<(&str, Value)>) -> Value {
    Value::Object(
        fields
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value))
            .collect(),
    )
}

/// An HTML-escaped string value.
fn text(s: &str) -> Value {
    let mut out = String::with_capacity(s.len());
    // Writing into a `String` can't fail.
    let _ = escape_html(&mut out, s);
    Value::String(out)
}

/// A string value escaped for use in an `href` or `src` attribute.
fn href(s: &str) -> Value {
    let mut out = String::with_capacity(s.len());
    let _ = escape_href(&mut out, s);
    Value::String(out)
}
