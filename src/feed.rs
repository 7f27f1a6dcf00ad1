//! Support for creating Atom feeds from a list of posts.

use std::fmt;
use std::io::Write;

use atom_syndication::{Category, Content, Entry, Error as AtomError, Feed, Link, Person, Text};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use tracing::debug;

use crate::config::Author;
use crate::post::Post;
use crate::value::Links;

/// Bundled configuration for creating a feed.
pub struct FeedConfig<'a> {
    pub title: &'a str,
    pub subtitle: &'a str,
    pub author: Option<&'a Author>,

    /// Supplies the feed id and the entry links.
    pub links: &'a dyn Links,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and a list of
/// [`Post`]s and writes the result to a [`std::io::Write`]. Posts without a
/// valid date are left out.
pub fn write_feed<W: Write>(config: FeedConfig, posts: &[Post], w: W) -> Result<()> {
    feed(&config, posts).write_to(w)?;
    Ok(())
}

fn feed(config: &FeedConfig, posts: &[Post]) -> Feed {
    let entries: Vec<Entry> = posts
        .iter()
        .filter_map(|post| match post.metadata.date.calendar().and_then(midnight_utc) {
            Some(date) => Some(entry(config, post, date)),
            None => {
                debug!(id = %post.metadata.id, "leaving undated post out of the feed");
                None
            }
        })
        .collect();

    let updated = entries
        .iter()
        .map(|entry| *entry.updated())
        .max()
        .unwrap_or_else(|| Utc::now().into());

    let mut feed = Feed::default();
    feed.set_title(Text::plain(config.title));
    if !config.subtitle.is_empty() {
        feed.set_subtitle(Some(Text::plain(config.subtitle)));
    }
    feed.set_id(config.links.home());
    feed.set_updated(updated);
    feed.set_authors(author_to_people(config.author));
    feed.set_links(vec![link(config.links.home())]);
    feed.set_entries(entries);
    feed
}

fn entry(config: &FeedConfig, post: &Post, date: DateTime<FixedOffset>) -> Entry {
    let url = config.links.post(&post.metadata.id);

    let mut content = Content::default();
    content.set_content_type(Some(String::from("html")));
    content.set_value(Some(post.body.clone()));

    let mut entry = Entry::default();
    entry.set_id(url.clone());
    entry.set_title(Text::plain(post.metadata.title.as_str()));
    entry.set_updated(date);
    entry.set_published(Some(date));
    entry.set_authors(author_to_people(config.author));
    entry.set_links(vec![link(url)]);
    if !post.metadata.description.is_empty() {
        entry.set_summary(Some(Text::plain(post.metadata.description.as_str())));
    }
    entry.set_categories(
        post.metadata
            .tags
            .iter()
            .map(|tag| {
                let mut category = Category::default();
                category.set_term(tag.as_str());
                category
            })
            .collect::<Vec<Category>>(),
    );
    entry.set_content(Some(content));
    entry
}

/// Posts carry dates without times; they're published at midnight UTC.
fn midnight_utc(date: NaiveDate) -> Option<DateTime<FixedOffset>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight).into())
}

fn link(href: String) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel("alternate");
    link
}

fn author_to_people(author: Option<&Author>) -> Vec<Person> {
    match author {
        Some(author) => {
            let mut person = Person::default();
            person.set_name(author.name.as_str());
            person.set_email(author.email.clone());
            vec![person]
        }
        None => Vec::new(),
    }
}

/// The result of writing a feed.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    Io(std::io::Error),

    /// Returned when there is an Atom-related error.
    Atom(AtomError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Atom(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Atom(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator in fallible feed operations.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}
