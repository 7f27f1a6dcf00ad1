//! Defines the [`PostMetadata`], [`Post`], [`PostDate`], and [`Error`] types
//! along with the logic for splitting a source document into its YAML
//! frontmatter and markdown body. See [`crate::repository`] for how documents
//! are found on disk.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};

use crate::markdown;

const FENCE: &str = "---";

/// The metadata for a single post. One of these exists per source document and
/// it is never mutated after it is parsed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PostMetadata {
    /// The post's identifier, which is the source file name less its `.md`
    /// extension.
    pub id: String,

    /// The title of the post. Empty if the frontmatter omits it.
    pub title: String,

    /// The date of the post.
    pub date: PostDate,

    /// A short description of the post. Empty if the frontmatter omits it.
    pub description: String,

    /// The post's tags in the order they were declared.
    pub tags: Vec<String>,

    /// The URI of the post's cover image, or the empty string.
    pub image: String,
}

impl PostMetadata {
    /// Parses the metadata for the post identified by `id` from the full
    /// contents of its source document. The markdown body is not rendered.
    pub fn parse(id: &str, input: &str) -> Result<PostMetadata> {
        let (frontmatter, _) = split_document(input)?;
        Ok(Frontmatter::parse(frontmatter)?.into_metadata(id))
    }

    /// Returns `true` if any of the post's tags is exactly `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A post with its rendered body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub metadata: PostMetadata,

    /// The post body rendered as HTML.
    pub body: String,
}

impl Post {
    /// Parses a full [`Post`] from an `id` and the contents of its source
    /// document. The document must be structured as follows:
    ///
    /// 1. Initial frontmatter fence (`---`)
    /// 2. YAML frontmatter with the optional fields `title`, `date`,
    ///    `description`, `tags`, and `image`
    /// 3. Terminal frontmatter fence (`---` on its own line)
    /// 4. Markdown body
    ///
    /// For example:
    ///
    /// ```md
    /// ---
    /// title: Hello, world!
    /// date: 2024-04-16
    /// tags: [greet]
    /// ---
    /// # Hello
    ///
    /// World
    /// ```
    pub fn parse(id: &str, input: &str) -> Result<Post> {
        let (frontmatter, body) = split_document(input)?;
        Ok(Post {
            metadata: Frontmatter::parse(frontmatter)?.into_metadata(id),
            body: markdown::to_html(body),
        })
    }
}

/// Splits a source document into its frontmatter and body slices.
fn split_document(input: &str) -> Result<(&str, &str)> {
    let input = input.trim_start_matches('\u{feff}');
    let rest = match input.strip_prefix(FENCE) {
        Some(rest) if rest.starts_with('\n') || rest.starts_with("\r\n") => {
            rest
        }
        _ => return Err(Error::FrontmatterMissingStartFence),
    };

    // The closing fence must be a line of its own. `offset` always lands on
    // the newline preceding it.
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if offset > 0 && line.trim_end() == FENCE {
            return Ok((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    Err(Error::FrontmatterMissingEndFence)
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Frontmatter {
    title: Option<String>,
    date: Option<String>,
    description: Option<String>,
    tags: Option<TagList>,
    image: Option<String>,
}

/// Tags may be written either as a YAML sequence or as a single string.
#[derive(Deserialize)]
#[serde(untagged)]
enum TagList {
    One(String),
    Many(Vec<String>),
}

impl Frontmatter {
    fn parse(yaml: &str) -> Result<Frontmatter> {
        if yaml.trim().is_empty() {
            return Ok(Frontmatter::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    fn into_metadata(self, id: &str) -> PostMetadata {
        PostMetadata {
            id: id.to_owned(),
            title: self.title.unwrap_or_default(),
            date: PostDate::new(self.date.unwrap_or_default()),
            description: self.description.unwrap_or_default(),
            tags: match self.tags {
                None => Vec::new(),
                Some(TagList::One(tag)) => vec![tag],
                Some(TagList::Many(tags)) => tags,
            },
            image: self.image.unwrap_or_default(),
        }
    }
}

/// A post date as written in the frontmatter together with the calendar date
/// it denotes, if any. Dates order by calendar value; a date that doesn't
/// parse orders below every valid date and equal to every other invalid date.
#[derive(Clone, Debug)]
pub struct PostDate {
    raw: String,
    calendar: Option<NaiveDate>,
}

impl PostDate {
    pub fn new(raw: impl Into<String>) -> PostDate {
        let raw = raw.into();
        let calendar = parse_calendar_date(raw.trim());
        PostDate { raw, calendar }
    }

    /// The date exactly as it appeared in the frontmatter.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn calendar(&self) -> Option<NaiveDate> {
        self.calendar
    }

    pub fn is_valid(&self) -> bool {
        self.calendar.is_some()
    }

    /// Formats the date for display, e.g. `April 16, 2024`. Falls back to the
    /// raw string for invalid dates.
    pub fn display(&self) -> String {
        match self.calendar {
            Some(date) => date.format("%B %-d, %Y").to_string(),
            None => self.raw.clone(),
        }
    }
}

fn parse_calendar_date(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date_time) = DateTime::parse_from_rfc3339(s) {
        return Some(date_time.naive_local().date());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|date_time| date_time.date())
}

impl PartialEq for PostDate {
    fn eq(&self, other: &Self) -> bool {
        self.calendar == other.calendar
    }
}
impl Eq for PostDate {}

impl PartialOrd for PostDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PostDate {
    /// `None < Some(_)`, so invalid dates sort as the minimum.
    fn cmp(&self, other: &Self) -> Ordering {
        self.calendar.cmp(&other.calendar)
    }
}

impl Serialize for PostDate {
    /// Serializes as the raw frontmatter string.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Represents the result of a [`Post`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Post`] or [`PostMetadata`] object. Any of
/// these marks the source document as malformed.
#[derive(Debug)]
pub enum Error {
    /// Returned when a post source file is missing its starting frontmatter
    /// fence (`---`).
    FrontmatterMissingStartFence,

    /// Returned when a post source file is missing its terminal frontmatter
    /// fence (i.e., the starting fence was found but the ending one was
    /// missing).
    FrontmatterMissingEndFence,

    /// Returned when there was an error parsing the frontmatter as YAML.
    DeserializeYaml(serde_yaml::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrontmatterMissingStartFence => {
                write!(f, "Post must begin with `---`")
            }
            Error::FrontmatterMissingEndFence => {
                write!(f, "Missing closing `---`")
            }
            Error::DeserializeYaml(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FrontmatterMissingStartFence => None,
            Error::FrontmatterMissingEndFence => None,
            Error::DeserializeYaml(err) => Some(err),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}
