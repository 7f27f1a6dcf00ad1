//! Renders every page of the static site and writes it to disk.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use gtmpl::Value;
use tracing::debug;

use crate::config::Config;
use crate::post::{Post, PostMetadata};
use crate::query::{apply_query, QueryState};
use crate::theme::{self, Theme};
use crate::value::{Site, StaticLinks};

/// The name of the JSON export of post metadata.
pub const SEARCH_INDEX_FILE: &str = "search.json";

/// Responsible for templating and writing the HTML pages of the static site.
pub struct Writer<'a> {
    pub config: &'a Config,
    pub theme: &'a Theme,

    /// Decides where each page lives. Every listing view it knows a tag slug
    /// for gets its own directory.
    pub links: &'a StaticLinks,

    /// Every tag in the corpus, sorted.
    pub tags: &'a [String],

    /// The directory into which pages are written.
    pub output_directory: &'a Path,
}

impl Writer<'_> {
    /// Writes post pages, the paginated home index, a paginated index for
    /// each tag, the not-found page and the metadata export. `posts` should be
    /// sorted newest first. Returns the number of files written.
    pub fn write_site(&self, posts: &[Post]) -> Result<usize> {
        let mut output = Output::new(self.output_directory);
        let site = Site {
            config: self.config,
            links: self.links,
            tags: self.tags,
        };
        let metadata: Vec<PostMetadata> = posts.iter().map(|post| post.metadata.clone()).collect();

        for post in posts {
            output.write_page(
                &StaticLinks::post_path(&post.metadata.id),
                &self.theme.post,
                site.post_page(post),
            )?;
        }

        let views = std::iter::once(None)
            .chain(self.tags.iter().map(|tag| Some(tag.as_str())));
        for tag in views {
            let first = QueryState::new().with_tag(tag);
            let page_size = self.config.page_size;
            let total_pages =
                apply_query(&metadata, &first, page_size, &self.config.search).total_pages;
            for number in 1..=total_pages {
                let state = first.clone().with_page(number);
                let page = apply_query(&metadata, &state, page_size, &self.config.search);
                output.write_page(
                    &self.links.view_path(&state),
                    &self.theme.index,
                    site.index_page(&page, &state),
                )?;
            }
        }

        output.write_page("404.html", &self.theme.not_found, site.not_found_page(""))?;

        let path = output.prepare(SEARCH_INDEX_FILE)?;
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &metadata)?;

        Ok(output.files_written)
    }
}

/// Tracks the directories created so far and the number of files written.
struct Output<'a> {
    root: &'a Path,
    seen_dirs: HashSet<PathBuf>,
    files_written: usize,
}

impl<'a> Output<'a> {
    fn new(root: &'a Path) -> Output<'a> {
        Output {
            root,
            seen_dirs: HashSet::new(),
            files_written: 0,
        }
    }

    /// Creates the parent directory of `relative_path` if needed and returns
    /// the full path.
    fn prepare(&mut self, relative_path: &str) -> Result<PathBuf> {
        let path = self.root.join(relative_path);
        if let Some(dir) = path.parent() {
            if self.seen_dirs.insert(dir.to_owned()) {
                fs::create_dir_all(dir)?;
            }
        }
        self.files_written += 1;
        Ok(path)
    }

    fn write_page(
        &mut self,
        relative_path: &str,
        template: &gtmpl::Template,
        value: Value,
    ) -> Result<()> {
        let html = theme::render(template, value)?;
        let path = self.prepare(relative_path)?;
        debug!(path = %path.display(), "writing page");
        fs::write(&path, html)?;
        Ok(())
    }
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug)]
pub enum Error {
    /// An error during templating.
    Template(theme::Error),

    /// An error serializing the metadata export.
    Json(serde_json::Error),

    /// An error writing the output files.
    Io(io::Error),
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator for fallible I/O operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<theme::Error> for Error {
    /// Converts a [`theme::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator for fallible template operations.
    fn from(err: theme::Error) -> Error {
        Error::Template(err)
    }
}

impl From<serde_json::Error> for Error {
    /// Converts a [`serde_json::Error`] into an [`Error`].
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::Json(err) => write!(f, "Writing {}: {}", SEARCH_INDEX_FILE, err),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}
