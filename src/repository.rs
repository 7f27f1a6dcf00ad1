//! Loads posts from the corpus directory and implements the collection-level
//! queries over them: sorting by date, listing tags, and filtering by tag.
//!
//! The corpus is the set of `*.md` files directly inside a single directory.
//! A post's id is its file name less the extension.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::post::{self, Post, PostMetadata};

const MARKDOWN_EXTENSION: &str = ".md";

/// Reads posts from a corpus directory. The repository holds no posts itself;
/// every call goes back to the filesystem.
pub struct Repository {
    directory: PathBuf,
}

impl Repository {
    pub fn new(directory: impl Into<PathBuf>) -> Repository {
        Repository {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Reads the metadata of every post in the corpus, in file-name order.
    /// Documents that can't be read or parsed are logged and skipped; only a
    /// missing or unreadable corpus directory fails the load.
    pub fn load_all(&self) -> Result<Vec<PostMetadata>> {
        let mut posts = Vec::new();
        for (id, path) in self.entries()? {
            match read_metadata(&id, &path) {
                Ok(metadata) => {
                    if !metadata.date.is_valid() {
                        warn!(
                            id = %metadata.id,
                            date = %metadata.date.raw(),
                            "invalid date; sorting post as oldest"
                        );
                    }
                    posts.push(metadata);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping post")
                }
            }
        }
        debug!(count = posts.len(), "loaded posts");
        Ok(posts)
    }

    /// [`Repository::load_all`] followed by [`sort_by_date_descending`].
    pub fn load_sorted(&self) -> Result<Vec<PostMetadata>> {
        Ok(sort_by_date_descending(self.load_all()?))
    }

    /// Lists the id of every post source file in the corpus, whether or not
    /// it parses.
    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.into_iter().map(|(id, _)| id).collect())
    }

    /// Reads and renders the post identified by `id`. Returns
    /// [`Error::NotFound`] if there is no such post, including for ids that
    /// would resolve outside the corpus directory.
    pub fn by_id(&self, id: &str) -> Result<Post> {
        if !is_plain_id(id) {
            return Err(Error::NotFound(id.to_owned()));
        }
        let path = self.directory.join(format!("{}{}", id, MARKDOWN_EXTENSION));
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(id.to_owned()))
            }
            Err(err) => return Err(Error::Io(err)),
        };
        Post::parse(id, &contents).map_err(|err| Error::Parse {
            path,
            err,
        })
    }

    /// Collects `(id, path)` for each markdown file in the corpus directory,
    /// ordered by file name.
    fn entries(&self) -> Result<Vec<(String, PathBuf)>> {
        if !self.directory.is_dir() {
            return Err(Error::MissingCorpus(self.directory.clone()));
        }

        let mut entries = Vec::new();
        for result in WalkDir::new(&self.directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable corpus entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = match entry.file_name().to_str() {
                Some(file_name) => file_name,
                None => {
                    warn!(
                        path = %entry.path().display(),
                        "skipping post with non-UTF-8 file name"
                    );
                    continue;
                }
            };
            let id = match file_name.strip_suffix(MARKDOWN_EXTENSION) {
                Some(id) => id,
                None => continue,
            };
            // Only ids that `by_id` can resolve make it into the corpus.
            if !is_plain_id(id) {
                warn!(path = %entry.path().display(), "skipping post with hidden or empty id");
                continue;
            }
            entries.push((id.to_owned(), entry.path().to_owned()));
        }
        Ok(entries)
    }
}

fn read_metadata(id: &str, path: &Path) -> Result<PostMetadata> {
    let contents = fs::read_to_string(path)?;
    PostMetadata::parse(id, &contents).map_err(|err| Error::Parse {
        path: path.to_owned(),
        err,
    })
}

/// Ids are bare file stems. Anything that could name a different directory
/// is rejected.
fn is_plain_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && !id.contains(|c| c == '/' || c == '\\' || c == '\0')
}

/// Sorts posts newest first. The sort is stable, so posts with the same date
/// (including posts whose dates didn't parse, which sort last) keep their
/// relative order.
pub fn sort_by_date_descending(mut posts: Vec<PostMetadata>) -> Vec<PostMetadata> {
    posts.sort_by(|a, b| b.date.cmp(&a.date));
    posts
}

/// Returns every tag used by `posts`, sorted and without duplicates.
pub fn all_tags(posts: &[PostMetadata]) -> Vec<String> {
    posts
        .iter()
        .flat_map(|post| post.tags.iter().cloned())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// Returns the posts tagged with `tag`, preserving their order.
pub fn by_tag<'a>(posts: &'a [PostMetadata], tag: &str) -> Vec<&'a PostMetadata> {
    posts.iter().filter(|post| post.has_tag(tag)).collect()
}

/// Represents the result of a [`Repository`] operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error reading posts from the corpus.
#[derive(Debug)]
pub enum Error {
    /// Returned when no post has the requested id.
    NotFound(String),

    /// Returned when the corpus directory doesn't exist or isn't a directory.
    MissingCorpus(PathBuf),

    /// Returned when a post source file is malformed.
    Parse { path: PathBuf, err: post::Error },

    /// Returned for other I/O errors.
    Io(io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound(id) => write!(f, "post not found: `{}`", id),
            Error::MissingCorpus(path) => {
                write!(f, "posts directory not found: '{}'", path.display())
            }
            Error::Parse { path, err } => {
                write!(f, "parsing post '{}': {}", path.display(), err)
            }
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NotFound(_) => None,
            Error::MissingCorpus(_) => None,
            Error::Parse { path: _, err } => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    /// Converts a [`io::Error`] into an [`Error`]. It allows us to use the `?`
    /// operator for fallible I/O functions.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
