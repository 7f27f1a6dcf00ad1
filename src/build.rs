//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: loading the posts
//! ([`crate::repository`]), rendering index and post pages
//! ([`crate::write`]), copying the static source directory into the output
//! directory, and generating the Atom feed ([`crate::feed`]).

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::feed::{write_feed, Error as FeedError, FeedConfig};
use crate::post::Post;
use crate::repository::{all_tags, Error as RepositoryError, Repository};
use crate::tag::unique_tags;
use crate::theme::{Error as ThemeError, Theme};
use crate::value::StaticLinks;
use crate::write::{Error as WriteError, Writer, SEARCH_INDEX_FILE};

/// The output subdirectories that a build owns outright.
const OUTPUT_DIRECTORIES: [&str; 4] = ["posts", "pages", "tags", "static"];

/// Builds the site described by a [`Config`] into its output directory.
/// [`Repository::load_sorted`], [`Writer::write_site`], and [`write_feed`] do
/// the heavy-lifting. This function also copies the static assets from source
/// directory to the output directory.
pub fn build_site(config: &Config) -> Result<()> {
    check_output_directory(config)?;

    let repository = Repository::new(&config.posts_source_directory);
    let metadata = repository.load_sorted()?;

    // Render bodies in date order. A post that vanished or broke since the
    // metadata pass is skipped like any other malformed post.
    let mut posts: Vec<Post> = Vec::with_capacity(metadata.len());
    for post in &metadata {
        match repository.by_id(&post.id) {
            Ok(post) => posts.push(post),
            Err(err) => warn!(id = %post.id, error = %err, "skipping post"),
        }
    }

    let theme = Theme::load(&config.theme_directory)?;

    // Blow away the old output directories so we don't have any collisions.
    // The root output directory itself is left alone in case the user passed
    // the wrong directory.
    let output = &config.root_output_directory;
    for dir in OUTPUT_DIRECTORIES.iter() {
        rmdir(&output.join(dir))?;
    }
    fs::create_dir_all(output)?;

    let tags = all_tags(&metadata);
    let links = StaticLinks::new(&config.site_root, &unique_tags(&tags));
    let pages = Writer {
        config,
        theme: &theme,
        links: &links,
        tags: &tags,
        output_directory: output,
    }
    .write_site(&posts)?;

    if config.static_source_directory.is_dir() {
        copy_dir(&config.static_source_directory, &output.join("static"))?;
    }

    write_feed(
        FeedConfig {
            title: &config.title,
            subtitle: &config.description,
            author: config.author.as_ref(),
            links: &links,
        },
        &posts,
        BufWriter::new(File::create(output.join("feed.atom"))?),
    )?;

    info!(
        posts = posts.len(),
        tags = tags.len(),
        files = pages,
        output = %output.display(),
        "built site"
    );
    Ok(())
}

/// Refuses an output directory that overlaps the project root or any of the
/// source directories, since cleaning it would delete sources.
fn check_output_directory(config: &Config) -> Result<()> {
    let output = resolve(&config.root_output_directory)?;
    let sources = [
        &config.posts_source_directory,
        &config.static_source_directory,
        &config.theme_directory,
    ];
    for source in sources.iter() {
        let resolved = resolve(source)?;
        if resolved.starts_with(&output) || output.starts_with(&resolved) {
            return Err(Error::UnsafeOutputDirectory {
                output: config.root_output_directory.clone(),
                overlaps: source.to_path_buf(),
            });
        }
    }
    if output == resolve(&config.project_root)? {
        return Err(Error::UnsafeOutputDirectory {
            output: config.root_output_directory.clone(),
            overlaps: config.project_root.clone(),
        });
    }
    Ok(())
}

/// Canonicalizes the longest existing prefix of `path` and appends the rest,
/// resolving `.` and `..` in the rest lexically.
fn resolve(path: &Path) -> Result<PathBuf> {
    let mut missing: Vec<Component> = Vec::new();
    let mut existing = path;
    let mut resolved = loop {
        match fs::canonicalize(existing) {
            Ok(resolved) => break resolved,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        let mut components = existing.components();
        match components.next_back() {
            Some(component) => missing.push(component),
            None => break PathBuf::new(),
        }
        existing = components.as_path();
        if existing.as_os_str().is_empty() {
            break std::env::current_dir()?;
        }
    };
    for component in missing.into_iter().rev() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            component => resolved.push(component),
        }
    }
    Ok(resolved)
}

/// Recursively copies the contents of `src` into `dst`.
fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|err| Error::CopyStatic(err.to_string()))?;
        let relative = match entry.path().strip_prefix(src) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn rmdir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during loading,
/// writing, cleaning output directories, loading templates, and other I/O.
#[derive(Debug)]
pub enum Error {
    /// Returned when the corpus can't be loaded.
    Repository(RepositoryError),

    /// Returned for errors loading the theme.
    Theme(ThemeError),

    /// Returned for errors writing pages to disk as HTML files.
    Write(WriteError),

    /// Returned when the output directory overlaps the project root or one of
    /// the source directories.
    UnsafeOutputDirectory { output: PathBuf, overlaps: PathBuf },

    /// Returned for I/O problems while cleaning output directories.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned when the static directory can't be walked.
    CopyStatic(String),

    /// Returned for errors writing the feed.
    Feed(FeedError),

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Repository(err) => err.fmt(f),
            Error::Theme(err) => err.fmt(f),
            Error::Write(err) => err.fmt(f),
            Error::UnsafeOutputDirectory { output, overlaps } => write!(
                f,
                "Refusing to build into '{}': it overlaps '{}'",
                output.display(),
                overlaps.display()
            ),
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::CopyStatic(err) => write!(f, "Copying static files: {}", err),
            Error::Feed(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Repository(err) => Some(err),
            Error::Theme(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::UnsafeOutputDirectory { .. } => None,
            Error::Clean { path: _, err } => Some(err),
            Error::CopyStatic(_) => None,
            Error::Feed(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<RepositoryError> for Error {
    /// Converts [`RepositoryError`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: RepositoryError) -> Error {
        Error::Repository(err)
    }
}

impl From<ThemeError> for Error {
    /// Converts [`ThemeError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: ThemeError) -> Error {
        Error::Theme(err)
    }
}

impl From<WriteError> for Error {
    /// Converts [`WriteError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: WriteError) -> Error {
        Error::Write(err)
    }
}

impl From<FeedError> for Error {
    /// Converts [`FeedError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: FeedError) -> Error {
        Error::Feed(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::PROJECT_FILE;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    /// Lays out a project around the `testdata/posts` fixtures.
    fn project(root: &Path) -> std::result::Result<Config, Box<dyn std::error::Error>> {
        let posts = root.join("posts");
        copy_dir(&Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/posts"), &posts)?;
        fs::write(posts.join("broken.md"), "no frontmatter here")?;
        fs::create_dir_all(root.join("static/css"))?;
        fs::write(root.join("static/css/style.css"), "body {}")?;
        fs::write(
            root.join(PROJECT_FILE),
            "title: Test Blog\nsite_root: https://example.org/\nauthor:\n  name: Sam\n",
        )?;
        Ok(Config::from_directory(root, Path::new("_site"))?)
    }

    #[test]
    fn test_build_site() -> TestResult {
        let root = tempfile::tempdir()?;
        let config = project(root.path())?;
        build_site(&config)?;

        let out = root.path().join("_site");
        for file in &[
            "index.html",
            "posts/docker-basics.html",
            "posts/rust-ownership.html",
            "posts/simple.html",
            "tags/docker/index.html",
            "tags/rust/index.html",
            "404.html",
            "feed.atom",
            SEARCH_INDEX_FILE,
            "static/css/style.css",
        ] {
            assert!(out.join(file).is_file(), "missing {}", file);
        }
        assert!(!out.join("posts/broken.html").exists());

        let index = fs::read_to_string(out.join("index.html"))?;
        let docker = index.find("docker-basics.html").ok_or("docker missing")?;
        let rust = index.find("rust-ownership.html").ok_or("rust missing")?;
        assert!(docker < rust, "posts should be newest first");
        Ok(())
    }

    #[test]
    fn test_rebuild_removes_stale_pages() -> TestResult {
        let root = tempfile::tempdir()?;
        let config = project(root.path())?;
        build_site(&config)?;

        fs::remove_file(config.posts_source_directory.join("simple.md"))?;
        fs::write(config.root_output_directory.join("CNAME"), "example.org")?;
        build_site(&config)?;

        let out = &config.root_output_directory;
        assert!(!out.join("posts/simple.html").exists());
        assert!(out.join("CNAME").is_file());
        Ok(())
    }

    #[test]
    fn test_refuses_project_root_as_output() -> TestResult {
        let root = tempfile::tempdir()?;
        project(root.path())?;
        let config = Config::from_directory(root.path(), Path::new("."))?;

        assert!(matches!(
            build_site(&config),
            Err(Error::UnsafeOutputDirectory { .. })
        ));
        assert!(config.posts_source_directory.join("simple.md").is_file());
        assert!(root.path().join("static/css/style.css").is_file());
        Ok(())
    }

    #[test]
    fn test_refuses_output_overlapping_sources() -> TestResult {
        let root = tempfile::tempdir()?;
        project(root.path())?;

        for output in &["static/site", "posts", "..", "theme/../static"] {
            let config = Config::from_directory(root.path(), Path::new(output))?;
            match build_site(&config) {
                Err(Error::UnsafeOutputDirectory { .. }) => {}
                other => panic!("built into {}: {:?}", output, other),
            }
        }
        assert!(!root.path().join("static/site").exists());
        assert!(root.path().join("posts/simple.md").is_file());
        Ok(())
    }

    #[test]
    fn test_missing_corpus() -> TestResult {
        let root = tempfile::tempdir()?;
        fs::write(
            root.path().join(PROJECT_FILE),
            "title: Empty\nsite_root: https://example.org/\n",
        )?;
        let config = Config::from_directory(root.path(), Path::new("_site"))?;
        assert!(matches!(
            build_site(&config),
            Err(Error::Repository(RepositoryError::MissingCorpus(_)))
        ));
        Ok(())
    }
}
