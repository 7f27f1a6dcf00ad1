//! Loads the project configuration from a `scrivener.yaml` file. The project
//! layout is fixed relative to that file:
//!
//! ```text
//! scrivener.yaml
//! posts/      markdown sources
//! static/     copied verbatim into the output
//! theme/      optional `index.html`, `post.html` and `not_found.html`
//!             templates overriding the built-in theme
//! ```

use std::fmt;
use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::page::DEFAULT_PAGE_SIZE;
use crate::search::SearchOptions;

/// The name of the project file.
pub const PROJECT_FILE: &str = "scrivener.yaml";

#[derive(Deserialize)]
struct Project {
    title: String,

    #[serde(default)]
    description: String,

    site_root: Url,

    #[serde(default)]
    author: Option<Author>,

    #[serde(default = "default_page_size")]
    page_size: usize,

    #[serde(default)]
    search: SearchOptions,

    #[serde(default)]
    serve: Serve,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Deserialize)]
#[serde(default)]
struct Serve {
    address: SocketAddr,
}

impl Default for Serve {
    fn default() -> Self {
        Serve {
            address: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// The author of the site, credited in the feed.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

/// The resolved configuration for a project.
#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,
    pub description: String,
    pub author: Option<Author>,

    /// The URL at which the built site is hosted, always with a trailing
    /// slash.
    pub site_root: Url,

    /// The number of posts per index page; at least 1.
    pub page_size: usize,
    pub search: SearchOptions,
    pub serve_address: SocketAddr,

    /// The directory containing the project file.
    pub project_root: PathBuf,
    pub posts_source_directory: PathBuf,
    pub static_source_directory: PathBuf,
    pub theme_directory: PathBuf,

    /// Where `build` writes the site.
    pub root_output_directory: PathBuf,
}

impl Config {
    /// Searches `dir` and then each of its ancestors for a
    /// [`PROJECT_FILE`] and loads the first one found.
    pub fn from_directory(dir: &Path, output_directory: &Path) -> Result<Config> {
        let mut current = Some(dir);
        while let Some(dir) = current {
            let path = dir.join(PROJECT_FILE);
            if path.is_file() {
                return Config::from_project_file(&path, output_directory);
            }
            current = dir.parent();
        }
        Err(Error::ProjectFileNotFound(dir.to_owned()))
    }

    /// Loads the configuration from the project file at `path`. Relative
    /// output directories are resolved against the project root.
    pub fn from_project_file(path: &Path, output_directory: &Path) -> Result<Config> {
        let file = File::open(path).map_err(|err| Error::OpenProjectFile {
            path: path.to_owned(),
            err,
        })?;
        let project: Project = serde_yaml::from_reader(file).map_err(|err| {
            Error::ParseProjectFile {
                path: path.to_owned(),
                err,
            }
        })?;
        let project_root = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Config::from_project(project, project_root, output_directory))
    }

    fn from_project(project: Project, project_root: &Path, output_directory: &Path) -> Config {
        let mut site_root = project.site_root;
        if !site_root.path().ends_with('/') {
            let path = format!("{}/", site_root.path());
            site_root.set_path(&path);
        }

        Config {
            title: project.title,
            description: project.description,
            author: project.author,
            site_root,
            page_size: project.page_size.max(1),
            search: project.search,
            serve_address: project.serve.address,
            project_root: project_root.to_owned(),
            posts_source_directory: project_root.join("posts"),
            static_source_directory: project_root.join("static"),
            theme_directory: project_root.join("theme"),
            root_output_directory: project_root.join(output_directory),
        }
    }
}

/// The result of loading configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the project configuration.
#[derive(Debug)]
pub enum Error {
    /// Returned when no project file exists in the starting directory or any
    /// of its ancestors.
    ProjectFileNotFound(PathBuf),

    /// Returned for I/O problems opening the project file.
    OpenProjectFile { path: PathBuf, err: io::Error },

    /// Returned when the project file isn't valid.
    ParseProjectFile {
        path: PathBuf,
        err: serde_yaml::Error,
    },
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ProjectFileNotFound(dir) => write!(
                f,
                "Could not find `{}` in '{}' or any parent directory",
                PROJECT_FILE,
                dir.display()
            ),
            Error::OpenProjectFile { path, err } => {
                write!(f, "Opening project file '{}': {}", path.display(), err)
            }
            Error::ParseProjectFile { path, err } => {
                write!(f, "Loading project file '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ProjectFileNotFound(_) => None,
            Error::OpenProjectFile { path: _, err } => Some(err),
            Error::ParseProjectFile { path: _, err } => Some(err),
        }
    }
}
