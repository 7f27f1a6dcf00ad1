//! Loads the page templates. A project's `theme/` directory may provide any of
//! `index.html`, `post.html` and `not_found.html`; templates it doesn't
//! provide come from the built-in theme.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gtmpl::{Context, Template, Value};
use tracing::debug;

const INDEX: (&str, &str) = ("index.html", include_str!("../theme/index.html"));
const POST: (&str, &str) = ("post.html", include_str!("../theme/post.html"));
const NOT_FOUND: (&str, &str) = ("not_found.html", include_str!("../theme/not_found.html"));

/// The parsed templates for each kind of page.
pub struct Theme {
    /// Renders listing views: the home index, tag indices and search results.
    pub index: Template,

    /// Renders a single post.
    pub post: Template,

    /// Renders the page for a post that doesn't exist.
    pub not_found: Template,
}

impl Theme {
    /// The built-in theme.
    pub fn builtin() -> Result<Theme> {
        Ok(Theme {
            index: parse(INDEX.1)?,
            post: parse(POST.1)?,
            not_found: parse(NOT_FOUND.1)?,
        })
    }

    /// Loads the theme from `directory`, falling back to the built-in
    /// template for each file the directory doesn't contain. A missing
    /// directory yields the built-in theme.
    pub fn load(directory: &Path) -> Result<Theme> {
        Ok(Theme {
            index: load_template(directory, INDEX)?,
            post: load_template(directory, POST)?,
            not_found: load_template(directory, NOT_FOUND)?,
        })
    }
}

/// Executes `template` against `value` and returns the output.
pub fn render(template: &Template, value: Value) -> Result<String> {
    let context = Context::from(value).map_err(|err| Error::Render(err.to_string()))?;
    let mut output: Vec<u8> = Vec::new();
    template
        .execute(&mut output, &context)
        .map_err(|err| Error::Render(err.to_string()))?;
    String::from_utf8(output).map_err(|err| Error::Render(err.to_string()))
}

fn load_template(directory: &Path, (file_name, builtin): (&str, &str)) -> Result<Template> {
    let path = directory.join(file_name);
    match fs::read_to_string(&path) {
        Ok(contents) => {
            debug!(path = %path.display(), "using theme template");
            parse(&contents).map_err(|err| match err {
                Error::ParseTemplate { path: _, err } => {
                    Error::ParseTemplate { path: Some(path), err }
                }
                err => err,
            })
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => parse(builtin),
        Err(err) => Err(Error::OpenTemplateFile { path, err }),
    }
}

fn parse(contents: &str) -> Result<Template> {
    let mut template = Template::default();
    template
        .parse(contents)
        .map_err(|err| Error::ParseTemplate {
            path: None,
            err: err.to_string(),
        })?;
    Ok(template)
}

/// The result of a theme operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading or executing a template.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: io::Error },

    /// Returned for errors parsing a template. `path` is `None` for the
    /// built-in templates.
    ParseTemplate { path: Option<PathBuf>, err: String },

    /// Returned for errors executing a template.
    Render(String),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate {
                path: Some(path),
                err,
            } => write!(f, "Parsing template '{}': {}", path.display(), err),
            Error::ParseTemplate { path: None, err } => {
                write!(f, "Parsing built-in template: {}", err)
            }
            Error::Render(err) => write!(f, "Rendering template: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate { .. } => None,
            Error::Render(_) => None,
        }
    }
}
