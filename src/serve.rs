//! A preview server that renders views on demand. Unlike the static build,
//! every listing view is addressable, including search results, through the
//! hrefs of [`QueryState::to_href`].
//!
//! The corpus metadata is loaded once at start-up; post pages re-read their
//! source file so edits to a post show up on reload.

use std::fmt;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Component, Path};

use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::feed::{write_feed, FeedConfig};
use crate::post::{Post, PostMetadata};
use crate::query::{apply_query, QueryState};
use crate::repository::{self, all_tags, Repository};
use crate::theme::{self, Theme};
use crate::value::{ServeLinks, Site};

/// Serves the site described by `config` on `address` until the process is
/// killed.
pub fn serve(config: &Config, address: SocketAddr) -> Result<()> {
    let site = PreviewSite::load(config)?;
    let server = Server::http(address).map_err(|err| Error::Bind { address, err })?;
    info!(%address, posts = site.posts.len(), "serving site");

    for request in server.incoming_requests() {
        respond(&site, request);
    }
    Ok(())
}

fn respond(site: &PreviewSite, request: Request) {
    let reply = site.handle(request.method(), request.url());
    debug!(
        method = %request.method(),
        url = %request.url(),
        status = reply.status,
        "request"
    );

    let content_type = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes());
    let mut response =
        Response::from_data(reply.body).with_status_code(StatusCode(reply.status));
    if let Ok(header) = content_type {
        response = response.with_header(header);
    }
    if let Err(err) = request.respond(response) {
        warn!(error = %err, "failed to send response");
    }
}

/// An HTTP response, independent of the server that sends it.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn html(status: u16, body: String) -> Reply {
        Reply {
            status,
            content_type: "text/html; charset=utf-8",
            body: body.into_bytes(),
        }
    }

    fn text(status: u16, body: &str) -> Reply {
        Reply {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.as_bytes().to_vec(),
        }
    }
}

/// The state shared by every request.
pub struct PreviewSite<'a> {
    config: &'a Config,
    theme: Theme,
    repository: Repository,

    /// Every post's metadata, newest first.
    posts: Vec<PostMetadata>,
    tags: Vec<String>,
}

impl<'a> PreviewSite<'a> {
    /// Loads the corpus and theme.
    pub fn load(config: &'a Config) -> Result<PreviewSite<'a>> {
        let repository = Repository::new(&config.posts_source_directory);
        let posts = repository.load_sorted()?;
        Ok(PreviewSite {
            config,
            theme: Theme::load(&config.theme_directory)?,
            tags: all_tags(&posts),
            posts,
            repository,
        })
    }

    fn site(&self) -> Site {
        Site {
            config: self.config,
            links: &ServeLinks,
            tags: &self.tags,
        }
    }

    /// Answers a request for `url`, a root-relative href.
    pub fn handle(&self, method: &Method, url: &str) -> Reply {
        match method {
            Method::Get | Method::Head => {}
            _ => return Reply::text(405, "Method not allowed"),
        }

        let result = match route(url) {
            Route::Feed => self.feed(),
            Route::Post(id) => self.post(&id),
            Route::Static(path) => Ok(self.asset(&path)),
            Route::View(state) => self.view(&state),
            Route::NotFound => self.not_found(""),
        };
        result.unwrap_or_else(|err| {
            error!(url, error = %err, "failed to render page");
            Reply::text(500, "Internal server error")
        })
    }

    fn view(&self, state: &QueryState) -> Result<Reply> {
        let page = apply_query(&self.posts, state, self.config.page_size, &self.config.search);
        // Links are built relative to the page actually shown.
        let state = state.clone().with_page(page.current_page);
        let value = self.site().index_page(&page, &state);
        let html = theme::render(&self.theme.index, value)?;
        Ok(Reply::html(200, html))
    }

    fn post(&self, id: &str) -> Result<Reply> {
        match self.repository.by_id(id) {
            Ok(post) => {
                let value = self.site().post_page(&post);
                let html = theme::render(&self.theme.post, value)?;
                Ok(Reply::html(200, html))
            }
            Err(repository::Error::NotFound(_)) => self.not_found(id),
            Err(err) => Err(err.into()),
        }
    }

    fn not_found(&self, id: &str) -> Result<Reply> {
        let html = theme::render(&self.theme.not_found, self.site().not_found_page(id))?;
        Ok(Reply::html(404, html))
    }

    fn asset(&self, path: &str) -> Reply {
        let safe = Path::new(path)
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Reply::text(404, "Not found");
        }

        let path = self.config.static_source_directory.join(path);
        match fs::read(&path) {
            Ok(body) => Reply {
                status: 200,
                content_type: content_type(&path),
                body,
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Reply::text(404, "Not found"),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read static file");
                Reply::text(500, "Internal server error")
            }
        }
    }

    fn feed(&self) -> Result<Reply> {
        let mut posts: Vec<Post> = Vec::with_capacity(self.posts.len());
        for post in &self.posts {
            match self.repository.by_id(&post.id) {
                Ok(post) => posts.push(post),
                Err(err) => warn!(id = %post.id, error = %err, "skipping post"),
            }
        }

        let mut body: Vec<u8> = Vec::new();
        write_feed(
            FeedConfig {
                title: &self.config.title,
                subtitle: &self.config.description,
                author: self.config.author.as_ref(),
                links: &ServeLinks,
            },
            &posts,
            &mut body,
        )?;
        Ok(Reply {
            status: 200,
            content_type: "application/atom+xml",
            body,
        })
    }
}

#[derive(Debug, PartialEq)]
enum Route {
    View(QueryState),
    Post(String),
    Static(String),
    Feed,
    NotFound,
}

fn route(url: &str) -> Route {
    let path = url.split(|c| c == '?' || c == '#').next().unwrap_or("");
    let decode = |segment: &str| match urlencoding::decode(segment) {
        Ok(decoded) if !decoded.is_empty() => Some(decoded.into_owned()),
        _ => None,
    };

    if let Some(id) = path.strip_prefix("/posts/") {
        return match decode(id) {
            Some(id) => Route::Post(id),
            None => Route::NotFound,
        };
    }
    if let Some(asset) = path.strip_prefix("/static/") {
        return match decode(asset) {
            Some(asset) => Route::Static(asset),
            None => Route::NotFound,
        };
    }
    if path == "/feed.atom" {
        return Route::Feed;
    }
    match QueryState::from_href(url) {
        Some(state) => Route::View(state),
        None => Route::NotFound,
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("html") => "text/html; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// The result of a server operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem starting the server or rendering a page.
#[derive(Debug)]
pub enum Error {
    /// Returned when the listening socket can't be opened.
    Bind {
        address: SocketAddr,
        err: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// Returned when the corpus can't be read.
    Repository(repository::Error),

    /// Returned for template problems.
    Theme(theme::Error),

    /// Returned when the feed can't be generated.
    Feed(crate::feed::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Bind { address, err } => write!(f, "Listening on {}: {}", address, err),
            Error::Repository(err) => err.fmt(f),
            Error::Theme(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bind { address: _, err } => Some(err.as_ref()),
            Error::Repository(err) => Some(err),
            Error::Theme(err) => Some(err),
            Error::Feed(err) => Some(err),
        }
    }
}

impl From<repository::Error> for Error {
    /// Converts [`repository::Error`]s into [`Error`].
    fn from(err: repository::Error) -> Error {
        Error::Repository(err)
    }
}

impl From<theme::Error> for Error {
    /// Converts [`theme::Error`]s into [`Error`].
    fn from(err: theme::Error) -> Error {
        Error::Theme(err)
    }
}

impl From<crate::feed::Error> for Error {
    /// Converts feed errors into [`Error`].
    fn from(err: crate::feed::Error) -> Error {
        Error::Feed(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::PROJECT_FILE;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn config(root: &Path) -> std::result::Result<Config, Box<dyn std::error::Error>> {
        fs::write(
            root.join(PROJECT_FILE),
            "title: Preview\nsite_root: https://example.org/\npage_size: 1\n",
        )?;
        let mut config = Config::from_directory(root, Path::new("_site"))?;
        config.posts_source_directory =
            Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/posts");
        Ok(config)
    }

    fn body(reply: &Reply) -> &str {
        std::str::from_utf8(&reply.body).unwrap_or("")
    }

    #[test]
    fn test_route() {
        assert_eq!(Route::View(QueryState::new()), route("/"));
        assert_eq!(
            Route::View(QueryState::new().with_tag(Some("linux")).with_page(2)),
            route("/tags/linux?page=2")
        );
        assert_eq!(Route::Post(String::from("hello world")), route("/posts/hello%20world"));
        assert_eq!(Route::Static(String::from("css/site.css")), route("/static/css/site.css"));
        assert_eq!(Route::Feed, route("/feed.atom"));
        assert_eq!(Route::NotFound, route("/posts/"));
        assert_eq!(Route::NotFound, route("/nope"));
    }

    #[test]
    fn test_views() -> TestResult {
        let root = tempfile::tempdir()?;
        let config = config(root.path())?;
        let site = PreviewSite::load(&config)?;

        let home = site.handle(&Method::Get, "/");
        assert_eq!(200, home.status);
        assert!(body(&home).contains("/posts/docker-basics"));
        assert!(body(&home).contains("/?page=2"));

        let search = site.handle(&Method::Get, "/?search=ownership");
        assert!(body(&search).contains("/posts/rust-ownership"));
        assert!(!body(&search).contains("/posts/docker-basics"));

        // Out-of-range pages clamp to the last page.
        let last = site.handle(&Method::Get, "/tags/linux?page=99");
        assert_eq!(200, last.status);
        assert!(body(&last).contains("/posts/rust-ownership"));
        Ok(())
    }

    #[test]
    fn test_post_and_not_found() -> TestResult {
        let root = tempfile::tempdir()?;
        let config = config(root.path())?;
        let site = PreviewSite::load(&config)?;

        let post = site.handle(&Method::Get, "/posts/simple");
        assert_eq!(200, post.status);
        assert!(body(&post).contains("Today is the first day of the Common Era."));

        let missing = site.handle(&Method::Get, "/posts/nope");
        assert_eq!(404, missing.status);
        assert!(body(&missing).contains("Post not found"));

        let escape = site.handle(&Method::Get, "/posts/..%2Fscrivener");
        assert_eq!(404, escape.status);
        Ok(())
    }

    #[test]
    fn test_static_and_methods() -> TestResult {
        let root = tempfile::tempdir()?;
        let config = config(root.path())?;
        fs::create_dir_all(&config.static_source_directory)?;
        fs::write(config.static_source_directory.join("style.css"), "body {}")?;
        let site = PreviewSite::load(&config)?;

        let css = site.handle(&Method::Get, "/static/style.css");
        assert_eq!(200, css.status);
        assert_eq!("text/css; charset=utf-8", css.content_type);
        assert_eq!("body {}", body(&css));

        assert_eq!(404, site.handle(&Method::Get, "/static/../scrivener.yaml").status);
        assert_eq!(405, site.handle(&Method::Post, "/").status);
        assert_eq!(200, site.handle(&Method::Head, "/").status);
        Ok(())
    }

    #[test]
    fn test_feed() -> TestResult {
        let root = tempfile::tempdir()?;
        let config = config(root.path())?;
        let site = PreviewSite::load(&config)?;

        let feed = site.handle(&Method::Get, "/feed.atom");
        assert_eq!(200, feed.status);
        assert_eq!("application/atom+xml", feed.content_type);
        assert!(body(&feed).contains("/posts/docker-basics"));
        Ok(())
    }
}
