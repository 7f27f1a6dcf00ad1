use std::fmt;
use std::net::{AddrParseError, SocketAddr};
use std::path::Path;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use tracing::error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use scrivener::build::{build_site, Error as BuildError};
use scrivener::config::{Config, Error as ConfigError};
use scrivener::query::Controller;
use scrivener::repository::{all_tags, by_tag, Error as RepositoryError, Repository};
use scrivener::serve::{serve, Error as ServeError};

const DEFAULT_OUTPUT_DIRECTORY: &str = "_site";

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let matches = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("build")
                .about("Renders the site into the output directory")
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .value_name("DIR")
                        .takes_value(true)
                        .default_value(DEFAULT_OUTPUT_DIRECTORY)
                        .help("Output directory, relative to the project root"),
                ),
        )
        .subcommand(
            SubCommand::with_name("serve")
                .about("Serves the site with live search")
                .arg(
                    Arg::with_name("address")
                        .short("a")
                        .long("address")
                        .value_name("ADDR")
                        .takes_value(true)
                        .help("Address to listen on, overriding serve.address"),
                ),
        )
        .subcommand(
            SubCommand::with_name("query")
                .about("Prints the posts shown by a listing href")
                .arg(Arg::with_name("HREF").required(true).index(1)),
        )
        .subcommand(
            SubCommand::with_name("tags").about("Lists every tag with its post count"),
        )
        .get_matches();

    if let Err(err) = run(&matches) {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let cwd = std::env::current_dir()?;
    match matches.subcommand() {
        ("build", Some(matches)) => {
            let output = matches.value_of("output").unwrap_or(DEFAULT_OUTPUT_DIRECTORY);
            build_site(&Config::from_directory(&cwd, Path::new(output))?)?;
        }
        ("serve", Some(matches)) => {
            let config = load_config(&cwd)?;
            let address = match matches.value_of("address") {
                Some(value) => value.parse::<SocketAddr>().map_err(|err| {
                    Error::InvalidAddress {
                        value: value.to_owned(),
                        err,
                    }
                })?,
                None => config.serve_address,
            };
            serve(&config, address)?;
        }
        ("query", Some(matches)) => {
            let href = matches.value_of("HREF").unwrap_or("/");
            query(&load_config(&cwd)?, href)?;
        }
        ("tags", Some(_)) => {
            let config = load_config(&cwd)?;
            let posts = Repository::new(&config.posts_source_directory).load_sorted()?;
            for tag in all_tags(&posts) {
                println!("{:>4}  {}", by_tag(&posts, &tag).len(), tag);
            }
        }
        _ => {}
    }
    Ok(())
}

fn load_config(cwd: &Path) -> Result<Config> {
    Ok(Config::from_directory(cwd, Path::new(DEFAULT_OUTPUT_DIRECTORY))?)
}

/// Prints the page of posts that `href` resolves to, with the canonical href
/// of the page actually shown.
fn query(config: &Config, href: &str) -> Result<()> {
    let posts = Repository::new(&config.posts_source_directory).load_sorted()?;
    let mut controller = Controller::new(&posts, config.page_size, config.search.clone());
    if !controller.restore(href) {
        return Err(Error::InvalidHref(href.to_owned()));
    }

    let view = controller.view();
    println!(
        "{}  page {} of {}, {} posts",
        controller.href(),
        view.current_page,
        view.total_pages,
        view.total_items
    );
    for post in &view.items {
        println!("{:>10}  {}  {}", post.date.raw(), post.id, post.title);
    }
    if view.has_next_page {
        let next = controller.state().clone().with_page(view.current_page + 1);
        println!("next: {}", next.to_href());
    }
    Ok(())
}

type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a command.
#[derive(Debug)]
enum Error {
    Config(ConfigError),
    Build(BuildError),
    Serve(ServeError),
    Repository(RepositoryError),
    InvalidAddress { value: String, err: AddrParseError },
    InvalidHref(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(err) => err.fmt(f),
            Error::Build(err) => err.fmt(f),
            Error::Serve(err) => err.fmt(f),
            Error::Repository(err) => err.fmt(f),
            Error::InvalidAddress { value, err } => {
                write!(f, "Invalid address '{}': {}", value, err)
            }
            Error::InvalidHref(href) => write!(
                f,
                "'{}' is not a listing view; expected '/' or '/tags/<tag>' with optional \
                 search and page parameters",
                href
            ),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Error {
        Error::Config(err)
    }
}

impl From<BuildError> for Error {
    fn from(err: BuildError) -> Error {
        Error::Build(err)
    }
}

impl From<ServeError> for Error {
    fn from(err: ServeError) -> Error {
        Error::Serve(err)
    }
}

impl From<RepositoryError> for Error {
    fn from(err: RepositoryError) -> Error {
        Error::Repository(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

