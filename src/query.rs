//! Composes tag filtering, search, and pagination into the list of posts a
//! view displays.
//!
//! A view is fully described by a [`QueryState`]: an optional tag, a search
//! query, and a page number. The state round-trips through a root-relative
//! href (`/tags/linux?search=shell&page=2`) so that a reloaded or shared link
//! reproduces the same view. [`apply_query`] turns a state into a page of
//! posts; [`Controller`] holds the state for an interactive session and
//! applies the transition rules.

use url::form_urlencoded;

use crate::page::{paginate, Pagination};
use crate::post::PostMetadata;
use crate::repository;
use crate::search::{SearchIndex, SearchOptions};

const TAGS_PREFIX: &str = "tags/";
const SEARCH_PARAM: &str = "search";
const PAGE_PARAM: &str = "page";

/// The parameters of a post-listing view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryState {
    search: String,
    tag: Option<String>,
    page: usize,
}

impl Default for QueryState {
    fn default() -> Self {
        QueryState {
            search: String::new(),
            tag: None,
            page: 1,
        }
    }
}

impl QueryState {
    /// The home view: no tag, no search, first page.
    pub fn new() -> QueryState {
        QueryState::default()
    }

    /// The search query; empty means no search.
    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// The 1-based page number. It may exceed the number of pages until the
    /// state is applied.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Replaces the search query (trimmed) and returns to the first page.
    pub fn with_search(self, query: &str) -> QueryState {
        QueryState {
            search: query.trim().to_owned(),
            page: 1,
            ..self
        }
    }

    /// Replaces the tag filter and returns to the first page. An empty tag is
    /// the same as no tag.
    pub fn with_tag(self, tag: Option<&str>) -> QueryState {
        QueryState {
            tag: tag.filter(|t| !t.is_empty()).map(str::to_owned),
            page: 1,
            ..self
        }
    }

    /// Moves to `page`, keeping the tag and search. Page 0 means page 1.
    pub fn with_page(self, page: usize) -> QueryState {
        QueryState {
            page: page.max(1),
            ..self
        }
    }

    /// Encodes the state as a root-relative href. The path is `/` or
    /// `/tags/<tag>`; `search` is omitted when empty and `page` when 1.
    pub fn to_href(&self) -> String {
        let mut href = String::from("/");
        if let Some(tag) = &self.tag {
            href.push_str(TAGS_PREFIX);
            href.push_str(&urlencoding::encode(tag));
        }

        let mut query = form_urlencoded::Serializer::new(String::new());
        if !self.search.is_empty() {
            query.append_pair(SEARCH_PARAM, &self.search);
        }
        if self.page > 1 {
            query.append_pair(PAGE_PARAM, &self.page.to_string());
        }
        let query = query.finish();
        if !query.is_empty() {
            href.push('?');
            href.push_str(&query);
        }
        href
    }

    /// Decodes a state from an href produced by [`QueryState::to_href`], or
    /// from a request path with query string. Returns `None` if the path isn't
    /// a listing view. Parameters are read leniently: unknown ones are
    /// ignored and an unusable `page` means page 1.
    pub fn from_href(href: &str) -> Option<QueryState> {
        let href = href.split('#').next().unwrap_or_default();
        let (path, query) = match href.split_once('?') {
            Some((path, query)) => (path, query),
            None => (href, ""),
        };

        let path = path.trim_matches('/');
        let tag = if path.is_empty() {
            None
        } else {
            let segment = path.strip_prefix(TAGS_PREFIX)?;
            if segment.is_empty() || segment.contains('/') {
                return None;
            }
            Some(match urlencoding::decode(segment) {
                Ok(tag) => tag.into_owned(),
                Err(_) => segment.to_owned(),
            })
        };

        let mut state = QueryState::new().with_tag(tag.as_deref());
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                SEARCH_PARAM => state.search = value.trim().to_owned(),
                PAGE_PARAM => {
                    state.page = value.trim().parse::<usize>().unwrap_or(1).max(1)
                }
                _ => {}
            }
        }
        Some(state)
    }
}

/// Computes the page of posts that `state` selects from `posts`, which
/// should already be sorted newest first.
///
/// 1. If a tag is selected, only posts with that tag are considered.
/// 2. If there is a search query, the remaining posts are ranked by the
///    search index and non-matching posts are dropped.
/// 3. Otherwise the remaining posts keep their order.
/// 4. The result is paginated, clamping the page into range.
pub fn apply_query<'a>(
    posts: &'a [PostMetadata],
    state: &QueryState,
    page_size: usize,
    options: &SearchOptions,
) -> Pagination<&'a PostMetadata> {
    let candidates: Vec<&'a PostMetadata> = match state.tag() {
        Some(tag) => repository::by_tag(posts, tag),
        None => posts.iter().collect(),
    };

    let results = if state.search().is_empty() {
        candidates
    } else {
        SearchIndex::build(candidates, options)
            .search(state.search())
            .into_posts()
    };

    paginate(&results, state.page(), page_size)
}

/// Holds the [`QueryState`] of an interactive session over a fixed set of
/// posts.
pub struct Controller<'a> {
    posts: &'a [PostMetadata],
    page_size: usize,
    options: SearchOptions,
    state: QueryState,
}

impl<'a> Controller<'a> {
    pub fn new(
        posts: &'a [PostMetadata],
        page_size: usize,
        options: SearchOptions,
    ) -> Controller<'a> {
        Controller {
            posts,
            page_size,
            options,
            state: QueryState::new(),
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn submit_search(&mut self, query: &str) {
        self.state = std::mem::take(&mut self.state).with_search(query);
    }

    pub fn select_tag(&mut self, tag: Option<&str>) {
        self.state = std::mem::take(&mut self.state).with_tag(tag);
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.state = std::mem::take(&mut self.state).with_page(page);
    }

    /// Replaces the state with the one encoded in `href`. Returns `false` and
    /// leaves the state alone if `href` isn't a listing view.
    pub fn restore(&mut self, href: &str) -> bool {
        match QueryState::from_href(href) {
            Some(state) => {
                self.state = state;
                true
            }
            None => false,
        }
    }

    /// The shareable href for the current state.
    pub fn href(&self) -> String {
        self.state.to_href()
    }

    /// Applies the current state. The stored page is clamped to the page
    /// actually shown.
    pub fn view(&mut self) -> Pagination<&'a PostMetadata> {
        let view = apply_query(self.posts, &self.state, self.page_size, &self.options);
        self.state.page = view.current_page;
        view
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::page::DEFAULT_PAGE_SIZE;
    use crate::post::PostDate;

    /// Fourteen posts, newest first. Posts 3, 7 and 11 are tagged `linux` and
    /// post 5 is about Docker.
    fn corpus() -> Vec<PostMetadata> {
        (1..=14)
            .rev()
            .map(|n| {
                let (title, tags) = match n {
                    3 | 7 | 11 => (format!("Shell Notes {}", n), vec!["linux"]),
                    5 => (String::from("Docker Basics"), vec!["devops"]),
                    _ => (format!("Gardening Diary {}", n), vec!["garden"]),
                };
                PostMetadata {
                    id: format!("post-{}", n),
                    title,
                    date: PostDate::new(format!("2024-01-{:02}", n)),
                    description: String::new(),
                    tags: tags.into_iter().map(String::from).collect(),
                    image: String::new(),
                }
            })
            .collect()
    }

    fn ids<'a>(page: &Pagination<&'a PostMetadata>) -> Vec<&'a str> {
        page.items.iter().map(|p| p.id.as_str()).collect()
    }

    fn apply<'a>(posts: &'a [PostMetadata], state: &QueryState) -> Pagination<&'a PostMetadata> {
        apply_query(posts, state, DEFAULT_PAGE_SIZE, &SearchOptions::default())
    }

    #[test]
    fn test_home_view_first_page() {
        let posts = corpus();
        let page = apply(&posts, &QueryState::new());
        assert_eq!(12, page.items.len());
        assert_eq!(2, page.total_pages);
        assert_eq!(14, page.total_items);
        assert!(page.has_next_page);
        assert_eq!("post-14", page.items[0].id);
    }

    #[test]
    fn test_home_view_second_page() {
        let posts = corpus();
        let page = apply(&posts, &QueryState::new().with_page(2));
        assert_eq!(vec!["post-2", "post-1"], ids(&page));
        assert!(!page.has_next_page);
        assert!(page.has_previous_page);
    }

    #[test]
    fn test_tag_view() {
        let posts = corpus();
        let page = apply(&posts, &QueryState::new().with_tag(Some("linux")));
        assert_eq!(vec!["post-11", "post-7", "post-3"], ids(&page));
        assert_eq!(1, page.total_pages);
    }

    #[test]
    fn test_search_view_with_typo() {
        let posts = corpus();
        let page = apply(&posts, &QueryState::new().with_search("dokcer"));
        assert_eq!(vec!["post-5"], ids(&page));
    }

    #[test]
    fn test_search_view_no_results() {
        let posts = corpus();
        let page = apply(&posts, &QueryState::new().with_search("xylophone"));
        assert!(page.items.is_empty());
        assert_eq!(0, page.total_items);
        assert_eq!(1, page.total_pages);
    }

    #[test]
    fn test_tag_and_search_combined() {
        let posts = corpus();
        let state = QueryState::new()
            .with_tag(Some("linux"))
            .with_search("shell notes 7");
        let page = apply(&posts, &state);
        assert_eq!(Some(&"post-7"), ids(&page).first());
        assert!(page.items.iter().all(|p| p.has_tag("linux")));

        let state = QueryState::new()
            .with_tag(Some("garden"))
            .with_search("docker");
        assert!(apply(&posts, &state).items.is_empty());
    }

    #[test]
    fn test_state_reset_rule() {
        let state = QueryState::new().with_search("x").with_page(3);
        assert_eq!(3, state.page());

        let state = state.with_search("y");
        assert_eq!(1, state.page());
        assert_eq!("y", state.search());

        let state = state.with_page(2);
        assert_eq!("y", state.search());
        assert_eq!(2, state.page());

        let state = state.with_tag(Some("linux"));
        assert_eq!(1, state.page());
        assert_eq!("y", state.search());
    }

    #[test]
    fn test_with_empty_tag_clears_tag() {
        let state = QueryState::new().with_tag(Some("linux")).with_tag(Some(""));
        assert_eq!(None, state.tag());
    }

    #[test]
    fn test_to_href() {
        assert_eq!("/", QueryState::new().to_href());
        assert_eq!("/?page=2", QueryState::new().with_page(2).to_href());
        assert_eq!(
            "/?search=docker+basics&page=3",
            QueryState::new()
                .with_search(" docker basics ")
                .with_page(3)
                .to_href()
        );
        assert_eq!(
            "/tags/web%20dev",
            QueryState::new().with_tag(Some("web dev")).to_href()
        );
        assert_eq!(
            "/tags/c%2B%2B?search=a%26b",
            QueryState::new()
                .with_tag(Some("c++"))
                .with_search("a&b")
                .to_href()
        );
    }

    #[test]
    fn test_href_round_trip() {
        let states = vec![
            QueryState::new(),
            QueryState::new().with_page(7),
            QueryState::new().with_search("rust & friends"),
            QueryState::new().with_tag(Some("c++")).with_page(2),
            QueryState::new()
                .with_tag(Some("web dev/ops"))
                .with_search("100% déjà vu")
                .with_page(4),
        ];
        for state in states {
            assert_eq!(Some(state.clone()), QueryState::from_href(&state.to_href()));
        }
    }

    #[test]
    fn test_from_href_lenient() {
        let parse = |href| QueryState::from_href(href);
        assert_eq!(Some(QueryState::new()), parse(""));
        assert_eq!(Some(QueryState::new()), parse("/?page=abc"));
        assert_eq!(Some(QueryState::new()), parse("/?page=0"));
        assert_eq!(Some(QueryState::new()), parse("/?page=-4"));
        assert_eq!(Some(QueryState::new()), parse("/?utm_source=feed#top"));
        assert_eq!(
            Some(QueryState::new().with_search("go")),
            parse("/?search=+go+")
        );
        assert_eq!(
            Some(QueryState::new().with_tag(Some("linux")).with_page(2)),
            parse("/tags/linux/?page=2")
        );
        assert_eq!(None, parse("/posts/hello"));
        assert_eq!(None, parse("/tags/"));
        assert_eq!(None, parse("/tags/a/b"));
    }

    #[test]
    fn test_controller_clamps_page() {
        let posts = corpus();
        let mut controller = Controller::new(&posts, DEFAULT_PAGE_SIZE, SearchOptions::default());
        controller.go_to_page(9);
        let page = controller.view();
        assert_eq!(2, page.current_page);
        assert_eq!(2, controller.state().page());
        assert_eq!("/?page=2", controller.href());
    }

    #[test]
    fn test_controller_restore_reproduces_view() {
        let posts = corpus();
        let mut controller = Controller::new(&posts, 2, SearchOptions::default());
        controller.select_tag(Some("linux"));
        controller.go_to_page(2);
        let before = ids(&controller.view());
        let href = controller.href();
        assert_eq!("/tags/linux?page=2", href);

        let mut reloaded = Controller::new(&posts, 2, SearchOptions::default());
        assert!(reloaded.restore(&href));
        assert_eq!(before, ids(&reloaded.view()));
        assert_eq!(vec!["post-3"], before);
    }

    #[test]
    fn test_controller_restore_rejects_other_paths() {
        let posts = corpus();
        let mut controller = Controller::new(&posts, DEFAULT_PAGE_SIZE, SearchOptions::default());
        controller.submit_search("docker");
        assert!(!controller.restore("/posts/post-5"));
        assert_eq!("docker", controller.state().search());
    }
}
