//! Fuzzy search over post metadata.
//!
//! A [`SearchIndex`] is built from a collection of posts and matches queries
//! against three weighted fields: the title, the description, and the tags
//! (joined into one field). Each field is scored with [`crate::fuzzy::score`]
//! where 0 is an exact match and 1 is no match at all; a field counts as a
//! match when its score is within the index's threshold. A post's overall
//! score combines its matching fields so that more, heavier, and shorter
//! matching fields rank higher. Lower scores are better.
//!
//! The index is a pure function of the posts it was built from. It doesn't
//! observe the repository; build a new one whenever the collection changes.

use serde::Deserialize;

use crate::fuzzy;
use crate::post::PostMetadata;

/// Scores of exactly zero would zero out the whole product, erasing the
/// contribution of the other fields, so they are clamped to this.
const EPSILON: f64 = f64::EPSILON;

/// Tunes how permissive and how field-weighted searches are.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// The highest field score that still counts as a match, from 0.0 (exact
    /// matches only) to 1.0 (everything matches).
    pub threshold: f64,

    pub title_weight: f64,
    pub description_weight: f64,
    pub tags_weight: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            threshold: 0.3,
            title_weight: 0.4,
            description_weight: 0.3,
            tags_weight: 0.3,
        }
    }
}

impl SearchOptions {
    /// Returns the field weights scaled to sum to 1, in title, description,
    /// tags order. Negative weights count as zero; if every weight is zero the
    /// fields are weighted equally.
    fn normalized_weights(&self) -> [f64; 3] {
        let weights = [
            self.title_weight.max(0.0),
            self.description_weight.max(0.0),
            self.tags_weight.max(0.0),
        ];
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            [weights[0] / total, weights[1] / total, weights[2] / total]
        } else {
            [1.0 / 3.0; 3]
        }
    }
}

/// A searchable field, lowercased and split into characters up front.
struct Field {
    text: Vec<char>,

    /// `1/sqrt(token count)`, so that a match in a short field weighs more
    /// than the same match in a long one.
    norm: f64,
}

impl Field {
    fn new(text: &str) -> Field {
        let tokens = text.split_whitespace().count().max(1);
        Field {
            text: text.to_lowercase().chars().collect(),
            norm: 1.0 / (tokens as f64).sqrt(),
        }
    }
}

struct Entry<'a> {
    post: &'a PostMetadata,
    fields: [Field; 3],
}

/// A weighted fuzzy index over a collection of posts.
pub struct SearchIndex<'a> {
    threshold: f64,
    weights: [f64; 3],
    entries: Vec<Entry<'a>>,
}

/// A post that matched a query, with its score.
#[derive(Clone, Debug, PartialEq)]
pub struct Hit<'a> {
    pub post: &'a PostMetadata,
    pub score: f64,
}

/// The outcome of [`SearchIndex::search`]. A blank query doesn't filter at
/// all, which is a different thing from a query that matches nothing.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchResults<'a> {
    /// The query was blank; every indexed post in its original order, with
    /// no scores.
    Unfiltered(Vec<&'a PostMetadata>),

    /// The posts matching a non-blank query, best match first. Posts with
    /// equal scores keep their original order. Empty when nothing matched.
    Ranked(Vec<Hit<'a>>),
}

impl<'a> SearchResults<'a> {
    /// Drops the scores, leaving the posts in result order.
    pub fn into_posts(self) -> Vec<&'a PostMetadata> {
        match self {
            SearchResults::Unfiltered(posts) => posts,
            SearchResults::Ranked(hits) => {
                hits.into_iter().map(|hit| hit.post).collect()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SearchResults::Unfiltered(posts) => posts.len(),
            SearchResults::Ranked(hits) => hits.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> SearchIndex<'a> {
    /// Builds an index over `posts`, preserving their order for tie-breaks.
    pub fn build<I>(posts: I, options: &SearchOptions) -> SearchIndex<'a>
    where
        I: IntoIterator<Item = &'a PostMetadata>,
    {
        SearchIndex {
            threshold: options.threshold,
            weights: options.normalized_weights(),
            entries: posts
                .into_iter()
                .map(|post| Entry {
                    post,
                    fields: [
                        Field::new(&post.title),
                        Field::new(&post.description),
                        Field::new(&post.tags.join(" ")),
                    ],
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Searches the index. See [`SearchResults`] for how blank queries are
    /// treated.
    pub fn search(&self, query: &str) -> SearchResults<'a> {
        let query = query.trim();
        if query.is_empty() {
            return SearchResults::Unfiltered(
                self.entries.iter().map(|entry| entry.post).collect(),
            );
        }

        let pattern: Vec<char> = query.to_lowercase().chars().collect();
        let mut hits: Vec<Hit<'a>> = self
            .entries
            .iter()
            .filter_map(|entry| {
                self.score(&pattern, entry).map(|score| Hit {
                    post: entry.post,
                    score,
                })
            })
            .collect();

        // `sort_by` is stable, which gives ties their original order.
        hits.sort_by(|a, b| a.score.total_cmp(&b.score));
        SearchResults::Ranked(hits)
    }

    /// Scores one entry, or returns `None` if no field matched.
    fn score(&self, pattern: &[char], entry: &Entry) -> Option<f64> {
        let mut total = 1.0;
        let mut matched = false;
        for (field, weight) in entry.fields.iter().zip(self.weights.iter()) {
            if field.text.is_empty() || *weight == 0.0 {
                continue;
            }
            let score = fuzzy::score(pattern, &field.text);
            if score <= self.threshold {
                matched = true;
                total *= score.max(EPSILON).powf(weight * field.norm);
            }
        }
        if matched {
            Some(total)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::post::PostDate;

    fn post(id: &str, title: &str, description: &str, tags: &[&str]) -> PostMetadata {
        PostMetadata {
            id: id.to_owned(),
            title: title.to_owned(),
            date: PostDate::new("2024-01-01"),
            description: description.to_owned(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            image: String::new(),
        }
    }

    fn corpus() -> Vec<PostMetadata> {
        vec![
            post(
                "gardening",
                "Gardening for Beginners",
                "Growing tomatoes at home",
                &["garden"],
            ),
            post(
                "docker-basics",
                "Docker Basics",
                "Containers, images and volumes",
                &["devops"],
            ),
            post(
                "kubernetes",
                "Kubernetes in Production",
                "Running docker containers at scale",
                &["devops", "k8s"],
            ),
            post("linux", "Linux Tips", "Shell tricks", &["linux"]),
        ]
    }

    fn ids<'a>(results: SearchResults<'a>) -> Vec<&'a str> {
        results
            .into_posts()
            .into_iter()
            .map(|p| p.id.as_str())
            .collect()
    }

    #[test]
    fn test_blank_query_passthrough() {
        let posts = corpus();
        let index = SearchIndex::build(&posts, &SearchOptions::default());
        for query in &["", "   ", "\t\n"] {
            let results = index.search(query);
            assert!(matches!(results, SearchResults::Unfiltered(_)));
            assert_eq!(
                vec!["gardening", "docker-basics", "kubernetes", "linux"],
                ids(results)
            );
        }
    }

    #[test]
    fn test_no_match_is_empty_ranked() {
        let posts = corpus();
        let index = SearchIndex::build(&posts, &SearchOptions::default());
        let results = index.search("xylophone");
        assert_eq!(SearchResults::Ranked(Vec::new()), results);
        assert!(results.is_empty());
    }

    #[test]
    fn test_typo_ranks_matching_title_first() {
        let posts = corpus();
        let index = SearchIndex::build(&posts, &SearchOptions::default());
        let results = index.search("dokcer");
        let ranked = ids(results);
        assert_eq!(Some(&"docker-basics"), ranked.first());
        assert!(!ranked.contains(&"gardening"));
    }

    #[test]
    fn test_title_outweighs_description() {
        let posts = corpus();
        let index = SearchIndex::build(&posts, &SearchOptions::default());
        assert_eq!(
            vec!["docker-basics", "kubernetes"],
            ids(index.search("docker"))
        );
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let posts = corpus();
        let index = SearchIndex::build(&posts, &SearchOptions::default());
        assert_eq!(vec!["linux"], ids(index.search("LINUX TIPS")));
    }

    #[test]
    fn test_tags_field_matches() {
        let posts = corpus();
        let index = SearchIndex::build(&posts, &SearchOptions::default());
        assert_eq!(vec!["kubernetes"], ids(index.search("k8s")));
    }

    #[test]
    fn test_equal_scores_keep_input_order() {
        let posts = vec![
            post("first", "Same", "", &[]),
            post("second", "Same", "", &[]),
            post("third", "Same", "", &[]),
        ];
        let index = SearchIndex::build(&posts, &SearchOptions::default());
        assert_eq!(vec!["first", "second", "third"], ids(index.search("same")));
    }

    #[test]
    fn test_threshold_controls_permissiveness() {
        let posts = corpus();
        let strict = SearchOptions {
            threshold: 0.0,
            ..SearchOptions::default()
        };
        let index = SearchIndex::build(&posts, &strict);
        assert!(index.search("dokcer").is_empty());
        assert_eq!(
            vec!["docker-basics", "kubernetes"],
            ids(index.search("docker"))
        );
    }

    #[test]
    fn test_scores_ascending() {
        let posts = corpus();
        let index = SearchIndex::build(&posts, &SearchOptions::default());
        match index.search("devops") {
            SearchResults::Ranked(hits) => {
                assert_eq!(2, hits.len());
                assert!(hits.windows(2).all(|w| w[0].score <= w[1].score));
            }
            SearchResults::Unfiltered(_) => panic!("expected ranked results"),
        }
    }

    #[test]
    fn test_build_over_subset() {
        let posts = corpus();
        let subset: Vec<&PostMetadata> = posts.iter().filter(|p| p.has_tag("devops")).collect();
        let index = SearchIndex::build(subset, &SearchOptions::default());
        assert_eq!(2, index.len());
        assert_eq!(vec!["kubernetes"], ids(index.search("production")));
    }

    #[test]
    fn test_normalized_weights() {
        let options = SearchOptions {
            title_weight: 2.0,
            description_weight: 1.0,
            tags_weight: 1.0,
            ..SearchOptions::default()
        };
        assert_eq!([0.5, 0.25, 0.25], options.normalized_weights());

        let zero = SearchOptions {
            title_weight: 0.0,
            description_weight: 0.0,
            tags_weight: 0.0,
            ..SearchOptions::default()
        };
        assert_eq!([1.0 / 3.0; 3], zero.normalized_weights());
    }
}
