//! Defines the [`Tag`] type, which pairs a post tag with the slug used for its
//! index pages on disk.

use std::hash::{Hash, Hasher};

/// A tag as it appears in post frontmatter, plus its slug. Tags are compared
/// by name; two tags that only differ in case are different tags, though they
/// share a slug.
#[derive(Clone, Debug)]
pub struct Tag {
    /// The tag exactly as written in the frontmatter.
    pub name: String,

    /// The tag slugified so it can be dropped into a path, e.g. `C++` becomes
    /// `c`. Falls back to `tag` for names with no sluggable characters.
    pub slug: String,
}

impl Tag {
    pub fn new(name: &str) -> Tag {
        let slug = slug::slugify(name);
        Tag {
            name: name.to_owned(),
            slug: if slug.is_empty() {
                String::from("tag")
            } else {
                slug
            },
        }
    }
}

/// Builds a [`Tag`] for each name, suffixing slugs (`-2`, `-3`, ...) where
/// distinct names would otherwise share one, so that every tag gets its own
/// index directory.
pub fn unique_tags(names: &[String]) -> Vec<Tag> {
    use std::collections::HashSet;

    let mut taken: HashSet<String> = HashSet::new();
    names
        .iter()
        .map(|name| {
            let mut tag = Tag::new(name);
            if !taken.insert(tag.slug.clone()) {
                let base = tag.slug.clone();
                let mut n = 2;
                while !taken.insert(format!("{}-{}", base, n)) {
                    n += 1;
                }
                tag.slug = format!("{}-{}", base, n);
            }
            tag
        })
        .collect()
}

impl Hash for Tag {
    /// Implements [`Hash`] for [`Tag`] by delegating directly to the `name`
    /// field.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl PartialEq for Tag {
    /// Implements [`PartialEq`] and [`Eq`] for [`Tag`] by delegating directly
    /// to the `name` field.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Tag {}
