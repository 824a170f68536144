//! URL classification and story identity
//!
//! Every fetched URL is classified exactly once into one of four kinds;
//! `Unknown` URLs are ignored by the controller rather than falling through
//! into traversal logic. Story-page URLs additionally carry a logical story
//! identity: the slug with the page-number suffix stripped, so that all pages
//! of one multi-page story key the same accumulation state regardless of
//! arrival order.

use crate::UrlError;
use std::fmt;
use url::Url;

/// Filename prefix of story pages, e.g. `chitat_my-story_1.html`
const STORY_PREFIX: &str = "chitat_";
const STORY_SUFFIX: &str = ".html";

/// The role a URL plays in the crawl traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// The configured site root listing category links
    CategoryRoot,

    /// A category listing page (including its pagination pages)
    CategoryPage,

    /// One page of a story
    StoryPage,

    /// Anything else; never fetched
    Unknown,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CategoryRoot => "category-root",
            Self::CategoryPage => "category-page",
            Self::StoryPage => "story-page",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Logical identity of a story, shared by all of its pages.
///
/// Derived deterministically from a story-page URL; stable across retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoryId(String);

impl StoryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a page within its story, ordered by the URL's numeric
/// suffix.
///
/// A plain suffix `_3.html` sorts as `(3, 0)`; a range suffix `_3-2.html`
/// sorts as `(3, 2)`, after the plain page 3 and before page 4. Keeping
/// both numbers distinct means a range-suffix continuation page never
/// collides with the plain page sharing its leading number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageSequence(u32, u32);

impl PageSequence {
    /// A plain page suffix like `_3.html`
    pub fn page(number: u32) -> Self {
        Self(number, 0)
    }

    /// A range page suffix like `_3-2.html`
    pub fn range(number: u32, sub: u32) -> Self {
        Self(number, sub)
    }

    /// True only for the plain `_1.html` suffix; range suffixes are
    /// continuation pages reached through next-page links.
    pub fn is_first(&self) -> bool {
        *self == Self(1, 0)
    }
}

impl fmt::Display for PageSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.1 == 0 {
            write!(f, "{}", self.0)
        } else {
            write!(f, "{}-{}", self.0, self.1)
        }
    }
}

/// A story-page URL decomposed into identity and page position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryPageRef {
    pub id: StoryId,
    pub sequence: PageSequence,
}

impl StoryPageRef {
    /// True if this URL names the first page of its story
    pub fn is_first_page(&self) -> bool {
        self.sequence.is_first()
    }
}

/// Classifies URLs relative to one configured site root
#[derive(Debug, Clone)]
pub struct Classifier {
    root: Url,
}

impl Classifier {
    /// Creates a classifier for the given crawl root.
    ///
    /// The root must be an absolute http(s) URL with a host and a
    /// directory-style path (trailing slash is added if missing).
    pub fn new(root: &str) -> Result<Self, UrlError> {
        let mut root = Url::parse(root).map_err(|e| UrlError::Parse(e.to_string()))?;

        match root.scheme() {
            "http" | "https" => {}
            other => return Err(UrlError::InvalidScheme(other.to_string())),
        }
        if root.host_str().is_none() {
            return Err(UrlError::MissingHost);
        }

        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        root.set_query(None);
        root.set_fragment(None);

        Ok(Self { root })
    }

    /// The crawl root URL
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Classifies a URL into its traversal role.
    ///
    /// Foreign hosts and URLs outside the root subtree are `Unknown`.
    pub fn classify(&self, url: &Url) -> PageKind {
        if url.host_str() != self.root.host_str() {
            return PageKind::Unknown;
        }

        if parse_story_filename(url).is_some() {
            return PageKind::StoryPage;
        }

        let path = url.path();
        let root_path = self.root.path();
        if path == root_path {
            return PageKind::CategoryRoot;
        }

        if let Some(rest) = path.strip_prefix(root_path) {
            // Category index: exactly one extra segment, directory-style.
            // Pagination: .../<category>/page-N.html
            let segments: Vec<&str> = rest.split('/').collect();
            match segments.as_slice() {
                [name, ""] if !name.is_empty() => return PageKind::CategoryPage,
                [_name, page] if is_pagination_file(page) => return PageKind::CategoryPage,
                _ => {}
            }
        }

        PageKind::Unknown
    }

    /// Decomposes a story-page URL into its identity and page number.
    ///
    /// Returns `None` for URLs that are not story pages on the crawl host.
    pub fn story_page(&self, url: &Url) -> Option<StoryPageRef> {
        if url.host_str() != self.root.host_str() {
            return None;
        }
        parse_story_filename(url)
    }
}

/// True for category pagination files like `page-341.html`
fn is_pagination_file(segment: &str) -> bool {
    segment
        .strip_prefix("page-")
        .and_then(|rest| rest.strip_suffix(STORY_SUFFIX))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Parses a story filename of shape `chitat_<slug>_<n>.html` or
/// `chitat_<slug>_<n>-<m>.html` into identity and page position.
fn parse_story_filename(url: &Url) -> Option<StoryPageRef> {
    let filename = url.path_segments()?.last()?;
    let middle = filename
        .strip_prefix(STORY_PREFIX)?
        .strip_suffix(STORY_SUFFIX)?;

    let (slug, suffix) = middle.rsplit_once('_')?;
    if slug.is_empty() {
        return None;
    }

    let sequence = match suffix.split_once('-') {
        Some((first, rest)) => {
            PageSequence::range(parse_page_part(first)?, parse_page_part(rest)?)
        }
        None => PageSequence::page(parse_page_part(suffix)?),
    };

    Some(StoryPageRef {
        id: StoryId(slug.to_string()),
        sequence,
    })
}

fn parse_page_part(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new("https://stories.example/ru/2/").unwrap()
    }

    fn parse(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_scheme() {
        let result = Classifier::new("ftp://stories.example/ru/2/");
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_new_adds_trailing_slash() {
        let c = Classifier::new("https://stories.example/ru/2").unwrap();
        assert_eq!(c.root().path(), "/ru/2/");
    }

    #[test]
    fn test_classify_root() {
        let c = classifier();
        assert_eq!(
            c.classify(&parse("https://stories.example/ru/2/")),
            PageKind::CategoryRoot
        );
    }

    #[test]
    fn test_classify_category() {
        let c = classifier();
        assert_eq!(
            c.classify(&parse("https://stories.example/ru/2/drama/")),
            PageKind::CategoryPage
        );
    }

    #[test]
    fn test_classify_category_pagination() {
        let c = classifier();
        assert_eq!(
            c.classify(&parse("https://stories.example/ru/2/drama/page-341.html")),
            PageKind::CategoryPage
        );
    }

    #[test]
    fn test_classify_story_page() {
        let c = classifier();
        assert_eq!(
            c.classify(&parse(
                "https://stories.example/ru/2/drama/chitat_my-story_1.html"
            )),
            PageKind::StoryPage
        );
    }

    #[test]
    fn test_classify_foreign_host() {
        let c = classifier();
        assert_eq!(
            c.classify(&parse("https://other.example/ru/2/drama/")),
            PageKind::Unknown
        );
    }

    #[test]
    fn test_classify_outside_root() {
        let c = classifier();
        assert_eq!(
            c.classify(&parse("https://stories.example/about.html")),
            PageKind::Unknown
        );
        assert_eq!(
            c.classify(&parse("https://stories.example/ru/2/drama/extra/deep/")),
            PageKind::Unknown
        );
    }

    #[test]
    fn test_story_identity_stable_across_pages() {
        let c = classifier();
        let p1 = c
            .story_page(&parse(
                "https://stories.example/ru/2/drama/chitat_my-story_1.html"
            ))
            .unwrap();
        let p2 = c
            .story_page(&parse(
                "https://stories.example/ru/2/drama/chitat_my-story_2.html"
            ))
            .unwrap();

        assert_eq!(p1.id, p2.id);
        assert_eq!(p1.id.as_str(), "my-story");
        assert_eq!(p1.sequence, PageSequence::page(1));
        assert_eq!(p2.sequence, PageSequence::page(2));
    }

    #[test]
    fn test_story_range_suffix() {
        let c = classifier();
        let p = c
            .story_page(&parse(
                "https://stories.example/ru/2/drama/chitat_my-story_1-2.html"
            ))
            .unwrap();

        assert_eq!(p.id.as_str(), "my-story");
        assert_eq!(p.sequence, PageSequence::range(1, 2));
        assert!(!p.is_first_page());
        // Distinct from the plain page 1 and ordered between pages 1 and 2
        assert_ne!(p.sequence, PageSequence::page(1));
        assert!(PageSequence::page(1) < p.sequence);
        assert!(p.sequence < PageSequence::page(2));
    }

    #[test]
    fn test_first_page_detection() {
        let c = classifier();
        let first = c
            .story_page(&parse(
                "https://stories.example/ru/2/drama/chitat_s_1.html"
            ))
            .unwrap();
        let third = c
            .story_page(&parse(
                "https://stories.example/ru/2/drama/chitat_s_3.html"
            ))
            .unwrap();

        assert!(first.is_first_page());
        assert!(!third.is_first_page());
    }

    #[test]
    fn test_story_slug_with_underscores() {
        // Only the final _<n> is the page suffix
        let c = classifier();
        let p = c
            .story_page(&parse(
                "https://stories.example/ru/2/drama/chitat_long_slug_name_2.html"
            ))
            .unwrap();
        assert_eq!(p.id.as_str(), "long_slug_name");
        assert_eq!(p.sequence, PageSequence::page(2));
    }

    #[test]
    fn test_not_a_story_filename() {
        let c = classifier();
        assert!(c
            .story_page(&parse("https://stories.example/ru/2/drama/page-3.html"))
            .is_none());
        assert!(c
            .story_page(&parse("https://stories.example/ru/2/drama/chitat_.html"))
            .is_none());
        assert!(c
            .story_page(&parse(
                "https://stories.example/ru/2/drama/chitat_story_x.html"
            ))
            .is_none());
    }
}
