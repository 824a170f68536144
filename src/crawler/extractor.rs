//! Page extraction: raw HTML to structured fields
//!
//! Extraction is a pure function of the page body, its URL, and the site
//! classifier. It never touches the network and never fails: a page with
//! degraded or missing markup yields whatever could be found, with absent
//! metadata fields reported as `None` rather than aborting the page.

use crate::record::StoryMetadata;
use crate::url::{Classifier, PageKind};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Content fragments shorter than this are markup noise, not story text
const MIN_FRAGMENT_CHARS: usize = 10;

static TITLE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[–-]\s*\w+\s+в\s+рассказах.*$").expect("static regex"));
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\s+\w+\s+\d{4}").expect("static regex"));
static AUTHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Автор[:\s]+([^\n,]+)").expect("static regex"));
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("static regex"));

/// Structured fields extracted from one fetched page
#[derive(Debug, Clone)]
pub enum ExtractedPage {
    /// Category links discovered on the site root
    CategoryRoot { category_links: Vec<Url> },

    /// First-page story links and pagination links from a category listing
    CategoryPage {
        story_links: Vec<Url>,
        pagination_links: Vec<Url>,
    },

    /// One page of a story
    StoryPage(StoryPageContent),

    /// Unclassifiable page; the controller drops it
    Ignored,
}

/// Extracted content of a single story page
#[derive(Debug, Clone)]
pub struct StoryPageContent {
    /// Text fragments of the content region, in document order
    pub fragments: Vec<String>,

    /// Metadata candidates; present only on the first page of a story
    pub metadata: Option<StoryMetadata>,

    /// URL of the next page of the same story, if one exists
    pub next_page: Option<Url>,
}

impl StoryPageContent {
    /// The page's content as one fragment-joined block
    pub fn content(&self) -> String {
        self.fragments.join("\n\n")
    }
}

/// Extracts the structured fields of a fetched page according to its kind.
///
/// Deterministic and side-effect free.
///
/// # Arguments
///
/// * `kind` - The page's classification, decided once at dispatch
/// * `html` - Raw page body
/// * `page_url` - URL the page was fetched from; base for relative links
/// * `classifier` - Site classifier used to filter extracted links
///
/// # Returns
///
/// * `ExtractedPage` - The fields relevant to the page's kind; degraded
///   markup yields partial results, never an error
pub fn extract(kind: PageKind, html: &str, page_url: &Url, classifier: &Classifier) -> ExtractedPage {
    let document = Html::parse_document(html);

    match kind {
        PageKind::CategoryRoot => ExtractedPage::CategoryRoot {
            category_links: extract_category_links(&document, page_url, classifier),
        },
        PageKind::CategoryPage => {
            let (story_links, pagination_links) =
                extract_listing_links(&document, page_url, classifier);
            ExtractedPage::CategoryPage {
                story_links,
                pagination_links,
            }
        }
        PageKind::StoryPage => ExtractedPage::StoryPage(extract_story_page(
            &document, page_url, classifier,
        )),
        PageKind::Unknown => ExtractedPage::Ignored,
    }
}

/// Category links on the root page: `a.hud` anchors whose resolved target
/// has the category-page shape under the crawl root. Foreign and malformed
/// links are silently dropped.
fn extract_category_links(document: &Html, base: &Url, classifier: &Classifier) -> Vec<Url> {
    let mut links = Vec::new();
    if let Ok(selector) = Selector::parse("a.hud[href]") {
        for element in document.select(&selector) {
            if let Some(url) = resolve_href(element, base) {
                if classifier.classify(&url) == PageKind::CategoryPage && !links.contains(&url) {
                    links.push(url);
                }
            }
        }
    }
    links
}

/// Story and pagination links on a category listing.
///
/// Story links are restricted to first-page URLs; continuation pages are
/// reached only through a story's own next-page links. Pagination covers
/// both numbered `page-N.html` anchors and the "older" (`rel=prev`) link,
/// which both resolve to category-page URLs.
fn extract_listing_links(
    document: &Html,
    base: &Url,
    classifier: &Classifier,
) -> (Vec<Url>, Vec<Url>) {
    let mut story_links = Vec::new();
    let mut pagination_links = Vec::new();

    if let Ok(selector) = Selector::parse("a.hud[href]") {
        for element in document.select(&selector) {
            if let Some(url) = resolve_href(element, base) {
                let is_first = classifier
                    .story_page(&url)
                    .map(|page| page.is_first_page())
                    .unwrap_or(false);
                if is_first && !story_links.contains(&url) {
                    story_links.push(url);
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("a.but[href]") {
        for element in document.select(&selector) {
            if let Some(url) = resolve_href(element, base) {
                if classifier.classify(&url) == PageKind::CategoryPage
                    && !pagination_links.contains(&url)
                {
                    pagination_links.push(url);
                }
            }
        }
    }

    (story_links, pagination_links)
}

/// Content fragments, next-page link, and (page 1 only) metadata
fn extract_story_page(document: &Html, page_url: &Url, classifier: &Classifier) -> StoryPageContent {
    let fragments = extract_fragments(document);
    if fragments.is_empty() {
        tracing::warn!("No content region found on {}", page_url);
    }

    let is_first_page = classifier
        .story_page(page_url)
        .map(|page| page.is_first_page())
        .unwrap_or(false);
    let metadata = is_first_page.then(|| extract_metadata(document));

    let next_page = extract_next_page_link(document, page_url, classifier);

    StoryPageContent {
        fragments,
        metadata,
        next_page,
    }
}

/// Text fragments of the `div#rsz` content region, short noise dropped
fn extract_fragments(document: &Html) -> Vec<String> {
    let mut fragments = Vec::new();
    if let Ok(selector) = Selector::parse("div#rsz") {
        for region in document.select(&selector) {
            for text in region.text() {
                let cleaned = clean_text(text);
                if cleaned.chars().count() > MIN_FRAGMENT_CHARS {
                    fragments.push(cleaned);
                }
            }
        }
    }
    fragments
}

/// The next page of the same story: an `a.but` anchor labeled "Далее",
/// falling back to `link[rel=next]`. Only same-story targets count.
fn extract_next_page_link(document: &Html, page_url: &Url, classifier: &Classifier) -> Option<Url> {
    let current = classifier.story_page(page_url)?;

    let mut candidate = None;
    if let Ok(selector) = Selector::parse("a.but[href]") {
        for element in document.select(&selector) {
            let label: String = element.text().collect();
            if label.contains("Далее") {
                candidate = resolve_href(element, page_url);
                break;
            }
        }
    }

    if candidate.is_none() {
        if let Ok(selector) = Selector::parse("link[rel='next'][href]") {
            candidate = document
                .select(&selector)
                .next()
                .and_then(|element| resolve_href(element, page_url));
        }
    }

    candidate.filter(|url| {
        classifier
            .story_page(url)
            .map(|page| page.id == current.id)
            .unwrap_or(false)
    })
}

/// Best-effort metadata extraction from the first page of a story.
///
/// Each field degrades to absent when its markup is missing or unexpected.
fn extract_metadata(document: &Html) -> StoryMetadata {
    let mut metadata = StoryMetadata {
        title: extract_title(document),
        ..Default::default()
    };

    if let Ok(selector) = Selector::parse("div.p[style*='border-bottom']") {
        if let Some(breadcrumb) = document.select(&selector).next() {
            metadata.category = extract_category(breadcrumb);
            metadata.tags = extract_tags(breadcrumb);
        }
    }

    metadata.publish_date = extract_publish_date(document);

    // Free-text fields live outside any stable element; scan text nodes
    let all_text: Vec<&str> = document.root_element().text().collect();
    metadata.author = extract_author(&all_text);
    metadata.rating = extract_labeled_number(&all_text, &["Рейтинг", "рейтинг"]);
    metadata.views = extract_labeled_number(&all_text, &["Просмотр", "просмотр"])
        .map(|views| views as u64);

    metadata
}

/// Title from `<h1>`, falling back to `<title>` with the site suffix trimmed
fn extract_title(document: &Html) -> Option<String> {
    for tag in ["h1", "title"] {
        if let Ok(selector) = Selector::parse(tag) {
            if let Some(element) = document.select(&selector).next() {
                let raw: String = element.text().collect();
                let trimmed = TITLE_SUFFIX_RE.replace(raw.trim(), "").trim().to_string();
                if !trimmed.is_empty() {
                    return Some(trimmed);
                }
            }
        }
    }
    None
}

/// Category is the second breadcrumb anchor (root link comes first)
fn extract_category(breadcrumb: ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse("a").ok()?;
    let links: Vec<String> = breadcrumb
        .select(&selector)
        .map(|a| clean_text(&a.text().collect::<String>()))
        .collect();
    links.get(1).filter(|s| !s.is_empty()).cloned()
}

/// Tags follow a `+` in the breadcrumb's own text, comma-separated
fn extract_tags(breadcrumb: ElementRef<'_>) -> Vec<String> {
    let mut tags = Vec::new();
    for text in breadcrumb.text() {
        if let Some((_, tail)) = text.split_once('+') {
            for tag in tail.split(',') {
                let cleaned = clean_text(tag);
                if cleaned.chars().count() > 2 && cleaned != "в" && !tags.contains(&cleaned) {
                    tags.push(cleaned);
                }
            }
        }
    }
    tags
}

/// Publish date: the first `<b>` text of shape "D month YYYY"
fn extract_publish_date(document: &Html) -> Option<String> {
    let selector = Selector::parse("div.p b").ok()?;
    for element in document.select(&selector) {
        let text = clean_text(&element.text().collect::<String>());
        if DATE_RE.is_match(&text) {
            return Some(text);
        }
    }
    None
}

/// Author from the first text node containing "Автор: …"
fn extract_author(texts: &[&str]) -> Option<String> {
    for text in texts {
        if let Some(captures) = AUTHOR_RE.captures(text) {
            let author = clean_text(&captures[1]);
            if !author.is_empty() {
                return Some(author);
            }
        }
    }
    None
}

/// First number following one of the labels in any text node
fn extract_labeled_number(texts: &[&str], labels: &[&str]) -> Option<f64> {
    for text in texts {
        for label in labels {
            if let Some(position) = text.find(label) {
                if let Some(found) = NUMBER_RE.find(&text[position + label.len()..]) {
                    return found.as_str().parse().ok();
                }
            }
        }
    }
    None
}

/// Resolves an element's href against the page URL, dropping special
/// schemes, fragments, and anything that is not http(s)
fn resolve_href(element: ElementRef<'_>, base: &Url) -> Option<Url> {
    let href = element.value().attr("href")?.trim();

    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("data:")
    {
        return None;
    }

    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// Trims and replaces non-breaking spaces
fn clean_text(text: &str) -> String {
    text.replace('\u{a0}', " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new("https://stories.example/ru/2/").unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_category_root_extraction() {
        let html = r#"<html><body>
            <a class="hud" href="/ru/2/drama/">Drama</a>
            <a class="hud" href="/ru/2/izmena/">Izmena</a>
            <a class="hud" href="https://other.example/ru/2/spam/">Foreign</a>
            <a class="hud" href="/about.html">About</a>
            <a href="/ru/2/plain/">No class</a>
        </body></html>"#;

        let extracted = extract(
            PageKind::CategoryRoot,
            html,
            &url("https://stories.example/ru/2/"),
            &classifier(),
        );

        match extracted {
            ExtractedPage::CategoryRoot { category_links } => {
                let paths: Vec<&str> = category_links.iter().map(|u| u.path()).collect();
                assert_eq!(paths, vec!["/ru/2/drama/", "/ru/2/izmena/"]);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_category_page_extraction() {
        let html = r#"<html><body>
            <a class="hud" href="chitat_first-story_1.html">First story</a>
            <a class="hud" href="chitat_other-story_2.html">Continuation, not first</a>
            <a class="hud" href="chitat_first-story_1.html">Duplicate listing</a>
            <a class="but" href="page-340.html">340</a>
            <a class="but" rel="prev" href="page-339.html">Старые &gt;&gt;</a>
        </body></html>"#;

        let extracted = extract(
            PageKind::CategoryPage,
            html,
            &url("https://stories.example/ru/2/drama/"),
            &classifier(),
        );

        match extracted {
            ExtractedPage::CategoryPage {
                story_links,
                pagination_links,
            } => {
                assert_eq!(story_links.len(), 1);
                assert!(story_links[0].path().ends_with("chitat_first-story_1.html"));
                assert_eq!(pagination_links.len(), 2);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_story_page_fragments_and_next() {
        let html = r#"<html><body>
            <div id="rsz">
                <p>This is a long enough first fragment.</p>
                <p>short</p>
                <p>And here comes the second usable fragment.</p>
            </div>
            <a class="but" href="chitat_tale_2.html">Далее</a>
        </body></html>"#;

        let extracted = extract(
            PageKind::StoryPage,
            html,
            &url("https://stories.example/ru/2/drama/chitat_tale_1.html"),
            &classifier(),
        );

        let content = match extracted {
            ExtractedPage::StoryPage(content) => content,
            other => panic!("wrong variant: {:?}", other),
        };

        assert_eq!(content.fragments.len(), 2);
        assert!(content.fragments[0].starts_with("This is"));
        let next = content.next_page.expect("should find next link");
        assert!(next.path().ends_with("chitat_tale_2.html"));
    }

    #[test]
    fn test_story_page_rel_next_fallback() {
        let html = r#"<html><head>
            <link rel="next" href="chitat_tale_2.html">
        </head><body>
            <div id="rsz"><p>Long enough content fragment here.</p></div>
        </body></html>"#;

        let extracted = extract(
            PageKind::StoryPage,
            html,
            &url("https://stories.example/ru/2/drama/chitat_tale_1.html"),
            &classifier(),
        );

        match extracted {
            ExtractedPage::StoryPage(content) => {
                assert!(content.next_page.is_some());
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_next_link_to_other_story_rejected() {
        let html = r#"<html><body>
            <div id="rsz"><p>Long enough content fragment here.</p></div>
            <a class="but" href="chitat_different_2.html">Далее</a>
        </body></html>"#;

        let extracted = extract(
            PageKind::StoryPage,
            html,
            &url("https://stories.example/ru/2/drama/chitat_tale_1.html"),
            &classifier(),
        );

        match extracted {
            ExtractedPage::StoryPage(content) => assert!(content.next_page.is_none()),
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_metadata_on_first_page() {
        let html = r#"<html><head><title>Сказка – что-то в рассказах на сайте</title></head><body>
            <h1>Сказка</h1>
            <div class="p" style="border-bottom: 1px">
                <a href="/ru/2/">Рассказы</a><a href="/ru/2/drama/">Драма</a>
                + первая, вторая метка
            </div>
            <div class="p"><b>3 мая 2023</b></div>
            <div id="rsz"><p>Story text long enough to keep around.</p></div>
            <div class="p">Автор: Иван Петров</div>
            <div class="p">Рейтинг: 4.5</div>
            <div class="p">Просмотров: 1200</div>
        </body></html>"#;

        let extracted = extract(
            PageKind::StoryPage,
            html,
            &url("https://stories.example/ru/2/drama/chitat_tale_1.html"),
            &classifier(),
        );

        let metadata = match extracted {
            ExtractedPage::StoryPage(content) => content.metadata.expect("page 1 has metadata"),
            other => panic!("wrong variant: {:?}", other),
        };

        assert_eq!(metadata.title.as_deref(), Some("Сказка"));
        assert_eq!(metadata.category.as_deref(), Some("Драма"));
        assert_eq!(
            metadata.tags,
            vec!["первая".to_string(), "вторая метка".to_string()]
        );
        assert_eq!(metadata.publish_date.as_deref(), Some("3 мая 2023"));
        assert_eq!(metadata.author.as_deref(), Some("Иван Петров"));
        assert_eq!(metadata.rating, Some(4.5));
        assert_eq!(metadata.views, Some(1200));
    }

    #[test]
    fn test_no_metadata_on_continuation_page() {
        let html = r#"<html><body>
            <h1>Сказка</h1>
            <div id="rsz"><p>Continuation text long enough to keep.</p></div>
        </body></html>"#;

        let extracted = extract(
            PageKind::StoryPage,
            html,
            &url("https://stories.example/ru/2/drama/chitat_tale_2.html"),
            &classifier(),
        );

        match extracted {
            ExtractedPage::StoryPage(content) => assert!(content.metadata.is_none()),
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_degraded_markup_yields_partial_metadata() {
        let html = r#"<html><body>
            <div id="rsz"><p>Only content, no metadata markup at all.</p></div>
        </body></html>"#;

        let extracted = extract(
            PageKind::StoryPage,
            html,
            &url("https://stories.example/ru/2/drama/chitat_tale_1.html"),
            &classifier(),
        );

        let metadata = match extracted {
            ExtractedPage::StoryPage(content) => content.metadata.expect("page 1 has metadata"),
            other => panic!("wrong variant: {:?}", other),
        };

        assert!(metadata.title.is_none());
        assert!(metadata.category.is_none());
        assert!(metadata.tags.is_empty());
        assert!(metadata.author.is_none());
    }

    #[test]
    fn test_unknown_kind_ignored() {
        let extracted = extract(
            PageKind::Unknown,
            "<html></html>",
            &url("https://stories.example/whatever"),
            &classifier(),
        );
        assert!(matches!(extracted, ExtractedPage::Ignored));
    }
}
