use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{Affordance, PageFetcher, RenderError, Renderer};

static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static BUTTONS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"button, [role="button"]"#).unwrap());
static ANCHORS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static NEXT_PAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"link[rel~="next"], a[rel~="next"]"#).unwrap());

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul", "button",
    "td", "th",
];

struct Document {
    url: Url,
    html: String,
}

/// Session state: the entry document plus everything appended by "load more" or
/// next-page follows, oldest first.
struct Session {
    documents: Vec<Document>,
    loaded: HashSet<String>,
}

impl Session {
    fn latest(&self) -> Result<&Document, RenderError> {
        self.documents.last().ok_or(RenderError::NoPage)
    }

    fn append(&mut self, url: Url, html: String) {
        self.loaded.insert(url.to_string());
        self.documents.push(Document { url, html });
    }
}

/// A [`Renderer`] over static HTML snapshots.
///
/// There is no live DOM: scrolling follows the page's `rel="next"` link when it
/// has one, and clicking an affordance loads the URL it points at. Either way
/// the new document is appended to the session so harvested links accumulate
/// the way they would under infinite scroll.
pub struct SnapshotRenderer<F> {
    fetcher: F,
    fetch_timeout: Duration,
    session: Option<Session>,
}

impl<F: PageFetcher> SnapshotRenderer<F> {
    /// `fetch_timeout` bounds loads triggered by scroll and click.
    pub fn new(fetcher: F, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            fetch_timeout,
            session: None,
        }
    }

    fn session(&self) -> Result<&Session, RenderError> {
        self.session.as_ref().ok_or(RenderError::NoPage)
    }

    async fn load(&self, url: &Url, timeout: Duration) -> Result<String, RenderError> {
        match tokio::time::timeout(timeout, self.fetcher.fetch(url.as_str())).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout {
                url: url.to_string(),
                after: timeout,
            }),
        }
    }

    async fn follow(&mut self, target: Url) -> Result<(), RenderError> {
        let html = self.load(&target, self.fetch_timeout).await?;
        if let Some(session) = self.session.as_mut() {
            session.append(target, html);
        }
        Ok(())
    }
}

#[async_trait]
impl<F: PageFetcher> Renderer for SnapshotRenderer<F> {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        let parsed = Url::parse(url).map_err(|e| RenderError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        // Drop the old session first so a failed load never leaves stale text behind.
        self.session = None;
        let html = self.load(&parsed, timeout).await?;
        let mut session = Session {
            documents: Vec::new(),
            loaded: HashSet::new(),
        };
        session.append(parsed, html);
        self.session = Some(session);
        Ok(())
    }

    async fn wait_settled(&mut self, _max: Duration) {
        // Snapshots are complete once fetched.
    }

    async fn current_text(&self) -> Result<String, RenderError> {
        let session = self.session()?;
        let texts: Vec<String> = session
            .documents
            .iter()
            .map(|d| inner_text(&d.html))
            .filter(|t| !t.is_empty())
            .collect();
        Ok(texts.join("\n"))
    }

    async fn evaluate_links(&self, selector_hint: &str) -> Result<Vec<String>, RenderError> {
        let selector = Selector::parse(selector_hint).map_err(|e| RenderError::Selector {
            selector: selector_hint.to_string(),
            reason: e.to_string(),
        })?;
        let session = self.session()?;

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for doc in &session.documents {
            for href in select_hrefs(&doc.html, &doc.url, &selector) {
                if seen.insert(href.clone()) {
                    links.push(href);
                }
            }
        }
        Ok(links)
    }

    async fn affordance_present(&self, affordance: &Affordance) -> Result<bool, RenderError> {
        let latest = self.session()?.latest()?;
        Ok(find_affordance(&latest.html, affordance).is_some())
    }

    async fn click_if_present(&mut self, affordance: &Affordance) -> Result<bool, RenderError> {
        let (target, loaded) = {
            let session = self.session()?;
            let latest = session.latest()?;
            match find_affordance(&latest.html, affordance) {
                None => return Ok(false),
                Some(None) => {
                    return Err(RenderError::Interaction(
                        "affordance has no link target".to_string(),
                    ))
                }
                Some(Some(href)) => {
                    let target = latest.url.join(&href).map_err(|e| {
                        RenderError::Interaction(format!("bad affordance target {href:?}: {e}"))
                    })?;
                    let loaded = session.loaded.contains(target.as_str());
                    (target, loaded)
                }
            }
        };

        if loaded {
            return Err(RenderError::Interaction(format!("{target} already loaded")));
        }
        debug!("following affordance to {}", target);
        self.follow(target).await?;
        Ok(true)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), RenderError> {
        let next = {
            let session = self.session()?;
            let latest = session.latest()?;
            next_page(&latest.html, &latest.url)
                .filter(|url| !session.loaded.contains(url.as_str()))
        };

        match next {
            Some(url) => {
                debug!("scroll: following next page {}", url);
                self.follow(url).await
            }
            None => Ok(()),
        }
    }
}

/// Visible text of a document, one line per block element. Script and style
/// contents are skipped; non-ASCII spaces are left for the normalizer.
pub fn inner_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    match document.select(&BODY).next() {
        Some(body) => walk(body, &mut raw),
        None => walk(document.root_element(), &mut raw),
    }

    raw.lines()
        .map(|l| l.trim_matches(|c: char| c.is_ascii_whitespace()))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }

    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            walk(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            push_collapsed(out, &text.text);
        }
    }
    if block {
        out.push('\n');
    }
}

/// Append `text` with runs of ASCII whitespace folded to one space.
fn push_collapsed(out: &mut String, text: &str) {
    let mut in_space = out.ends_with(' ');
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
}

fn select_hrefs(html: &str, base: &Url, selector: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(|url| url.to_string())
        .collect()
}

/// `None`: no matching element. `Some(None)`: found, but nothing to follow.
///
/// Buttons match on any label they contain. Plain links only count when their
/// whole text is a label, so a card link like "Voir plus de détails" is skipped.
fn find_affordance(html: &str, affordance: &Affordance) -> Option<Option<String>> {
    let document = Html::parse_document(html);
    let visible = |el: &ElementRef<'_>| el.text().collect::<Vec<_>>().join(" ");
    let element = document
        .select(&BUTTONS)
        .find(|el| affordance.matches(&visible(el)))
        .or_else(|| {
            document
                .select(&ANCHORS)
                .find(|el| affordance.is_label(&visible(el)))
        })?;

    let value = element.value();
    let target = ["href", "data-href", "data-url"]
        .iter()
        .find_map(|attr| value.attr(attr))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:"))
        .map(str::to_string);
    Some(target)
}

fn next_page(html: &str, base: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    document
        .select(&NEXT_PAGE)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| base.join(href.trim()).ok())
}
