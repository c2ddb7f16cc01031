use url::Url;

/// Marker removed textually from every resolved URL
const PARENT_MARKER: &str = "../";

/// Resolves hrefs and srcs scraped from a listing site against its root
///
/// Resolution is textual rather than RFC 3986 joining. The listing sites
/// mix three reference shapes on their pages: section-prefixed paths
/// (`catalogue/page-2.html`), page-index paths that omit the section
/// (`page-3.html`), and parent-relative paths (`../media/x.jpg`). Each is
/// concatenated onto the root in its own way and every `../` is then
/// stripped from the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    root: String,
    section: Option<String>,
    page_prefix: Option<String>,
}

impl UrlResolver {
    /// Creates a resolver for a site root such as `https://books.toscrape.com/`
    ///
    /// A trailing `/` is added when missing.
    pub fn new(root: impl Into<String>) -> Self {
        let mut root = root.into();
        if !root.ends_with('/') {
            root.push('/');
        }

        Self {
            root,
            section: None,
            page_prefix: None,
        }
    }

    /// Declares the sub-directory holding paginated listing and detail pages
    ///
    /// References starting with `page_prefix` are taken to live inside
    /// `section` even when they omit it.
    pub fn with_section(mut self, section: impl Into<String>, page_prefix: impl Into<String>) -> Self {
        let mut section = section.into();
        if !section.is_empty() && !section.ends_with('/') {
            section.push('/');
        }

        self.section = Some(section).filter(|s| !s.is_empty());
        self.page_prefix = Some(page_prefix.into()).filter(|p| !p.is_empty());
        self
    }

    /// The site root, always ending in `/`
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Resolves a reference with no current-directory context
    ///
    /// # Examples
    ///
    /// ```
    /// use shelf_harvest::UrlResolver;
    ///
    /// let resolver = UrlResolver::new("https://books.toscrape.com/")
    ///     .with_section("catalogue/", "page");
    ///
    /// assert_eq!(
    ///     resolver.resolve("page-2.html"),
    ///     "https://books.toscrape.com/catalogue/page-2.html"
    /// );
    /// assert_eq!(
    ///     resolver.resolve("../media/cache/x.jpg"),
    ///     "https://books.toscrape.com/media/cache/x.jpg"
    /// );
    /// ```
    pub fn resolve(&self, reference: &str) -> String {
        self.resolve_in("", reference)
    }

    /// Resolves a reference found on the page at `page_url`
    ///
    /// Bare relative references are placed in the directory of that page;
    /// every other shape resolves exactly as in [`UrlResolver::resolve`].
    pub fn resolve_from(&self, page_url: &str, reference: &str) -> String {
        self.resolve_in(self.directory_of(page_url), reference)
    }

    /// Returns the directory of `page_url` relative to the root (`""` or `"catalogue/"`)
    pub fn directory_of<'a>(&self, page_url: &'a str) -> &'a str {
        let Some(rest) = page_url.strip_prefix(self.root.as_str()) else {
            return "";
        };

        let path = rest.split(['?', '#']).next().unwrap_or_default();
        match path.rfind('/') {
            Some(idx) => &path[..=idx],
            None => "",
        }
    }

    fn resolve_in(&self, directory: &str, reference: &str) -> String {
        let reference = reference.trim();

        let joined = if is_absolute_http(reference) {
            reference.to_string()
        } else if self.in_section(reference) {
            format!("{}{}", self.root, reference)
        } else if let (Some(section), true) = (&self.section, self.is_page_index(reference)) {
            format!("{}{}{}", self.root, section, reference)
        } else if let Some(stripped) = reference.strip_prefix('/') {
            format!("{}{}", self.root, stripped.trim_start_matches('/'))
        } else if reference.contains(PARENT_MARKER) {
            format!("{}{}", self.root, reference)
        } else {
            format!("{}{}{}", self.root, directory, reference)
        };

        joined.replace(PARENT_MARKER, "")
    }

    fn in_section(&self, reference: &str) -> bool {
        self.section
            .as_deref()
            .map(|s| s.trim_end_matches('/'))
            .is_some_and(|s| reference.starts_with(s))
    }

    fn is_page_index(&self, reference: &str) -> bool {
        self.page_prefix
            .as_deref()
            .is_some_and(|p| reference.starts_with(p))
    }
}

fn is_absolute_http(reference: &str) -> bool {
    Url::parse(reference)
        .map(|u| u.scheme() == "http" || u.scheme() == "https")
        .unwrap_or(false)
}
