//! Integration tests for the crawler
//!
//! These tests use wiremock to stand up small copies of the two listing
//! sites and run full crawls against them end-to-end.

use chrono::DateTime;
use shelf_harvest::config::{load_config_with_hash, Config};
use shelf_harvest::crawler::{
    build_http_client, walk, BookListing, Coordinator, RunReport, StopReason,
};
use shelf_harvest::records::{Book, Price};
use shelf_harvest::storage::{open_storage, RunStatus, SqliteStorage, Source, Storage};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a test configuration pointing both sources at the mock server
fn create_test_config(server: &MockServer) -> Config {
    let root = format!("{}/", server.uri());

    let mut config = Config::default();
    config.books.base_url = root.clone();
    config.quotes.base_url = root;
    config.http.timeout_secs = 5;
    config.http.connect_timeout_secs = 2;
    config.crawler.detail_concurrency = 2;
    config
}

fn book_card(href: &str, title: &str, rating: &str, price: &str) -> String {
    format!(
        r#"<li class="col-xs-6 col-sm-4 col-md-3 col-lg-3">
            <article class="product_pod">
                <div class="image_container">
                    <a href="{href}"><img src="../media/cache/{title}.jpg" class="thumbnail"></a>
                </div>
                <p class="star-rating {rating}"><i class="icon-star"></i></p>
                <h3><a href="{href}" title="{title}">{title}</a></h3>
                <div class="product_price"><p class="price_color">£{price}</p></div>
            </article>
        </li>"#
    )
}

fn book_page(cards: &[String], next: Option<&str>) -> String {
    let pager = next
        .map(|href| format!(r#"<ul class="pager"><li class="next"><a href="{}">next</a></li></ul>"#, href))
        .unwrap_or_default();

    format!(
        r#"<html><body><section><div><ol class="row">{}</ol></div>{}</section></body></html>"#,
        cards.concat(),
        pager
    )
}

fn detail_page(category: &str, upc: &str, price: &str) -> String {
    format!(
        r#"<html><body>
        <ul class="breadcrumb">
            <li><a href="../../index.html">Home</a></li>
            <li><a href="../category/books_1/index.html">Books</a></li>
            <li><a href="../category/books/x/index.html">{category}</a></li>
        </ul>
        <div id="product_description" class="sub-header"><h2>Product Description</h2></div>
        <p>A description of {upc}.</p>
        <table class="table table-striped">
            <tr><th>UPC</th><td>{upc}</td></tr>
            <tr><th>Product Type</th><td>Books</td></tr>
            <tr><th>Price (excl. tax)</th><td>£{price}</td></tr>
            <tr><th>Price (incl. tax)</th><td>£{price}</td></tr>
            <tr><th>Tax</th><td>£0.00</td></tr>
            <tr><th>Availability</th><td>In stock (22 available)</td></tr>
            <tr><th>Number of reviews</th><td>0</td></tr>
        </table>
        </body></html>"#
    )
}

async fn mount_page(server: &MockServer, at: &str, body: String, times: u64) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Shared log of (path, arrival time) for every request a [`Recorded`] answers
type ArrivalLog = Arc<Mutex<Vec<(String, Instant)>>>;

/// Answers with a fixed body after `delay`, logging when each request arrived
struct Recorded {
    log: ArrivalLog,
    body: String,
    delay: Duration,
}

impl Respond for Recorded {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.log
            .lock()
            .unwrap()
            .push((request.url.path().to_string(), Instant::now()));
        ResponseTemplate::new(200)
            .set_body_string(self.body.clone())
            .set_delay(self.delay)
    }
}

async fn mount_recorded(
    server: &MockServer,
    at: &str,
    body: String,
    delay: Duration,
    log: &ArrivalLog,
) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(Recorded {
            log: Arc::clone(log),
            body,
            delay,
        })
        .mount(server)
        .await;
}

fn arrivals(log: &ArrivalLog, filter: impl Fn(&str) -> bool) -> Vec<Instant> {
    let mut times: Vec<Instant> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|(p, _)| filter(p.as_str()))
        .map(|(_, t)| *t)
        .collect();
    times.sort();
    times
}

fn titles(books: &[Book]) -> Vec<&str> {
    books.iter().filter_map(|b| b.title.as_deref()).collect()
}

#[tokio::test]
async fn test_pagination_fetches_each_page_once() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/index.html",
        book_page(
            &[
                book_card("catalogue/one_1/index.html", "One", "One", "1.00"),
                book_card("catalogue/two_2/index.html", "Two", "Two", "2.00"),
            ],
            Some("catalogue/page-2.html"),
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "/catalogue/page-2.html",
        book_page(
            &[
                book_card("three_3/index.html", "Three", "Three", "3.00"),
                book_card("four_4/index.html", "Four", "Four", "4.00"),
            ],
            Some("page-3.html"),
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "/catalogue/page-3.html",
        book_page(&[book_card("five_5/index.html", "Five", "Five", "5.00")], None),
        1,
    )
    .await;

    let mut config = create_test_config(&server);
    config.crawler.fetch_details = false;

    let coordinator =
        Coordinator::with_storage(config, "test", SqliteStorage::new_in_memory().unwrap()).unwrap();
    let count = coordinator.run_book_crawl().await.unwrap();
    assert_eq!(count, 5);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let books = storage.load_books().unwrap();
    assert_eq!(titles(&books), vec!["One", "Two", "Three", "Four", "Five"]);

    // Cards on a section page resolve inside the section
    assert_eq!(
        books[2].product_url.as_deref(),
        Some(format!("{}/catalogue/three_3/index.html", server.uri()).as_str())
    );
    assert_eq!(
        books[2].image_url.as_deref(),
        Some(format!("{}/media/cache/Three.jpg", server.uri()).as_str())
    );

    let runs = storage.recent_runs(Some(Source::Books), 1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].item_count, Some(5));
}

#[tokio::test]
async fn test_detail_failure_is_isolated() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/index.html",
        book_page(
            &[
                book_card("catalogue/alpha_1/index.html", "Alpha", "One", "10.00"),
                book_card("catalogue/beta_2/index.html", "Beta", "Two", "20.00"),
                book_card("catalogue/gamma_3/index.html", "Gamma", "Three", "30.00"),
            ],
            None,
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "/catalogue/alpha_1/index.html",
        detail_page("Poetry", "upc-alpha", "10.00"),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/beta_2/index.html"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/catalogue/gamma_3/index.html",
        detail_page("Travel", "upc-gamma", "30.00"),
        1,
    )
    .await;

    let coordinator = Coordinator::with_storage(
        create_test_config(&server),
        "test",
        SqliteStorage::new_in_memory().unwrap(),
    )
    .unwrap();
    assert_eq!(coordinator.run_book_crawl().await.unwrap(), 3);

    let storage = coordinator.storage();
    let books = storage.lock().unwrap().load_books().unwrap();
    assert_eq!(titles(&books), vec!["Alpha", "Beta", "Gamma"]);

    assert_eq!(books[0].detail.upc.as_deref(), Some("upc-alpha"));
    assert_eq!(books[0].detail.category.as_deref(), Some("Poetry"));

    // The failed detail keeps listing fields only
    assert!(books[1].detail.is_empty());
    assert_eq!(books[1].price, Some(Price::from_cents(2000)));
    assert_eq!(books[1].rating.as_deref(), Some("Two"));

    assert_eq!(books[2].detail.upc.as_deref(), Some("upc-gamma"));
    assert_eq!(books[2].detail.category.as_deref(), Some("Travel"));
}

#[tokio::test]
async fn test_cyclic_next_link_terminates() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/index.html",
        book_page(
            &[book_card("catalogue/one_1/index.html", "One", "One", "1.00")],
            Some("catalogue/page-2.html"),
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "/catalogue/page-2.html",
        book_page(
            &[book_card("two_2/index.html", "Two", "Two", "2.00")],
            Some("../index.html"),
        ),
        1,
    )
    .await;

    let config = create_test_config(&server);
    let client = build_http_client(&config.http).unwrap();
    let listing = BookListing::new(config.books.resolver()).unwrap();

    let outcome = walk(&client, &listing, &config.books.start_url(), 100)
        .await
        .unwrap();

    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(outcome.items.len(), 2);
    assert_eq!(
        outcome.stop,
        StopReason::Revisit(format!("{}/index.html", server.uri()))
    );
}

#[tokio::test]
async fn test_page_cap_stops_walk() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/index.html",
        book_page(
            &[book_card("catalogue/one_1/index.html", "One", "One", "1.00")],
            Some("catalogue/page-2.html"),
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "/catalogue/page-2.html",
        book_page(
            &[book_card("two_2/index.html", "Two", "Two", "2.00")],
            Some("page-3.html"),
        ),
        0,
    )
    .await;

    let config = create_test_config(&server);
    let client = build_http_client(&config.http).unwrap();
    let listing = BookListing::new(config.books.resolver()).unwrap();

    let outcome = walk(&client, &listing, &config.books.start_url(), 1)
        .await
        .unwrap();

    assert_eq!(outcome.pages_fetched, 1);
    assert_eq!(titles(&outcome.items), vec!["One"]);
    assert_eq!(outcome.stop, StopReason::PageLimit);
}

#[tokio::test]
async fn test_quote_crawl_keeps_tag_order() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<html><body>
        <div class="quote">
            <span class="text">“The world as we have created it is a process of our thinking.”</span>
            <span>by <small class="author">Albert Einstein</small></span>
            <div class="tags">Tags:
                <a class="tag" href="/tag/thinking/">thinking</a>
                <a class="tag" href="/tag/change/">change</a>
                <a class="tag" href="/tag/world/">world</a>
            </div>
        </div>
        <nav><ul class="pager"><li class="next"><a href="/page/2/">Next</a></li></ul></nav>
        </body></html>"#
            .to_string(),
        1,
    )
    .await;
    mount_page(
        &server,
        "/page/2/",
        r#"<html><body>
        <div class="quote">
            <span class="text">“A day without sunshine is like, you know, night.”</span>
            <span>by <small class="author">Steve Martin</small></span>
            <div class="tags">Tags:</div>
        </div>
        </body></html>"#
            .to_string(),
        1,
    )
    .await;

    let coordinator = Coordinator::with_storage(
        create_test_config(&server),
        "test",
        SqliteStorage::new_in_memory().unwrap(),
    )
    .unwrap();
    assert_eq!(coordinator.run_quote_crawl().await.unwrap(), 2);

    let storage = coordinator.storage();
    let quotes = storage.lock().unwrap().load_quotes().unwrap();
    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes[0].author.as_deref(), Some("Albert Einstein"));
    assert_eq!(quotes[0].tags, vec!["thinking", "change", "world"]);
    assert_eq!(quotes[1].author.as_deref(), Some("Steve Martin"));
    assert!(quotes[1].tags.is_empty());
}

#[tokio::test]
async fn test_listing_failure_keeps_previous_snapshot() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/index.html",
        book_page(
            &[book_card("catalogue/new_1/index.html", "New", "One", "1.00")],
            Some("catalogue/page-2.html"),
        ),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-2.html"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage
        .replace_books(&[
            Book {
                title: Some("Old A".to_string()),
                ..Book::default()
            },
            Book {
                title: Some("Old B".to_string()),
                ..Book::default()
            },
        ])
        .unwrap();

    let mut config = create_test_config(&server);
    config.crawler.fetch_details = false;
    let coordinator = Coordinator::with_storage(config, "test", storage).unwrap();

    let err = coordinator.run_book_crawl().await.unwrap_err();
    assert!(err.to_string().contains("503"));

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(titles(&storage.load_books().unwrap()), vec!["Old A", "Old B"]);

    let runs = storage.recent_runs(Some(Source::Books), 1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
}

#[tokio::test]
async fn test_end_to_end_from_config_file() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/index.html",
        book_page(
            &[book_card(
                "catalogue/a-light-in-the-attic_1000/index.html",
                "A Light in the Attic",
                "Three",
                "51.77",
            )],
            None,
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "/catalogue/a-light-in-the-attic_1000/index.html",
        detail_page("Poetry", "a897fe39b1053632", "51.77"),
        1,
    )
    .await;
    mount_page(
        &server,
        "/",
        r#"<html><body><div class="quote"><span class="text">“Q”</span></div></body></html>"#
            .to_string(),
        1,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("snapshot.db");
    let config_path = dir.path().join("shelf-harvest.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[output]
database-path = "{db}"

[books]
base-url = "{root}/"

[quotes]
base-url = "{root}/"
"#,
            db = db_path.display(),
            root = server.uri()
        ),
    )
    .unwrap();

    let (config, hash) = load_config_with_hash(&config_path).unwrap();
    let coordinator = Coordinator::new(config, hash.clone()).unwrap();
    let report = coordinator.run_all().await;
    assert_eq!(report.books, Some(1));
    assert_eq!(report.quotes, Some(1));

    // A fresh connection sees the committed snapshot
    let storage = open_storage(Path::new(&db_path)).unwrap();
    let books = storage.load_books().unwrap();
    assert_eq!(books.len(), 1);

    let book = &books[0];
    assert_eq!(book.title.as_deref(), Some("A Light in the Attic"));
    assert_eq!(book.rating.as_deref(), Some("Three"));
    assert_eq!(book.price.map(|p| p.to_string()).as_deref(), Some("51.77"));
    assert_eq!(book.detail.category.as_deref(), Some("Poetry"));
    assert_eq!(book.detail.upc.as_deref(), Some("a897fe39b1053632"));
    assert_eq!(book.detail.number_of_reviews, Some(0));

    let quotes = storage.load_quotes().unwrap();
    assert_eq!(quotes[0].text.as_deref(), Some("“Q”"));
    assert_eq!(quotes[0].author, None);

    let runs = storage.recent_runs(None, 10).unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.config_hash == hash));
}

#[tokio::test]
async fn test_overlapping_triggers_run_one_after_another() {
    let server = MockServer::start().await;
    let log = ArrivalLog::default();
    let delay = Duration::from_millis(300);

    mount_recorded(
        &server,
        "/index.html",
        book_page(&[book_card("catalogue/one_1/index.html", "One", "One", "1.00")], None),
        delay,
        &log,
    )
    .await;
    mount_recorded(
        &server,
        "/",
        r#"<html><body><div class="quote"><span class="text">“Q”</span></div></body></html>"#
            .to_string(),
        delay,
        &log,
    )
    .await;

    let mut config = create_test_config(&server);
    config.crawler.fetch_details = false;
    let coordinator =
        Coordinator::with_storage(config, "test", SqliteStorage::new_in_memory().unwrap()).unwrap();

    let (single, combined) = tokio::join!(coordinator.run_book_crawl(), coordinator.run_all());
    assert_eq!(single.unwrap(), 1);
    assert_eq!(
        combined,
        RunReport {
            books: Some(1),
            quotes: Some(1)
        }
    );

    // The second book walk starts only once the first one has been answered
    let book_fetches = arrivals(&log, |p| p == "/index.html");
    assert_eq!(book_fetches.len(), 2);
    assert!(book_fetches[1] - book_fetches[0] >= delay - Duration::from_millis(50));

    // Recorded runs never overlap
    let storage = coordinator.storage();
    let mut runs = storage.lock().unwrap().recent_runs(None, 10).unwrap();
    runs.reverse();
    assert_eq!(runs.len(), 3);
    for pair in runs.windows(2) {
        let finished = DateTime::parse_from_rfc3339(pair[0].finished_at.as_deref().unwrap()).unwrap();
        let started = DateTime::parse_from_rfc3339(&pair[1].started_at).unwrap();
        assert!(started >= finished, "run {} started before run {} finished", pair[1].id, pair[0].id);
    }
}

#[tokio::test]
async fn test_detail_fetches_respect_concurrency_limit() {
    let server = MockServer::start().await;
    let log = ArrivalLog::default();
    let delay = Duration::from_millis(300);
    let slugs = ["a_1", "b_2", "c_3", "d_4", "e_5", "f_6"];

    let cards: Vec<String> = slugs
        .iter()
        .map(|slug| book_card(&format!("catalogue/{}/index.html", slug), slug, "One", "1.00"))
        .collect();
    mount_page(&server, "/index.html", book_page(&cards, None), 1).await;

    for slug in slugs {
        mount_recorded(
            &server,
            &format!("/catalogue/{}/index.html", slug),
            detail_page("Poetry", slug, "1.00"),
            delay,
            &log,
        )
        .await;
    }

    let mut config = create_test_config(&server);
    config.crawler.detail_concurrency = 2;
    let coordinator =
        Coordinator::with_storage(config, "test", SqliteStorage::new_in_memory().unwrap()).unwrap();

    let started = Instant::now();
    assert_eq!(coordinator.run_book_crawl().await.unwrap(), slugs.len());
    assert!(started.elapsed() >= delay * 3);

    // With two permits, a third request can only arrive after the one two
    // places earlier has been answered
    let details = arrivals(&log, |p| p.starts_with("/catalogue/"));
    assert_eq!(details.len(), slugs.len());
    for i in 2..details.len() {
        assert!(
            details[i] - details[i - 2] >= delay - Duration::from_millis(50),
            "more than two detail fetches in flight at request {}",
            i
        );
    }

    let storage = coordinator.storage();
    let books = storage.lock().unwrap().load_books().unwrap();
    assert!(books.iter().all(|b| b.detail.upc.is_some()));
}
