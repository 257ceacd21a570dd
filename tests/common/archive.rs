//! A fake paper archive served by wiremock

use paper_harvest::Config;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Listing page path for a year
pub fn listing_path(year: u16) -> String {
    format!("/paper_files/paper/{year}")
}

/// href of a paper link, in the layout the archive used that year
pub fn paper_href(year: u16, key: &str) -> String {
    if year <= 2020 {
        format!("/paper/{year}/hash/{key}-Abstract.html")
    } else {
        format!("/paper_files/paper/{year}/hash/{key}")
    }
}

/// Path the derived PDF URL points at
pub fn pdf_path(year: u16, key: &str) -> String {
    if year <= 2020 {
        format!("/paper/{year}/hash/{key}-paper.pdf")
    } else {
        format!("/paper_files/paper/{year}/hash/{key}.pdf")
    }
}

/// PDF body served for a paper
pub fn pdf_body(year: u16, key: &str) -> Vec<u8> {
    format!("%PDF-1.4\n% {year}/{key}\n%%EOF\n").into_bytes()
}

/// Listing page with one anchor per `(key, title)` plus some navigation noise
pub fn listing_html(year: u16, papers: &[(&str, &str)]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><title>Proceedings</title></head><body>\n\
         <nav><a href=\"/\">Home</a> <a href=\"/paper_files/paper\">All years</a></nav>\n<ul>\n",
    );
    for (key, title) in papers {
        html.push_str(&format!(
            "  <li><a title=\"paper title\" href=\"{}\">{}</a> <i>Some Author</i></li>\n",
            paper_href(year, key),
            title
        ));
    }
    html.push_str("</ul></body></html>\n");
    html
}

/// Mount a year's listing page, answering after `delay`
pub async fn mount_listing(
    server: &MockServer,
    year: u16,
    papers: &[(&str, &str)],
    delay: Duration,
) {
    Mock::given(method("GET"))
        .and(path(listing_path(year)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_html(year, papers))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Mount the PDFs of `papers`, each expected to be fetched `times` times
pub async fn mount_pdfs(server: &MockServer, year: u16, papers: &[(&str, &str)], times: u64) {
    for (key, _) in papers {
        Mock::given(method("GET"))
            .and(path(pdf_path(year, key)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf_body(year, key)))
            .expect(times)
            .mount(server)
            .await;
    }
}

/// Mount a listing and its PDFs, each PDF expected exactly once
pub async fn mount_year(server: &MockServer, year: u16, papers: &[(&str, &str)]) {
    mount_listing(server, year, papers, Duration::ZERO).await;
    mount_pdfs(server, year, papers, 1).await;
}

/// Mount a listing page that fails with `status`
pub async fn mount_failing_listing(server: &MockServer, year: u16, status: u16) {
    Mock::given(method("GET"))
        .and(path(listing_path(year)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Configuration crawling `server` with every output under `dir`
pub fn archive_config(server: &MockServer, dir: &Path, start_year: u16, end_year: u16) -> Config {
    let mut config = Config::default();
    config.crawl.base_url = server.uri();
    config.crawl.start_year = start_year;
    config.crawl.end_year = end_year;
    config.output.download_dir = dir.join("downloads");
    config.output.csv_path = dir.join("meta").join("papers.csv");
    config.output.json_path = dir.join("meta").join("papers.json");
    config.http.listing_timeout = Duration::from_secs(5);
    config.http.download_timeout = Duration::from_secs(5);
    config
}
