use super::*;
use crate::aggregator::YearListing;
use crate::error::{Error, FetchError};
use crate::store::{load_csv, load_json};
use crate::test_helpers::{MockFetcher, ORIGIN, listing_page, listing_url, test_config};
use crate::types::{DownloadOutcome, OutcomeKind};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Listing page for `year` plus a scripted PDF body for each paper
fn with_year(fetcher: MockFetcher, year: u16, titles: &[&str]) -> MockFetcher {
    let hrefs: Vec<String> = titles
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if year <= 2020 {
                format!("/paper/{year}/hash/p{i}-Abstract.html")
            } else {
                format!("/paper_files/paper/{year}/hash/p{i}")
            }
        })
        .collect();
    let entries: Vec<(&str, &str)> = hrefs
        .iter()
        .zip(titles)
        .map(|(h, t)| (h.as_str(), *t))
        .collect();

    let mut fetcher = fetcher.page(listing_url(year), listing_page(&entries));
    for href in &hrefs {
        let pdf_url = if year <= 2020 {
            format!("{ORIGIN}{}", href.replace("Abstract.html", "paper.pdf"))
        } else {
            format!("{ORIGIN}{href}.pdf")
        };
        fetcher = fetcher.page(pdf_url.clone(), format!("%PDF {pdf_url}"));
    }
    fetcher
}

fn harvester(config: crate::Config, fetcher: &Arc<MockFetcher>) -> Harvester {
    Harvester::with_fetcher(config, fetcher.clone()).unwrap()
}

fn pdfs_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn full_run_with_one_failed_year() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 2019, 2021);
    let fetcher = MockFetcher::new().failing(
        listing_url(2021),
        FetchError::Timeout {
            url: listing_url(2021),
        },
    );
    let fetcher = with_year(fetcher, 2019, &["Alpha", "Beta: Two"]);
    let fetcher = Arc::new(with_year(fetcher, 2020, &["Gamma"]));

    let report = harvester(config.clone(), &fetcher).run().await.unwrap();

    let titles: Vec<(u16, &str)> = report
        .records
        .iter()
        .map(|r| (r.year(), r.title()))
        .collect();
    assert_eq!(
        titles,
        vec![(2019, "Alpha"), (2019, "Beta: Two"), (2020, "Gamma")]
    );
    assert_eq!(report.failed_years(), vec![2021]);
    assert_eq!(report.years[&2019], YearListing::Fetched { papers: 2 });

    assert!(report.save.is_complete());
    assert_eq!(load_csv(&config.output.csv_path).unwrap(), report.records);
    assert_eq!(load_json(&config.output.json_path).unwrap(), report.records);

    assert_eq!(
        report.downloads.iter().map(|d| d.year).collect::<Vec<_>>(),
        vec![2019, 2020]
    );
    assert_eq!(report.tally().succeeded, 3);
    assert_eq!(
        pdfs_in(&config.year_dir(2019)),
        vec!["Alpha.pdf".to_string(), "Beta_ Two.pdf".to_string()]
    );
    assert_eq!(pdfs_in(&config.year_dir(2020)), vec!["Gamma.pdf".to_string()]);
    assert!(!config.year_dir(2021).exists());
}

#[tokio::test]
async fn no_records_anywhere_is_fatal_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 2019, 2020);
    let fetcher = Arc::new(MockFetcher::new().page(listing_url(2019), "<html></html>"));

    let err = harvester(config.clone(), &fetcher).run().await.unwrap_err();

    assert!(matches!(
        err,
        Error::NoMetadata {
            start_year: 2019,
            end_year: 2020
        }
    ));
    assert!(!config.output.csv_path.exists());
    assert!(!config.output.json_path.exists());
    assert!(!config.output.download_dir.exists());
}

#[tokio::test]
async fn metadata_only_run_skips_downloads() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), 2022, 2022);
    config.output.download_pdfs = false;
    let fetcher = Arc::new(with_year(MockFetcher::new(), 2022, &["Only Metadata"]));

    let report = harvester(config.clone(), &fetcher).run().await.unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(
        report.records[0].pdf_url(),
        format!("{ORIGIN}/paper_files/paper/2022/hash/p0.pdf")
    );
    assert!(report.downloads.is_empty());
    assert_eq!(fetcher.total_calls(), 1, "only the listing page is fetched");
    assert!(config.output.csv_path.exists());
    assert!(!config.output.download_dir.exists());
}

#[tokio::test]
async fn rerun_skips_everything_already_downloaded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 2018, 2019);
    let fetcher = with_year(MockFetcher::new(), 2018, &["One", "Two"]);
    let fetcher = Arc::new(with_year(fetcher, 2019, &["Three"]));
    let harvester = harvester(config, &fetcher);

    let first = harvester.run().await.unwrap();
    let second = harvester.run().await.unwrap();

    assert_eq!(first.tally().succeeded, 3);
    assert_eq!(second.tally().skipped, 3);
    assert_eq!(second.tally().succeeded, 0);
    // Two runs: listings twice each, PDFs once each
    assert_eq!(fetcher.total_calls(), 2 * 2 + 3);
    for report in &second.downloads {
        assert!(
            report
                .outcomes
                .iter()
                .all(|o| matches!(o, DownloadOutcome::Skipped { .. }))
        );
    }
}

#[tokio::test]
async fn metadata_is_saved_before_any_download_starts() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 2019, 2020);
    let fetcher = MockFetcher::new();
    let fetcher = with_year(fetcher, 2019, &["A"]);
    let fetcher = Arc::new(with_year(fetcher, 2020, &["B", "C"]));
    let harvester = harvester(config, &fetcher);
    let mut rx = harvester.subscribe();

    harvester.run().await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let first_download = events
        .iter()
        .position(|e| matches!(e, Event::YearStarted { .. }))
        .unwrap();
    let last_metadata = events
        .iter()
        .rposition(|e| {
            matches!(
                e,
                Event::ListingFetched { .. }
                    | Event::ListingEmpty { .. }
                    | Event::ListingFailed { .. }
                    | Event::MetadataSaved { .. }
                    | Event::MetadataSaveFailed { .. }
            )
        })
        .unwrap();
    assert!(last_metadata < first_download);

    match events.last().unwrap() {
        Event::HarvestFinished { records, tally } => {
            assert_eq!(*records, 3);
            assert_eq!(tally.succeeded, 3);
        }
        other => panic!("last event should finish the harvest, got {other:?}"),
    }
    let finished: usize = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                Event::PaperFinished {
                    outcome: OutcomeKind::Succeeded,
                    ..
                }
            )
        })
        .count();
    assert_eq!(finished, 3);
}

#[tokio::test]
async fn year_concurrency_bounds_coordinators() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), 2011, 2016);
    config.concurrency.year_concurrency = 2;
    config.concurrency.paper_concurrency = 1;

    let mut fetcher = MockFetcher::new();
    for year in 2011..=2016 {
        let href = format!("/paper/{year}/hash/x-Abstract.html");
        fetcher = fetcher
            .page(listing_url(year), listing_page(&[(href.as_str(), "X")]))
            .page_after(
                format!("{ORIGIN}/paper/{year}/hash/x-paper.pdf"),
                "pdf",
                Duration::from_millis(30),
            );
    }
    let fetcher = Arc::new(fetcher);

    let report = harvester(config, &fetcher).run().await.unwrap();

    assert_eq!(report.tally().succeeded, 6);
    let peak = fetcher.max_in_flight();
    assert!(peak <= 2, "outer limit of 2 years, saw {peak} fetches in flight");
}

#[tokio::test]
async fn configured_retries_apply_to_listing_fetches() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), 2019, 2020);
    config.retry.max_attempts = 2;
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(5);
    config.retry.jitter = false;
    config.output.download_pdfs = false;
    let fetcher = MockFetcher::new().failing(
        listing_url(2020),
        FetchError::HttpStatus {
            url: listing_url(2020),
            status: 503,
        },
    );
    let fetcher = Arc::new(with_year(fetcher, 2019, &["Kept"]));

    let report = harvester(config, &fetcher).run().await.unwrap();

    assert_eq!(fetcher.calls(&listing_url(2020)), 3, "first try plus two retries");
    assert_eq!(fetcher.calls(&listing_url(2019)), 1);
    assert_eq!(report.failed_years(), vec![2020]);
}

#[tokio::test]
async fn invalid_configuration_is_rejected_up_front() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 2023, 2017);
    let fetcher: Arc<dyn PageFetcher> = Arc::new(MockFetcher::new());

    let err = Harvester::with_fetcher(config, fetcher).err().unwrap();

    match err {
        Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("start_year")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_downloads_do_not_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 2020, 2020);
    let listing = listing_page(&[
        ("/paper/2020/hash/ok-Abstract.html", "Works"),
        ("/paper/2020/hash/gone-Abstract.html", "Missing PDF"),
    ]);
    let fetcher = Arc::new(
        MockFetcher::new()
            .page(listing_url(2020), listing)
            .page(format!("{ORIGIN}/paper/2020/hash/ok-paper.pdf"), "pdf"),
    );

    let report = harvester(config, &fetcher).run().await.unwrap();

    let year = &report.downloads[0];
    let kinds: Vec<OutcomeKind> = year.outcomes.iter().map(DownloadOutcome::kind).collect();
    assert_eq!(kinds, vec![OutcomeKind::Succeeded, OutcomeKind::Failed]);
    assert_eq!(report.tally().failed, 1);
}
