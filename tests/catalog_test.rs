//! Catalog and installer driven through the library API.

use contribman::archive::ArchiveExtractorImpl;
use contribman::contribution::{ContributionKey, ContributionType};
use contribman::download::HttpDownloader;
use contribman::http::HttpClient;
use contribman::installer::{ContributionInstaller, InstallerOptions};
use contribman::listing::{ContributionListing, ListingEvent};
use contribman::platform::Platform;
use contribman::progress::{ProgressMonitor, ProgressSink};
use contribman::runtime::RealRuntime;
use contribman::scanner::scan_installed;
use mockito::Server;
use std::fs;
use std::io::{Cursor, Write};
use std::sync::Arc;
use tempfile::tempdir;
use zip::ZipWriter;
use zip::write::FileOptions;

fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<()> = FileOptions::default();
    for (name, content) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_update_clears_has_updates() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/Foo.zip")
        .with_status(200)
        .with_body(zip_bytes(&[(
            "Foo/library.properties",
            "name=Foo\nversion=3\n",
        )]))
        .create_async()
        .await;

    let dir = tempdir().unwrap();
    let sketchbook = dir.path().join("sketchbook");
    let installed = sketchbook.join("libraries/Foo");
    fs::create_dir_all(&installed).unwrap();
    fs::write(installed.join("library.properties"), "name=Foo\nversion=2\n").unwrap();

    let listing = Arc::new(ContributionListing::new(Platform::new("linux", 64, None)));
    listing.load_advertised_text(&format!(
        "library\nname=Foo\ncategory=Sound\nversion=3\nprettyVersion=1.3\ndownload={}/Foo.zip\n",
        server.url()
    ));
    listing.merge_installed(scan_installed(&RealRuntime, &sketchbook).unwrap());

    let key = ContributionKey::new("Foo", ContributionType::Library);
    let foo = listing.find(&key).unwrap();
    assert!(foo.is_installed());
    assert!(listing.has_updates(&foo));
    assert!(listing.matches(&foo, "has:updates"));

    let runtime = Arc::new(RealRuntime);
    let downloader = HttpDownloader::new(Arc::clone(&runtime), HttpClient::new(reqwest::Client::new()));
    let installer = Arc::new(
        ContributionInstaller::new(
            runtime,
            Arc::new(downloader),
            Arc::new(ArchiveExtractorImpl::new()),
            Arc::clone(&listing),
            sketchbook.clone(),
        )
        .with_options(InstallerOptions {
            backup_on_install: false,
            backup_on_remove: false,
        }),
    );

    let mut events = listing.subscribe();
    while events.try_recv().is_ok() {}

    let progress = Arc::new(ProgressMonitor::new());
    let outcome = installer.install(&foo, progress.clone()).wait().await;
    assert!(outcome.is_done(), "{:?}", outcome);
    assert!(progress.is_finished());
    assert!(!progress.is_error());

    let updated = listing.find(&key).unwrap();
    assert!(updated.is_installed());
    assert!(!listing.has_updates(&updated));
    assert!(
        fs::read_to_string(installed.join("library.properties"))
            .unwrap()
            .contains("version=3\n")
    );

    // One change event, no additions or removals
    match events.try_recv().unwrap() {
        ListingEvent::Changed { old, new } => {
            assert!(old.same(&foo));
            assert!(new.same(&updated));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(events.try_recv().is_err());
}
