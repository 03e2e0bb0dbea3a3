//! Producers, bridge and worker running together.

use std::sync::Arc;
use std::time::Duration;

use autocoupons_bridge::Bridge;
use autocoupons_enroller::{Waits, WorkerOptions, spawn_with_driver};
use autocoupons_types::{BlanketCourse, Classification, CourseStore, RunReport, SpecificCourse};

use crate::common::{FakePage, Listing, coupon_url};

fn options() -> WorkerOptions {
    WorkerOptions {
        max_attempts: 1,
        waits: Waits {
            timeout: Duration::from_millis(30),
            poll_interval: Duration::from_millis(5),
        },
    }
}

fn classification_of(report: &RunReport, url_id: &str) -> Option<Classification> {
    report
        .outcomes()
        .iter()
        .find(|outcome| outcome.course.url_id().as_str() == url_id)
        .map(|outcome| outcome.classification)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn producers_fan_in_to_one_classification_per_course() {
    let page = FakePage::new()
        .listing("free", Listing::Free)
        .listing("paid", Listing::Paid)
        .listing("owned", Listing::Owned);
    let visits = page.visits();

    let (bridge, consumer) = Bridge::open(Arc::new(CourseStore::new()));
    let worker = spawn_with_driver(consumer, options(), move || Box::pin(async move { Ok(page) }))
        .unwrap();

    let batches = [
        vec![coupon_url("free", "A"), coupon_url("paid", "B")],
        vec![coupon_url("owned", "C"), coupon_url("free", "A")],
        vec![
            "https://www.udemy.com/course/no-coupon/".to_string(),
            "https://example.com/not-a-course".to_string(),
        ],
    ];
    let producers: Vec<_> = batches
        .into_iter()
        .map(|urls| {
            let publisher = bridge.publisher();
            tokio::spawn(async move {
                for url in urls {
                    publisher.publish(url)?;
                    tokio::task::yield_now().await;
                }
                Ok::<_, autocoupons_bridge::BridgeError>(())
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap().unwrap();
    }

    let stats = bridge.close().await.unwrap();
    let report = worker.wait().await.unwrap();

    assert_eq!(report.len(), 3);
    assert_eq!(classification_of(&report, "free"), Some(Classification::Enrolled));
    assert_eq!(classification_of(&report, "paid"), Some(Classification::Paid));
    assert_eq!(classification_of(&report, "owned"), Some(Classification::ToBlacklist));
    assert_eq!(stats.forwarded, 3);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.bare, 1);
    assert_eq!(stats.unparseable, 1);
    assert_eq!(visits.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn known_courses_never_reach_the_browser() {
    let mut store = CourseStore::new();
    store.add(BlanketCourse::new("owned").into()).unwrap();
    store.add(SpecificCourse::new("paid", "OLD").into()).unwrap();
    let page = FakePage::new()
        .listing("owned", Listing::Owned)
        .listing("paid", Listing::Paid);
    let visits = page.visits();

    let (bridge, consumer) = Bridge::open(Arc::new(store));
    let worker = spawn_with_driver(consumer, options(), move || Box::pin(async move { Ok(page) }))
        .unwrap();
    let publisher = bridge.publisher();
    publisher.publish(coupon_url("owned", "NEW")).unwrap();
    publisher.publish(coupon_url("paid", "OLD")).unwrap();
    publisher.publish(coupon_url("paid", "NEW")).unwrap();
    bridge.close().await.unwrap();
    let report = worker.wait().await.unwrap();

    // A new token for a paid course is worth another look.
    assert_eq!(report.len(), 1);
    assert_eq!(report.outcomes()[0].course, SpecificCourse::new("paid", "NEW"));
    assert_eq!(*visits.lock().unwrap(), [coupon_url("paid", "NEW")]);
}

#[tokio::test]
async fn failed_producer_does_not_strand_the_worker() {
    let page = FakePage::new().listing("paid", Listing::Paid);
    let (bridge, consumer) = Bridge::open(Arc::new(CourseStore::new()));
    let worker = spawn_with_driver(consumer, options(), move || Box::pin(async move { Ok(page) }))
        .unwrap();

    let publisher = bridge.publisher();
    let producer = tokio::spawn(async move {
        publisher
            .publish(coupon_url("paid", "X"))
            .map_err(std::io::Error::other)?;
        Err::<(), _>(std::io::Error::other("listing went away"))
    });
    assert!(producer.await.unwrap().is_err());

    bridge.close().await.unwrap();
    let report = worker.wait().await.unwrap();

    assert_eq!(report.len(), 1);
    assert_eq!(report.count(Classification::Paid), 1);
}

#[tokio::test]
async fn broken_pages_are_reported_as_errors() {
    let page = FakePage::new();
    let (bridge, consumer) = Bridge::open(Arc::new(CourseStore::new()));
    let worker = spawn_with_driver(consumer, options(), move || Box::pin(async move { Ok(page) }))
        .unwrap();
    bridge.publisher().publish(coupon_url("ghost", "T")).unwrap();
    bridge.close().await.unwrap();

    let report = worker.wait().await.unwrap();

    assert_eq!(classification_of(&report, "ghost"), Some(Classification::Error));
    let mut store = CourseStore::new();
    report.merge_into(&mut store).unwrap();
    assert!(store.is_empty());
}
