//! Shared test fixtures.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use autocoupons_enroller::selectors::{
    CHECKOUT_BUTTON, ENROLL_BUTTON, PRICE, PURCHASED, TOTAL_AMOUNT,
};
use autocoupons_enroller::{DriverFut, PageDriver};
use autocoupons_types::CourseRef;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CHECKOUT_URL: &str = "https://www.udemy.com/payment/checkout/express/course/1/";
pub const DONE_URL: &str = "https://www.udemy.com/cart/success/";

/// What a course's landing page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// The coupon makes it free: enroll button and a zero checkout total.
    Free,
    Paid,
    /// Already in the account.
    Owned,
}

/// A page driver that serves landing pages by course id.
///
/// Unknown courses render an empty page, so every wait on them times out.
#[derive(Debug, Default)]
pub struct FakePage {
    listings: HashMap<String, Listing>,
    url: String,
    visits: Arc<Mutex<Vec<String>>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(mut self, url_id: &str, listing: Listing) -> Self {
        self.listings.insert(url_id.to_string(), listing);
        self
    }

    /// Course pages visited, readable after the page moved to the worker.
    pub fn visits(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.visits)
    }

    fn current_listing(&self) -> Option<Listing> {
        let course = CourseRef::from_url(&self.url)?;
        self.listings.get(course.url_id().as_str()).copied()
    }

    fn visible(&self, selector: &str) -> bool {
        match self.url.as_str() {
            CHECKOUT_URL => selector == TOTAL_AMOUNT || selector == CHECKOUT_BUTTON,
            DONE_URL => false,
            _ => match self.current_listing() {
                Some(Listing::Free) => selector == PRICE || selector == ENROLL_BUTTON,
                Some(Listing::Paid) => selector == PRICE,
                Some(Listing::Owned) => selector == PURCHASED,
                None => false,
            },
        }
    }
}

impl PageDriver for FakePage {
    type Element = &'static str;

    fn navigate<'a>(&'a mut self, url: &'a str) -> DriverFut<'a, ()> {
        Box::pin(async move {
            self.url = url.to_string();
            if let Ok(mut visits) = self.visits.lock() {
                visits.push(url.to_string());
            }
            Ok(())
        })
    }

    fn current_url(&mut self) -> DriverFut<'_, String> {
        Box::pin(async move { Ok(self.url.clone()) })
    }

    fn find_all<'a>(&'a mut self, selector: &'a str) -> DriverFut<'a, Vec<&'static str>> {
        Box::pin(async move {
            let known = [PRICE, ENROLL_BUTTON, PURCHASED, TOTAL_AMOUNT, CHECKOUT_BUTTON];
            Ok(known
                .into_iter()
                .filter(|candidate| *candidate == selector && self.visible(candidate))
                .collect())
        })
    }

    fn text<'a>(&'a mut self, element: &'a &'static str) -> DriverFut<'a, String> {
        Box::pin(async move {
            let text = match (*element, self.current_listing()) {
                (PRICE, Some(Listing::Paid)) => "$19.99",
                (PRICE, _) => "Free",
                (TOTAL_AMOUNT, _) => "0",
                _ => "",
            };
            Ok(text.to_string())
        })
    }

    fn is_clickable<'a>(&'a mut self, element: &'a &'static str) -> DriverFut<'a, bool> {
        Box::pin(async move { Ok(*element == ENROLL_BUTTON || *element == CHECKOUT_BUTTON) })
    }

    fn cursor<'a>(&'a mut self, _element: &'a &'static str) -> DriverFut<'a, String> {
        Box::pin(async { Ok("pointer".to_string()) })
    }

    fn click<'a>(&'a mut self, element: &'a &'static str) -> DriverFut<'a, ()> {
        Box::pin(async move {
            match *element {
                ENROLL_BUTTON => self.url = CHECKOUT_URL.to_string(),
                CHECKOUT_BUTTON => self.url = DONE_URL.to_string(),
                _ => {}
            }
            Ok(())
        })
    }

    fn quit(&mut self) -> DriverFut<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

/// Course URL carrying a coupon.
pub fn coupon_url(url_id: &str, token: &str) -> String {
    format!("https://www.udemy.com/course/{url_id}/?couponCode={token}")
}

/// Serve `course_urls` as a single page of the posts API.
pub async fn start_tutorialbar(course_urls: &[String], date: &str) -> MockServer {
    let server = MockServer::start().await;
    let posts: Vec<_> = course_urls
        .iter()
        .map(|url| serde_json::json!({ "date": date, "acf": { "course_url": url } }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts))
        .mount(&server)
        .await;
    server
}
