//! The enrollment decision procedure.
//!
//! Four gates run in order and any of them may settle the course:
//!
//! 1. fast classification from landing-page signals (may report false
//!    positives, later gates are the authority);
//! 2. confirmed classification from the purchase section;
//! 3. navigation to checkout;
//! 4. checkout verification and the final purchase click.

use autocoupons_types::{Classification, SpecificCourse};

use crate::driver::{
    Condition, PageDriver, Waits, any_present, body_text, find, first_text,
};
use crate::error::AutomationFault;
use crate::selectors::{
    CART_BUTTON, CART_CHECKOUT, CHECKOUT_BUTTON, CHECKOUT_URL_PART, CURRENCY_MARKER,
    ENROLL_BUTTON, FORBIDDEN_BODY, FREE_BADGE, FREE_COURSE, GO_TO_CART, HOME_URL,
    NON_COURSE_URL_PARTS, NOT_FOUND_BANNER, OWNED_OR_FREE, OWNED_URL_PARTS, PRICE,
    PRIVATE_COURSE, PURCHASED, TOTAL_AMOUNT, UNAVAILABLE, UNREACHABLE,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct EnrollmentMachine {
    waits: Waits,
}

impl EnrollmentMachine {
    #[must_use]
    pub fn new(waits: Waits) -> Self {
        Self { waits }
    }

    /// Classify `course`, enrolling in it when the token makes it free.
    ///
    /// Page faults are logged and reported as [`Classification::Error`].
    pub async fn enroll<D: PageDriver>(
        &self,
        driver: &mut D,
        course: &SpecificCourse,
    ) -> Classification {
        match self.try_enroll(driver, course).await {
            Ok(classification) => classification,
            Err(err) => {
                tracing::warn!(%course, error = %err, "Page automation failed while enrolling");
                Classification::Error
            }
        }
    }

    async fn try_enroll<D: PageDriver>(
        &self,
        driver: &mut D,
        course: &SpecificCourse,
    ) -> Result<Classification, AutomationFault> {
        let url = course.checkout_url();
        tracing::debug!(%url, "Enrolling");
        driver.navigate(&url).await?;

        let state = self.fast_classification(driver, course).await?;
        if state != Classification::Enrollable {
            tracing::debug!(%course, %state, "Fast classification settled course");
            return Ok(state);
        }

        let state = self.confirmed_classification(driver).await?;
        if state != Classification::Enrollable {
            tracing::debug!(%course, %state, "Confirmed classification settled course");
            return Ok(state);
        }

        self.go_to_checkout(driver).await?;

        let state = self.verify_checkout(driver).await?;
        if state != Classification::Enrollable {
            // Earlier gates should have caught this.
            tracing::error!(%course, %state, "Checkout disagrees with course page");
            return Ok(state);
        }

        self.complete_checkout(driver).await?;
        Ok(Classification::Enrolled)
    }

    async fn fast_classification<D: PageDriver>(
        &self,
        driver: &mut D,
        course: &SpecificCourse,
    ) -> Result<Classification, AutomationFault> {
        let blanket_url = course.blanket_url();
        let mut signals = vec![
            Condition::BodyTextIs(FORBIDDEN_BODY),
            Condition::UrlIs(HOME_URL.to_string()),
            Condition::UrlIs(blanket_url.clone()),
        ];
        signals.extend(NON_COURSE_URL_PARTS.map(Condition::UrlContains));
        signals.extend(
            [
                UNAVAILABLE,
                NOT_FOUND_BANNER,
                PRIVATE_COURSE,
                ENROLL_BUTTON,
                FREE_BADGE,
                PURCHASED,
                FREE_COURSE,
                PRICE,
            ]
            .map(Condition::Located),
        );
        self.waits.until(driver, &Condition::AnyOf(signals)).await?;

        let url = driver.current_url().await?;
        let body = body_text(driver).await?;
        let blacklisted = body.trim() == FORBIDDEN_BODY
            || NON_COURSE_URL_PARTS.iter().any(|part| url.contains(part))
            || url == HOME_URL
            || any_present(driver, &UNREACHABLE).await?
            || any_present(driver, &OWNED_OR_FREE).await?;
        if blacklisted {
            return Ok(Classification::ToBlacklist);
        }

        let price = first_text(driver, PRICE).await?;
        tracing::debug!(%url, ?price, "Fast classification signals");
        let paid = url == blanket_url || price.is_some_and(|price| price.contains(CURRENCY_MARKER));
        Ok(if paid {
            Classification::Paid
        } else {
            Classification::Enrollable
        })
    }

    async fn confirmed_classification<D: PageDriver>(
        &self,
        driver: &mut D,
    ) -> Result<Classification, AutomationFault> {
        let signals = [PURCHASED, PRICE, FREE_BADGE, FREE_COURSE].map(Condition::Located);
        self.waits
            .until(driver, &Condition::AnyOf(signals.to_vec()))
            .await?;

        if any_present(driver, &OWNED_OR_FREE).await? {
            return Ok(Classification::ToBlacklist);
        }

        // The price element can render before its text.
        let price = self.waits.text(driver, PRICE).await?;
        tracing::debug!(%price, "Confirmed price");
        Ok(if price.contains(CURRENCY_MARKER) {
            Classification::Paid
        } else {
            Classification::Enrollable
        })
    }

    async fn go_to_checkout<D: PageDriver>(&self, driver: &mut D) -> Result<(), AutomationFault> {
        let either = Condition::AnyOf(vec![
            Condition::Located(ENROLL_BUTTON),
            Condition::Clickable(CART_BUTTON),
        ]);
        self.waits.until(driver, &either).await?;

        if find(driver, ENROLL_BUTTON).await?.is_some() {
            let button = self.waits.clickable(driver, ENROLL_BUTTON).await?;
            return driver.click(&button).await;
        }

        let cart = find(driver, CART_BUTTON)
            .await?
            .ok_or_else(|| AutomationFault::MissingElement(CART_BUTTON.to_string()))?;
        driver.click(&cart).await?;

        for selector in [GO_TO_CART, CART_CHECKOUT] {
            tracing::debug!(selector, "Waiting for cart control");
            let button = self.waits.clickable(driver, selector).await?;
            driver.click(&button).await?;
        }
        Ok(())
    }

    async fn verify_checkout<D: PageDriver>(
        &self,
        driver: &mut D,
    ) -> Result<Classification, AutomationFault> {
        let mut signals: Vec<_> = OWNED_URL_PARTS.map(Condition::UrlContains).to_vec();
        signals.push(Condition::Located(TOTAL_AMOUNT));
        self.waits.until(driver, &Condition::AnyOf(signals)).await?;

        let url = driver.current_url().await?;
        if OWNED_URL_PARTS.iter().any(|part| url.contains(part)) {
            return Ok(Classification::ToBlacklist);
        }

        let total = self.waits.located(driver, TOTAL_AMOUNT).await?;
        let total = driver.text(&total).await?;
        tracing::debug!(%total, "Checkout total");
        Ok(if total.trim_start().starts_with('0') {
            Classification::Enrollable
        } else {
            Classification::Paid
        })
    }

    async fn complete_checkout<D: PageDriver>(&self, driver: &mut D) -> Result<(), AutomationFault> {
        let ready = Condition::AllOf(vec![
            Condition::Clickable(CHECKOUT_BUTTON),
            Condition::CursorAllowed(CHECKOUT_BUTTON),
        ]);
        self.waits.until(driver, &ready).await?;

        let button = find(driver, CHECKOUT_BUTTON)
            .await?
            .ok_or_else(|| AutomationFault::MissingElement(CHECKOUT_BUTTON.to_string()))?;
        driver.click(&button).await?;

        self.waits
            .until(driver, &Condition::UrlOmits(CHECKOUT_URL_PART))
            .await
    }
}
