//! CSS selectors and URL markers for course and checkout pages.

pub const ENROLL_BUTTON: &str =
    r#"[class*="sidebar-container--content"] [data-purpose*="buy-this-course-button"].ud-btn-primary"#;
pub const CART_BUTTON: &str =
    r#"[class*="sidebar-container--content"] [data-purpose*="add-to-cart"] button"#;
pub const FREE_BADGE: &str = r#".ud-badge-free, [class*="course-badges-module--free"]"#;
pub const PURCHASED: &str = r#"[class*="purchase-info"]"#;
pub const FREE_COURSE: &str = r#"[class*="generic-purchase-section--free-course"]"#;
pub const PRICE: &str = r#"[class*="sidebar-container--content"] [data-purpose*="course-price-text"] span:not(.ud-sr-only)"#;

pub const UNAVAILABLE: &str = r#"[class*="limited-access-container--content"]"#;
pub const NOT_FOUND_BANNER: &str = ".error__container";
pub const PRIVATE_COURSE: &str = r#"[class*="course-landing-page-private"]"#;

pub const GO_TO_CART: &str = r#"[data-purpose*="go-to-cart-button"]"#;
pub const CART_CHECKOUT: &str = r#"[data-purpose*="shopping-cart-checkout"]"#;
pub const TOTAL_AMOUNT: &str = r#"[data-purpose*="total-amount-summary"] span:nth-child(2)"#;
pub const CHECKOUT_BUTTON: &str = r#"[class*="checkout-button--checkout-button--button"]"#;

/// Markers meaning the course is already owned, free, or gone.
pub const OWNED_OR_FREE: [&str; 3] = [FREE_BADGE, PURCHASED, FREE_COURSE];
pub const UNREACHABLE: [&str; 3] = [UNAVAILABLE, NOT_FOUND_BANNER, PRIVATE_COURSE];

pub const HOME_URL: &str = "https://www.udemy.com/";
pub const FORBIDDEN_BODY: &str = "Forbidden";
/// URL shapes that are listings or drafts rather than a course landing page.
pub const NON_COURSE_URL_PARTS: [&str; 3] = ["/topic/", "/courses/", "/draft/"];
/// URL shapes reached at checkout when the account already owns the course.
pub const OWNED_URL_PARTS: [&str; 2] = ["/learn/lecture/", "/cart/subscribe/course/"];
pub const CHECKOUT_URL_PART: &str = "checkout";

pub const CURRENCY_MARKER: char = '$';
