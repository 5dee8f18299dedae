use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::StatusCode;
use actix_web::http::header::{self, ContentType};
use actix_web::{HttpRequest, HttpResponse, HttpResponseBuilder};

pub const FLASH_COOKIE: &str = "maiscan_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Success,
    Info,
    Danger,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Info => "info",
            FlashLevel::Danger => "danger",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(FlashLevel::Success),
            "info" => Some(FlashLevel::Info),
            "danger" => Some(FlashLevel::Danger),
            _ => None,
        }
    }
}

/// A message shown once, on the page rendered after a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub message: String,
}

impl FlashMessage {
    pub fn new(level: FlashLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Info, message)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Danger, message)
    }

    pub fn to_cookie(&self) -> Cookie<'static> {
        let value = format!("{}|{}", self.level.as_str(), self.message);
        Cookie::build(FLASH_COOKIE, urlencoding::encode(&value).into_owned())
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .finish()
    }

    fn decode(raw: &str) -> Option<Self> {
        let value = urlencoding::decode(raw).ok()?;
        let (level, message) = value.split_once('|')?;
        Some(Self::new(FlashLevel::parse(level)?, message))
    }

    /// Reads the pending message, if any. Malformed cookies are ignored.
    pub fn from_request(req: &HttpRequest) -> Option<Self> {
        let cookie = req.cookie(FLASH_COOKIE)?;
        let message = Self::decode(cookie.value());
        if message.is_none() && !cookie.value().is_empty() {
            log::debug!("Ignoring malformed flash cookie");
        }
        message
    }
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(FLASH_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// `302 Found` to `location`, carrying `flash` to the next page.
pub fn redirect(location: &str, flash: FlashMessage) -> HttpResponseBuilder {
    let mut builder = HttpResponse::Found();
    builder
        .insert_header((header::LOCATION, location.to_string()))
        .cookie(flash.to_cookie());
    builder
}

/// Renders an HTML page with the pending flash message (plus `extra`), and
/// consumes the flash cookie.
pub fn render_page<F>(
    req: &HttpRequest,
    status: StatusCode,
    extra: Option<FlashMessage>,
    page: F,
) -> HttpResponse
where
    F: FnOnce(&[FlashMessage]) -> String,
{
    let pending = FlashMessage::from_request(req);
    let had_cookie = req.cookie(FLASH_COOKIE).is_some();
    let messages: Vec<FlashMessage> = pending.into_iter().chain(extra).collect();

    let mut builder = HttpResponse::build(status);
    builder.content_type(ContentType::html());
    if had_cookie {
        builder.cookie(removal_cookie());
    }
    builder.body(page(&messages))
}
