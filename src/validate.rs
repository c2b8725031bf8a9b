//! Client-side input checks performed before any request is dispatched.
use crate::error::ApiError;
use once_cell::sync::Lazy;
use regex::Regex;

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid slug regex"));

static SHEET_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").expect("valid sheet URL regex"));

const MAX_NAME_LEN: usize = 100;
const MAX_SLUG_LEN: usize = 50;

/// Derive a URL-safe slug from a display name: lowercase, runs of
/// non-alphanumerics collapse to single hyphens, leading/trailing hyphens
/// stripped. A name with no ASCII alphanumerics yields an empty string.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

pub fn name_input(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("category name must be non-empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::validation(format!(
            "category name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

pub fn slug_input(slug: &str) -> Result<(), ApiError> {
    if slug.is_empty() {
        return Err(ApiError::validation("category slug must be non-empty"));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(ApiError::validation(format!(
            "category slug must be at most {MAX_SLUG_LEN} characters"
        )));
    }
    if !SLUG_RE.is_match(slug) {
        return Err(ApiError::validation(format!(
            "category slug '{slug}' must match [a-z0-9-]+"
        )));
    }
    Ok(())
}

pub fn category_input(name: &str, slug: &str) -> Result<(), ApiError> {
    name_input(name)?;
    slug_input(slug)
}

pub fn keyword_input(keyword: &str) -> Result<(), ApiError> {
    if keyword.trim().is_empty() {
        return Err(ApiError::validation("keyword must be non-empty"));
    }
    Ok(())
}

pub fn page_params(page: u32, per_page: u32) -> Result<(), ApiError> {
    if page < 1 {
        return Err(ApiError::validation("page must be >= 1"));
    }
    if per_page < 1 {
        return Err(ApiError::validation("per_page must be >= 1"));
    }
    Ok(())
}

/// Extract the spreadsheet id from a Google Sheets URL. Rejects anything not
/// containing a `/spreadsheets/d/{id}` segment before a request is sent.
pub fn sheet_id_from_url(url: &str) -> Result<String, ApiError> {
    SHEET_URL_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            ApiError::validation(format!(
                "'{url}' is not a spreadsheet URL (expected /spreadsheets/d/{{id}})"
            ))
        })
}
