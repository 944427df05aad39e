//! DOM selectors and URL markers for the storefront pages.
//!
//! These are collaborators owned by the external site; when the site changes
//! its markup, this is the file to fix.

/// Query-string marker identifying the library download endpoint
pub const DOWNLOAD_MARKER: &str = "download?asin=";

/// Email input on the sign-in page
pub const EMAIL_FIELD: &str = "#ap_email";

/// Password input on the sign-in page
pub const PASSWORD_FIELD: &str = "#ap_password";

/// Two-stage sign-in continue button
pub const CONTINUE_BUTTON: &str = "#continue";

/// Direct sign-in submit button
pub const SIGNIN_BUTTON: &str = "#signInSubmit";

/// Library search box
pub const LIBRARY_SEARCH: &str = "#lib-search";

/// One row per book in the library listing
pub const LIBRARY_ROW: &str = ".adbl-library-content-row";

/// Download link inside a library row
pub const DOWNLOAD_BUTTON: &str = r#"span[id^="download-button-"] > a.bc-button-text"#;

/// Whether a request URL is the library download endpoint
pub fn is_download_request(url: &str) -> bool {
    url.contains(DOWNLOAD_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_request_matches_marker() {
        assert!(is_download_request(
            "https://www.audible.com/library/download?asin=B002V0QK4C&codec=AAX"
        ));
    }

    #[test]
    fn test_other_requests_do_not_match() {
        assert!(!is_download_request("https://www.audible.com/library/titles"));
        assert!(!is_download_request(
            "https://www.audible.com/static/download.css"
        ));
        assert!(!is_download_request(
            "https://www.audible.com/pd/product?asin=B002V0QK4C"
        ));
        assert!(!is_download_request(""));
    }
}
