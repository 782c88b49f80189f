use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use std::collections::HashMap;

use crate::app::auth::TokenPair;
use crate::app::media::UploadedFile;
use crate::http::auth::{ACCESS_COOKIE, REFRESH_COOKIE};
use crate::http::AppError;

/// Text fields and files of a multipart form. A file input left empty by the
/// browser is treated as absent.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(name, UploadedFile { file_name, bytes });
                }
                None => {
                    let text = field.text().await.map_err(multipart_error)?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    pub fn has_flag(&self, name: &str) -> bool {
        matches!(self.text(name), Some(value) if !value.is_empty() && value != "false" && value != "0")
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::payload_too_large("upload is too large")
    } else {
        tracing::debug!(error = %err, "rejected multipart body");
        AppError::bad_request("invalid multipart form")
    }
}

pub fn session_cookies(tokens: &TokenPair, secure: bool) -> Vec<String> {
    let access_max_age = (tokens.access_expires_at - time::OffsetDateTime::now_utc())
        .whole_seconds()
        .max(0);
    let refresh_max_age = (tokens.refresh_expires_at - time::OffsetDateTime::now_utc())
        .whole_seconds()
        .max(0);
    vec![
        cookie(ACCESS_COOKIE, &tokens.access_token, access_max_age, secure),
        cookie(REFRESH_COOKIE, &tokens.refresh_token, refresh_max_age, secure),
    ]
}

pub fn cleared_cookies(secure: bool) -> Vec<String> {
    vec![
        cookie(ACCESS_COOKIE, "", 0, secure),
        cookie(REFRESH_COOKIE, "", 0, secure),
    ]
}

fn cookie(name: &str, value: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, value, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookies_are_http_only_and_optionally_secure() {
        let plain = cookie("access_token", "abc", 60, false);
        assert_eq!(plain, "access_token=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=60");

        let secure = cookie("access_token", "abc", 60, true);
        assert!(secure.ends_with("; Secure"));
    }

    #[test]
    fn cleared_cookies_expire_immediately() {
        for cookie in cleared_cookies(false) {
            assert!(cookie.contains("Max-Age=0"));
        }
    }

    #[test]
    fn flags_treat_empty_and_false_as_unset() {
        let mut form = MultipartForm::default();
        form.fields.insert("avatar-clear".into(), "on".into());
        form.fields.insert("off".into(), "false".into());
        form.fields.insert("blank".into(), String::new());
        assert!(form.has_flag("avatar-clear"));
        assert!(!form.has_flag("off"));
        assert!(!form.has_flag("blank"));
        assert!(!form.has_flag("absent"));
    }
}
