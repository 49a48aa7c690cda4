use futures::StreamExt;
use subtle::ConstantTimeEq;

pub fn get_header_str_value<'a>(headers: &'a ntex::http::HeaderMap, key: &str) -> Option<&'a str> {
    headers.get(key).and_then(|v| v.to_str().ok())
}

/// Compares a shared secret in constant time. An empty expected secret never matches.
pub fn secret_matches(provided: Option<&str>, expected: &str) -> bool {
    match provided {
        Some(provided) if !expected.is_empty() => {
            provided.as_bytes().ct_eq(expected.as_bytes()).into()
        }
        _ => false,
    }
}

/// Value of `key` (`name`, `filename`) in a `content-disposition` header
pub fn content_disposition_param(content_disposition: &str, key: &str) -> Option<String> {
    content_disposition
        .split(';')
        .filter_map(|section| section.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(key))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Concats the chunks of a multipart field, skipping the failed ones
pub async fn get_bytes_value(field: ntex_multipart::Field) -> Vec<u8> {
    field
        .filter_map(|x| async move { x.ok() })
        .collect::<Vec<ntex::util::Bytes>>()
        .await
        .concat()
}

/// Multipart field as text
pub async fn get_field_value(field: ntex_multipart::Field) -> String {
    String::from_utf8_lossy(&get_bytes_value(field).await).into_owned()
}
