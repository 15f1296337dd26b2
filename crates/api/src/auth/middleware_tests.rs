// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]

//! Tests for credential extraction and local token validation.

use axum::body::Body;
use axum::extract::Request;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use uuid::Uuid;

use super::jwt::JwtManager;
use super::middleware::{extract_token, token_from_cookie_header, AuthMethod};

const TEST_SECRET: &str = "super-secret-supabase-jwt-secret";

#[derive(Serialize)]
struct TestClaims {
    sub: String,
    email: Option<String>,
    aud: String,
    exp: usize,
}

fn make_token(sub: &str, secret: &str) -> String {
    let claims = TestClaims {
        sub: sub.to_string(),
        email: Some("user@example.com".to_string()),
        aud: "authenticated".to_string(),
        exp: 4_102_444_800, // 2100-01-01, far enough out for any test run
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn request_with_headers(headers: &[(&str, &str)]) -> Request {
    let mut builder = Request::builder().uri("/api/clips");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

#[test]
fn test_bearer_header_extracted() {
    let request = request_with_headers(&[("Authorization", "Bearer tok_abc")]);
    let (token, method) = extract_token(&request).unwrap();
    assert_eq!(token, "tok_abc");
    assert_eq!(method, AuthMethod::Bearer);
}

#[test]
fn test_cookie_fallback() {
    let request = request_with_headers(&[("Cookie", "pagestash_auth_token=tok_cookie")]);
    let (token, method) = extract_token(&request).unwrap();
    assert_eq!(token, "tok_cookie");
    assert_eq!(method, AuthMethod::Cookie);
}

#[test]
fn test_header_preferred_over_cookie() {
    let request = request_with_headers(&[
        ("Authorization", "Bearer tok_header"),
        ("Cookie", "pagestash_auth_token=tok_cookie"),
    ]);
    let (token, method) = extract_token(&request).unwrap();
    assert_eq!(token, "tok_header");
    assert_eq!(method, AuthMethod::Bearer);
}

#[test]
fn test_no_credentials() {
    let request = request_with_headers(&[]);
    assert!(extract_token(&request).is_none());
}

#[test]
fn test_non_bearer_authorization_ignored() {
    // An ApiKey or Basic scheme is not a session token.
    let request = request_with_headers(&[("Authorization", "Basic dXNlcjpwYXNz")]);
    assert!(extract_token(&request).is_none());
}

#[test]
fn test_cookie_parsing_among_others() {
    let value = "theme=dark; pagestash_auth_token=tok_1; _ga=GA1.2";
    assert_eq!(token_from_cookie_header(value).unwrap(), "tok_1");
}

#[test]
fn test_cookie_name_prefix_not_confused() {
    // A cookie whose name merely starts with ours must not match.
    let value = "pagestash_auth_token_old=stale";
    assert!(token_from_cookie_header(value).is_none());
}

#[test]
fn test_valid_token_validates() {
    let user_id = Uuid::new_v4();
    let token = make_token(&user_id.to_string(), TEST_SECRET);

    let manager = JwtManager::new(TEST_SECRET);
    let claims = manager.validate_access_token(&token).unwrap();
    assert_eq!(claims.sub, user_id.to_string());
    assert_eq!(claims.email.as_deref(), Some("user@example.com"));
}

#[test]
fn test_wrong_secret_rejected() {
    let token = make_token(&Uuid::new_v4().to_string(), "some-other-secret");
    let manager = JwtManager::new(TEST_SECRET);
    assert!(manager.validate_access_token(&token).is_err());
}

#[test]
fn test_garbage_token_rejected() {
    let manager = JwtManager::new(TEST_SECRET);
    assert!(manager.validate_access_token("not.a.jwt").is_err());
    assert!(manager.validate_access_token("").is_err());
}
