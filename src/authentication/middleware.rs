use warp::{
    reject::{self, Rejection},
    Filter,
};

use super::jwt::{verify_jwt_session, SessionData};

#[derive(Debug)]
pub struct Unauthorized;

impl reject::Reject for Unauthorized {}

/// Extracts the token from `Token <jwt>` or `Bearer <jwt>`.
pub fn parse_authorization(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    match scheme {
        "Token" | "Bearer" if !token.trim().is_empty() => Some(token.trim()),
        _ => None,
    }
}

fn authorize(header: &str, secret: &str) -> Option<SessionData> {
    let token = parse_authorization(header)?;
    verify_jwt_session(token, secret).ok().map(SessionData::from)
}

pub fn with_session(
    secret: String,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::<String>("authorization").and_then(move |header: String| {
        let session = authorize(&header, &secret);
        async move { session.ok_or_else(|| reject::custom(Unauthorized)) }
    })
}

pub fn with_possible_session(
    secret: String,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").map(move |header: Option<String>| {
        header
            .as_deref()
            .and_then(|header| authorize(header, &secret))
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        jwt::generate_jwt_session,
        schema::{User, UserRole},
    };

    use super::*;

    const SECRET: &str = "middleware-secret";

    fn token() -> String {
        let user = User {
            id: 3,
            email: String::from("a@example.com"),
            username: String::from("alice"),
            first_name: String::new(),
            last_name: String::new(),
            password: String::new(),
            role: UserRole::User,
        };
        generate_jwt_session(&user, SECRET, 1)
            .ok()
            .expect("token is signed")
    }

    #[test]
    fn parses_authorization_schemes() {
        assert_eq!(parse_authorization("Token abc"), Some("abc"));
        assert_eq!(parse_authorization("Bearer abc "), Some("abc"));
        assert_eq!(parse_authorization("Basic abc"), None);
        assert_eq!(parse_authorization("Token "), None);
        assert_eq!(parse_authorization("abc"), None);
    }

    #[tokio::test]
    async fn session_filter_accepts_valid_token() {
        let session = warp::test::request()
            .header("authorization", format!("Token {}", token()))
            .filter(&with_session(SECRET.to_string()))
            .await
            .unwrap();

        assert_eq!(session.user_id, 3);
    }

    #[tokio::test]
    async fn session_filter_rejects_missing_or_bad_token() {
        let filter = with_session(SECRET.to_string());

        assert!(warp::test::request().filter(&filter).await.is_err());
        assert!(warp::test::request()
            .header("authorization", "Token nope")
            .filter(&filter)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn possible_session_is_none_for_anonymous_viewer() {
        let filter = with_possible_session(SECRET.to_string());

        let anonymous = warp::test::request().filter(&filter).await.unwrap();
        assert!(anonymous.is_none());

        let viewer = warp::test::request()
            .header("authorization", format!("Bearer {}", token()))
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(viewer.map(|s| s.username), Some(String::from("alice")));
    }
}
