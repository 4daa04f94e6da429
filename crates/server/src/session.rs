//! Session cookie carrying the bounded conversation history (spec §6).
//!
//! The original (`examples/original_source/main.py`) keeps history in a
//! server-side session dict behind Starlette's `SessionMiddleware`, itself
//! backed by a signed cookie holding an opaque session id. This version
//! signs the (small, bounded-to-ten-turns) history directly into the
//! cookie with `axum-extra`'s `SignedCookieJar`, avoiding a second piece of
//! shared mutable state the spec doesn't otherwise require (spec §5: "no
//! cross-request shared mutable state except the conversation history
//! store").

use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
use scholarqa_llm::ChatMessage;
use tracing::warn;

pub const SESSION_COOKIE_NAME: &str = "scholarqa_session";

/// Reads the conversation history out of the signed cookie jar. A missing
/// or unparseable cookie is treated as an empty history rather than an
/// error — a fresh session is a normal starting state, not a failure.
pub fn read_history(jar: &SignedCookieJar) -> Vec<ChatMessage> {
    let Some(cookie) = jar.get(SESSION_COOKIE_NAME) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<ChatMessage>>(cookie.value()) {
        Ok(history) => history,
        Err(e) => {
            warn!(error = %e, "session cookie did not parse as conversation history, starting fresh");
            Vec::new()
        }
    }
}

/// Writes the updated history back into the signed cookie jar, trimmed to
/// the last ten turns (spec §3 lifecycle).
pub fn write_history(jar: SignedCookieJar, history: &[ChatMessage]) -> anyhow::Result<SignedCookieJar> {
    let start = history.len().saturating_sub(scholarqa_llm::MAX_HISTORY_TURNS);
    let bounded = &history[start..];
    let value = serde_json::to_string(bounded)?;
    let cookie = Cookie::build((SESSION_COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .build();
    Ok(jar.add(cookie))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_extra::extract::cookie::Key;

    #[test]
    fn round_trips_history_through_the_jar() {
        let key = Key::derive_from(&[7u8; 64]);
        let jar = SignedCookieJar::new(key);
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];

        let jar = write_history(jar, &history).unwrap();
        let read_back = read_history(&jar);

        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].content, "hi");
    }

    #[test]
    fn empty_jar_yields_empty_history() {
        let key = Key::derive_from(&[3u8; 64]);
        let jar = SignedCookieJar::new(key);
        assert!(read_history(&jar).is_empty());
    }

    #[test]
    fn write_history_trims_to_last_ten_turns() {
        let key = Key::derive_from(&[9u8; 64]);
        let jar = SignedCookieJar::new(key);
        let history: Vec<ChatMessage> = (0..16).map(|i| ChatMessage::user(format!("turn {i}"))).collect();

        let jar = write_history(jar, &history).unwrap();
        let read_back = read_history(&jar);

        assert_eq!(read_back.len(), 10);
        assert_eq!(read_back[0].content, "turn 6");
    }
}
