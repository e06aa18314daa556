// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_stream::stream;
use futures::Stream;
use serde_json::Value;

use crate::error::FetchError;
use crate::request::RequestDescriptor;
use crate::session::Session;
use crate::Params;

/// Cursor field of paginated Dynatrace responses.
pub const NEXT_PAGE_KEY: &str = "nextPageKey";

/// One decoded response body and the cursor it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub body: Value,
    pub next_page_key: Option<String>,
}

impl Page {
    pub fn new(body: Value) -> Self {
        let next_page_key = next_page_key(&body);
        Self {
            body,
            next_page_key,
        }
    }
}

fn next_page_key(body: &Value) -> Option<String> {
    match body.get(NEXT_PAGE_KEY)? {
        Value::Null => None,
        Value::String(key) => Some(key.clone()),
        other => Some(other.to_string()),
    }
}

/// Executes `request` and follows its cursor until the server stops returning one.
///
/// The first request carries the request's own parameters; every follow-up carries only
/// `nextPageKey`. An error ends the stream after being yielded once, and so does a cursor equal
/// to the one just sent. Nothing is fetched before the stream is polled.
pub fn fetch<'a>(
    session: &'a Session,
    request: RequestDescriptor,
) -> impl Stream<Item = Result<Page, FetchError>> + Send + 'a {
    stream! {
        let RequestDescriptor { url, mut params, .. } = request;
        let mut sent_cursor: Option<String> = None;
        loop {
            let page = match session.get_json(&url, &params).await {
                Ok(body) => Page::new(body),
                Err(error) => {
                    yield Err(error);
                    break;
                }
            };
            session.record_page();
            let cursor = page.next_page_key.clone();
            yield Ok(page);

            let Some(cursor) = cursor else {
                break;
            };
            if sent_cursor.as_deref() == Some(cursor.as_str()) {
                tracing::warn!(url = %url, cursor = %cursor, "Server repeated the page cursor, stopping pagination");
                break;
            }
            params = Params::from([(NEXT_PAGE_KEY.to_string(), cursor.clone())]);
            sent_cursor = Some(cursor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_token::ApiToken;
    use crate::http::HttpClientOptions;
    use crate::session::SessionOptions;
    use futures::StreamExt;
    use mockito::Matcher;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    async fn session(url: String) -> Session {
        let options = SessionOptions {
            tenant: url,
            api_token: ApiToken::from("t"),
            client: HttpClientOptions {
                allow_plaintext: true,
                ..HttpClientOptions::default()
            },
        };
        Session::open(&options, CancellationToken::new())
            .await
            .expect("session")
    }

    fn request(session: &Session, path: &str) -> RequestDescriptor {
        RequestDescriptor {
            url: format!("{}{path}", session.base_url()),
            params: Params::from([("from".to_string(), "1".to_string())]),
            endpoint: crate::catalog::Endpoint::Problems.descriptor(),
        }
    }

    #[test]
    fn next_page_key_handles_null_and_absent() {
        assert_eq!(next_page_key(&json!({"nextPageKey": null})), None);
        assert_eq!(next_page_key(&json!({"problems": []})), None);
        assert_eq!(next_page_key(&json!([1, 2])), None);
        assert_eq!(
            next_page_key(&json!({"nextPageKey": "abc"})),
            Some("abc".to_string())
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn repeated_cursor_stops_pagination() {
        let mut server = mockito::Server::new_async().await;
        let _first = server
            .mock("GET", "/api/v2/problems")
            .match_query(Matcher::UrlEncoded("from".into(), "1".into()))
            .with_body(r#"{"problems": [], "nextPageKey": "same"}"#)
            .create_async()
            .await;
        let again = server
            .mock("GET", "/api/v2/problems")
            .match_query(Matcher::Exact("nextPageKey=same".into()))
            .with_body(r#"{"problems": [], "nextPageKey": "same"}"#)
            .expect(1)
            .create_async()
            .await;

        let session = session(server.url()).await;
        let pages: Vec<_> = fetch(&session, request(&session, "/api/v2/problems"))
            .collect()
            .await;

        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(Result::is_ok));
        again.assert_async().await;
        assert!(logs_contain("Server repeated the page cursor"));
    }

    #[tokio::test]
    async fn error_ends_the_stream() {
        let mut server = mockito::Server::new_async().await;
        let _first = server
            .mock("GET", "/api/v2/problems")
            .match_query(Matcher::UrlEncoded("from".into(), "1".into()))
            .with_body(r#"{"problems": [{"problemId": "P-1"}], "nextPageKey": "k2"}"#)
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/api/v2/problems")
            .match_query(Matcher::Exact("nextPageKey=k2".into()))
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let session = session(server.url()).await;
        let pages: Vec<_> = fetch(&session, request(&session, "/api/v2/problems"))
            .collect()
            .await;

        assert_eq!(pages.len(), 2);
        assert!(pages[0].is_ok());
        assert!(matches!(
            pages[1],
            Err(FetchError::RemoteApi { status: 503, .. })
        ));
        assert_eq!(session.stats().pages, 1);
    }

    #[tokio::test]
    async fn nothing_is_sent_before_polling() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/problems")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let session = session(server.url()).await;
        let stream = fetch(&session, request(&session, "/api/v2/problems"));
        drop(stream);
        mock.assert_async().await;
    }
}
