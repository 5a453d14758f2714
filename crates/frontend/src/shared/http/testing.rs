//! Scripted in-memory transport for tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

use super::{HttpRequest, HttpResponse, HttpTransport, TransportError};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Respond(HttpResponse),
    Fail(TransportError),
    /// Never completes
    Hang,
    /// Responds after a delay
    Delayed(Duration, HttpResponse),
}

impl Reply {
    pub(crate) fn json(status: u16, body: &str) -> Self {
        Reply::Respond(HttpResponse {
            status,
            body: body.to_string(),
        })
    }
}

/// Routes by URL path (query string ignored); each route replays its
/// replies in order and repeats the last one. Unknown routes answer 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: RefCell<Vec<(String, VecDeque<Reply>)>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(self, path: &str, reply: Reply) -> Self {
        {
            let mut routes = self.routes.borrow_mut();
            match routes.iter_mut().find(|(p, _)| p == path) {
                Some((_, replies)) => replies.push_back(reply),
                None => routes.push((path.to_string(), VecDeque::from([reply]))),
            }
        }
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| path_of(&r.url) == path)
            .count()
    }

    fn next_reply(&self, path: &str) -> Option<Reply> {
        let mut routes = self.routes.borrow_mut();
        let (_, replies) = routes.iter_mut().find(|(p, _)| p == path)?;
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    }
}

fn path_of(url: &str) -> &str {
    let without_query = url.split('?').next().unwrap_or(url);
    match without_query.find("://") {
        Some(scheme_end) => {
            let rest = &without_query[scheme_end + 3..];
            rest.find('/').map_or("/", |i| &rest[i..])
        }
        None => without_query,
    }
}

#[async_trait(?Send)]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = path_of(&request.url).to_string();
        self.requests.borrow_mut().push(request);

        match self.next_reply(&path) {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(error)) => Err(error),
            Some(Reply::Hang) => futures::future::pending().await,
            Some(Reply::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            None => Ok(HttpResponse {
                status: 404,
                body: r#"{"detail":"Not Found"}"#.to_string(),
            }),
        }
    }
}
