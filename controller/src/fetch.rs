use std::{future::Future, time::Duration};

use tracing::debug;

use crate::{error::FetchError, metrics};

/// Raw calendar payload and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSource {
    pub url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

pub trait CalendarFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<CalendarSource, FetchError>> + Send;
}

/// Single-attempt HTTP fetcher; the timeout covers connect, headers and body.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        Ok(Self { client })
    }

    async fn fetch_once(&self, url: &str) -> Result<CalendarSource, FetchError> {
        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status();
        metrics::record_fetch(status.as_str());

        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let body = response.bytes().await.map_err(classify)?;
        debug!(url, status = status.as_u16(), bytes = body.len(), "calendar fetched");

        Ok(CalendarSource {
            url: url.to_string(),
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}

impl CalendarFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<CalendarSource, FetchError> {
        let result = self.fetch_once(url).await;
        match &result {
            Err(FetchError::Timeout) => {
                metrics::record_timeout();
                metrics::record_fetch(metrics::STATUS_TRANSPORT);
            }
            Err(FetchError::Transport(_)) => metrics::record_fetch(metrics::STATUS_TRANSPORT),
            Ok(_) | Err(FetchError::Http(_)) => {}
        }
        result
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(err.to_string())
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use chrono::{DateTime, Utc};

    use super::*;

    /// Replays scripted responses in order; the last one repeats forever.
    #[derive(Debug)]
    pub struct ScriptedFetcher {
        responses: Mutex<Vec<Result<Vec<u8>, FetchError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        pub fn new(responses: Vec<Result<Vec<u8>, FetchError>>) -> Self {
            assert!(!responses.is_empty());
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CalendarFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<CalendarSource, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = {
                let mut responses = self.responses.lock().unwrap();
                if responses.len() > 1 {
                    responses.remove(0)
                } else {
                    responses[0].clone()
                }
            };
            response.map(|body| CalendarSource {
                url: url.to_string(),
                status: 200,
                body,
            })
        }
    }

    pub fn calendar_body(events: &[(DateTime<Utc>, DateTime<Utc>, &str)]) -> Vec<u8> {
        let mut body = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n");
        for (index, (start, end, summary)) in events.iter().enumerate() {
            body.push_str(&format!(
                "BEGIN:VEVENT\r\nUID:event-{index}\r\nSUMMARY:{summary}\r\n\
                 DTSTART:{}\r\nDTEND:{}\r\nEND:VEVENT\r\n",
                start.format("%Y%m%dT%H%M%SZ"),
                end.format("%Y%m%dT%H%M%SZ"),
            ));
        }
        body.push_str("END:VCALENDAR\r\n");
        body.into_bytes()
    }
}
