use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fetch;

/// Where a news item sits relative to its event window.
///
/// The feed encodes it as `{"kind": "will_start_after", "days": 3}`.
/// Kinds this build does not know, and known kinds missing their `days`,
/// decode as [`TimeMark::Unrecognized`] instead of failing the whole feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTimeMark", into = "RawTimeMark")]
pub enum TimeMark {
    WillStartAfter(u32),
    WillStartToday,
    HasPublished,
    WillEndAfter(u32),
    WillEndToday,
    HasEnded,
    Unrecognized,
}

/// Wire shape of a [`TimeMark`]. `days` is kept loose so that an unknown
/// kind carrying any payload still decodes.
#[derive(Debug, Serialize, Deserialize)]
struct RawTimeMark {
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    days: Option<serde_json::Value>,
}

impl From<RawTimeMark> for TimeMark {
    fn from(raw: RawTimeMark) -> Self {
        let days = raw
            .days
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|d| u32::try_from(d).ok());

        match (raw.kind.as_str(), days) {
            ("will_start_after", Some(n)) => TimeMark::WillStartAfter(n),
            ("will_start_today", _) => TimeMark::WillStartToday,
            ("has_published", _) => TimeMark::HasPublished,
            ("will_end_after", Some(n)) => TimeMark::WillEndAfter(n),
            ("will_end_today", _) => TimeMark::WillEndToday,
            ("has_ended", _) => TimeMark::HasEnded,
            _ => TimeMark::Unrecognized,
        }
    }
}

impl From<TimeMark> for RawTimeMark {
    fn from(mark: TimeMark) -> Self {
        let (kind, days) = match mark {
            TimeMark::WillStartAfter(n) => ("will_start_after", Some(n)),
            TimeMark::WillStartToday => ("will_start_today", None),
            TimeMark::HasPublished => ("has_published", None),
            TimeMark::WillEndAfter(n) => ("will_end_after", Some(n)),
            TimeMark::WillEndToday => ("will_end_today", None),
            TimeMark::HasEnded => ("has_ended", None),
            TimeMark::Unrecognized => ("unrecognized", None),
        };
        RawTimeMark {
            kind: kind.to_string(),
            days: days.map(serde_json::Value::from),
        }
    }
}

/// One entry of the news feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: u64,
    pub subject: String,
    /// Publication time in seconds since the Unix epoch.
    pub timestamp: f64,
    pub time_mark: TimeMark,
}

/// Source of the latest news, newest first.
pub trait NewsSource: Send + Sync {
    fn latest(&self) -> impl Future<Output = Result<Vec<NewsItem>>> + Send;
}

/// Items newer than `watermark`.
///
/// Takes the leading run of items whose timestamp is above the watermark and
/// stops at the first one that is not, so an older item further down the
/// list is never picked up even if its timestamp is higher.
pub fn diff_since(items: &[NewsItem], watermark: f64) -> &[NewsItem] {
    let fresh = items
        .iter()
        .position(|item| item.timestamp <= watermark)
        .unwrap_or(items.len());
    &items[..fresh]
}

/// Reads the feed as a JSON array over HTTP.
#[derive(Debug, Clone)]
pub struct HttpNewsSource {
    client: Client,
    url: String,
    attempts: u32,
}

impl HttpNewsSource {
    pub fn new(url: String, attempts: u32, timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(fetch::http_client(timeout)?, url, attempts))
    }

    pub fn with_client(client: Client, url: String, attempts: u32) -> Self {
        Self {
            client,
            url,
            attempts,
        }
    }
}

impl NewsSource for HttpNewsSource {
    async fn latest(&self) -> Result<Vec<NewsItem>> {
        let items: Vec<NewsItem> = fetch::get_json(&self.client, &self.url, self.attempts).await?;
        tracing::debug!(count = items.len(), "fetched news feed");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(id: u64, timestamp: f64) -> NewsItem {
        NewsItem {
            id,
            subject: format!("news {id}"),
            timestamp,
            time_mark: TimeMark::HasPublished,
        }
    }

    #[test]
    fn diff_is_a_prefix_take() {
        let items = vec![item(1, 1500.0), item(2, 1200.0), item(3, 900.0), item(4, 1100.0)];
        let diff = diff_since(&items, 1000.0);
        let ids: Vec<u64> = diff.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn diff_excludes_items_at_the_watermark() {
        let items = vec![item(1, 1000.0), item(2, 2000.0)];
        assert!(diff_since(&items, 1000.0).is_empty());
    }

    #[test]
    fn diff_of_all_fresh_and_of_nothing() {
        let items = vec![item(1, 3000.0), item(2, 2000.0)];
        assert_eq!(diff_since(&items, 1000.0).len(), 2);
        assert!(diff_since(&[], 1000.0).is_empty());
    }

    #[test]
    fn time_mark_wire_format() {
        let parsed: TimeMark = serde_json::from_str(r#"{"kind":"will_end_after","days":2}"#).unwrap();
        assert_eq!(parsed, TimeMark::WillEndAfter(2));

        let parsed: TimeMark = serde_json::from_str(r#"{"kind":"has_ended"}"#).unwrap();
        assert_eq!(parsed, TimeMark::HasEnded);

        let json = serde_json::to_string(&TimeMark::WillStartAfter(1)).unwrap();
        assert_eq!(json, r#"{"kind":"will_start_after","days":1}"#);
    }

    #[test]
    fn unknown_time_mark_is_unrecognized() {
        let parsed: TimeMark = serde_json::from_str(r#"{"kind":"is_postponed"}"#).unwrap();
        assert_eq!(parsed, TimeMark::Unrecognized);
    }

    #[test]
    fn unknown_time_mark_with_days_is_unrecognized() {
        for raw in [
            r#"{"kind":"will_be_postponed_after","days":3}"#,
            r#"{"kind":"is_postponed","days":"soon"}"#,
            r#"{"kind":"will_start_after"}"#,
            r#"{"kind":"will_end_after","days":-1}"#,
        ] {
            let parsed: TimeMark = serde_json::from_str(raw).unwrap();
            assert_eq!(parsed, TimeMark::Unrecognized, "{raw}");
        }
    }

    #[test]
    fn feed_with_unknown_kind_still_parses() {
        let items: Vec<NewsItem> = serde_json::from_str(
            r#"[
                {"id": 2, "subject": "Postponed", "timestamp": 2000,
                 "time_mark": {"kind": "will_be_postponed_after", "days": 3}},
                {"id": 1, "subject": "Done", "timestamp": 1000,
                 "time_mark": {"kind": "has_ended"}}
            ]"#,
        )
        .unwrap();
        assert_eq!(items[0].time_mark, TimeMark::Unrecognized);
        assert_eq!(items[1].time_mark, TimeMark::HasEnded);
    }

    #[tokio::test]
    async fn http_source_decodes_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[
                    {"id": 9, "subject": "Live event", "timestamp": 1700000000.5,
                     "time_mark": {"kind": "will_start_today"}},
                    {"id": 8, "subject": "Gacha", "timestamp": 1699990000,
                     "time_mark": {"kind": "will_end_after", "days": 4}}
                ]"#,
            ))
            .mount(&server)
            .await;

        let source = HttpNewsSource::new(
            format!("{}/news.json", server.uri()),
            2,
            Duration::from_secs(5),
        )
        .unwrap();
        let items = source.latest().await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].time_mark, TimeMark::WillStartToday);
        assert_eq!(items[1].time_mark, TimeMark::WillEndAfter(4));
        assert_eq!(items[1].timestamp, 1699990000.0);
    }
}
