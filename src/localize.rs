use crate::news::TimeMark;

/// Alert body expressed as a key into the app's localization table plus its
/// format arguments; the device renders the final string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedBody {
    pub key: &'static str,
    pub args: Vec<String>,
}

impl LocalizedBody {
    fn new(key: &'static str) -> Self {
        Self { key, args: Vec::new() }
    }

    fn counted(one: &'static str, other: &'static str, n: u32) -> Self {
        Self {
            key: if n == 1 { one } else { other },
            args: vec![n.to_string()],
        }
    }
}

/// Body for an item with the given time mark, or `None` when the mark is
/// unknown to this build.
pub fn body_for(mark: TimeMark) -> Option<LocalizedBody> {
    let body = match mark {
        TimeMark::WillStartAfter(days) => LocalizedBody::counted(
            "News.time-mark.will-start-after.one",
            "News.time-mark.will-start-after.other",
            days,
        ),
        TimeMark::WillEndAfter(days) => LocalizedBody::counted(
            "News.time-mark.will-end-after.one",
            "News.time-mark.will-end-after.other",
            days,
        ),
        TimeMark::WillEndToday => LocalizedBody::new("News.time-mark.will-end-today"),
        TimeMark::HasEnded => LocalizedBody::new("News.time-mark.has-ended"),
        TimeMark::HasPublished => LocalizedBody::new("News.time-mark.has-published"),
        TimeMark::WillStartToday => LocalizedBody::new("News.time-mark.will-start-today"),
        TimeMark::Unrecognized => return None,
    };
    Some(body)
}
