use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::models::{Category, Event};
use crate::services::completion::{CompletionError, CompletionService};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Request text is empty")]
    EmptyInput,

    #[error("Completion service returned no structured event")]
    NoStructuredOutput,

    #[error("Malformed event proposal: {0}")]
    MalformedResponse(String),

    #[error("Completion service unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl From<CompletionError> for NormalizeError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Unavailable(msg) => NormalizeError::UpstreamUnavailable(msg),
            CompletionError::InvalidEnvelope(msg) => NormalizeError::MalformedResponse(msg),
        }
    }
}

/// Default length of an event when the completion service gives no usable end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationPolicy {
    exam: Duration,
}

impl DurationPolicy {
    pub const DEFAULT_EXAM_MINUTES: i64 = 150;

    /// `None` unless `minutes` is positive and representable as a duration.
    pub fn with_exam_minutes(minutes: i64) -> Option<Self> {
        Duration::try_minutes(minutes)
            .filter(|exam| *exam > Duration::zero())
            .map(|exam| Self { exam })
    }

    pub fn duration_for(&self, category: Category) -> Duration {
        match category {
            Category::Lecture | Category::Tutorial => Duration::hours(1),
            Category::Social => Duration::minutes(30),
            Category::Exam => self.exam,
            Category::Club | Category::Assignment | Category::Other => Duration::hours(1),
        }
    }
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self {
            exam: Duration::minutes(Self::DEFAULT_EXAM_MINUTES),
        }
    }
}

/// Arguments of the `createEvent` call as the model produced them.
#[derive(Debug, Deserialize)]
struct ProposedEvent {
    title: String,
    start: String,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Turns a free-form request plus a category into a fully populated [`Event`].
pub struct EventNormalizer {
    completion: Arc<dyn CompletionService>,
    policy: DurationPolicy,
    offset: FixedOffset,
}

impl EventNormalizer {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        policy: DurationPolicy,
        offset: FixedOffset,
    ) -> Self {
        Self {
            completion,
            policy,
            offset,
        }
    }

    pub fn policy(&self) -> &DurationPolicy {
        &self.policy
    }

    pub async fn normalize(
        &self,
        request_text: &str,
        category: Category,
    ) -> Result<Event, NormalizeError> {
        let now = Utc::now().with_timezone(&self.offset);
        self.normalize_at(request_text, category, now).await
    }

    /// Same as [`normalize`](Self::normalize) with an explicit "current time"
    /// used to anchor relative expressions in the request.
    pub async fn normalize_at(
        &self,
        request_text: &str,
        category: Category,
        now: DateTime<FixedOffset>,
    ) -> Result<Event, NormalizeError> {
        let request_text = request_text.trim();
        if request_text.is_empty() {
            return Err(NormalizeError::EmptyInput);
        }

        let context = build_context(request_text, category, now, &self.policy);

        tracing::debug!(category = %category, "Requesting structured event proposal");
        let call = self
            .completion
            .propose_event(&context)
            .await?
            .ok_or(NormalizeError::NoStructuredOutput)?;

        let proposal: ProposedEvent = serde_json::from_str(&call.arguments)
            .map_err(|e| NormalizeError::MalformedResponse(format!("invalid arguments: {}", e)))?;

        let title = proposal.title.trim();
        if title.is_empty() {
            return Err(NormalizeError::MalformedResponse("empty title".to_string()));
        }

        let start = parse_timestamp(&proposal.start, self.offset).ok_or_else(|| {
            NormalizeError::MalformedResponse(format!("invalid start: {}", proposal.start))
        })?;

        let end = match proposal.end.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_timestamp(raw, self.offset).ok_or_else(|| {
                NormalizeError::MalformedResponse(format!("invalid end: {}", raw))
            })?),
        };

        let end = match end {
            Some(end) if end > start => end,
            _ => start
                .checked_add_signed(self.policy.duration_for(category))
                .ok_or_else(|| {
                    NormalizeError::MalformedResponse(format!("no end representable after {}", start))
                })?,
        };

        Ok(Event::new(
            title.to_string(),
            start,
            end,
            proposal.description.unwrap_or_default().trim().to_string(),
            category,
        ))
    }
}

/// Context text handed to the completion service for one submission.
pub fn build_context(
    request_text: &str,
    category: Category,
    now: DateTime<FixedOffset>,
    policy: &DurationPolicy,
) -> String {
    let minutes = policy.duration_for(category).num_minutes();
    format!(
        "Request: \"{request}\"\n\
         Category: {category}\n\
         Current date: {date} ({weekday}), current time: {time}, UTC offset {offset}\n\
         Resolve relative expressions such as \"tomorrow\" or \"next Friday\" against the current date.\n\
         Duration guidance: a {category} usually lasts {minutes} minutes; \
         if the request gives no end time, end the event {minutes} minutes after it starts.\n\
         Call createEvent with a short title, ISO 8601 start and end date-times, \
         and a one-sentence description.",
        request = request_text,
        category = category,
        date = now.format("%Y-%m-%d"),
        weekday = now.format("%A"),
        time = now.format("%H:%M"),
        offset = now.offset(),
        minutes = minutes,
    )
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse an RFC 3339 date-time, or a naive one interpreted in `offset`.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| naive.and_local_timezone(offset).single())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::services::completion::fake::FakeCompletion;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        utc().with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()
    }

    fn normalizer(fake: Arc<FakeCompletion>) -> EventNormalizer {
        EventNormalizer::new(fake, DurationPolicy::default(), utc())
    }

    #[tokio::test]
    async fn empty_input_never_reaches_upstream() {
        let fake = Arc::new(FakeCompletion::with_arguments(json!({})));
        let n = normalizer(fake.clone());

        for text in ["", "   ", "\n\t"] {
            for category in Category::ALL {
                let err = n.normalize_at(text, category, now()).await.unwrap_err();
                assert!(matches!(err, NormalizeError::EmptyInput));
            }
        }
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn valid_proposal_is_preserved() {
        let fake = Arc::new(FakeCompletion::with_arguments(json!({
            "title": "Algorithms lecture",
            "start": "2026-10-20T09:00:00+02:00",
            "end": "2026-10-20T10:30:00+02:00",
            "description": "Room 101"
        })));
        let n = normalizer(fake.clone());

        for category in Category::ALL {
            let event = n
                .normalize_at("algorithms tomorrow 9 to 10:30", category, now())
                .await
                .unwrap();
            let offset = FixedOffset::east_opt(2 * 3600).unwrap();
            assert_eq!(event.start(), offset.with_ymd_and_hms(2026, 10, 20, 9, 0, 0).unwrap());
            assert_eq!(event.end(), offset.with_ymd_and_hms(2026, 10, 20, 10, 30, 0).unwrap());
            assert_eq!(event.category(), category);
            assert_eq!(event.color(), category.color());
            assert_eq!(event.title(), "Algorithms lecture");
            assert_eq!(event.description(), "Room 101");
        }
        assert_eq!(fake.calls(), Category::ALL.len());
    }

    #[tokio::test]
    async fn missing_end_uses_category_default() {
        let n = normalizer(Arc::new(FakeCompletion::with_arguments(json!({
            "title": "Something",
            "start": "2026-10-20T15:00:00"
        }))));
        let policy = DurationPolicy::default();
        let start = utc().with_ymd_and_hms(2026, 10, 20, 15, 0, 0).unwrap();

        for category in Category::ALL {
            let event = n.normalize_at("something", category, now()).await.unwrap();
            assert_eq!(event.start(), start);
            assert_eq!(event.end(), start + policy.duration_for(category));
        }
    }

    #[test]
    fn default_durations_per_category() {
        let policy = DurationPolicy::default();
        assert_eq!(policy.duration_for(Category::Lecture), Duration::hours(1));
        assert_eq!(policy.duration_for(Category::Tutorial), Duration::hours(1));
        assert_eq!(policy.duration_for(Category::Social), Duration::minutes(30));
        assert_eq!(policy.duration_for(Category::Exam), Duration::minutes(150));
        assert_eq!(policy.duration_for(Category::Assignment), Duration::hours(1));
        assert_eq!(policy.duration_for(Category::Club), Duration::hours(1));
        assert_eq!(policy.duration_for(Category::Other), Duration::hours(1));

        let custom = DurationPolicy::with_exam_minutes(180).unwrap();
        assert_eq!(custom.duration_for(Category::Exam), Duration::hours(3));
    }

    #[test]
    fn unrepresentable_exam_minutes_are_refused() {
        assert!(DurationPolicy::with_exam_minutes(0).is_none());
        assert!(DurationPolicy::with_exam_minutes(-30).is_none());
        assert!(DurationPolicy::with_exam_minutes(i64::MAX).is_none());
        assert!(DurationPolicy::with_exam_minutes(i64::MIN).is_none());
    }

    #[tokio::test]
    async fn end_not_after_start_is_replaced() {
        for end in ["2026-10-20T15:00:00", "2026-10-20T14:00:00", ""] {
            let n = normalizer(Arc::new(FakeCompletion::with_arguments(json!({
                "title": "Final exam",
                "start": "2026-10-20T15:00:00",
                "end": end
            }))));
            let event = n.normalize_at("final", Category::Exam, now()).await.unwrap();
            assert_eq!(event.duration_minutes(), 150);
        }
    }

    #[tokio::test]
    async fn no_structured_call_fails() {
        let fake = Arc::new(FakeCompletion::without_call());
        let err = normalizer(fake.clone())
            .normalize_at("lunch", Category::Social, now())
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizeError::NoStructuredOutput));
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_arguments_fail() {
        for raw in [
            "not json",
            r#"{"start":"2026-10-20T15:00:00"}"#,
            r#"{"title":"  ","start":"2026-10-20T15:00:00"}"#,
            r#"{"title":"x","start":"next week"}"#,
            r#"{"title":"x","start":"2026-10-20T15:00:00","end":"later"}"#,
        ] {
            let n = normalizer(Arc::new(FakeCompletion::with_raw_arguments(raw)));
            let err = n.normalize_at("x", Category::Other, now()).await.unwrap_err();
            assert!(
                matches!(err, NormalizeError::MalformedResponse(_)),
                "expected malformed for {raw}, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn start_at_end_of_calendar_range_fails_without_panicking() {
        // Derived end would fall past the last representable instant.
        for raw in [
            r#"{"title":"x","start":"+262142-12-31T23:30:00"}"#,
            r#"{"title":"x","start":"+262142-12-31T23:30:00","end":""}"#,
            r#"{"title":"x","start":"+262142-12-31T23:30:00","end":"+262142-12-31T23:00:00"}"#,
        ] {
            let n = normalizer(Arc::new(FakeCompletion::with_raw_arguments(raw)));
            let err = n.normalize_at("x", Category::Other, now()).await.unwrap_err();
            assert!(
                matches!(err, NormalizeError::MalformedResponse(_)),
                "expected malformed for {raw}, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn supplied_end_at_end_of_calendar_range_is_kept() {
        let n = normalizer(Arc::new(FakeCompletion::with_arguments(json!({
            "title": "Far future",
            "start": "+262142-12-31T23:00:00",
            "end": "+262142-12-31T23:45:00"
        }))));
        let event = n.normalize_at("x", Category::Exam, now()).await.unwrap();
        assert_eq!(event.duration_minutes(), 45);

        // Past the representable range the end cannot even be parsed.
        let n = normalizer(Arc::new(FakeCompletion::with_arguments(json!({
            "title": "Too far",
            "start": "+262142-12-31T23:00:00",
            "end": "+262143-01-01T00:30:00"
        }))));
        let err = n.normalize_at("x", Category::Exam, now()).await.unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn oversized_exam_policy_cannot_overflow_derived_end() {
        let policy = DurationPolicy::with_exam_minutes(crate::config::MAX_EXAM_DURATION_MINUTES)
            .unwrap();
        let n = EventNormalizer::new(
            Arc::new(FakeCompletion::with_arguments(json!({
                "title": "Final",
                "start": "+262142-12-30T00:00:00"
            }))),
            policy,
            utc(),
        );
        let err = n.normalize_at("final", Category::Exam, now()).await.unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn upstream_failures_pass_through() {
        let err = normalizer(Arc::new(FakeCompletion::unavailable()))
            .normalize_at("x", Category::Other, now())
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizeError::UpstreamUnavailable(_)));

        let err = normalizer(Arc::new(FakeCompletion::with_reply(|| {
            Err(CompletionError::InvalidEnvelope("bad body".into()))
        })))
        .normalize_at("x", Category::Other, now())
        .await
        .unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn coffee_tomorrow_gets_thirty_minutes() {
        let fake = Arc::new(FakeCompletion::with_arguments(json!({
            "title": "Coffee with Sam",
            "start": "2026-10-20T15:00:00",
            "description": "Coffee meetup"
        })));
        let event = normalizer(fake.clone())
            .normalize_at("Coffee with Sam tomorrow at 3pm", Category::Social, now())
            .await
            .unwrap();

        assert_eq!(event.title(), "Coffee with Sam");
        assert_eq!(event.end(), utc().with_ymd_and_hms(2026, 10, 20, 15, 30, 0).unwrap());
        assert_eq!(event.category(), Category::Social);
        assert_eq!(event.color(), Category::Social.color());
        assert_eq!(event.description(), "Coffee meetup");

        let context = fake.last_context().unwrap();
        assert!(context.contains("Coffee with Sam tomorrow at 3pm"));
        assert!(context.contains("social"));
        assert!(context.contains("2026-10-19"));
        assert!(context.contains("30 minutes"));
    }

    #[test]
    fn context_mentions_exam_guidance() {
        let context = build_context("midterm", Category::Exam, now(), &DurationPolicy::default());
        assert!(context.contains("Category: exam"));
        assert!(context.contains("150 minutes"));
        assert!(context.contains("Monday"));
    }

    #[test]
    fn parses_supported_timestamp_shapes() {
        let offset = FixedOffset::east_opt(-4 * 3600).unwrap();
        let expected = offset.with_ymd_and_hms(2026, 10, 20, 15, 0, 0).unwrap();

        assert_eq!(parse_timestamp("2026-10-20T15:00:00", offset), Some(expected));
        assert_eq!(parse_timestamp("2026-10-20T15:00", offset), Some(expected));
        assert_eq!(parse_timestamp("2026-10-20 15:00:00", offset), Some(expected));
        assert_eq!(parse_timestamp("2026-10-20 15:00", offset), Some(expected));
        assert_eq!(parse_timestamp(" 2026-10-20T15:00:00.000 ", offset), Some(expected));
        assert_eq!(parse_timestamp("2026-10-20T19:00:00Z", offset), Some(expected));
        assert_eq!(parse_timestamp("tomorrow", offset), None);
        assert_eq!(parse_timestamp("2026-10-20", offset), None);
    }
}
