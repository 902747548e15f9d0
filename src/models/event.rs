use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::category::Category;

/// A normalized calendar event.
///
/// Events are only built through [`Event::new`], which derives `color` from
/// the category, so the color can never disagree with the category. There are
/// no setters: once created an event is immutable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    id: Uuid,
    title: String,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    description: String,
    category: Category,
    color: &'static str,
    created_at: DateTime<Utc>,
}

impl Event {
    /// Callers must guarantee `end >= start`; the normalizer enforces this.
    pub fn new(
        title: String,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        description: String,
        category: Category,
    ) -> Self {
        debug_assert!(end >= start, "event end precedes start");
        Self {
            id: Uuid::new_v4(),
            title,
            start,
            end,
            description,
            category,
            color: category.color(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn start(&self) -> DateTime<FixedOffset> {
        self.start
    }

    pub fn end(&self) -> DateTime<FixedOffset> {
        self.end
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn color(&self) -> &'static str {
        self.color
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}
