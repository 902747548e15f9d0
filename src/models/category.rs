use serde::{Deserialize, Serialize};

/// Classification tag chosen by the user when submitting an event.
///
/// The category drives the display color and the default duration applied
/// when the completion service does not supply an end time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Lecture,
    Tutorial,
    Club,
    Social,
    Exam,
    Assignment,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Lecture,
        Category::Tutorial,
        Category::Club,
        Category::Social,
        Category::Exam,
        Category::Assignment,
        Category::Other,
    ];

    /// Strict parse (case-insensitive). Returns `None` for unknown names.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "lecture" => Some(Category::Lecture),
            "tutorial" => Some(Category::Tutorial),
            "club" => Some(Category::Club),
            "social" => Some(Category::Social),
            "exam" => Some(Category::Exam),
            "assignment" => Some(Category::Assignment),
            "other" => Some(Category::Other),
            _ => None,
        }
    }

    /// Lenient parse used by the submission interface: missing or unknown
    /// names resolve to `Other`.
    pub fn from_label(label: Option<&str>) -> Self {
        label.and_then(Self::from_str).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Lecture => "lecture",
            Category::Tutorial => "tutorial",
            Category::Club => "club",
            Category::Social => "social",
            Category::Exam => "exam",
            Category::Assignment => "assignment",
            Category::Other => "other",
        }
    }

    /// Fixed display color for the category.
    pub const fn color(self) -> &'static str {
        match self {
            Category::Lecture => "#3b82f6",
            Category::Tutorial => "#10b981",
            Category::Club => "#8b5cf6",
            Category::Social => "#f59e0b",
            Category::Exam => "#ef4444",
            Category::Assignment => "#f97316",
            Category::Other => "#6b7280",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl TryFrom<&str> for Category {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value).ok_or_else(|| format!("Invalid category: {}", value))
    }
}
