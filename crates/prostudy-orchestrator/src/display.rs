//! Lesson display rendering.
//!
//! Everything here is a pure function of [`RequestState`]. The same section
//! table drives both the on-screen view and the exported document, so the two
//! never disagree about order or fallback text.

use chrono::{DateTime, Utc};
use prostudy_report::LessonDocument;
use serde::{Deserialize, Serialize};

use crate::lesson::{present, LessonRecord, RequestState};

/// Heading shown while a lesson is generating.
pub const LOADING_HEADING: &str = "Consulting Master Database...";
/// Main loading message.
pub const LOADING_MESSAGE: &str = "Generating comprehensive technical brief...";
/// Secondary loading line.
pub const LOADING_DETAIL: &str = "Cross-referencing jewelry standards and clinical protocols.";
/// Message shown for any failed request.
pub const FAILURE_MESSAGE: &str = "Generation failed. Please retry in a few moments.";
/// Badge shown for lessons carrying the deep-dive markers.
pub const DEEP_DIVE_BADGE: &str = "Deep Dive Enabled";

// ============================================================================
// Section Table
// ============================================================================

type Field = fn(&LessonRecord) -> Option<&String>;

struct SectionDef {
    heading: &'static str,
    field: Field,
    fallback: Option<&'static str>,
}

const SECTIONS: [SectionDef; 14] = [
    SectionDef {
        heading: "Technical Overview",
        field: |r| Some(&r.overview),
        fallback: None,
    },
    SectionDef {
        heading: "Clinical Anatomy",
        field: |r| Some(&r.anatomy),
        fallback: None,
    },
    SectionDef {
        heading: "Instruments & Tools",
        field: |r| Some(&r.tools),
        fallback: None,
    },
    SectionDef {
        heading: "Jewelry Standards",
        field: |r| r.jewelry_specs.as_ref(),
        fallback: Some("See general standards."),
    },
    SectionDef {
        heading: "Sensation & Recovery",
        field: |r| r.pain_and_healing.as_ref(),
        fallback: Some("Standard healing protocols apply."),
    },
    SectionDef {
        heading: "Pros & Cons",
        field: |r| r.pros_cons.as_ref(),
        fallback: Some("Standard considerations."),
    },
    SectionDef {
        heading: "Clinical Red Flags",
        field: |r| r.red_flags.as_ref(),
        fallback: Some("Standard health screening."),
    },
    SectionDef {
        heading: "Step-by-Step Procedure",
        field: |r| Some(&r.procedure),
        fallback: None,
    },
    SectionDef {
        heading: "Tray & Workspace Configuration",
        field: |r| r.setup.as_ref(),
        fallback: Some("Standard tray setup protocol applies."),
    },
    SectionDef {
        heading: "Aftercare Protocol",
        field: |r| Some(&r.aftercare),
        fallback: None,
    },
    SectionDef {
        heading: "Known Complications",
        field: |r| Some(&r.complications),
        fallback: None,
    },
    SectionDef {
        heading: "Common Healing Issues",
        field: |r| r.common_issues.as_ref(),
        fallback: Some("No specific common issues recorded."),
    },
    SectionDef {
        heading: "Consultation & Consent Script",
        field: |r| r.client_discussion.as_ref(),
        fallback: Some("Standard consultation and consent protocol."),
    },
    SectionDef {
        heading: "Frequent Professional Questions",
        field: |r| r.faqs.as_ref(),
        fallback: Some("No frequently asked questions recorded."),
    },
];

// ============================================================================
// View Types
// ============================================================================

/// One rendered lesson section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
    /// Section heading.
    pub heading: String,
    /// Field text, or the fallback when the field is absent.
    pub body: String,
    /// Whether `body` is fallback text.
    pub is_fallback: bool,
}

/// What the lesson panel shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum LessonView {
    /// Panel closed.
    Hidden,
    /// Waiting for the service.
    Loading {
        /// Requested title.
        title: String,
        /// Loading heading.
        heading: String,
        /// Loading message.
        message: String,
        /// Secondary loading line.
        detail: String,
    },
    /// The last request failed.
    Failed {
        /// User-facing failure message.
        message: String,
    },
    /// A lesson is ready.
    Ready {
        /// Lesson title.
        title: String,
        /// Badges shown under the title.
        badges: Vec<String>,
        /// Sections in display order.
        sections: Vec<SectionView>,
    },
}

impl LessonView {
    /// Renders the panel for a request state.
    #[must_use]
    pub fn render(state: &RequestState) -> Self {
        match state {
            RequestState::Idle => Self::Hidden,
            RequestState::Loading { request } => Self::Loading {
                title: request.title.clone(),
                heading: LOADING_HEADING.to_string(),
                message: LOADING_MESSAGE.to_string(),
                detail: LOADING_DETAIL.to_string(),
            },
            RequestState::Error { .. } => Self::Failed {
                message: FAILURE_MESSAGE.to_string(),
            },
            RequestState::Success { lesson } => Self::Ready {
                title: lesson.title.clone(),
                badges: badges(lesson),
                sections: sections(lesson),
            },
        }
    }
}

/// Badges for a lesson: difficulty when present, and the deep-dive marker
/// when both difficulty and pain/healing are present.
#[must_use]
pub fn badges(lesson: &LessonRecord) -> Vec<String> {
    let mut badges = Vec::new();
    if let Some(difficulty) = present(lesson.difficulty.as_ref()) {
        badges.push(format!("Difficulty: {difficulty}"));
    }
    if lesson.is_deep_dive() {
        badges.push(DEEP_DIVE_BADGE.to_string());
    }
    badges
}

/// The fourteen display sections in order, with fallbacks applied.
#[must_use]
pub fn sections(lesson: &LessonRecord) -> Vec<SectionView> {
    SECTIONS
        .iter()
        .map(|def| match present((def.field)(lesson)) {
            Some(body) => SectionView {
                heading: def.heading.to_string(),
                body: body.to_string(),
                is_fallback: false,
            },
            None => SectionView {
                heading: def.heading.to_string(),
                body: def.fallback.unwrap_or_default().to_string(),
                is_fallback: true,
            },
        })
        .collect()
}

/// Builds the export document for a lesson.
pub fn to_document(
    lesson: &LessonRecord,
    generated_at: DateTime<Utc>,
) -> prostudy_report::Result<LessonDocument> {
    let builder = badges(lesson)
        .into_iter()
        .fold(LessonDocument::builder().title(&lesson.title), |b, badge| {
            b.badge(badge)
        });

    sections(lesson)
        .into_iter()
        .fold(builder, |b, section| b.section(section.heading, section.body))
        .generated_at(generated_at)
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use prostudy_report::MarkdownGenerator;

    use super::*;
    use crate::lesson::tests::sample_lesson;
    use crate::lesson::GenerateRequest;

    #[test]
    fn test_idle_is_hidden() {
        assert_eq!(LessonView::render(&RequestState::Idle), LessonView::Hidden);
    }

    #[test]
    fn test_loading_view() {
        let view = LessonView::render(&RequestState::Loading {
            request: GenerateRequest::new("Daith", true),
        });
        let LessonView::Loading {
            title,
            heading,
            message,
            detail,
        } = view
        else {
            unreachable!("loading state renders loading view");
        };
        assert_eq!(title, "Daith");
        assert_eq!(heading, "Consulting Master Database...");
        assert_eq!(message, "Generating comprehensive technical brief...");
        assert_eq!(
            detail,
            "Cross-referencing jewelry standards and clinical protocols."
        );
    }

    #[test]
    fn test_error_view_uses_fixed_message() {
        let view = LessonView::render(&RequestState::Error {
            message: "LLM API error (server): 503".to_string(),
        });
        assert_eq!(
            view,
            LessonView::Failed {
                message: "Generation failed. Please retry in a few moments.".to_string()
            }
        );
    }

    #[test]
    fn test_fallbacks_for_absent_fields() {
        let sections = sections(&sample_lesson("Helix"));
        assert_eq!(sections.len(), 14);

        let body = |heading: &str| {
            sections
                .iter()
                .find(|s| s.heading == heading)
                .map(|s| s.body.clone())
                .unwrap()
        };
        assert_eq!(body("Technical Overview"), "Overview text");
        assert_eq!(body("Jewelry Standards"), "See general standards.");
        assert_eq!(body("Sensation & Recovery"), "Standard healing protocols apply.");
        assert_eq!(body("Pros & Cons"), "Standard considerations.");
        assert_eq!(body("Clinical Red Flags"), "Standard health screening.");
        assert_eq!(
            body("Tray & Workspace Configuration"),
            "Standard tray setup protocol applies."
        );
        assert_eq!(
            body("Common Healing Issues"),
            "No specific common issues recorded."
        );
        assert_eq!(
            body("Consultation & Consent Script"),
            "Standard consultation and consent protocol."
        );
        assert_eq!(
            body("Frequent Professional Questions"),
            "No frequently asked questions recorded."
        );
    }

    #[test]
    fn test_blank_optional_counts_as_absent() {
        let mut lesson = sample_lesson("Helix");
        lesson.red_flags = Some("  ".to_string());
        lesson.setup = Some("Sterile field, 14g needle.".to_string());

        let sections = sections(&lesson);
        let red = sections.iter().find(|s| s.heading == "Clinical Red Flags").unwrap();
        assert!(red.is_fallback);
        let setup = sections
            .iter()
            .find(|s| s.heading == "Tray & Workspace Configuration")
            .unwrap();
        assert!(!setup.is_fallback);
        assert_eq!(setup.body, "Sterile field, 14g needle.");
    }

    #[test]
    fn test_section_order() {
        let headings: Vec<_> = sections(&sample_lesson("Helix"))
            .into_iter()
            .map(|s| s.heading)
            .collect();
        assert_eq!(headings[0], "Technical Overview");
        assert_eq!(headings[7], "Step-by-Step Procedure");
        assert_eq!(headings[13], "Frequent Professional Questions");
    }

    #[test]
    fn test_badges() {
        let mut lesson = sample_lesson("Daith");
        assert!(badges(&lesson).is_empty());

        lesson.difficulty = Some("Advanced".to_string());
        assert_eq!(badges(&lesson), vec!["Difficulty: Advanced"]);

        lesson.pain_and_healing = Some("6-9 months".to_string());
        assert_eq!(
            badges(&lesson),
            vec!["Difficulty: Advanced", "Deep Dive Enabled"]
        );
    }

    #[test]
    fn test_document_contains_every_section() {
        let lesson = sample_lesson("Industrial");
        let document = to_document(&lesson, Utc::now()).unwrap();
        let markdown = MarkdownGenerator::new(&document).generate();

        assert!(markdown.starts_with("# Industrial"));
        for section in sections(&lesson) {
            assert!(markdown.contains(&format!("## {}", section.heading)));
            assert!(markdown.contains(&section.body));
        }
    }

    #[test]
    fn test_ready_view_serialization() {
        let view = LessonView::render(&RequestState::Success {
            lesson: sample_lesson("Helix"),
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["view"], "ready");
        assert_eq!(json["title"], "Helix");
        assert_eq!(json["sections"].as_array().unwrap().len(), 14);
        assert_eq!(json["sections"][3]["isFallback"], true);
    }
}
