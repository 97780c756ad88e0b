//! Preview data returned by the conversion service, and the store that holds it.
//!
//! The service answers `/preview` with `{ "questions": [...] }`. Each wire
//! [`PreviewQuestion`] is ingested once into a [`PreviewItem`], which decides
//! how the answers are displayed:
//!
//! * more than one answer → [`AnswerDisplay::MultipleChoice`], options listed,
//!   the one matching `correct_answer_id` flagged;
//! * exactly one answer → [`AnswerDisplay::SingleAnswer`], a flat `Answer:` line
//!   (short answer, essay, fill in the blank);
//! * no answers → nothing to display.
//!
//! Renderers match on the variant instead of re-counting answers.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Write as _;

// ── Wire types ───────────────────────────────────────────────────────────

/// Body of a `/preview` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewResponse {
    #[serde(default)]
    pub questions: Vec<PreviewQuestion>,
}

/// One question as sent by the conversion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewQuestion {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,

    /// Question type, e.g. `multiple_choice`, `true_false`, `short_answer`.
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub question_text: String,

    /// Prompt field used by older service versions. Read only when
    /// `question_text` is empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub question: String,

    #[serde(default = "default_points")]
    pub points: f64,

    #[serde(default)]
    pub answers: Vec<PreviewAnswer>,

    #[serde(default, deserialize_with = "opt_id_as_string")]
    pub correct_answer_id: Option<String>,
}

/// One answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewAnswer {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub text: String,
}

fn default_points() -> f64 {
    1.0
}

/// Ids arrive as JSON numbers from some parsers and as strings from others.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Int(n) => n.to_string(),
            RawId::Float(f) => f.to_string(),
            RawId::Str(s) => s,
        }
    }
}

fn id_as_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    RawId::deserialize(d).map(String::from)
}

fn opt_id_as_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(d)?.map(String::from))
}

// ── Ingested form ────────────────────────────────────────────────────────

/// An answer option prepared for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
    pub correct: bool,
}

/// How a question's answers are shown, decided once at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "display", rename_all = "snake_case")]
pub enum AnswerDisplay {
    MultipleChoice { options: Vec<AnswerOption> },
    SingleAnswer { text: String },
}

impl AnswerDisplay {
    /// Text of the correct answer, if one is known.
    pub fn correct_text(&self) -> Option<&str> {
        match self {
            AnswerDisplay::MultipleChoice { options } => options
                .iter()
                .find(|o| o.correct)
                .map(|o| o.text.as_str()),
            AnswerDisplay::SingleAnswer { text } => Some(text),
        }
    }
}

/// A question ready for the review dialog. Read-only to renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewItem {
    pub id: String,
    pub kind: String,
    pub text: String,
    pub points: f64,
    pub answers: Option<AnswerDisplay>,
}

impl PreviewItem {
    pub fn from_question(q: PreviewQuestion) -> Self {
        let text = if q.question_text.is_empty() {
            q.question
        } else {
            q.question_text
        };
        let answers = match q.answers.len() {
            0 => None,
            1 => q
                .answers
                .into_iter()
                .next()
                .map(|a| AnswerDisplay::SingleAnswer { text: a.text }),
            _ => {
                let correct = q.correct_answer_id.as_deref();
                Some(AnswerDisplay::MultipleChoice {
                    options: q
                        .answers
                        .into_iter()
                        .map(|a| AnswerOption {
                            correct: Some(a.id.as_str()) == correct,
                            id: a.id,
                            text: a.text,
                        })
                        .collect(),
                })
            }
        };

        Self {
            id: q.id,
            kind: q.kind,
            text,
            points: q.points,
            answers,
        }
    }

    /// `multiple_choice` → `MULTIPLE CHOICE`.
    pub fn kind_label(&self) -> String {
        self.kind.replace('_', " ").to_uppercase()
    }

    pub fn points_label(&self) -> String {
        let unit = if self.points > 1.0 { "points" } else { "point" };
        format!("{} {unit}", self.points)
    }
}

// ── Store ────────────────────────────────────────────────────────────────

/// Holds the last fetched questions and the dialog visibility flag.
///
/// Content and visibility are independent: hiding the dialog keeps the
/// questions, and a new fetch replaces the whole list.
#[derive(Debug, Clone, Default)]
pub struct PreviewStore {
    items: Vec<PreviewItem>,
    visible: bool,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the full collection.
    pub fn set_questions(&mut self, questions: Vec<PreviewQuestion>) {
        self.items = questions.into_iter().map(PreviewItem::from_question).collect();
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn items(&self) -> &[PreviewItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ── Text rendering ───────────────────────────────────────────────────────

/// Render one question as plain text. `index` is 0-based.
///
/// ```text
/// 1 - MULTIPLE CHOICE  (1 point)
/// What is 2+2?
///     3
///   ✓ 4
/// Answer: 4
/// ```
pub fn render_item(index: usize, item: &PreviewItem) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} - {}  ({})",
        index + 1,
        item.kind_label(),
        item.points_label()
    );
    let _ = writeln!(out, "{}", item.text);

    match &item.answers {
        Some(AnswerDisplay::MultipleChoice { options }) => {
            for opt in options {
                let marker = if opt.correct { "✓" } else { " " };
                let _ = writeln!(out, "  {marker} {}", opt.text);
            }
            if let Some(correct) = item.answers.as_ref().and_then(|a| a.correct_text()) {
                let _ = writeln!(out, "Answer: {correct}");
            }
        }
        Some(AnswerDisplay::SingleAnswer { text }) => {
            let _ = writeln!(out, "Answer: {text}");
        }
        None => {}
    }

    out
}

/// Render the whole dialog body.
pub fn render_preview(items: &[PreviewItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| render_item(i, item))
        .collect::<Vec<_>>()
        .join("\n")
}
