//! Prompt templates and response parsing shared by the methods.
//!
//! Templates use `{name}` placeholders. `{{` and `}}` render as literal
//! braces. Placeholders are checked against the names a method supplies
//! when the template is built, so rendering itself cannot fail.

use crate::models::ConfigError;

/// Placeholder for the question body.
pub const QUESTION_TEXT: &str = "question_text";
/// Placeholder for the numbered concept steps.
pub const CONCEPT_STEPS_TEXT: &str = "concept_steps_text";
/// Placeholder for a previously generated analogy.
pub const ANALOGY_TEXT: &str = "analogy_text";

pub const SAG_DEFAULT_PROMPT: &str = "You are an expert science tutor.

Your task is to create ONE analogy that helps a student intuitively understand the following QUESTION.
The analogy should:
- Capture the key underlying concept, not surface details.
- Use a familiar, everyday scenario.
- Avoid revealing the exact correct answer.
- Be concise (3–6 sentences).

QUESTION:
{question_text}

If answer options are provided, think about them silently but DO NOT mention them explicitly.
";

pub const CONCEPT_EXTRACTION_PROMPT: &str = "You are an expert science educator.

Your task is to analyze the following QUESTION and extract the key conceptual steps
that a student needs to understand in order to solve it.

Write a numbered list of 3 to 6 conceptual steps.
Each step should be:
- about ONE core concept or relation
- phrased in a short, clear sentence
- ordered from most basic/foundational to most advanced/specific

QUESTION:
{question_text}

If answer options are present, silently consider them but DO NOT mention them.
OUTPUT FORMAT (numbered list):
1. ...
2. ...
3. ...
";

pub const PROGRESSIVE_ANALOGY_PROMPT: &str = "You are an expert tutor who explains complex ideas using progressive analogies.

You are given:
- A QUESTION that the student needs to answer.
- A list of CONCEPT STEPS that represent the reasoning structure needed to solve the question.

Your task is to write ONE progressive analogy that:
- Has clearly separated stages/paragraphs that roughly follow the concept steps.
- Starts from a familiar, everyday scenario.
- Gradually introduces more detail/complexity, following the order of the concept steps.
- Helps the student build an intuitive mental model.
- Does NOT reveal the exact correct answer.
- Is around 5–10 sentences in total.

QUESTION:
{question_text}

CONCEPT STEPS:
{concept_steps_text}

Write the analogy as a short narrative, divided into logical steps or paragraphs, but do NOT explicitly say \"Step 1, Step 2\".
";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed, validated prompt template.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    name: String,
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse `source`, accepting only placeholders listed in `allowed`.
    pub fn parse(
        name: impl Into<String>,
        source: &str,
        allowed: &[&str],
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let mut segments = Vec::new();
        let mut buffer = String::new();
        let mut chars = source.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' => {
                    if matches!(chars.peek(), Some('{')) {
                        chars.next();
                        buffer.push('{');
                        continue;
                    }

                    let mut placeholder = String::new();
                    let mut closed = false;
                    for next in chars.by_ref() {
                        if next == '}' {
                            closed = true;
                            break;
                        }
                        placeholder.push(next);
                    }

                    if !closed {
                        return Err(ConfigError::MalformedTemplate {
                            template: name,
                            reason: "unclosed '{'".to_string(),
                        });
                    }

                    let key = placeholder.trim();
                    if !allowed.contains(&key) {
                        return Err(ConfigError::UnknownPlaceholder {
                            template: name,
                            placeholder: key.to_string(),
                        });
                    }

                    if !buffer.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut buffer)));
                    }
                    segments.push(Segment::Placeholder(key.to_string()));
                }
                '}' => {
                    if matches!(chars.peek(), Some('}')) {
                        chars.next();
                        buffer.push('}');
                    } else {
                        return Err(ConfigError::MalformedTemplate {
                            template: name,
                            reason: "unmatched '}'".to_string(),
                        });
                    }
                }
                _ => buffer.push(ch),
            }
        }

        if !buffer.is_empty() {
            segments.push(Segment::Literal(buffer));
        }

        Ok(Self {
            name,
            source: source.to_string(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(key) => Some(key.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute `values` into the template.
    ///
    /// A placeholder with no matching value renders as empty text.
    pub fn render(&self, values: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(key) => {
                    if let Some((_, value)) = values.iter().find(|(k, _)| k == key) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }
}

/// Split a model response into ordered steps.
///
/// A trimmed line whose first character is a digit and whose second is `.`
/// or `)` starts a new step with the numbering stripped. Other lines continue
/// the previous step, or start one if there is none. Always returns at least
/// one element; for blank input that element is empty.
pub fn parse_numbered_list(text: &str) -> Vec<String> {
    let mut steps: Vec<String> = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut chars = line.chars();
        let numbered = matches!(
            (chars.next(), chars.next()),
            (Some(first), Some('.' | ')')) if first.is_ascii_digit()
        );

        if numbered {
            // Both leading chars are ASCII, so byte offset 2 is a boundary.
            let rest = line[2..]
                .trim_start_matches(['.', ' '])
                .trim_start_matches([')', ' '])
                .trim();
            steps.push(if rest.is_empty() { line } else { rest }.to_string());
        } else if let Some(last) = steps.last_mut() {
            last.push(' ');
            last.push_str(line);
        } else {
            steps.push(line.to_string());
        }
    }

    steps.retain(|step| !step.is_empty());
    if steps.is_empty() {
        steps.push(text.trim().to_string());
    }
    steps
}

/// Render steps as `1. a\n2. b`.
pub fn number_steps(steps: &[String]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect::<Vec<_>>()
        .join("\n")
}
