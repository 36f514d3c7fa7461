//! Artifact name templates
//!
//! Image names are rendered from a small template language with a fixed
//! variable set: `{{.Name}}`, `{{.Date}}`, and `{{.FullDate}}`. Templates
//! come from configuration or from a per-instance tag override, so syntax
//! is validated up front and unknown variables are rejected at parse time.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from parsing a name template
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Placeholder opened with `{{` but never closed
    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),

    /// Placeholder references a variable outside the fixed set
    #[error("unknown template variable '{0}' (expected .Name, .Date, or .FullDate)")]
    UnknownVariable(String),
}

/// Template variables available to name templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variable {
    Name,
    Date,
    FullDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(Variable),
}

/// A parsed, validated name template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    segments: Vec<Segment>,
}

impl NameTemplate {
    /// Parse a template string, validating every placeholder.
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = input;
        let mut offset = 0;

        while let Some(open) = rest.find("{{") {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let close = after
                .find("}}")
                .ok_or(TemplateError::Unterminated(offset + open))?;

            let var = match after[..close].trim() {
                ".Name" => Variable::Name,
                ".Date" => Variable::Date,
                ".FullDate" => Variable::FullDate,
                other => return Err(TemplateError::UnknownVariable(other.to_string())),
            };

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Variable(var));

            offset += open + 2 + close + 2;
            rest = &after[close + 2..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Render the template against a context.
    pub fn render(&self, ctx: &RenderContext) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Variable(Variable::Name) => out.push_str(&ctx.name),
                Segment::Variable(Variable::Date) => out.push_str(&ctx.date),
                Segment::Variable(Variable::FullDate) => out.push_str(&ctx.full_date),
            }
        }
        out
    }
}

/// Values exposed to a template render
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Value of the resource's "Name" tag, or empty if absent
    pub name: String,
    /// Current date, `YYYY-MM-DD`
    pub date: String,
    /// Current timestamp, `YYYY-MM-DD-HH-MM-SS`
    pub full_date: String,
}

impl RenderContext {
    /// Build a context for the given resource name at the given instant.
    pub fn at(name: &str, when: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            date: when.format("%Y-%m-%d").to_string(),
            full_date: when.format("%Y-%m-%d-%H-%M-%S").to_string(),
        }
    }

    /// Build a context for the given resource name at the current time.
    pub fn now(name: &str) -> Self {
        Self::at(name, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx(name: &str) -> RenderContext {
        let when = Utc.with_ymd_and_hms(2020, 4, 7, 13, 5, 9).unwrap();
        RenderContext::at(name, when)
    }

    #[test]
    fn renders_default_format() {
        let t = NameTemplate::parse("{{.Name}}-{{.Date}}").unwrap();
        assert_eq!(t.render(&ctx("web1")), "web1-2020-04-07");
    }

    #[test]
    fn renders_empty_name() {
        let t = NameTemplate::parse("{{.Name}}-{{.Date}}").unwrap();
        assert_eq!(t.render(&ctx("")), "-2020-04-07");
    }

    #[test]
    fn renders_full_date() {
        let t = NameTemplate::parse("backup-{{.FullDate}}").unwrap();
        assert_eq!(t.render(&ctx("web1")), "backup-2020-04-07-13-05-09");
    }

    #[test]
    fn renders_literal_only() {
        let t = NameTemplate::parse("no-placeholders").unwrap();
        assert_eq!(t.render(&ctx("web1")), "no-placeholders");
    }

    #[test]
    fn accepts_whitespace_inside_placeholder() {
        let t = NameTemplate::parse("{{ .Name }}").unwrap();
        assert_eq!(t.render(&ctx("db2")), "db2");
    }

    #[test]
    fn rejects_unknown_variable() {
        let err = NameTemplate::parse("{{.Hostname}}").unwrap_err();
        assert_eq!(err, TemplateError::UnknownVariable(".Hostname".to_string()));
    }

    #[test]
    fn rejects_unterminated_placeholder() {
        let err = NameTemplate::parse("prefix-{{.Name").unwrap_err();
        assert_eq!(err, TemplateError::Unterminated(7));
    }

    #[test]
    fn date_tracks_render_context() {
        let t = NameTemplate::parse("{{.Name}}-{{.Date}}").unwrap();
        let rendered = t.render(&RenderContext::now("web1"));
        let today = Utc::now().format("%Y-%m-%d").to_string();
        assert_eq!(rendered, format!("web1-{today}"));
    }
}
