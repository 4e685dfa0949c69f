//! Reference extraction from Markdown.
//!
//! Recognised forms:
//! - links `[text](target)` and images `![alt](target)`, with an optional
//!   `"title"` after the target
//! - inline `spec.<alias>` or `spec.<alias>#<section>`, outside link spans
//!
//! Lines inside fenced code blocks (```` ``` ```` or `~~~`) are skipped.
//! Line and column are 1-based; columns count characters, not bytes.

use regex::Regex;

use super::{Reference, ReferenceKind, Target};
use crate::manifest::is_valid_alias;

const LINK_PATTERN: &str = r#"(!?)\[([^\]]*)\]\(\s*([^)\s]+)(?:\s+"[^"]*")?\s*\)"#;
const INLINE_PATTERN: &str = r"(?:^|[^A-Za-z0-9_./-])(spec\.([a-z0-9_-]+)(?:#([A-Za-z0-9_-]+))?)";

/// Every reference in `text`, in document order.
#[must_use]
pub fn parse_spec(text: &str) -> Vec<Reference> {
    let (Ok(link_re), Ok(inline_re)) = (Regex::new(LINK_PATTERN), Regex::new(INLINE_PATTERN)) else {
        return Vec::new();
    };

    let mut references = Vec::new();
    let mut fence: Option<&str> = None;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim_start();
        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            continue;
        }
        if trimmed.starts_with("```") {
            fence = Some("```");
            continue;
        }
        if trimmed.starts_with("~~~") {
            fence = Some("~~~");
            continue;
        }

        let mut found: Vec<(usize, Reference)> = Vec::new();
        let mut spans = Vec::new();

        for caps in link_re.captures_iter(line) {
            let (Some(whole), Some(label), Some(raw)) = (caps.get(0), caps.get(2), caps.get(3)) else {
                continue;
            };
            let is_image = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            if !is_image && label.as_str().is_empty() {
                continue;
            }
            spans.push(whole.range());
            found.push((
                whole.start(),
                Reference {
                    kind: if is_image { ReferenceKind::Image } else { ReferenceKind::Link },
                    text: label.as_str().to_string(),
                    raw: raw.as_str().to_string(),
                    target: classify(raw.as_str()),
                    line: line_no,
                    column: column_of(line, whole.start()),
                },
            ));
        }

        for caps in inline_re.captures_iter(line) {
            let (Some(whole), Some(alias)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if spans.iter().any(|span| span.contains(&whole.start())) {
                continue;
            }
            found.push((
                whole.start(),
                Reference {
                    kind: ReferenceKind::Inline,
                    text: whole.as_str().to_string(),
                    raw: whole.as_str().to_string(),
                    target: Target::Dependency {
                        alias: alias.as_str().to_string(),
                        artifact: None,
                        section: caps.get(3).map(|m| m.as_str().to_string()),
                    },
                    line: line_no,
                    column: column_of(line, whole.start()),
                },
            ));
        }

        found.sort_by_key(|(offset, _)| *offset);
        references.extend(found.into_iter().map(|(_, r)| r));
    }

    references
}

/// Classify a link target.
///
/// - `scheme://...` and `mailto:` are external
/// - `#anchor` stays in the document
/// - `spec.<alias>[#section]` and `<alias>:<artifact>[#section]` name a
///   dependency
/// - anything else is a plain local path
pub(crate) fn classify(raw: &str) -> Target {
    if raw.contains("://") || raw.starts_with("mailto:") {
        return Target::External(raw.to_string());
    }
    if let Some(anchor) = raw.strip_prefix('#') {
        return Target::Anchor(anchor.to_string());
    }

    let (body, section) = match raw.split_once('#') {
        Some((body, section)) => (body, Some(section.to_string())),
        None => (raw, None),
    };

    if let Some(alias) = body.strip_prefix("spec.")
        && is_valid_alias(alias)
    {
        return Target::Dependency {
            alias: alias.to_string(),
            artifact: None,
            section,
        };
    }
    if let Some((alias, artifact)) = body.split_once(':')
        && is_valid_alias(alias)
        && !artifact.is_empty()
    {
        return Target::Dependency {
            alias: alias.to_string(),
            artifact: Some(artifact.to_string()),
            section,
        };
    }

    Target::Local(raw.to_string())
}

fn column_of(line: &str, byte_offset: usize) -> usize {
    line.get(..byte_offset).map_or(1, |prefix| prefix.chars().count() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_images_and_inline() {
        let text = "# Title\n\nSee [See](https://example.com/o/r) and spec.r#section.\n![diagram](img/a.png)\n";
        let refs = parse_spec(text);
        assert_eq!(refs.len(), 3);

        assert_eq!(refs[0].kind, ReferenceKind::Link);
        assert_eq!(refs[0].text, "See");
        assert_eq!(refs[0].target, Target::External("https://example.com/o/r".to_string()));
        assert_eq!((refs[0].line, refs[0].column), (3, 5));

        assert_eq!(refs[1].kind, ReferenceKind::Inline);
        assert_eq!(
            refs[1].target,
            Target::Dependency {
                alias: "r".to_string(),
                artifact: None,
                section: Some("section".to_string()),
            }
        );
        assert_eq!(refs[1].line, 3);

        assert_eq!(refs[2].kind, ReferenceKind::Image);
        assert_eq!(refs[2].line, 4);
        assert_eq!(refs[2].column, 1);
    }

    #[test]
    fn test_fenced_code_is_skipped() {
        let text = "```\n[a](spec.x)\nspec.y\n```\n~~~md\nspec.z\n~~~\nspec.w\n";
        let refs = parse_spec(text);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].line, 8);
    }

    #[test]
    fn test_inline_inside_link_not_duplicated() {
        let refs = parse_spec("[api](spec.api#auth)\n");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ReferenceKind::Link);
        assert!(matches!(&refs[0].target, Target::Dependency { alias, .. } if alias == "api"));
    }

    #[test]
    fn test_inline_requires_word_boundary() {
        assert!(parse_spec("myspec.r and docs/spec.q").is_empty());
        assert_eq!(parse_spec("(spec.r)").len(), 1);
        assert_eq!(parse_spec("`spec.r#x`").len(), 1);
    }

    #[test]
    fn test_link_title_and_empty_label() {
        let refs = parse_spec("[x](#intro \"Intro\") [](ignored.md)");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, Target::Anchor("intro".to_string()));
    }

    #[test]
    fn test_classify() {
        assert!(matches!(classify("mailto:a@b.c"), Target::External(_)));
        assert_eq!(
            classify("api:auth/login.md#flow"),
            Target::Dependency {
                alias: "api".to_string(),
                artifact: Some("auth/login.md".to_string()),
                section: Some("flow".to_string()),
            }
        );
        assert_eq!(classify("./local.md"), Target::Local("./local.md".to_string()));
        assert_eq!(classify("Bad:thing"), Target::Local("Bad:thing".to_string()));
    }

    #[test]
    fn test_columns_count_characters() {
        let refs = parse_spec("héllo spec.r");
        assert_eq!(refs[0].column, 7);
    }
}
