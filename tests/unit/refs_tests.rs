//! Reference parsing and resolution through the public API.

use anyhow::Result;
use std::fs;
use tempfile::TempDir;

use specledger::refs::{ReferenceKind, Target, parse_spec, resolve_with_cache, validate};

const DOC: &str = "\
# Payments

Depends on [auth](api:auth.md#tokens \"Auth spec\") and spec.billing.

```markdown
[ignored](api:nothing.md) spec.ignored
```

Émoji ✓ spec.api#errors
![diagram](img/flow.png)
";

#[test]
fn parses_document_in_order() {
    let refs = parse_spec(DOC);
    let raws: Vec<&str> = refs.iter().map(|r| r.raw.as_str()).collect();
    assert_eq!(raws, ["api:auth.md#tokens", "spec.billing", "spec.api#errors", "img/flow.png"]);

    assert_eq!(refs[0].kind, ReferenceKind::Link);
    assert_eq!(refs[0].text, "auth");
    assert_eq!(
        refs[0].target,
        Target::Dependency {
            alias: "api".to_string(),
            artifact: Some("auth.md".to_string()),
            section: Some("tokens".to_string()),
        }
    );
    assert_eq!(refs[1].kind, ReferenceKind::Inline);
    assert_eq!(refs[1].alias(), Some("billing"));
    assert_eq!(refs[3].kind, ReferenceKind::Image);
}

#[test]
fn positions_count_characters() {
    let refs = parse_spec(DOC);
    let inline = &refs[2];
    assert_eq!(inline.line, 9);
    assert_eq!(inline.column, 9);
}

#[test]
fn fenced_blocks_are_skipped() {
    let refs = parse_spec(DOC);
    assert!(refs.iter().all(|r| r.alias() != Some("ignored")));
    assert!(refs.iter().all(|r| !r.raw.contains("nothing")));
}

#[test]
fn inline_form_needs_a_boundary() {
    assert!(parse_spec("myspec.api docs/spec.api").is_empty());
    assert_eq!(parse_spec("(spec.api)").len(), 1);
}

#[test]
fn validate_against_known_aliases() {
    let refs = parse_spec(DOC);
    let errors = validate(&refs, ["api", "billing"]);
    assert!(errors.is_empty());

    let errors = validate(&refs, ["api"]);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].reference.alias(), Some("billing"));
}

#[test]
fn resolve_falls_back_to_cache() -> Result<()> {
    let project = TempDir::new()?;
    let cache = TempDir::new()?;
    fs::create_dir_all(cache.path().join("specs"))?;
    fs::write(cache.path().join("specs").join("auth.md"), "auth\n")?;

    let (rel, cached) =
        resolve_with_cache("specledger/", "api", "specs/", "auth.md", Some(project.path()), cache.path())?;
    assert_eq!(rel, "specledger/api/auth.md");
    assert_eq!(cached, cache.path().join("specs").join("auth.md"));

    let missing =
        resolve_with_cache("specledger/", "api", "specs/", "nope.md", Some(project.path()), cache.path());
    assert!(missing.is_err());

    let escaping = resolve_with_cache("specledger/", "api", "specs/", "../x.md", None, cache.path());
    assert!(escaping.is_err());
    Ok(())
}
