//! Unit tests for prompt front-matter parsing.

use std::fs;

use budgie::catalog::frontmatter::{load_from_prompt, parse, split_frontmatter};
use budgie::AppError;

const PROMPT: &str = "---
name: reviewer
description: Reviews pull requests
capabilities:
  - Spot bugs
  - Suggest tests
use_when:
  - A diff is ready
avoid_when:
  - Writing new code
model: claude-opus-4
tags: [review]
---
You are a careful reviewer.
";

#[test]
fn split_requires_leading_and_closing_delimiters() {
    assert_eq!(split_frontmatter("---\na: 1\n---\nbody"), Some("a: 1"));
    assert_eq!(split_frontmatter("no front-matter"), None);
    assert_eq!(split_frontmatter("---\nnever closed"), None);
    assert_eq!(split_frontmatter("body\n---\na: 1\n---\n"), None);
}

#[test]
fn parse_reads_all_fields() {
    let meta = parse(PROMPT).unwrap().unwrap();

    assert_eq!(meta.name, "reviewer");
    assert_eq!(meta.capabilities, vec!["Spot bugs", "Suggest tests"]);
    assert_eq!(meta.tags, vec!["review"]);
    assert_eq!(meta.model(), Some("claude-opus-4"));
}

#[test]
fn enhanced_description_lists_sections() {
    let description = parse(PROMPT).unwrap().unwrap().enhanced_description();

    assert!(description.starts_with("Reviews pull requests"));
    assert!(description.contains("Capabilities:\n- Spot bugs\n- Suggest tests"));
    assert!(description.contains("Use when:\n- A diff is ready"));
    assert!(description.contains("Avoid when:\n- Writing new code"));
}

#[test]
fn enhanced_description_omits_empty_sections() {
    let meta = parse("---\ndescription: Plain\n---\n").unwrap().unwrap();
    assert_eq!(meta.enhanced_description(), "Plain");
    assert_eq!(meta.model(), None);
}

#[test]
fn invalid_yaml_is_frontmatter_error() {
    let err = parse("---\ncapabilities: [unterminated\n---\n").unwrap_err();
    assert!(matches!(err, AppError::Frontmatter(_)));
}

#[test]
fn missing_prompt_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_from_prompt(dir.path(), "ghost").unwrap().is_none());
}

#[test]
fn prompt_file_is_loaded_by_agent_name() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("reviewer.md"), PROMPT).unwrap();

    let meta = load_from_prompt(dir.path(), "reviewer").unwrap().unwrap();
    assert_eq!(meta.description, "Reviews pull requests");
}
