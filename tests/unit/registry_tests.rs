//! Unit tests for building the tool registry from descriptors.

use std::fs;

use budgie::catalog::registry::{build_registry, FrontmatterStatus};
use budgie::config::GlobalConfig;
use budgie::models::agent::AgentDescriptor;

fn descriptor(name: &str, description: &str) -> AgentDescriptor {
    AgentDescriptor {
        name: name.into(),
        description: description.into(),
    }
}

fn config(prompts_dir: &std::path::Path) -> GlobalConfig {
    GlobalConfig {
        prompts_dir: prompts_dir.to_path_buf(),
        default_model: "default-model".into(),
        ..GlobalConfig::default()
    }
}

#[test]
fn only_exposable_agents_are_registered() {
    let dir = tempfile::tempdir().unwrap();
    let registry = build_registry(
        &[
            descriptor("orchestrator", "sub-agent: coordinator"),
            descriptor("Reviewer", "sub-agent: Reviews code"),
            descriptor("plain", "not a sub-agent"),
        ],
        &config(dir.path()),
    );

    assert_eq!(registry.len(), 1);
    let agent = &registry[0];
    assert_eq!(agent.tool_name, "kiro-subagents.reviewer");
    assert_eq!(agent.agent_name, "Reviewer");
    assert_eq!(agent.base_description, "Reviews code");
    assert_eq!(agent.description, "Reviews code");
    assert_eq!(agent.model, "default-model");
    assert_eq!(agent.frontmatter, FrontmatterStatus::NotFound);
}

#[test]
fn first_agent_wins_on_tool_name_collision() {
    let dir = tempfile::tempdir().unwrap();
    let registry = build_registry(
        &[
            descriptor("Code Reviewer", "sub-agent: first"),
            descriptor("code-reviewer", "sub-agent: second"),
        ],
        &config(dir.path()),
    );

    assert_eq!(registry.len(), 1);
    assert_eq!(registry[0].base_description, "first");
}

#[test]
fn agent_cannot_shadow_health_tool() {
    let dir = tempfile::tempdir().unwrap();
    let registry = build_registry(
        &[descriptor("health-check", "sub-agent: imposter")],
        &config(dir.path()),
    );
    assert!(registry.is_empty());
}

#[test]
fn frontmatter_enhances_description_and_model() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("reviewer.md"),
        "---\ndescription: Reviews PRs\ncapabilities: [Spot bugs]\nmodel: fast-model\n---\nbody\n",
    )
    .unwrap();

    let registry = build_registry(
        &[descriptor("reviewer", "sub-agent: Reviews code")],
        &config(dir.path()),
    );

    let agent = &registry[0];
    assert_eq!(agent.frontmatter, FrontmatterStatus::Loaded);
    assert_eq!(agent.base_description, "Reviews code");
    assert!(agent.description.starts_with("Reviews PRs"));
    assert!(agent.description.contains("- Spot bugs"));
    assert_eq!(agent.model, "fast-model");
}

#[test]
fn broken_frontmatter_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("reviewer.md"), "---\ntags: [oops\n---\n").unwrap();

    let registry = build_registry(
        &[descriptor("reviewer", "sub-agent: Reviews code")],
        &config(dir.path()),
    );

    assert!(matches!(registry[0].frontmatter, FrontmatterStatus::Error(_)));
    assert_eq!(registry[0].description, "Reviews code");
    assert_eq!(registry[0].model, "default-model");
}
