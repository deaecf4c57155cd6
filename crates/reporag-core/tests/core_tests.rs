use std::fs;

use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use tempfile::TempDir;

use reporag_core::config::{Config, IndexBackend, Settings};
use reporag_core::types::{doc_types, Document, SourceDocument};

#[test]
fn settings_from_toml_file_expand_home() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("config.toml");
    fs::write(
        &path,
        "[index]\nbackend = \"lance\"\nuri = \"~/reporag/index\"\n[hyde]\napi_key = \"gsk-test\"\n",
    )
    .expect("write config");

    let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(&path));
    let settings = Config::from_figment(figment).settings().expect("settings");

    assert_eq!(settings.index.backend, IndexBackend::Lance);
    let uri = settings.index.uri.expect("uri");
    if std::env::var_os("HOME").is_some() {
        assert!(!uri.starts_with('~'), "tilde is expanded: {uri}");
    }
    assert!(uri.ends_with("reporag/index"));
    assert_eq!(settings.hyde.api_key.as_deref(), Some("gsk-test"));
}

#[test]
fn remote_uri_is_left_untouched() {
    let figment = Figment::from(Serialized::defaults(Settings::default()))
        .merge(Toml::string(
            "[index]\nbackend = \"lance\"\nuri = \"db://team-index\"\napi_key = \"sk\"",
        ));
    let settings = Config::from_figment(figment).settings().expect("settings");
    assert!(settings.index.is_remote());
    assert_eq!(settings.index.uri.as_deref(), Some("db://team-index"));
}

#[test]
fn document_source_json_array() {
    let raw = r#"[
        {"content": "Install via npm install", "type": "readme",
         "metadata": {"section_title": "Setup"}},
        {"content": "src/\n  main.rs", "type": "file_tree"},
        {"content": "Crash on start", "type": "issue",
         "metadata": {"number": 12, "labels": ["bug"]}},
        {"content": "no type given"}
    ]"#;
    let docs: Vec<SourceDocument> = serde_json::from_str(raw).expect("parse");
    assert_eq!(docs.len(), 4);
    assert_eq!(docs[1].doc_type, doc_types::FILE_TREE);
    assert_eq!(docs[2].metadata["labels"][0], "bug");
    assert_eq!(docs[3].doc_type, doc_types::UNKNOWN);

    let (stored, dropped) = Document::from_source("id".into(), "x/y", docs[0].clone());
    assert!(dropped.is_empty());
    assert_eq!(stored.repo_name, "x/y");
    assert_eq!(stored.metadata["section_title"], "Setup");
}
