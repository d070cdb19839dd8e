use claude_settings::defaults::{default_document, DEFAULT_MODEL};
use claude_settings::{merge, ErrorKind, SettingsStore, SettingsUpdate};
use serde_json::json;
use std::fs;

#[tokio::test]
async fn first_load_synthesizes_and_persists_defaults() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("nested/.claude/settings.json");
    let store = SettingsStore::new(&path);

    let first = store.load().await.expect("first load");
    assert_eq!(first, default_document());
    assert_eq!(first.get("model"), Some(&json!(DEFAULT_MODEL)));
    assert_eq!(
        first.nested("permissions", "defaultMode"),
        Some(&json!("acceptEdits"))
    );
    assert!(path.is_file());

    let second = store.load().await.expect("second load");
    assert_eq!(second, first);
}

#[tokio::test]
async fn saved_file_is_pretty_printed_with_two_spaces() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    let store = SettingsStore::new(&path);

    store.load().await.expect("load");
    let raw = fs::read_to_string(&path).expect("read");
    assert!(raw.starts_with("{\n  \""));
}

#[tokio::test]
async fn corrupt_file_is_reported_and_left_untouched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    fs::write(&path, "{not json").expect("seed");
    let store = SettingsStore::new(&path);

    let err = store.load().await.expect_err("corrupt");
    assert_eq!(err.kind(), ErrorKind::CorruptDocument);
    assert_eq!(fs::read_to_string(&path).expect("read"), "{not json");

    let update = SettingsUpdate::builder().model("claude-x").build();
    let err = store.apply(&update).await.expect_err("refuse write");
    assert_eq!(err.kind(), ErrorKind::CorruptDocument);
    assert_eq!(fs::read_to_string(&path).expect("read"), "{not json");
}

#[tokio::test]
async fn non_object_root_counts_as_corrupt() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    fs::write(&path, "[1, 2, 3]").expect("seed");

    let err = SettingsStore::new(&path).load().await.expect_err("corrupt");
    assert_eq!(err.kind(), ErrorKind::CorruptDocument);
}

#[tokio::test]
async fn auth_token_save_keeps_existing_model() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    let store = SettingsStore::new(&path);

    let loaded = store.load().await.expect("load");
    let update = SettingsUpdate::try_from(json!({ "env": { "ANTHROPIC_AUTH_TOKEN": "tok_123" } }))
        .expect("update");
    store.save(&merge(&loaded, &update)).await.expect("save");

    let reloaded = store.load().await.expect("reload");
    assert_eq!(reloaded.env_str("ANTHROPIC_AUTH_TOKEN"), Some("tok_123"));
    assert_eq!(reloaded.env_str("ANTHROPIC_MODEL"), loaded.env_str("ANTHROPIC_MODEL"));
}

#[tokio::test]
async fn unknown_keys_written_by_other_tools_survive_updates() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    fs::write(
        &path,
        r#"{"$schema":"https://example.test/schema.json","feedbackSurveyState":{"lastShown":3},"env":{"HTTP_PROXY":"http://proxy"}}"#,
    )
    .expect("seed");
    let store = SettingsStore::new(&path);

    let update = SettingsUpdate::builder()
        .env("ANTHROPIC_MODEL", "claude-y")
        .include_co_authored_by(false)
        .build();
    let saved = store.apply(&update).await.expect("apply");

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(on_disk, saved.clone().into_value());
    assert_eq!(on_disk["$schema"], json!("https://example.test/schema.json"));
    assert_eq!(on_disk["feedbackSurveyState"], json!({ "lastShown": 3 }));
    assert_eq!(on_disk["env"]["HTTP_PROXY"], json!("http://proxy"));
    assert_eq!(on_disk["env"]["ANTHROPIC_MODEL"], json!("claude-y"));
    assert_eq!(on_disk["includeCoAuthoredBy"], json!(false));
}

#[tokio::test]
async fn typed_updates_are_clamped_and_mirrored_on_disk() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    let store = SettingsStore::new(&path);
    store.load().await.expect("load");

    let update = SettingsUpdate::builder()
        .max_tokens(20000)
        .env("CLAUDE_CODE_MAX_OUTPUT_TOKENS", "50000")
        .model("claude-new")
        .build();
    store.apply(&update).await.expect("apply");

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(on_disk["max_tokens"], json!(8192));
    assert_eq!(on_disk["env"]["CLAUDE_CODE_MAX_OUTPUT_TOKENS"], json!("8192"));
    assert_eq!(on_disk["model"], json!("claude-new"));
    assert_eq!(on_disk["env"]["ANTHROPIC_MODEL"], json!("claude-new"));
}

#[tokio::test]
async fn validated_updates_skip_neither_clamp_nor_mirror() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    let store = SettingsStore::new(&path);

    let update = SettingsUpdate::try_from(json!({
        "model": "claude-raw",
        "max_tokens": 64000
    }))
    .expect("update");
    let saved = store.apply(&update).await.expect("apply");

    assert_eq!(saved.get("max_tokens"), Some(&json!(8192)));
    assert_eq!(saved.env_str("CLAUDE_CODE_MAX_OUTPUT_TOKENS"), Some("8192"));
    assert_eq!(saved.env_str("ANTHROPIC_MODEL"), Some("claude-raw"));
    assert_eq!(store.load().await.expect("reload"), saved);
}

#[cfg(unix)]
#[tokio::test]
async fn unwritable_directory_is_a_storage_failure() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().expect("tempdir");
    let locked = temp.path().join("locked");
    fs::create_dir(&locked).expect("mkdir");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).expect("chmod");

    let store = SettingsStore::new(locked.join("settings.json"));
    let result = store.save(&default_document()).await;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).expect("restore");

    // Root ignores directory permissions.
    if let Err(err) = result {
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
