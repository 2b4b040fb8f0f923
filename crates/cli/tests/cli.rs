use assert_cmd::Command;
use serde_json::Value;

fn libris(config_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("libris").unwrap();
    cmd.env("LIBRIS_CONFIG_DIR", config_dir)
        .env("LIBRIS_ENV", "local")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    let output = libris(dir.path()).arg("--help").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    for command in ["serve", "seed", "settings"] {
        assert!(stdout.contains(command), "{command}");
    }
}

#[test]
fn settings_prints_effective_configuration() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("base.toml"),
        "[server]\nport = 4100\n\n[database]\ncollection = \"catalog\"\n",
    )
    .unwrap();

    let output = libris(dir.path())
        .arg("settings")
        .env("LIBRIS__SERVER__HOST", "127.0.0.1")
        .output()
        .unwrap();
    assert!(output.status.success());

    let settings: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(settings["server"]["port"], 4100);
    assert_eq!(settings["server"]["host"], "127.0.0.1");
    assert_eq!(settings["database"]["collection"], "catalog");
}

#[test]
fn seed_stores_books_in_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("books.json");
    let input = dir.path().join("seed.json");
    std::fs::write(
        &input,
        r#"[
            {"title": "Dune", "author": "Frank Herbert", "genre": "SciFi", "publishedYear": 1965},
            {"title": "Emma", "author": "Jane Austen", "genre": "Romance", "publishedYear": 1815}
        ]"#,
    )
    .unwrap();

    let output = libris(dir.path())
        .arg("seed")
        .arg(&input)
        .env("LIBRIS__DATABASE__URL", format!("file://{}", store.display()))
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().contains("seeded 2 books"));

    let snapshot: Value = serde_json::from_slice(&std::fs::read(&store).unwrap()).unwrap();
    assert_eq!(snapshot["collections"]["books"].as_array().unwrap().len(), 2);
}

#[test]
fn seed_rejects_invalid_books() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("seed.json");
    std::fs::write(&input, r#"{"title": "Dune"}"#).unwrap();

    let output = libris(dir.path()).arg("seed").arg(&input).output().unwrap();
    assert!(!output.status.success());
}
