use clipchat_client::config_store::{
    CONFIG_DIR_ENV, ConfigLoadError, ConfigSaveError, JsonConfigStore, MAX_CONFIG_BYTES,
    config_path, load_settings_from_path, load_settings_or_default, parse_settings_json,
    replace_with_tmp, save_settings_to_path, save_settings_with_retry,
};
use clipchat_core::{Preset, Settings, SettingsError, SettingsStore};

fn sample_settings() -> Settings {
    Settings {
        model: "gpt-4o".to_owned(),
        temperature: 1.25,
        max_tokens: 2048,
        always_on_top: false,
        auto_paste_on_launch: false,
        system_prompt: "Answer in haiku.".to_owned(),
        selected_preset: Some("Haiku".to_owned()),
        custom_presets: vec![Preset::new("Haiku", "Answer in haiku.")],
        api_base_url: "http://localhost:8080/v1".to_owned(),
    }
}

#[test]
fn saved_settings_load_back_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("config.json");

    save_settings_to_path(&path, &sample_settings()).expect("save");
    let loaded = load_settings_from_path(&path).expect("load");
    assert_eq!(loaded, sample_settings());
    assert!(!path.with_extension("json.tmp").exists());
}

#[test]
fn save_overwrites_existing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");

    save_settings_to_path(&path, &Settings::default()).expect("first save");
    save_settings_with_retry(&path, &sample_settings()).expect("second save");
    assert_eq!(load_settings_or_default(&path), sample_settings());
}

#[test]
fn failed_replace_keeps_the_previous_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    save_settings_to_path(&path, &sample_settings()).expect("first save");

    let missing_tmp = path.with_extension("json.tmp");
    let err = replace_with_tmp(&missing_tmp, &path).expect_err("nothing to move");
    assert!(matches!(err, ConfigSaveError::Rename(_)));
    assert_eq!(load_settings_from_path(&path).expect("still there"), sample_settings());
}

#[test]
fn padded_text_fields_are_rejected_instead_of_changing_on_reload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");

    let padded = Settings {
        model: " gpt-4o ".to_owned(),
        ..sample_settings()
    };
    let err = save_settings_to_path(&path, &padded).expect_err("untrimmed model");
    assert!(matches!(
        err,
        ConfigSaveError::Invalid(SettingsError::Untrimmed(_))
    ));
    assert!(!path.exists());

    let normalized = padded.normalized();
    save_settings_to_path(&path, &normalized).expect("save");
    assert_eq!(load_settings_from_path(&path).expect("load"), normalized);
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");

    assert!(matches!(
        load_settings_from_path(&path),
        Err(ConfigLoadError::Metadata(_))
    ));
    assert_eq!(load_settings_or_default(&path), Settings::default());
}

#[test]
fn malformed_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").expect("write");

    assert!(matches!(
        load_settings_from_path(&path),
        Err(ConfigLoadError::Parse(_))
    ));
    assert_eq!(load_settings_or_default(&path), Settings::default());
}

#[test]
fn oversized_file_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    let padding = " ".repeat(MAX_CONFIG_BYTES as usize + 1);
    std::fs::write(&path, format!("{{\"model\":\"gpt-4o\"}}{padding}")).expect("write");

    assert!(matches!(
        load_settings_from_path(&path),
        Err(ConfigLoadError::TooLarge { .. })
    ));
    assert_eq!(load_settings_or_default(&path), Settings::default());
}

#[test]
fn out_of_range_temperature_is_not_saved() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");

    for temperature in [-0.1, 2.1, 3.5] {
        let settings = Settings {
            temperature,
            ..Settings::default()
        };
        let err = save_settings_with_retry(&path, &settings).expect_err("rejected");
        assert!(matches!(
            err,
            ConfigSaveError::Invalid(SettingsError::TemperatureOutOfRange(_))
        ));
    }
    assert!(!path.exists());
}

#[test]
fn boundary_temperatures_are_saved() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");

    for temperature in [0.0, 2.0] {
        let settings = Settings {
            temperature,
            ..Settings::default()
        };
        save_settings_to_path(&path, &settings).expect("save");
        assert_eq!(load_settings_or_default(&path).temperature, temperature);
    }
}

#[test]
fn hand_edited_values_are_clamped_on_load() {
    let settings = parse_settings_json(
        r#"{ "temperature": 7.5, "max_tokens": 0, "model": "  ", "api_base_url": "ftp://x" }"#,
    )
    .expect("parse");
    assert_eq!(settings.temperature, 2.0);
    assert_eq!(settings.max_tokens, 1);
    assert_eq!(settings.model, Settings::default().model);
    assert_eq!(settings.api_base_url, Settings::default().api_base_url);
}

#[test]
fn older_files_with_fewer_fields_still_load() {
    let settings =
        parse_settings_json(r#"{ "model": "gpt-4-turbo", "auto_paste": false }"#).expect("parse");
    assert_eq!(settings.model, "gpt-4-turbo");
    assert!(!settings.auto_paste_on_launch);
    assert!(settings.always_on_top);
    assert_eq!(settings.max_tokens, Settings::default().max_tokens);
}

#[test]
fn api_key_never_lands_in_the_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "model": "gpt-4o", "api_key": "sk-should-not-survive-0000" }"#)
        .expect("write");

    let settings = load_settings_from_path(&path).expect("stray field ignored");
    assert_eq!(settings.model, "gpt-4o");

    save_settings_to_path(&path, &settings).expect("save");
    let written = std::fs::read_to_string(&path).expect("read back");
    assert!(!written.contains("api_key"));
    assert!(!written.contains("sk-should-not-survive"));
}

#[test]
fn store_trait_round_trips_and_reports_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = JsonConfigStore::new(dir.path().join("config.json"));

    assert_eq!(store.load(), Settings::default());
    store.save(&sample_settings()).expect("save");
    assert_eq!(store.load(), sample_settings());

    let invalid = Settings {
        max_tokens: 0,
        ..Settings::default()
    };
    let err = store.save(&invalid).expect_err("invalid settings rejected");
    assert!(err.to_string().contains("max tokens"), "unexpected: {err}");
    assert_eq!(store.load(), sample_settings());
}

#[test]
fn config_dir_can_be_overridden() {
    let dir = tempfile::tempdir().expect("tempdir");

    // SAFETY: no other test in this binary reads or writes this variable.
    unsafe {
        std::env::set_var(CONFIG_DIR_ENV, dir.path());
    }
    let path = config_path();
    unsafe {
        std::env::remove_var(CONFIG_DIR_ENV);
    }

    assert_eq!(path, dir.path().join("config.json"));
}
