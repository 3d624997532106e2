//! Identity discovery tests: contiguous index scanning over secrets.

use std::collections::HashMap;

use mimic_hostd::models::identity::Identity;
use mimic_hostd::orchestrator::launcher::discover_identities;
use mimic_hostd::secrets::SecretSource;

fn secrets_with_indices(indices: &[u32]) -> SecretSource {
    let mut map = HashMap::new();
    for index in indices {
        map.insert(format!("MIMIC_MODEL_UID_{index}"), format!("model-{index}"));
        map.insert(
            format!("MIMIC_MODEL_SECRET_KEY_{index}"),
            format!("key-{index}"),
        );
        map.insert(format!("MIMIC_BOT_TOKEN_{index}"), format!("token-{index}"));
    }
    SecretSource::from_map(map)
}

#[test]
fn discovers_contiguous_identities() {
    let secrets = secrets_with_indices(&[1, 2, 3]);
    let identities = discover_identities(&secrets, 10);

    assert_eq!(identities.len(), 3);
    assert_eq!(identities[0].index, 1);
    assert_eq!(identities[2].model_uid, "model-3");
    assert_eq!(identities[1].bot_token, "token-2");
}

#[test]
fn stops_at_first_gap() {
    // Indices 1, 2, 3 present, 4 missing, 5 present: the scan must stop
    // at the gap and never see 5.
    let secrets = secrets_with_indices(&[1, 2, 3, 5]);
    let identities = discover_identities(&secrets, 10);

    assert_eq!(identities.len(), 3);
    assert!(identities.iter().all(|id| id.index <= 3));
}

#[test]
fn empty_source_discovers_nothing() {
    let secrets = secrets_with_indices(&[]);
    assert!(discover_identities(&secrets, 10).is_empty());
}

#[test]
fn missing_index_one_discovers_nothing() {
    let secrets = secrets_with_indices(&[2, 3]);
    assert!(discover_identities(&secrets, 10).is_empty());
}

#[test]
fn caps_at_max_bots() {
    let secrets = secrets_with_indices(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    let identities = discover_identities(&secrets, 10);

    assert_eq!(identities.len(), 10);
    assert_eq!(identities.last().map(|id| id.index), Some(10));
}

#[test]
fn incomplete_triple_counts_as_missing() {
    let mut map = HashMap::new();
    map.insert("MIMIC_MODEL_UID_1".to_owned(), "model-1".to_owned());
    map.insert("MIMIC_MODEL_SECRET_KEY_1".to_owned(), "key-1".to_owned());
    map.insert("MIMIC_BOT_TOKEN_1".to_owned(), "token-1".to_owned());
    // Index 2 has a UID but no token: the triple is incomplete.
    map.insert("MIMIC_MODEL_UID_2".to_owned(), "model-2".to_owned());
    map.insert("MIMIC_MODEL_SECRET_KEY_2".to_owned(), "key-2".to_owned());
    let secrets = SecretSource::from_map(map);

    let identities = discover_identities(&secrets, 10);
    assert_eq!(identities.len(), 1);
}

#[test]
fn empty_values_count_as_missing() {
    let mut map = HashMap::new();
    map.insert("MIMIC_MODEL_UID_1".to_owned(), "model-1".to_owned());
    map.insert("MIMIC_MODEL_SECRET_KEY_1".to_owned(), String::new());
    map.insert("MIMIC_BOT_TOKEN_1".to_owned(), "token-1".to_owned());
    let secrets = SecretSource::from_map(map);

    assert!(secrets.identity(1).is_none());
    assert!(discover_identities(&secrets, 10).is_empty());
}

#[test]
fn identity_lookup_returns_full_triple() {
    let secrets = secrets_with_indices(&[1]);
    let identity = secrets.identity(1).expect("identity present");

    assert_eq!(identity.index, 1);
    assert_eq!(identity.model_uid, "model-1");
    assert_eq!(identity.model_key, "key-1");
    assert_eq!(identity.bot_token, "token-1");
}

#[test]
fn settings_blob_name_derives_from_model_uid() {
    let identity = Identity {
        index: 1,
        model_uid: "abc123".into(),
        model_key: "k".into(),
        bot_token: "t".into(),
    };
    assert_eq!(identity.settings_blob_name(), "hosted_config_abc123.json");
}

#[test]
fn file_source_round_trips_through_json() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("secrets.json");
    std::fs::write(
        &path,
        r#"{"MIMIC_MODEL_UID_1": "m1", "MIMIC_MODEL_SECRET_KEY_1": "k1", "MIMIC_BOT_TOKEN_1": "t1"}"#,
    )
    .expect("write secrets");

    let secrets = SecretSource::from_file(&path).expect("secrets load");
    assert_eq!(discover_identities(&secrets, 10).len(), 1);
}

#[test]
fn rejects_malformed_secrets_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("secrets.json");
    std::fs::write(&path, "[1, 2, 3]").expect("write secrets");

    assert!(SecretSource::from_file(&path).is_err());
}

#[test]
#[serial_test::serial]
fn env_source_reads_process_environment() {
    std::env::set_var("MIMIC_MODEL_UID_1", "env-model");
    std::env::set_var("MIMIC_MODEL_SECRET_KEY_1", "env-key");
    std::env::set_var("MIMIC_BOT_TOKEN_1", "env-token");
    std::env::remove_var("MIMIC_MODEL_UID_2");

    let identities = discover_identities(&SecretSource::Env, 10);

    std::env::remove_var("MIMIC_MODEL_UID_1");
    std::env::remove_var("MIMIC_MODEL_SECRET_KEY_1");
    std::env::remove_var("MIMIC_BOT_TOKEN_1");

    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].model_uid, "env-model");
}
