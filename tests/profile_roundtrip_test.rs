//! Profile -> vocabulary -> de-identification -> profile

use kanon::deident::{
    EditDistance, KAnonDeidentifier, KAnonSettings, NoopObserver, RemapDeidentifier,
    VocabDeidentifier,
};
use kanon::domain::{ProfileEntry, VocabProfile};
use std::collections::HashMap;
use tempfile::tempdir;

fn entry(value: &str, count: f64) -> ProfileEntry {
    ProfileEntry {
        value: value.to_string(),
        count,
    }
}

fn given_names() -> VocabProfile {
    VocabProfile::new(
        "given_name",
        vec![
            entry("John", 500.0),
            entry("Mary", 320.0),
            entry("Jonh", 2.0),
            entry("Zxqqy", 1.0),
        ],
    )
}

fn count_by_value(profile: &VocabProfile) -> HashMap<String, f64> {
    profile
        .entries
        .iter()
        .map(|e| (e.value.clone(), e.count))
        .collect()
}

#[test]
fn test_save_and_load_through_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("given_name.json");

    let profile = given_names();
    profile.save(&path).unwrap();
    let loaded = VocabProfile::load(&path).unwrap();

    assert_eq!(loaded, profile);
    assert_eq!(loaded.total_count(), 823.0);
}

#[test]
fn test_load_rejects_negative_counts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(
        &path,
        r#"{"field":"given_name","entries":[{"value":"John","count":-1.0}]}"#,
    )
    .unwrap();

    assert!(VocabProfile::load(&path).is_err());
}

#[test]
fn test_kanon_round_trip_keeps_total_count() {
    let profile = given_names();
    let before = count_by_value(&profile);
    let total = profile.total_count();

    let (vocab, counts) = profile.into_vocabulary();
    let by_value: HashMap<String, f64> = counts
        .iter()
        .map(|(&index, &count)| (vocab.get_for_index(index).unwrap(), count))
        .collect();
    assert_eq!(by_value, before);

    let deidentifier: KAnonDeidentifier<String, Vec<char>> = KAnonDeidentifier::new(
        EditDistance::new(2, 2),
        ["John", "Johan", "Amy", "Zack"]
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>(),
        KAnonSettings::new(30.0),
    )
    .unwrap();
    let count = |v: &String| by_value.get(v).copied().unwrap_or(0.0);
    let summary = deidentifier
        .deidentify(&vocab, &count, &NoopObserver)
        .unwrap();
    assert_eq!(summary.victims, 2);
    assert!(summary.is_complete());

    let output = VocabProfile::from_vocabulary("given_name", &vocab, &counts).unwrap();
    assert_eq!(output.total_count(), total);

    let after = count_by_value(&output);
    assert!(!after.contains_key("Jonh"));
    assert!(!after.contains_key("Zxqqy"));
    assert_eq!(after["Mary"], 320.0);
    // John was already live, so Jonh takes the next closest name
    assert_eq!(after["John"], 500.0);
    assert_eq!(after["Johan"], 2.0);
}

#[test]
fn test_remap_merge_folds_counts() {
    let profile = VocabProfile::new(
        "company",
        vec![
            entry("Acme1", 3.0),
            entry("Acme", 40.0),
            entry("Acme2", 5.0),
            entry("Globex", 60.0),
        ],
    );
    let (vocab, counts) = profile.into_vocabulary();

    let remap = RemapDeidentifier::new(
        Box::new(|value: &String, count: &kanon::deident::CountFn<'_, String>| {
            (count(value) < 30.0).then(|| value.trim_end_matches(char::is_numeric).to_string())
        }),
        2,
    )
    .unwrap();
    let counts_by_value: HashMap<String, f64> = counts
        .iter()
        .map(|(&index, &count)| (vocab.get_for_index(index).unwrap(), count))
        .collect();
    let summary = remap
        .deidentify(&vocab, &|v: &String| counts_by_value[v], &NoopObserver)
        .unwrap();
    assert_eq!(summary.merged, 2);

    let output = VocabProfile::from_vocabulary("company", &vocab, &counts).unwrap();
    assert_eq!(
        output.entries,
        vec![entry("Acme", 48.0), entry("Globex", 60.0)]
    );
}

#[test]
fn test_duplicate_profile_values_share_an_index() {
    let profile = VocabProfile::new("city", vec![entry("Oslo", 4.0), entry("Oslo", 6.0)]);
    let (vocab, counts) = profile.into_vocabulary();

    assert_eq!(vocab.len(), 1);
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[&1], 10.0);
}
