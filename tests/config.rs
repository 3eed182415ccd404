use std::fs;

use assert_matches::assert_matches;

use kira_bioutils::config::{ConfigLoader, DEFAULT_BATCH_SIZE};
use kira_bioutils::error::KiraError;
use kira_bioutils::ncbi::GENOMES_FTP_STEM;

#[test]
fn explicit_config_overrides_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-bu.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "uniprot": {"batch_size": 250, "retries": 3},
            "entrez": {"email": "curator@example.org", "attempts": 4},
            "download": {"suffix": "genomic.fna.gz"}
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.batch_size, 250);
    assert_eq!(resolved.retries, 3);
    assert_eq!(resolved.email.as_deref(), Some("curator@example.org"));
    assert_eq!(resolved.entrez_attempts, 4);
    assert_eq!(resolved.assembly_suffix, "genomic.fna.gz");
    assert_eq!(resolved.ftp_stem, GENOMES_FTP_STEM);
    assert_eq!(
        resolved.source_path().map(|path| path.as_str()),
        path.to_str()
    );
}

#[test]
fn partial_sections_keep_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("partial.json");
    fs::write(&path, r#"{"entrez": {"email": "  "}}"#).unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.batch_size, DEFAULT_BATCH_SIZE);
    assert!(resolved.email.is_none());
}

#[test]
fn missing_explicit_config_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, KiraError::ConfigRead(_));
}

#[test]
fn malformed_config_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(KiraError::ConfigParse(_))
    );

    fs::write(&path, r#"{"uniprot": {"batch_size": 0}}"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(KiraError::ConfigParse(_))
    );
}
