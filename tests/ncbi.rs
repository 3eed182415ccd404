use std::cell::RefCell;
use std::io::Cursor;

use assert_matches::assert_matches;
use serde_json::{Value, json};

use kira_bioutils::domain::GenomeAccession;
use kira_bioutils::download::{DownloadStatus, FileFetcher, RemoteStream, get_genomic_assembly};
use kira_bioutils::error::KiraError;
use kira_bioutils::ncbi::{
    DEFAULT_ASSEMBLY_SUFFIX, EntrezClient, GENOMES_FTP_STEM, resolve_assembly_url,
};
use kira_bioutils::output::JsonOutput;

/// Entrez stand-in that knows a single assembly.
struct OneAssembly {
    accession: &'static str,
    name: &'static str,
    terms: RefCell<Vec<String>>,
}

impl OneAssembly {
    fn new(accession: &'static str, name: &'static str) -> Self {
        Self {
            accession,
            name,
            terms: RefCell::new(Vec::new()),
        }
    }
}

impl EntrezClient for OneAssembly {
    fn search(&self, db: &str, term: &str) -> Result<Vec<String>, KiraError> {
        assert_eq!(db, "assembly");
        self.terms.borrow_mut().push(term.to_string());
        if term.starts_with(self.accession) {
            Ok(vec!["2563".to_string(), "9999".to_string()])
        } else {
            Ok(Vec::new())
        }
    }

    fn summary(&self, _db: &str, id: &str) -> Result<Value, KiraError> {
        Ok(json!({
            "result": {
                "uids": [id],
                id: {"assemblyaccession": self.accession, "assemblyname": self.name}
            }
        }))
    }
}

struct NoEntrez;

impl EntrezClient for NoEntrez {
    fn search(&self, _db: &str, _term: &str) -> Result<Vec<String>, KiraError> {
        Err(KiraError::Transport("connection refused".to_string()))
    }

    fn summary(&self, _db: &str, _id: &str) -> Result<Value, KiraError> {
        unreachable!("summary after failed search")
    }
}

#[derive(Default)]
struct RecordingMirror {
    urls: RefCell<Vec<String>>,
}

impl FileFetcher for RecordingMirror {
    fn open(&self, url: &str) -> Result<RemoteStream, KiraError> {
        self.urls.borrow_mut().push(url.to_string());
        Ok(RemoteStream {
            content_length: Some(4),
            reader: Box::new(Cursor::new(b"gbff".to_vec())),
        })
    }
}

fn accession(value: &str) -> GenomeAccession {
    value.parse().unwrap()
}

#[test]
fn resolves_mirror_url_from_assembly_name() {
    let entrez = OneAssembly::new("GCA_000021645.1", "ASM2164v1");
    let resolved = resolve_assembly_url(
        &entrez,
        &accession("GCA_000021645.1"),
        DEFAULT_ASSEMBLY_SUFFIX,
        GENOMES_FTP_STEM,
    )
    .unwrap();

    assert_eq!(
        resolved.url,
        "https://ftp.ncbi.nlm.nih.gov/genomes/all/GCA/000/021/645/\
         GCA_000021645.1_ASM2164v1/GCA_000021645.1_ASM2164v1_genomic.gbff.gz"
    );
    assert_eq!(resolved.filestem, "GCA_000021645.1_ASM2164v1");
    assert_eq!(
        *entrez.terms.borrow(),
        vec!["GCA_000021645.1[Assembly Accession]"]
    );
}

#[test]
fn assembly_name_is_sanitized_in_url() {
    let entrez = OneAssembly::new("GCF_000005845.2", "ASM584v2 (E. coli)");
    let resolved = resolve_assembly_url(
        &entrez,
        &accession("GCF_000005845.2"),
        "genomic.fna.gz",
        "https://mirror.test/genomes/",
    )
    .unwrap();

    assert_eq!(resolved.filestem, "GCF_000005845.2_ASM584v2__E._coli_");
    assert_eq!(
        resolved.url,
        "https://mirror.test/genomes/GCF/000/005/845/\
         GCF_000005845.2_ASM584v2__E._coli_/GCF_000005845.2_ASM584v2__E._coli__genomic.fna.gz"
    );
}

#[test]
fn unknown_accession_is_a_lookup_error() {
    let entrez = OneAssembly::new("GCA_000021645.1", "ASM2164v1");
    let err = resolve_assembly_url(
        &entrez,
        &accession("GCA_999999999.1"),
        DEFAULT_ASSEMBLY_SUFFIX,
        GENOMES_FTP_STEM,
    )
    .unwrap_err();
    assert_matches!(err, KiraError::Lookup(_));
}

#[test]
fn entrez_failure_propagates() {
    let err = resolve_assembly_url(
        &NoEntrez,
        &accession("GCA_000021645.1"),
        DEFAULT_ASSEMBLY_SUFFIX,
        GENOMES_FTP_STEM,
    )
    .unwrap_err();
    assert!(err.is_transport());
}

#[test]
fn genomic_assembly_lands_in_outdir_with_underscored_name() {
    let temp = tempfile::tempdir().unwrap();
    let entrez = OneAssembly::new("GCA_000021645.1", "ASM2164v1");
    let mirror = RecordingMirror::default();

    let download = get_genomic_assembly(
        &entrez,
        &mirror,
        &accession("GCA_000021645.1"),
        Some(temp.path()),
        DEFAULT_ASSEMBLY_SUFFIX,
        GENOMES_FTP_STEM,
        &JsonOutput,
    )
    .unwrap();

    let expected = temp
        .path()
        .join("GCA_000021645_1_ASM2164v1_genomic.gbff.gz");
    assert_eq!(download.path, expected);
    assert_eq!(download.status, DownloadStatus::Downloaded { bytes: 4 });
    assert_eq!(*mirror.urls.borrow(), vec![download.url.clone()]);
    assert_eq!(std::fs::read(&expected).unwrap(), b"gbff");
}
