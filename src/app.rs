use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::domain::{AccessionMap, EntryKind, GenomeAccession, UniprotMapping};
use crate::download::{self, AssemblyDownload, DownloadStatus, FileFetcher};
use crate::error::KiraError;
use crate::fs_util::{self, OutputDirAction};
use crate::ncbi::EntrezClient;
use crate::uniprot::{self, IdMappingClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub severity: Severity,
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            elapsed: None,
        }
    }

    pub fn info(message: impl Into<String>, elapsed: Option<Duration>) -> Self {
        Self {
            elapsed,
            ..Self::new(Severity::Info, message)
        }
    }
}

/// Where library code reports what it is doing.
pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);

    /// Bytes written so far for a transfer, with the expected total if known.
    fn transfer(&self, _label: &str, _written: u64, _total: Option<u64>) {}

    fn info(&self, message: &str) {
        self.event(ProgressEvent::new(Severity::Info, message));
    }

    fn warning(&self, message: &str) {
        self.event(ProgressEvent::new(Severity::Warning, message));
    }

    fn error(&self, message: &str) {
        self.event(ProgressEvent::new(Severity::Error, message));
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    pub suffix: String,
    pub ftp_stem: String,
    pub verify: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MappingOptions {
    pub batch_size: usize,
    pub retries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub items: Vec<AssemblyDownload>,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingResult {
    pub input_accessions: usize,
    pub resolved: usize,
    pub mapping: UniprotMapping,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub directory: PathBuf,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputDirResult {
    pub path: PathBuf,
    pub action: OutputDirAction,
}

pub struct App<E: EntrezClient, F: FileFetcher, U: IdMappingClient> {
    entrez: E,
    mirror: F,
    uniprot: U,
}

impl<E: EntrezClient, F: FileFetcher, U: IdMappingClient> App<E, F, U> {
    pub fn new(entrez: E, mirror: F, uniprot: U) -> Self {
        Self {
            entrez,
            mirror,
            uniprot,
        }
    }

    /// Downloads each assembly into `outdir`. Stops at the first accession
    /// Entrez cannot resolve; download and verification failures only show in
    /// the item.
    pub fn fetch_assemblies(
        &self,
        accessions: &[GenomeAccession],
        outdir: Option<&Path>,
        options: &AssemblyOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, KiraError> {
        let mut items = Vec::with_capacity(accessions.len());
        for accession in accessions {
            sink.info(&format!("resolving assembly {accession}"));
            let mut item = download::get_genomic_assembly(
                &self.entrez,
                &self.mirror,
                accession,
                outdir,
                &options.suffix,
                &options.ftp_stem,
                sink,
            )?;
            if options.verify {
                item.verified = verify_download(&item, sink);
            }
            items.push(item);
        }
        Ok(FetchResult {
            items,
            generated_at: iso_timestamp(),
        })
    }

    pub fn map_accessions(
        &self,
        accessions: &AccessionMap,
        options: MappingOptions,
        sink: &dyn ProgressSink,
    ) -> Result<MappingResult, KiraError> {
        map_accessions(&self.uniprot, accessions, options, sink)
    }
}

/// Maps accessions to UniProt without the NCBI clients an [`App`] carries.
pub fn map_accessions<U: IdMappingClient + ?Sized>(
    client: &U,
    accessions: &AccessionMap,
    options: MappingOptions,
    sink: &dyn ProgressSink,
) -> Result<MappingResult, KiraError> {
    let mapping = uniprot::map_accessions(
        client,
        accessions,
        options.batch_size,
        options.retries,
        sink,
    )?;
    Ok(MappingResult {
        input_accessions: accessions.len(),
        resolved: mapping.len(),
        mapping,
        generated_at: iso_timestamp(),
    })
}

/// Checks a freshly downloaded gzip file. Other files are not checked.
fn verify_download(item: &AssemblyDownload, sink: &dyn ProgressSink) -> Option<bool> {
    let is_gzip = item
        .path
        .extension()
        .is_some_and(|extension| extension == "gz");
    if !is_gzip || !matches!(item.status, DownloadStatus::Downloaded { .. }) {
        return None;
    }
    match fs_util::validate_gzip(&item.path) {
        Ok(_) => {
            sink.info(&format!("verified {}", item.path.display()));
            Some(true)
        }
        Err(err) => {
            sink.error(&format!("verification failed for {}: {err}", item.accession));
            Some(false)
        }
    }
}

pub fn list_paths(
    directory: &Path,
    kind: EntryKind,
    prefixes: &[String],
    suffixes: &[String],
) -> Result<ListResult, KiraError> {
    let prefixes = prefixes.iter().map(String::as_str).collect::<Vec<_>>();
    let suffixes = suffixes.iter().map(String::as_str).collect::<Vec<_>>();
    let paths = fs_util::list_entries(
        directory,
        kind,
        (!prefixes.is_empty()).then_some(prefixes.as_slice()),
        (!suffixes.is_empty()).then_some(suffixes.as_slice()),
    )?;
    Ok(ListResult {
        directory: directory.to_path_buf(),
        paths,
    })
}

pub fn prepare_output_dir(
    path: &Path,
    force: bool,
    nodelete: bool,
    sink: &dyn ProgressSink,
) -> Result<OutputDirResult, KiraError> {
    let action = fs_util::make_output_directory(path, force, nodelete, sink)?;
    Ok(OutputDirResult {
        path: path.to_path_buf(),
        action,
    })
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
