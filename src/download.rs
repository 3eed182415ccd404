use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::GenomeAccession;
use crate::error::KiraError;
use crate::ncbi::{self, EntrezClient};
use crate::transport;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(45);
pub const CHUNK_SIZE: usize = 1_048_576;

/// An opened remote resource, ready to be streamed.
pub struct RemoteStream {
    pub content_length: Option<u64>,
    pub reader: Box<dyn Read>,
}

pub trait FileFetcher {
    fn open(&self, url: &str) -> Result<RemoteStream, KiraError>;
}

#[derive(Clone)]
pub struct MirrorHttpClient {
    client: Client,
}

impl MirrorHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        Self::with_connect_timeout(CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(timeout: Duration) -> Result<Self, KiraError> {
        let client = transport::client_builder()?
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|err| KiraError::Transport(err.to_string()))?;
        Ok(Self { client })
    }
}

impl FileFetcher for MirrorHttpClient {
    fn open(&self, url: &str) -> Result<RemoteStream, KiraError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| KiraError::Transport(err.to_string()))?;
        let response = transport::handle_status(response, "mirror")?;
        Ok(RemoteStream {
            content_length: response.content_length(),
            reader: Box::new(response),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DownloadStatus {
    Downloaded { bytes: u64 },
    Skipped,
    Failed,
}

/// Streams `url` into `destination`.
///
/// Best effort: transport and disk failures are logged through `sink` and
/// reported as [`DownloadStatus::Failed`], never raised. An existing
/// destination is left untouched. A write failure may leave a truncated file.
pub fn download_file<F: FileFetcher + ?Sized>(
    fetcher: &F,
    url: &str,
    destination: &Path,
    accession: &str,
    file_type: &str,
    sink: &dyn ProgressSink,
) -> DownloadStatus {
    if destination.exists() {
        sink.warning(&format!(
            "output file {} exists, not downloading",
            destination.display()
        ));
        return DownloadStatus::Skipped;
    }

    let start = Instant::now();
    let mut remote = match fetcher.open(url) {
        Ok(remote) => remote,
        Err(err) => {
            sink.error(&format!(
                "failed to download {file_type} for {accession}: {err}"
            ));
            return DownloadStatus::Failed;
        }
    };

    let label = format!("{accession} {file_type}");
    match copy_in_chunks(&mut remote, destination, &label, sink) {
        Ok(bytes) => {
            sink.event(ProgressEvent::info(
                format!("downloaded {label} to {} ({bytes} bytes)", destination.display()),
                Some(start.elapsed()),
            ));
            DownloadStatus::Downloaded { bytes }
        }
        Err(err) => {
            sink.error(&format!("download failed for {accession}: {err}"));
            DownloadStatus::Failed
        }
    }
}

fn copy_in_chunks(
    remote: &mut RemoteStream,
    destination: &Path,
    label: &str,
    sink: &dyn ProgressSink,
) -> io::Result<u64> {
    let mut out = File::create(destination)?;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let read = match remote.reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        out.write_all(&buffer[..read])?;
        written += read as u64;
        sink.transfer(label, written, remote.content_length);
    }
    out.flush()?;
    Ok(written)
}

#[derive(Debug, Clone, Serialize)]
pub struct AssemblyDownload {
    pub accession: String,
    pub url: String,
    pub path: PathBuf,
    pub status: DownloadStatus,
    /// Gzip integrity of the downloaded file, when it was checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

/// Output file name for an assembly: dots in the filestem become underscores.
pub fn assembly_file_name(filestem: &str, suffix: &str) -> String {
    format!("{}_{suffix}", filestem.replace('.', "_"))
}

/// Resolves the mirror URL for `accession` and downloads it into `outdir`
/// (the current directory when `None`).
///
/// Lookup failures are returned; download failures only show in the status.
pub fn get_genomic_assembly<E, F>(
    entrez: &E,
    fetcher: &F,
    accession: &GenomeAccession,
    outdir: Option<&Path>,
    suffix: &str,
    ftp_stem: &str,
    sink: &dyn ProgressSink,
) -> Result<AssemblyDownload, KiraError>
where
    E: EntrezClient + ?Sized,
    F: FileFetcher + ?Sized,
{
    let assembly = ncbi::resolve_assembly_url(entrez, accession, suffix, ftp_stem)?;
    let file_name = assembly_file_name(&assembly.filestem, suffix);
    let path = match outdir {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    };

    let status = download_file(
        fetcher,
        &assembly.url,
        &path,
        accession.as_str(),
        "GenBank file",
        sink,
    );

    Ok(AssemblyDownload {
        accession: accession.to_string(),
        url: assembly.url,
        path,
        status,
        verified: None,
    })
}
