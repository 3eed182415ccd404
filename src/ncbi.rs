use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{AssemblyUrl, GenomeAccession};
use crate::error::KiraError;
use crate::transport;

pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const GENOMES_FTP_STEM: &str = "https://ftp.ncbi.nlm.nih.gov/genomes/all";
pub const DEFAULT_ASSEMBLY_SUFFIX: &str = "genomic.gbff.gz";
pub const ENTREZ_ATTEMPTS: usize = 10;

// NCBI allows three requests per second without an API key.
const ENTREZ_PAUSE: Duration = Duration::from_millis(350);

static ESCAPE_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s/,#\(\)]").unwrap());

/// The two Entrez E-utilities the assembly resolver needs.
pub trait EntrezClient {
    /// `esearch`: ids matching `term` in `db`, in Entrez order.
    fn search(&self, db: &str, term: &str) -> Result<Vec<String>, KiraError>;
    /// `esummary`: the full document summary for `id` in `db`.
    fn summary(&self, db: &str, id: &str) -> Result<Value, KiraError>;
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Clone)]
pub struct EntrezHttpClient {
    client: Client,
    base_url: String,
    email: Option<String>,
    api_key: Option<String>,
    attempts: usize,
}

impl EntrezHttpClient {
    pub fn new(email: Option<String>) -> Result<Self, KiraError> {
        let client = transport::build_client(Duration::from_secs(60))?;
        let api_key = std::env::var("NCBI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Ok(Self {
            client,
            base_url: EUTILS_BASE_URL.to_string(),
            email,
            api_key,
            attempts: ENTREZ_ATTEMPTS,
        })
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    fn get_json(&self, utility: &str, params: &[(&str, &str)]) -> Result<Value, KiraError> {
        let url = format!("{}/{utility}.fcgi", self.base_url);
        transport::with_retries(self.attempts, ENTREZ_PAUSE, || {
            let mut request = self
                .client
                .get(&url)
                .query(params)
                .query(&[("retmode", "json"), ("tool", "kira-bu")]);
            if let Some(email) = &self.email {
                request = request.query(&[("email", email.as_str())]);
            }
            if let Some(key) = &self.api_key {
                request = request.query(&[("api_key", key.as_str())]);
            }
            let response = request
                .send()
                .map_err(|err| KiraError::Transport(err.to_string()))?;
            let response = transport::handle_status(response, "Entrez")?;
            response
                .json::<Value>()
                .map_err(|err| KiraError::Transport(err.to_string()))
        })
    }
}

impl EntrezClient for EntrezHttpClient {
    fn search(&self, db: &str, term: &str) -> Result<Vec<String>, KiraError> {
        let raw = self.get_json("esearch", &[("db", db), ("term", term)])?;
        let parsed: ESearchResponse = serde_json::from_value(raw)
            .map_err(|err| KiraError::Transport(format!("unexpected esearch response: {err}")))?;
        Ok(parsed.esearchresult.idlist)
    }

    fn summary(&self, db: &str, id: &str) -> Result<Value, KiraError> {
        self.get_json("esummary", &[("db", db), ("id", id), ("report", "full")])
    }
}

/// Looks up the assembly name of `accession` and builds its mirror URL.
///
/// An accession Entrez does not know is a [`KiraError::Lookup`].
pub fn resolve_assembly_url<E: EntrezClient + ?Sized>(
    client: &E,
    accession: &GenomeAccession,
    suffix: &str,
    ftp_stem: &str,
) -> Result<AssemblyUrl, KiraError> {
    let term = format!("{}[Assembly Accession]", accession.as_str());
    let ids = client.search("assembly", &term)?;
    let id = ids
        .first()
        .ok_or_else(|| KiraError::Lookup(format!("no assembly record for {accession}")))?;

    let summary = client.summary("assembly", id)?;
    let assembly_name = extract_assembly_name(&summary, id).ok_or_else(|| {
        KiraError::Lookup(format!("assembly summary {id} for {accession} has no name"))
    })?;

    compile_url(accession, &assembly_name, suffix, ftp_stem)
}

/// Reads `result.<uid>.assemblyname` from an esummary JSON document.
pub fn extract_assembly_name(summary: &Value, id: &str) -> Option<String> {
    summary
        .get("result")
        .and_then(|result| result.get(id))
        .and_then(|doc| doc.get("assemblyname"))
        .and_then(|name| name.as_str())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
}

pub fn sanitize_assembly_name(name: &str) -> String {
    ESCAPE_CHARACTERS.replace_all(name, "_").into_owned()
}

/// Builds the mirror URL, e.g.
/// `{stem}/GCA/000/021/645/GCA_000021645.1_ASM2164v1/GCA_000021645.1_ASM2164v1_genomic.gbff.gz`.
pub fn compile_url(
    accession: &GenomeAccession,
    assembly_name: &str,
    suffix: &str,
    ftp_stem: &str,
) -> Result<AssemblyUrl, KiraError> {
    let filestem = format!("{}_{}", accession.as_str(), sanitize_assembly_name(assembly_name));

    let mut parts = filestem.splitn(3, '_');
    let prefix = parts.next().unwrap_or_default();
    let number = parts
        .next()
        .and_then(|rest| rest.split('.').next())
        .filter(|digits| !digits.is_empty())
        .ok_or_else(|| KiraError::InvalidGenomeAccession(accession.to_string()))?;

    let sub_directories = number
        .as_bytes()
        .chunks(3)
        .map(|group| String::from_utf8_lossy(group).into_owned())
        .collect::<Vec<_>>()
        .join("/");

    let url = format!(
        "{}/{prefix}/{sub_directories}/{filestem}/{filestem}_{suffix}",
        ftp_stem.trim_end_matches('/')
    );
    Ok(AssemblyUrl { url, filestem })
}
