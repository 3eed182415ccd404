use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use reqwest::blocking::Client;

use crate::app::ProgressSink;
use crate::domain::{AccessionMap, AccessionRecord, UniprotMapping};
use crate::error::KiraError;
use crate::transport;

pub const UNIPROT_MAPPING_URL: &str = "https://www.uniprot.org/uploadlists/";

/// Hard limit UniProt puts on a single mapping query.
pub const MAX_BATCH_SIZE: usize = 20_000;

/// Above this size the service often answers 400 when it is busy.
pub const SAFE_BATCH_SIZE: usize = 500;

pub trait IdMappingClient {
    /// Maps one space-separated batch of EMBL accessions, returning the raw
    /// tab-delimited response body.
    fn map_batch(&self, query: &str) -> Result<String, KiraError>;
}

#[derive(Clone)]
pub struct UniprotHttpClient {
    client: Client,
    url: String,
}

impl UniprotHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        Self::with_url(UNIPROT_MAPPING_URL)
    }

    pub fn with_url(url: &str) -> Result<Self, KiraError> {
        let client = transport::build_client(Duration::from_secs(30))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl IdMappingClient for UniprotHttpClient {
    fn map_batch(&self, query: &str) -> Result<String, KiraError> {
        let params = [
            ("from", "EMBL"),
            ("to", "ACC"),
            ("format", "tab"),
            ("query", query),
        ];
        let response = self
            .client
            .post(&self.url)
            .form(&params)
            .send()
            .map_err(|err| KiraError::Transport(err.to_string()))?;
        let response = transport::handle_status(response, "UniProt")?;
        response
            .text()
            .map_err(|err| KiraError::Transport(err.to_string()))
    }
}

/// Splits `items` into consecutive chunks of at most `size` elements.
pub fn chunk_accessions<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if size == 0 {
        return Vec::new();
    }
    items.chunks(size).map(|chunk| chunk.to_vec()).collect()
}

/// Resolves UniProt accessions for every GenBank accession in `accessions`.
///
/// Accessions are sent in batches of `batch_size`. A batch whose request fails
/// is pushed to the back of the queue until it has failed more than
/// `retry_limit` times, after which it is dropped: its accessions are simply
/// missing from the result and only an error is logged. Accessions UniProt
/// does not know are absent as well.
pub fn map_accessions<C: IdMappingClient + ?Sized>(
    client: &C,
    accessions: &AccessionMap,
    batch_size: usize,
    retry_limit: usize,
    sink: &dyn ProgressSink,
) -> Result<UniprotMapping, KiraError> {
    if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
        return Err(KiraError::InvalidBatchSize {
            size: batch_size,
            max: MAX_BATCH_SIZE,
        });
    }
    if batch_size > SAFE_BATCH_SIZE {
        sink.warning(&format!(
            "batch size {batch_size} is above {SAFE_BATCH_SIZE}; UniProt may reject these queries"
        ));
    }

    let keys = accessions.keys().cloned().collect::<Vec<_>>();
    let batches = chunk_accessions(&keys, batch_size)
        .into_iter()
        .map(|chunk| chunk.join(" "))
        .collect::<Vec<_>>();
    let total_batches = batches.len();

    let mut queue = batches.into_iter().enumerate().collect::<VecDeque<_>>();
    let mut failures: HashMap<usize, usize> = HashMap::new();
    let mut mapping = UniprotMapping::new();
    let start = Instant::now();

    while let Some((index, query)) = queue.pop_front() {
        let body = match client.map_batch(&query) {
            Ok(body) => body,
            Err(err) => {
                let count = failures.entry(index).or_insert(0);
                *count += 1;
                let count = *count;
                if count > retry_limit {
                    failures.remove(&index);
                    sink.error(&format!(
                        "batch {}/{total_batches} failed more than {retry_limit} times, dropping it: {err}",
                        index + 1
                    ));
                } else {
                    sink.warning(&format!(
                        "batch {}/{total_batches} failed (attempt {count}), queued for retry: {err}",
                        index + 1
                    ));
                    queue.push_back((index, query));
                }
                continue;
            }
        };

        let parsed = parse_mapping_response(&body, accessions, sink);
        sink.info(&format!(
            "batch {}/{total_batches}: {} UniProt accessions",
            index + 1,
            parsed.len()
        ));
        mapping.extend(parsed);
    }

    sink.event(crate::app::ProgressEvent::info(
        format!(
            "retrieved {} GenBank accessions from the local db; {} were associated with records in UniProt",
            accessions.len(),
            mapping.len()
        ),
        Some(start.elapsed()),
    ));

    Ok(mapping)
}

/// Reads the accession map given to `kira-bu uniprot`: either a JSON object
/// (`{"CAA12345.1": 17}`) or whitespace-separated `accession id` lines.
pub fn parse_accession_map(content: &str) -> Result<AccessionMap, KiraError> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed)
            .map_err(|err| KiraError::InvalidInput(format!("accession JSON: {err}")));
    }

    let mut accessions = AccessionMap::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(accession), Some(id)) = (fields.next(), fields.next()) else {
            return Err(KiraError::InvalidInput(format!(
                "line {}: expected `accession id`",
                number + 1
            )));
        };
        let id = id.parse::<i64>().map_err(|_| {
            KiraError::InvalidInput(format!("line {}: invalid record id {id}", number + 1))
        })?;
        accessions.insert(accession.to_string(), id);
    }
    Ok(accessions)
}

/// Parses a tab-delimited ID mapping response (`From<TAB>To` with a header line).
pub fn parse_mapping_response(
    body: &str,
    accessions: &AccessionMap,
    sink: &dyn ProgressSink,
) -> Vec<(String, AccessionRecord)> {
    let mut records = Vec::new();
    for line in body.lines().skip(1) {
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let (Some(source), Some(uniprot)) = (fields.next(), fields.next()) else {
            sink.warning(&format!("skipping malformed UniProt line: {line}"));
            continue;
        };
        let Some(&internal_id) = accessions.get(source) else {
            sink.warning(&format!(
                "UniProt returned {source}, which was not part of the query"
            ));
            continue;
        };
        records.push((
            uniprot.to_string(),
            AccessionRecord {
                source_accession: source.to_string(),
                internal_id,
            },
        ));
    }
    records
}
