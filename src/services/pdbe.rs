//! PDBe REST API client.
//!
//! Answers obsolete-status, UniProt mapping and experimental-method
//! queries. Every endpoint returns a JSON object keyed by the lowercase
//! entry id.

use super::{AccessionLookup, ChainMapping, ExperimentLookup, ObsoleteLookup};
use crate::config::ServiceConfig;
use crate::error::{PocketBenchError, Result};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct StatusRecord {
    status_code: String,
    #[serde(default)]
    superceded_by: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EntryMappings {
    #[serde(rename = "UniProt", default)]
    uniprot: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct UniprotFamily {
    #[serde(default)]
    mappings: Vec<ChainRef>,
}

#[derive(Debug, Deserialize)]
struct ChainRef {
    chain_id: String,
}

#[derive(Debug, Deserialize)]
struct ExperimentRecord {
    experimental_method: String,
}

/// PDBe API client.
#[derive(Clone)]
pub struct PdbeClient {
    client: Client,
    api_base: String,
}

impl PdbeClient {
    /// Create a new client with the given service configuration.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            api_base: config.pdbe_api_base.clone(),
        })
    }

    /// Get the URL of an entry-scoped endpoint.
    fn endpoint(&self, path: &str, code: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/{}/{}", base, path, code)
    }

    async fn fetch(&self, path: &str, code: &str) -> Result<String> {
        let response = self.client.get(self.endpoint(path, code)).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(PocketBenchError::Http(format!(
                "Request for {}/{} failed ({})",
                path, code, status
            )));
        }

        Ok(body)
    }
}

/// Pull the record for `code` out of a PDBe `{code: ...}` envelope.
fn entry_record<T: DeserializeOwned>(body: &str, code: &str) -> Result<T> {
    let mut payload: HashMap<String, T> = serde_json::from_str(body)?;
    payload
        .remove(code)
        .ok_or_else(|| PocketBenchError::Lookup(format!("No record for '{}' in response", code)))
}

fn parse_status(body: &str, code: &str) -> Result<Option<String>> {
    let records: Vec<StatusRecord> = entry_record(body, code)?;
    let record = records
        .into_iter()
        .next()
        .ok_or_else(|| PocketBenchError::Lookup(format!("Empty status for '{}'", code)))?;

    if record.status_code == "OBS" {
        Ok(record
            .superceded_by
            .into_iter()
            .next()
            .map(|c| c.to_lowercase()))
    } else {
        Ok(None)
    }
}

fn parse_mappings(body: &str, code: &str) -> Result<Vec<ChainMapping>> {
    let entry: EntryMappings = entry_record(body, code)?;

    let mut mappings = Vec::new();
    for (accession, family) in entry.uniprot {
        let family: UniprotFamily = serde_json::from_value(family)?;
        for chain in family.mappings {
            mappings.push(ChainMapping::new(accession.clone(), chain.chain_id));
        }
    }
    Ok(mappings)
}

fn parse_experiment(body: &str, code: &str) -> Result<Vec<String>> {
    let records: Vec<ExperimentRecord> = entry_record(body, code)?;
    Ok(records.into_iter().map(|r| r.experimental_method).collect())
}

impl ObsoleteLookup for PdbeClient {
    async fn superseded_by(&self, code: &str) -> Result<Option<String>> {
        let code = code.to_lowercase();
        let body = self.fetch("pdb/entry/status", &code).await?;
        parse_status(&body, &code)
    }
}

impl AccessionLookup for PdbeClient {
    async fn chain_mappings(&self, code: &str) -> Result<Vec<ChainMapping>> {
        let code = code.to_lowercase();
        let body = self.fetch("mappings/uniprot", &code).await?;
        parse_mappings(&body, &code)
    }
}

impl ExperimentLookup for PdbeClient {
    async fn experimental_methods(&self, code: &str) -> Result<Vec<String>> {
        let code = code.to_lowercase();
        let body = self.fetch("pdb/entry/experiment", &code).await?;
        parse_experiment(&body, &code)
    }
}
