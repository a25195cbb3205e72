use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use uuid::Uuid;

use crate::authz::{node_iri, parse_node_iri, Rank, Resource};

use super::vocab::{self, ACCESS_GRAPH, FILESYSTEM_GRAPH, PREFIXES, ROOT_LABEL};
use super::{FileRecord, FsEntry, FsNode, GraphStore, NodeKind, PolicyRecord, PolicyType};

const MIME_SPARQL_QUERY: &str = "application/sparql-query";
const MIME_SPARQL_UPDATE: &str = "application/sparql-update";
const MIME_SPARQL_RESULTS: &str = "application/sparql-results+json";

const DEFAULT_MIME: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
struct SelectResponse {
    results: SelectResults,
}

#[derive(Debug, Deserialize)]
struct SelectResults {
    bindings: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct Term {
    value: String,
}

type Row = HashMap<String, Term>;

fn get<'a>(row: &'a Row, name: &str) -> Option<&'a str> {
    row.get(name).map(|t| t.value.as_str())
}

/// Graph store backed by the upstream SPARQL 1.1 endpoints.
pub struct SparqlStore {
    client: reqwest::Client,
    base_url: String,
}

impl SparqlStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build sparql client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn select(&self, query: String) -> Result<Vec<Row>> {
        debug!("SPARQL select, {} bytes", query.len());
        let url = format!("{}/query", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, MIME_SPARQL_QUERY)
            .header(ACCEPT, MIME_SPARQL_RESULTS)
            .body(query)
            .send()
            .await
            .context("send sparql query")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("sparql query failed with status {status}: {body}");
        }

        let data: SelectResponse = resp.json().await.context("parse sparql results")?;
        Ok(data.results.bindings)
    }

    async fn update(&self, update: String) -> Result<()> {
        debug!("SPARQL update, {} bytes", update.len());
        let url = format!("{}/update", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, MIME_SPARQL_UPDATE)
            .body(update)
            .send()
            .await
            .context("send sparql update")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("sparql update failed with status {status}: {body}");
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for SparqlStore {
    async fn list_policies(&self, resource: &Resource) -> Result<Vec<PolicyRecord>> {
        let rows = self.select(policies_query(resource)).await?;
        Ok(parse_policies(&rows))
    }

    async fn resolve_path(&self, segments: &[String]) -> Result<Option<FsNode>> {
        let rows = self.select(resolve_path_query(segments)).await?;
        let row = match rows.first() {
            Some(row) => row,
            None => return Ok(None),
        };

        let iri = get(row, "node").unwrap_or_default();
        let id = match parse_node_iri(iri) {
            Some(id) => id,
            None => bail!("filesystem node {iri:?} is not a urn:uuid"),
        };
        let kind = match get(row, "kind").and_then(parse_kind) {
            Some(kind) => kind,
            None => return Ok(None),
        };
        Ok(Some(FsNode { id, kind }))
    }

    async fn list_children(&self, dir: &Uuid) -> Result<Vec<FsEntry>> {
        let rows = self.select(list_children_query(dir)).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            let iri = get(row, "child").unwrap_or_default();
            let uuid = match parse_node_iri(iri) {
                Some(id) => id,
                None => {
                    warn!("Skip child {iri:?} of {dir}, not a urn:uuid");
                    continue;
                }
            };
            let kind = match get(row, "kind").and_then(parse_kind) {
                Some(kind) => kind,
                None => continue,
            };
            entries.push(FsEntry {
                uuid,
                label: get(row, "label").unwrap_or_default().to_string(),
                kind,
                mime: get(row, "mime").map(String::from),
                size: get(row, "size").and_then(|s| s.parse().ok()),
            });
        }
        Ok(entries)
    }

    async fn get_file(&self, id: &Uuid) -> Result<Option<FileRecord>> {
        let rows = self.select(get_file_query(id)).await?;
        let row = match rows.first() {
            Some(row) => row,
            None => return Ok(None),
        };

        let created = get(row, "created")
            .and_then(|raw| match DateTime::parse_from_rfc3339(raw) {
                Ok(created) => Some(created.with_timezone(&Utc)),
                Err(e) => {
                    warn!("File {id} has unparsable created time {raw:?}: {e}");
                    None
                }
            })
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Ok(Some(FileRecord {
            id: *id,
            label: get(row, "label").unwrap_or_default().to_string(),
            size: get(row, "size").and_then(|s| s.parse().ok()).unwrap_or(0),
            mime: get(row, "mime").unwrap_or(DEFAULT_MIME).to_string(),
            created,
            stored_as: get(row, "storedAs").unwrap_or_default().to_string(),
        }))
    }

    async fn insert_file(&self, parent: &Uuid, file: &FileRecord) -> Result<()> {
        self.update(insert_file_update(parent, file)).await
    }

    async fn update_file_size(&self, id: &Uuid, size: u64) -> Result<()> {
        self.update(update_size_update(id, size)).await
    }
}

/// Render a value as a quoted SPARQL string literal.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn parse_kind(iri: &str) -> Option<NodeKind> {
    match iri {
        vocab::POSIX_DIRECTORY => Some(NodeKind::Directory),
        vocab::POSIX_FILE => Some(NodeKind::File),
        _ => None,
    }
}

/// Every policy row whose target is the resource, or an ancestor-or-self
/// of it for nodes. For nodes this is `posix:includes*` written as the
/// node itself united with `posix:includes+`.
fn policies_query(resource: &Resource) -> String {
    let target = format!("<{}>", resource.iri());
    let target_clause = if resource.is_fixed() {
        format!("VALUES ?target {{ {target} }}")
    } else {
        format!(
            "{{ VALUES ?target {{ {target} }} }} UNION {{ GRAPH <{FILESYSTEM_GRAPH}> {{ ?target posix:includes+ {target} . }} }}"
        )
    };

    format!(
        r#"{PREFIXES}
SELECT ?type ?level ?grantee ?hash WHERE {{
    {target_clause}
    GRAPH <{ACCESS_GRAPH}> {{
        ?policy a liqk:AccessPolicy ;
            liqk:target ?target ;
            liqk:policyType ?type ;
            liqk:level ?level .
        OPTIONAL {{ ?policy liqk:grantee ?grantee . }}
        OPTIONAL {{ ?policy liqk:grantee ?token . ?token liqk:tokenHash ?hash . }}
    }}
}}"#
    )
}

fn parse_policies(rows: &[Row]) -> Vec<PolicyRecord> {
    let mut policies = Vec::with_capacity(rows.len());
    for row in rows {
        let policy_type = match get(row, "type").map(vocab::local_name) {
            Some("public") => PolicyType::Public,
            Some("token") => PolicyType::Token,
            other => {
                debug!("Ignore policy with type {other:?}");
                continue;
            }
        };
        let level = match get(row, "level").and_then(Rank::from_level) {
            Some(level) => level,
            None => {
                debug!("Ignore policy with level {:?}", get(row, "level"));
                continue;
            }
        };
        // A grantee without a hash still marks the record as token-scoped; the
        // empty digest never matches.
        let grantee_hash = get(row, "grantee")
            .map(|_| get(row, "hash").unwrap_or_default().to_string());

        policies.push(PolicyRecord {
            policy_type,
            level,
            grantee_hash,
        });
    }
    policies
}

fn resolve_path_query(segments: &[String]) -> String {
    let mut patterns = format!(
        "        ?n0 a posix:Directory ;\n            rdfs:label {} .\n",
        escape_literal(ROOT_LABEL)
    );
    for (idx, segment) in segments.iter().enumerate() {
        patterns.push_str(&format!(
            "        ?n{idx} posix:includes ?n{next} .\n        ?n{next} rdfs:label {label} .\n",
            next = idx + 1,
            label = escape_literal(segment),
        ));
    }
    let last = segments.len();

    format!(
        r#"{PREFIXES}
SELECT ?node ?kind WHERE {{
    GRAPH <{FILESYSTEM_GRAPH}> {{
{patterns}        ?n{last} a ?kind .
        FILTER(?kind IN (posix:Directory, posix:File))
        BIND(?n{last} AS ?node)
    }}
}}
LIMIT 1"#
    )
}

fn list_children_query(dir: &Uuid) -> String {
    let dir = node_iri(dir);
    format!(
        r#"{PREFIXES}
SELECT ?child ?label ?kind ?mime ?size WHERE {{
    GRAPH <{FILESYSTEM_GRAPH}> {{
        <{dir}> posix:includes ?child .
        ?child rdfs:label ?label ;
            a ?kind .
        FILTER(?kind IN (posix:Directory, posix:File))
        OPTIONAL {{ ?child dc:format ?mime . }}
        OPTIONAL {{ ?child posix:size ?size . }}
    }}
}}
ORDER BY ?label"#
    )
}

fn get_file_query(id: &Uuid) -> String {
    let node = node_iri(id);
    format!(
        r#"{PREFIXES}
SELECT ?label ?size ?mime ?created ?storedAs WHERE {{
    GRAPH <{FILESYSTEM_GRAPH}> {{
        <{node}> a posix:File ;
            rdfs:label ?label ;
            liqk:storedAs ?storedAs .
        OPTIONAL {{ <{node}> posix:size ?size . }}
        OPTIONAL {{ <{node}> dc:format ?mime . }}
        OPTIONAL {{ <{node}> dc:created ?created . }}
    }}
}}
LIMIT 1"#
    )
}

fn insert_file_update(parent: &Uuid, file: &FileRecord) -> String {
    let node = node_iri(&file.id);
    let parent = node_iri(parent);
    format!(
        r#"{PREFIXES}
INSERT DATA {{
    GRAPH <{FILESYSTEM_GRAPH}> {{
        <{node}> a posix:File ;
            rdfs:label {label} ;
            posix:size {size} ;
            dc:format {mime} ;
            dc:created {created}^^xsd:dateTime ;
            liqk:storedAs {stored_as} .
        <{parent}> posix:includes <{node}> .
    }}
}}"#,
        label = escape_literal(&file.label),
        size = file.size,
        mime = escape_literal(&file.mime),
        created = escape_literal(&file.created.to_rfc3339()),
        stored_as = escape_literal(&file.stored_as),
    )
}

fn update_size_update(id: &Uuid, size: u64) -> String {
    let node = node_iri(id);
    format!(
        r#"{PREFIXES}
DELETE {{ GRAPH <{FILESYSTEM_GRAPH}> {{ <{node}> posix:size ?old . }} }}
INSERT {{ GRAPH <{FILESYSTEM_GRAPH}> {{ <{node}> posix:size {size} . }} }}
WHERE {{
    GRAPH <{FILESYSTEM_GRAPH}> {{
        <{node}> a posix:File .
        OPTIONAL {{ <{node}> posix:size ?old . }}
    }}
}}"#
    )
}
