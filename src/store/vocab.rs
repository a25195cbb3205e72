//! IRIs and prefixes shared by every query the gateway builds.

pub const STORE_ROOT_GRAPH: &str = "http://liqk.org/graph";
pub const ACCESS_GRAPH: &str = "http://liqk.org/graph/access";
pub const FILESYSTEM_GRAPH: &str = "http://liqk.org/graph/filesystem";

pub const UPLOAD_ACTION: &str = "http://liqk.org/action/upload";

pub const ROOT_LABEL: &str = "/";

pub const PREFIXES: &str = r#"PREFIX posix: <http://www.w3.org/ns/posix/stat#>
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
PREFIX dc: <http://purl.org/dc/terms/>
PREFIX liqk: <http://liqk.org/schema#>
"#;

pub const POSIX_DIRECTORY: &str = "http://www.w3.org/ns/posix/stat#Directory";
pub const POSIX_FILE: &str = "http://www.w3.org/ns/posix/stat#File";

/// Local name of an IRI: the part after the last `#` or `/`.
pub fn local_name(iri: &str) -> &str {
    match iri.rfind(['#', '/']) {
        Some(idx) => &iri[idx + 1..],
        None => iri,
    }
}
