use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::authn::TokenDigest;
use crate::authz::{Rank, Resource};

use super::vocab::ROOT_LABEL;
use super::{FileRecord, FsEntry, FsNode, GraphStore, NodeKind, PolicyRecord, PolicyType};

struct Node {
    label: String,
    kind: NodeKind,
    file: Option<FileRecord>,
}

struct Policy {
    target: Resource,
    record: PolicyRecord,
}

#[derive(Default)]
struct Graph {
    nodes: HashMap<Uuid, Node>,
    /// Inclusion edges as (parent, child).
    includes: Vec<(Uuid, Uuid)>,
    policies: Vec<Policy>,
}

impl Graph {
    /// Self plus every node that reaches `id` through inclusion edges,
    /// computed as an explicit breadth-first walk up the parents.
    fn ancestors_or_self(&self, id: Uuid) -> HashSet<Uuid> {
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for (parent, child) in self.includes.iter() {
                if *child == current && seen.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }
        seen
    }

    fn root(&self) -> Option<Uuid> {
        self.nodes
            .iter()
            .find(|(_, node)| node.kind == NodeKind::Directory && node.label == ROOT_LABEL)
            .map(|(id, _)| *id)
    }

    fn child_by_label(&self, parent: Uuid, label: &str) -> Option<Uuid> {
        self.includes
            .iter()
            .filter(|(p, _)| *p == parent)
            .map(|(_, c)| *c)
            .find(|c| self.nodes.get(c).is_some_and(|n| n.label == label))
    }
}

/// In-process graph used by tests in place of the SPARQL backend.
#[derive(Default)]
pub struct MemoryStore {
    graph: Mutex<Graph>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    stall_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut graph = self.graph.lock().unwrap();
        graph.nodes.insert(
            id,
            Node {
                label: ROOT_LABEL.to_string(),
                kind: NodeKind::Directory,
                file: None,
            },
        );
        id
    }

    pub fn add_dir(&self, parent: Uuid, label: &str) -> Uuid {
        self.add_node(parent, label, NodeKind::Directory)
    }

    pub fn add_node(&self, parent: Uuid, label: &str, kind: NodeKind) -> Uuid {
        let id = Uuid::new_v4();
        let file = match kind {
            NodeKind::File => Some(FileRecord {
                id,
                label: label.to_string(),
                size: 0,
                mime: String::from("application/octet-stream"),
                created: Utc::now(),
                stored_as: format!("{id}.bin"),
            }),
            NodeKind::Directory => None,
        };
        let mut graph = self.graph.lock().unwrap();
        graph.nodes.insert(
            id,
            Node {
                label: label.to_string(),
                kind,
                file,
            },
        );
        graph.includes.push((parent, id));
        id
    }

    pub fn add_public_policy(&self, target: Resource, level: Rank) {
        self.add_policy(target, PolicyType::Public, level, None);
    }

    pub fn add_token_policy(&self, target: Resource, level: Rank, secret: &str) {
        let hash = TokenDigest::of(secret).to_string();
        self.add_policy(target, PolicyType::Token, level, Some(hash));
    }

    pub fn add_policy(
        &self,
        target: Resource,
        policy_type: PolicyType,
        level: Rank,
        grantee_hash: Option<String>,
    ) {
        let mut graph = self.graph.lock().unwrap();
        graph.policies.push(Policy {
            target,
            record: PolicyRecord {
                policy_type,
                level,
                grantee_hash,
            },
        });
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Writes never complete while set.
    pub fn stall_writes(&self, stall: bool) {
        self.stall_writes.store(stall, Ordering::SeqCst);
    }

    pub fn file_count(&self) -> usize {
        let graph = self.graph.lock().unwrap();
        graph.nodes.values().filter(|n| n.file.is_some()).count()
    }

    pub fn parent_of(&self, id: &Uuid) -> Option<Uuid> {
        let graph = self.graph.lock().unwrap();
        graph
            .includes
            .iter()
            .find(|(_, c)| c == id)
            .map(|(p, _)| *p)
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("memory store: reads disabled");
        }
        Ok(())
    }

    async fn wait_if_stalled(&self) {
        if self.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory store: writes disabled");
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn list_policies(&self, resource: &Resource) -> Result<Vec<PolicyRecord>> {
        self.check_read()?;
        let graph = self.graph.lock().unwrap();

        let targets: HashSet<Resource> = match resource {
            Resource::Node(id) => graph
                .ancestors_or_self(*id)
                .into_iter()
                .map(Resource::Node)
                .collect(),
            fixed => HashSet::from([*fixed]),
        };

        Ok(graph
            .policies
            .iter()
            .filter(|p| targets.contains(&p.target))
            .map(|p| p.record.clone())
            .collect())
    }

    async fn resolve_path(&self, segments: &[String]) -> Result<Option<FsNode>> {
        self.check_read()?;
        let graph = self.graph.lock().unwrap();

        let mut current = match graph.root() {
            Some(root) => root,
            None => return Ok(None),
        };
        for segment in segments {
            current = match graph.child_by_label(current, segment) {
                Some(child) => child,
                None => return Ok(None),
            };
        }

        Ok(graph.nodes.get(&current).map(|node| FsNode {
            id: current,
            kind: node.kind,
        }))
    }

    async fn list_children(&self, dir: &Uuid) -> Result<Vec<FsEntry>> {
        self.check_read()?;
        let graph = self.graph.lock().unwrap();

        let mut entries: Vec<FsEntry> = graph
            .includes
            .iter()
            .filter(|(p, _)| p == dir)
            .filter_map(|(_, c)| {
                let node = graph.nodes.get(c)?;
                Some(FsEntry {
                    uuid: *c,
                    label: node.label.clone(),
                    kind: node.kind,
                    mime: node.file.as_ref().map(|f| f.mime.clone()),
                    size: node.file.as_ref().map(|f| f.size),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(entries)
    }

    async fn get_file(&self, id: &Uuid) -> Result<Option<FileRecord>> {
        self.check_read()?;
        let graph = self.graph.lock().unwrap();
        Ok(graph.nodes.get(id).and_then(|n| n.file.clone()))
    }

    async fn insert_file(&self, parent: &Uuid, file: &FileRecord) -> Result<()> {
        self.wait_if_stalled().await;
        self.check_write()?;
        let mut graph = self.graph.lock().unwrap();
        graph.nodes.insert(
            file.id,
            Node {
                label: file.label.clone(),
                kind: NodeKind::File,
                file: Some(file.clone()),
            },
        );
        graph.includes.push((*parent, file.id));
        Ok(())
    }

    async fn update_file_size(&self, id: &Uuid, size: u64) -> Result<()> {
        self.wait_if_stalled().await;
        self.check_write()?;
        let mut graph = self.graph.lock().unwrap();
        match graph.nodes.get_mut(id).and_then(|n| n.file.as_mut()) {
            Some(file) => {
                file.size = size;
                Ok(())
            }
            None => bail!("file {id} not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn test_resolve_path() {
        let store = MemoryStore::new();
        let root = store.add_root();
        let a = store.add_dir(root, "a");
        let b = store.add_dir(a, "b");
        let c = store.add_node(b, "c.txt", NodeKind::File);

        let path = |p: &[&str]| p.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let node = store.resolve_path(&path(&[])).await.unwrap().unwrap();
        assert_eq!(node.id, root);
        let node = store.resolve_path(&path(&["a", "b"])).await.unwrap().unwrap();
        assert_eq!(node, FsNode { id: b, kind: NodeKind::Directory });
        let node = store
            .resolve_path(&path(&["a", "b", "c.txt"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(node, FsNode { id: c, kind: NodeKind::File });

        assert!(store.resolve_path(&path(&["a", "x.txt"])).await.unwrap().is_none());
        assert!(store.resolve_path(&path(&["A"])).await.unwrap().is_none());
        assert!(store.resolve_path(&path(&["b"])).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn test_policies_follow_inclusion() {
        let store = MemoryStore::new();
        let root = store.add_root();
        let a = store.add_dir(root, "a");
        let b = store.add_dir(a, "b");
        let other = store.add_dir(root, "other");
        store.add_public_policy(Resource::Node(a), Rank::View);
        store.add_public_policy(Resource::StoreRoot, Rank::Edit);

        assert_eq!(store.list_policies(&Resource::Node(a)).await.unwrap().len(), 1);
        assert_eq!(store.list_policies(&Resource::Node(b)).await.unwrap().len(), 1);
        assert!(store.list_policies(&Resource::Node(other)).await.unwrap().is_empty());
        assert!(store.list_policies(&Resource::Node(root)).await.unwrap().is_empty());
        assert_eq!(store.list_policies(&Resource::StoreRoot).await.unwrap().len(), 1);
        assert!(store.list_policies(&Resource::UploadAction).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_inclusion_cycle_terminates() {
        let store = MemoryStore::new();
        let root = store.add_root();
        let a = store.add_dir(root, "a");
        let b = store.add_dir(a, "b");
        store.graph.lock().unwrap().includes.push((b, a));
        store.add_public_policy(Resource::Node(root), Rank::Comment);

        let policies = store.list_policies(&Resource::Node(b)).await.unwrap();
        assert_eq!(policies.len(), 1);
    }
}
