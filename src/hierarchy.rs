//! The chunked hierarchy codec: partitioning an octree into depth-bounded
//! chunks linked by proxy records, and the inverse two-phase parse.
//!
//! Writing is two-phase: first every chunk's node list and byte size is
//! known (`createChunks`), so every chunk's file offset can be computed
//! before a single byte is written; only then can proxy records be
//! back-patched with correct targets (`writeHierarchy`). Parsing mirrors
//! this: a chunk's records are read in full before any proxy inside it is
//! followed, since a proxy's target chunk may itself contain proxies.

use crate::error::{Error, Result};
use crate::node::{Node, NodeKind, NodeRecord, NodeTree, BYTES_PER_NODE, ROOT_NAME};
use std::collections::{HashMap, VecDeque};
use std::io::{Read, Seek, SeekFrom};

fn name_depth(name: &str) -> usize {
    name.len() - 1
}

/// A contiguous run of node records rooted at `root_name`, covering every
/// live descendant up to `stepSize` levels below it.
#[derive(Clone, Debug)]
pub struct Chunk {
    pub root_name: String,
    pub nodes: Vec<String>,
}

impl Chunk {
    pub fn byte_len(&self) -> i64 {
        (self.nodes.len() * BYTES_PER_NODE) as i64
    }
}

/// Depth-first collects every node reachable from `start` within
/// `step_size` levels (inclusive), in an order where, for any depth,
/// names sort ascending by `(len, lex)` across the whole chunk — the
/// same order `writeHierarchy` will re-sort them into.
pub fn gather_chunk(tree: &NodeTree, start: &str, step_size: u32) -> Vec<String> {
    let start_depth = name_depth(start);
    let frontier_depth = start_depth + step_size as usize;
    let mut out = Vec::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(start.to_string());
    while let Some(name) = queue.pop_front() {
        let Some(node) = tree.get(&name) else {
            continue;
        };
        out.push(name.clone());
        if name_depth(&name) < frontier_depth {
            for digit in 0..8u8 {
                if let Some(child) = &node.children[digit as usize] {
                    queue.push_back(child.clone());
                }
            }
        }
    }
    out
}

/// Partitions `tree` into chunks of `step_size` levels each, starting at
/// `root`. Chunks are returned in parent-before-child, depth-first
/// pre-order over chunk roots.
pub fn create_chunks(tree: &NodeTree, root: &str, step_size: u32) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut stack = vec![root.to_string()];
    while let Some(chunk_root) = stack.pop() {
        let nodes = gather_chunk(tree, &chunk_root, step_size);
        let frontier_depth = name_depth(&chunk_root) + step_size as usize;

        let mut frontier_roots = Vec::new();
        for name in &nodes {
            if name_depth(name) != frontier_depth {
                continue;
            }
            if let Some(node) = tree.get(name) {
                if node.children.iter().any(Option::is_some) {
                    frontier_roots.push(name.clone());
                }
            }
        }
        log::debug!(
            "hierarchy chunk rooted at {chunk_root} gathers {} nodes, {} child chunks",
            nodes.len(),
            frontier_roots.len()
        );
        // push in reverse so the stack pops the lexicographically-first
        // frontier root next, preserving pre-order across the whole tree
        for r in frontier_roots.into_iter().rev() {
            stack.push(r);
        }
        chunks.push(Chunk {
            root_name: chunk_root,
            nodes,
        });
    }
    chunks
}

/// Serializes `chunks` (already computed over `tree`) into the
/// concatenated on-disk hierarchy stream, back-patching proxy records to
/// point at each child chunk's precomputed byte offset.
pub fn write_hierarchy(tree: &NodeTree, chunks: &[Chunk], step_size: u32) -> Result<Vec<u8>> {
    let index_of: HashMap<&str, usize> = chunks
        .iter()
        .enumerate()
        .map(|(i, c)| (c.root_name.as_str(), i))
        .collect();

    let mut chunk_byte_offsets = Vec::with_capacity(chunks.len());
    let mut cursor: i64 = 0;
    for chunk in chunks {
        chunk_byte_offsets.push(cursor);
        cursor += chunk.byte_len();
    }

    let mut out = Vec::with_capacity(cursor as usize);
    for chunk in chunks {
        let mut sorted = chunk.nodes.clone();
        sorted.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        let frontier_depth = name_depth(&chunk.root_name) + step_size as usize;

        for name in &sorted {
            let node = tree
                .get(name)
                .ok_or_else(|| Error::HierarchyShort(format!("no node named {name}")))?;
            let has_children = node.children.iter().any(Option::is_some);
            if name_depth(name) == frontier_depth && has_children {
                let child_index = *index_of.get(name.as_str()).ok_or_else(|| {
                    Error::HierarchyShort(format!("no chunk rooted at frontier node {name}"))
                })?;
                let child_chunk = &chunks[child_index];
                let record = NodeRecord {
                    kind: NodeKind::Proxy,
                    child_mask: node.recompute_child_mask(),
                    num_points: node.num_points,
                    byte_offset: chunk_byte_offsets[child_index],
                    byte_size: child_chunk.byte_len(),
                };
                record.write_to(&mut out)?;
            } else {
                let record = tree
                    .record_for(name)
                    .expect("node looked up above must still exist");
                record.write_to(&mut out)?;
            }
        }
    }
    Ok(out)
}

/// Parses the chunked hierarchy stream starting at offset 0 with the
/// given first chunk size, reconstructing the full in-memory tree. No
/// `Proxy` node survives into the returned tree.
pub fn parse_hierarchy<R: Read + Seek>(
    file: &mut R,
    first_chunk_size: i64,
    step_size: u32,
) -> Result<NodeTree> {
    let mut tree = NodeTree::new();
    file.seek(SeekFrom::Start(0))?;
    parse_chunk(file, ROOT_NAME, None, first_chunk_size, step_size, &mut tree)?;
    Ok(tree)
}

fn parse_chunk<R: Read + Seek>(
    file: &mut R,
    root_name: &str,
    root_parent: Option<String>,
    chunk_size: i64,
    step_size: u32,
    tree: &mut NodeTree,
) -> Result<()> {
    if chunk_size < 0 || chunk_size as usize % BYTES_PER_NODE != 0 {
        return Err(Error::HierarchyShort(format!(
            "chunk size {chunk_size} is not a positive multiple of {BYTES_PER_NODE}"
        )));
    }
    let record_count = chunk_size as usize / BYTES_PER_NODE;
    let mut records = Vec::with_capacity(record_count);
    for _ in 0..record_count {
        records.push(NodeRecord::read_from(file)?);
    }

    let frontier_depth = name_depth(root_name) + step_size as usize;
    let mut queue: VecDeque<(String, Option<String>)> = VecDeque::new();
    queue.push_back((root_name.to_string(), root_parent));
    let mut proxies: Vec<(String, i64, i64)> = Vec::new();

    for record in &records {
        let (name, parent) = queue.pop_front().ok_or_else(|| {
            Error::HierarchyShort(format!(
                "chunk rooted at {root_name} has more records than expected node names"
            ))
        })?;
        let depth = name_depth(&name);

        if record.kind == NodeKind::Proxy {
            log::debug!("following proxy {name} -> offset {}", record.byte_offset);
            proxies.push((name.clone(), record.byte_offset, record.byte_size));
            let mut node = Node::new(name, NodeKind::Proxy);
            node.parent = parent;
            node.num_points = record.num_points;
            tree.insert(node);
            continue;
        }

        let mut node = Node::new(name.clone(), record.kind);
        node.parent = parent;
        node.child_mask = record.child_mask;
        node.num_points = record.num_points;
        node.byte_offset = record.byte_offset;
        node.byte_size = record.byte_size;
        tree.insert(node);

        if depth < frontier_depth {
            for digit in 0..8u8 {
                if record.child_mask & (1 << digit) != 0 {
                    queue.push_back((format!("{name}{digit}"), Some(name.clone())));
                }
            }
        }
    }

    for (name, offset, size) in proxies {
        file.seek(SeekFrom::Start(offset as u64))?;
        let parent = tree.get(&name).and_then(|n| n.parent.clone());
        parse_chunk(file, &name, parent, size, step_size, tree)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ROOT_NAME;
    use std::io::Cursor;

    fn full_octree(depth: usize) -> NodeTree {
        let mut tree = NodeTree::new();
        let mut frontier = vec![ROOT_NAME.to_string()];
        let mut root = Node::new(ROOT_NAME, NodeKind::Normal);
        root.num_points = 10;
        tree.insert(root);
        for _ in 0..depth {
            let mut next = Vec::new();
            for parent_name in frontier {
                for digit in 0..8u8 {
                    let mut child = Node::new(format!("{parent_name}{digit}"), NodeKind::Leaf);
                    child.parent = Some(parent_name.clone());
                    child.num_points = 5;
                    tree.insert(child);
                    next.push(format!("{parent_name}{digit}"));
                }
            }
            frontier = next;
        }
        // every non-leaf-level node above the final frontier is actually Normal
        for name in tree.nodes.keys().cloned().collect::<Vec<_>>() {
            let has_children = tree.get(&name).unwrap().children.iter().any(Option::is_some);
            if has_children {
                tree.get_mut(&name).unwrap().kind = NodeKind::Normal;
            }
        }
        tree
    }

    #[test]
    fn p3_single_chunk_round_trip_depth_2() {
        let tree = full_octree(2);
        assert_eq!(tree.len(), 73);
        let chunks = create_chunks(&tree, ROOT_NAME, 4);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].nodes.len(), 73);
        let bytes = write_hierarchy(&tree, &chunks, 4).unwrap();
        assert_eq!(bytes.len(), 73 * BYTES_PER_NODE);

        let mut cursor = Cursor::new(bytes.clone());
        let parsed = parse_hierarchy(&mut cursor, bytes.len() as i64, 4).unwrap();
        assert_eq!(parsed.len(), 73);
        for (name, node) in &tree.nodes {
            let got = parsed.get(name).expect("node missing after round trip");
            assert_eq!(got.kind, node.kind);
            assert_eq!(got.child_mask, node.child_mask);
            assert_eq!(got.num_points, node.num_points);
        }
        for node in parsed.nodes.values() {
            assert_ne!(node.kind, NodeKind::Proxy);
        }
    }

    #[test]
    fn p3_multi_chunk_round_trip_with_small_step() {
        // step_size=1 on a depth-3 tree forces multiple chunks and at
        // least one proxy hop, exercising the recursive seek path.
        let tree = full_octree(3);
        let step_size = 1;
        let chunks = create_chunks(&tree, ROOT_NAME, step_size);
        assert!(chunks.len() > 1);

        let bytes = write_hierarchy(&tree, &chunks, step_size).unwrap();
        let first_chunk_size = chunks[0].byte_len();
        assert!(first_chunk_size < bytes.len() as i64);

        let mut cursor = Cursor::new(bytes);
        let parsed = parse_hierarchy(&mut cursor, first_chunk_size, step_size).unwrap();
        assert_eq!(parsed.len(), tree.len());
        for (name, node) in &tree.nodes {
            let got = parsed.get(name).expect("node missing after round trip");
            assert_eq!(got.kind, node.kind, "kind mismatch at {name}");
            assert_eq!(got.child_mask, node.child_mask, "mask mismatch at {name}");
        }
        for node in parsed.nodes.values() {
            assert_ne!(node.kind, NodeKind::Proxy);
        }
    }

    #[test]
    fn p6_write_hierarchy_is_deterministic() {
        let tree = full_octree(2);
        let chunks = create_chunks(&tree, ROOT_NAME, 4);
        let a = write_hierarchy(&tree, &chunks, 4).unwrap();
        let b = write_hierarchy(&tree, &chunks, 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn s3_depth_two_first_chunk_size_is_1606() {
        let tree = full_octree(2);
        let chunks = create_chunks(&tree, ROOT_NAME, 4);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].byte_len(), 1606);
    }

    #[test]
    fn s4_proxy_offsets_stay_within_file() {
        let tree = full_octree(3);
        let step_size = 2;
        let chunks = create_chunks(&tree, ROOT_NAME, step_size);
        assert!(chunks.len() > 1);
        let bytes = write_hierarchy(&tree, &chunks, step_size).unwrap();
        let first_chunk_size = chunks[0].byte_len();

        let mut cursor = Cursor::new(bytes.clone());
        let parsed = parse_hierarchy(&mut cursor, first_chunk_size, step_size).unwrap();
        assert_eq!(parsed.len(), tree.len());

        // every node that used to require a proxy now has its real children
        for node in parsed.nodes.values() {
            if node.children.iter().any(Option::is_some) {
                assert_ne!(node.kind, NodeKind::Leaf);
            }
        }
    }
}
