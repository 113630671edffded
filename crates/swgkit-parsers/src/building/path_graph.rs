// swgkit-parsers/src/building/path_graph.rs
//! AI navigation graph attached to a portal layout
//!
//! The adjacency tables `ECNT` (outgoing edges per node) and `ESTR` (index of
//! each node's first edge) are derived from the edge list on encode and are
//! not kept in the model.

use serde::Serialize;
use swgkit_core::{Result, Vec3};

use crate::binary::{ByteReader, ByteWriter, Endian};
use crate::iff::{Node, Tag};

const PGRF: Tag = Tag::new(b"PGRF");
const PGRF_VERSION: Tag = Tag::new(b"0001");
const META: Tag = Tag::new(b"META");
const PNOD: Tag = Tag::new(b"PNOD");
const PEDG: Tag = Tag::new(b"PEDG");
const ECNT: Tag = Tag::new(b"ECNT");
const ESTR: Tag = Tag::new(b"ESTR");

const NODE_SIZE: usize = 32;
const EDGE_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PathGraph {
    pub graph_type: i32,
    pub nodes: Vec<PathNode>,
    pub edges: Vec<PathEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathNode {
    pub index: i32,
    pub id: i32,
    pub key: i32,
    pub node_type: i32,
    pub position: Vec3,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathEdge {
    pub from: i32,
    pub to: i32,
    pub width_left: f32,
    pub width_right: f32,
}

impl PathGraph {
    /// Number of edges leaving each node, by node position
    pub fn edge_counts(&self) -> Vec<i32> {
        let mut counts = vec![0i32; self.nodes.len()];
        for edge in &self.edges {
            if let Some(count) = usize::try_from(edge.from).ok().and_then(|i| counts.get_mut(i)) {
                *count += 1;
            }
        }
        counts
    }

    /// Index of each node's first outgoing edge, `-1` when it has none
    pub fn edge_starts(&self) -> Vec<i32> {
        let mut starts = vec![-1i32; self.nodes.len()];
        for (i, edge) in self.edges.iter().enumerate() {
            if let Some(start) = usize::try_from(edge.from).ok().and_then(|n| starts.get_mut(n)) {
                if *start < 0 {
                    *start = i as i32;
                }
            }
        }
        starts
    }
}

pub(super) fn decode(node: &Node, endian: Endian) -> Option<PathGraph> {
    let Some((_, body)) = node.version_form() else {
        tracing::warn!("Path graph without version form");
        return None;
    };

    let mut graph = PathGraph::default();
    for child in body {
        let Node::Leaf { tag, data } = child else {
            tracing::warn!(label = %child.label(), "Skipping container in path graph");
            continue;
        };
        let mut reader = ByteReader::new(data);
        let result = match *tag {
            META => reader.i32_with(endian).map(|t| graph.graph_type = t),
            PNOD => read_records(&mut reader, endian, NODE_SIZE, |r| read_node(r, endian))
                .map(|nodes| graph.nodes = nodes),
            PEDG => read_records(&mut reader, endian, EDGE_SIZE, |r| read_edge(r, endian))
                .map(|edges| graph.edges = edges),
            // Derived tables, rebuilt on encode
            ECNT | ESTR => Ok(()),
            other => {
                tracing::warn!(tag = %other, "Skipping unknown path graph chunk");
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::warn!(tag = %tag, error = %e, "Malformed path graph chunk");
        }
    }

    Some(graph)
}

fn read_records<T>(
    reader: &mut ByteReader<'_>,
    endian: Endian,
    record_size: usize,
    mut read: impl FnMut(&mut ByteReader<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    let declared = reader.i32_with(endian)?.max(0) as usize;
    let available = reader.remaining() / record_size;
    if available < declared {
        tracing::warn!(declared, available, "Truncated path graph records");
    }
    (0..declared.min(available)).map(|_| read(reader)).collect()
}

fn read_node(reader: &mut ByteReader<'_>, endian: Endian) -> Result<PathNode> {
    Ok(PathNode {
        index: reader.i32_with(endian)?,
        id: reader.i32_with(endian)?,
        key: reader.i32_with(endian)?,
        node_type: reader.i32_with(endian)?,
        position: reader.vec3()?,
        radius: reader.f32()?,
    })
}

fn read_edge(reader: &mut ByteReader<'_>, endian: Endian) -> Result<PathEdge> {
    Ok(PathEdge {
        from: reader.i32_with(endian)?,
        to: reader.i32_with(endian)?,
        width_left: reader.f32()?,
        width_right: reader.f32()?,
    })
}

pub(super) fn encode(graph: &PathGraph, endian: Endian) -> Node {
    let mut meta = ByteWriter::with_capacity(4);
    meta.put_i32_with(graph.graph_type, endian);

    let mut nodes = ByteWriter::with_capacity(4 + graph.nodes.len() * NODE_SIZE);
    nodes.put_i32_with(graph.nodes.len() as i32, endian);
    for n in &graph.nodes {
        nodes.put_i32_with(n.index, endian);
        nodes.put_i32_with(n.id, endian);
        nodes.put_i32_with(n.key, endian);
        nodes.put_i32_with(n.node_type, endian);
        nodes.put_vec3(n.position);
        nodes.put_f32(n.radius);
    }

    let mut edges = ByteWriter::with_capacity(4 + graph.edges.len() * EDGE_SIZE);
    edges.put_i32_with(graph.edges.len() as i32, endian);
    for e in &graph.edges {
        edges.put_i32_with(e.from, endian);
        edges.put_i32_with(e.to, endian);
        edges.put_f32(e.width_left);
        edges.put_f32(e.width_right);
    }

    let table = |values: Vec<i32>| {
        let mut w = ByteWriter::with_capacity(4 + values.len() * 4);
        w.put_i32_with(values.len() as i32, endian);
        for v in values {
            w.put_i32_with(v, endian);
        }
        w.into_inner()
    };

    Node::form(
        PGRF,
        vec![Node::form(
            PGRF_VERSION,
            vec![
                Node::leaf(META, meta.into_inner()),
                Node::leaf(PNOD, nodes.into_inner()),
                Node::leaf(PEDG, edges.into_inner()),
                Node::leaf(ECNT, table(graph.edge_counts())),
                Node::leaf(ESTR, table(graph.edge_starts())),
            ],
        )],
    )
}
