//! Marshalled form and text serialization for manifolds.
//!
//! The marshalled layout is id-indexed: vertex points and normals with
//! per-vertex neighbor orderings, edge normals keyed by endpoint ids,
//! and face normals with boundary vertex id cycles. The text form is
//! tab-separated with `ID`/`VERTICES`/`EDGES`/`FACES` section headers;
//! `#` starts a comment line and blank lines are skipped.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::error::{HullError, HullResult};
use crate::manifold::{normalized_safe, Manifold};
use crate::types::{EdgeId, VertexId};

/// Id-indexed snapshot of a manifold, suitable for persistence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarshalledManifold {
    /// Manifold id.
    pub id: i64,

    /// Vertex id → position.
    pub points: BTreeMap<i64, Point3<f64>>,

    /// Vertex id → outward normal.
    pub normals: BTreeMap<i64, Vector3<f64>>,

    /// Vertex id → neighbor vertex ids, in incidence order.
    pub incident_vertices: BTreeMap<i64, Vec<i64>>,

    /// Endpoint id pair → edge normal.
    pub edge_normals: BTreeMap<(i64, i64), Vector3<f64>>,

    /// Face id → outward normal.
    pub face_normals: BTreeMap<i64, Vector3<f64>>,

    /// Face id → boundary vertex ids, in cycle order.
    pub face_vertices: BTreeMap<i64, Vec<i64>>,
}

impl Manifold {
    /// Exports this manifold into its marshalled form.
    pub fn export_data(&self) -> MarshalledManifold {
        let mut m = MarshalledManifold {
            id: self.id,
            ..Default::default()
        };

        for (v, vertex) in &self.vertices {
            m.points.insert(vertex.id, vertex.point);
            m.normals.insert(vertex.id, vertex.normal);
            let mut ids = Vec::new();
            for &h in &vertex.incident {
                let he = &self.half_edges[h];
                if he.src == v {
                    ids.push(self.vertices[he.dst].id);
                }
            }
            m.incident_vertices.insert(vertex.id, ids);
        }

        for edge in self.edges.values() {
            let id1 = self.vertices[self.half_edges[edge.he1].src].id;
            let id2 = self.vertices[self.half_edges[edge.he2].src].id;
            m.edge_normals.insert((id1, id2), edge.normal);
        }

        for face in self.faces.values() {
            m.face_normals.insert(face.id, face.normal);
            let ids = face
                .half_edges
                .iter()
                .map(|&h| self.vertices[self.half_edges[h].src].id)
                .collect();
            m.face_vertices.insert(face.id, ids);
        }

        m
    }

    /// Rebuilds this manifold from a marshalled snapshot, replacing any
    /// existing contents.
    pub fn import_data(&mut self, m: &MarshalledManifold) -> HullResult<()> {
        self.clear();
        self.id = m.id;

        let mut vertices: BTreeMap<i64, VertexId> = BTreeMap::new();
        for (&id, p) in &m.points {
            let v = self.make_vertex(*p, Some(id));
            let normal = m.normals.get(&id).copied().unwrap_or_default();
            self.vertices[v].normal = normalized_safe(normal);
            vertices.insert(id, v);
            self.next_feature_id = self.next_feature_id.max(id + 1);
        }

        let lookup_vertex = |id: i64, vertices: &BTreeMap<i64, VertexId>| {
            vertices
                .get(&id)
                .copied()
                .ok_or(HullError::UnknownId { kind: "vertex", id })
        };

        let mut edges: BTreeMap<(i64, i64), EdgeId> = BTreeMap::new();
        for (&(id1, id2), n) in &m.edge_normals {
            let v1 = lookup_vertex(id1, &vertices)?;
            let v2 = lookup_vertex(id2, &vertices)?;
            let e = self.make_edge(v1, v2);
            self.edges[e].normal = normalized_safe(*n);
            edges.insert((id1, id2), e);
        }

        let lookup_edge = |a: i64, b: i64, edges: &BTreeMap<(i64, i64), EdgeId>| {
            edges
                .get(&(a, b))
                .or_else(|| edges.get(&(b, a)))
                .copied()
                .ok_or(HullError::UnknownId { kind: "edge", id: a })
        };

        for (&fid, vertex_ids) in &m.face_vertices {
            let Some(&last) = vertex_ids.last() else {
                continue;
            };
            let mut prev = last;
            let mut half_edges = Vec::with_capacity(vertex_ids.len());
            for &vn in vertex_ids {
                let v_prev = lookup_vertex(prev, &vertices)?;
                let e = lookup_edge(prev, vn, &edges)?;
                let edge = &self.edges[e];
                let he = if self.half_edges[edge.he1].src == v_prev {
                    edge.he1
                } else {
                    edge.he2
                };
                half_edges.push(he);
                prev = vn;
            }
            let f = self.make_polygon(&half_edges);
            if let Some(n) = m.face_normals.get(&fid) {
                self.faces[f].normal = *n;
            }
        }

        // Incidence lists in the recorded neighbor ordering: incoming
        // half-edge first, then its outgoing buddy, per neighbor.
        for (&id, neighbor_ids) in &m.incident_vertices {
            let v = lookup_vertex(id, &vertices)?;
            for &nid in neighbor_ids {
                let e = lookup_edge(nid, id, &edges)?;
                let edge = &self.edges[e];
                let (he1, he2) = (edge.he1, edge.he2);
                if self.half_edges[he1].src == v {
                    self.vertices[v].incident.push(he2);
                    self.vertices[v].incident.push(he1);
                } else {
                    self.vertices[v].incident.push(he1);
                    self.vertices[v].incident.push(he2);
                }
            }
        }

        self.construct_helper_maps();
        debug!(
            v = self.vertex_count(),
            e = self.edge_count(),
            f = self.face_count(),
            "imported manifold"
        );
        Ok(())
    }
}

/// Writes the marshalled form as tab-separated text.
pub fn emit_text<W: Write>(m: &MarshalledManifold, mut w: W) -> HullResult<()> {
    writeln!(w, "ID")?;
    writeln!(w, "{}", m.id)?;

    writeln!(w, "VERTICES")?;
    writeln!(w, "#id\tpoint xyz\tnormal xyz\tneighbor ids...")?;
    for (id, p) in &m.points {
        let n = m.normals.get(id).copied().unwrap_or_default();
        write!(w, "{id}\t{}\t{}\t{}\t{}\t{}\t{}", p.x, p.y, p.z, n.x, n.y, n.z)?;
        if let Some(ids) = m.incident_vertices.get(id) {
            for nid in ids {
                write!(w, "\t{nid}")?;
            }
        }
        writeln!(w)?;
    }

    writeln!(w, "EDGES")?;
    writeln!(w, "#vertex 1\tvertex 2\tnormal xyz")?;
    for ((id1, id2), n) in &m.edge_normals {
        writeln!(w, "{id1}\t{id2}\t{}\t{}\t{}", n.x, n.y, n.z)?;
    }

    writeln!(w, "FACES")?;
    writeln!(w, "#id\tnormal xyz\tvertex ids...")?;
    for (id, n) in &m.face_normals {
        write!(w, "{id}\t{}\t{}\t{}", n.x, n.y, n.z)?;
        if let Some(ids) = m.face_vertices.get(id) {
            for vid in ids {
                write!(w, "\t{vid}")?;
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Init,
    Id,
    Vertices,
    Edges,
    Faces,
}

fn parse_f64(field: &str, line: usize) -> HullResult<f64> {
    field.parse().map_err(|_| HullError::Parse {
        line,
        reason: format!("expected a number, found {field:?}"),
    })
}

fn parse_i64(field: &str, line: usize) -> HullResult<i64> {
    field.parse().map_err(|_| HullError::Parse {
        line,
        reason: format!("expected an integer, found {field:?}"),
    })
}

/// Parses the tab-separated text form back into a marshalled manifold.
pub fn parse_text<R: BufRead>(r: R) -> HullResult<MarshalledManifold> {
    let mut m = MarshalledManifold::default();
    let mut section = Section::Init;

    for (i, line) in r.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split('\t').filter(|f| !f.is_empty()).collect();
        if fields.is_empty() {
            continue;
        }

        if fields.len() == 1 {
            match fields[0] {
                "ID" => {
                    section = Section::Id;
                    continue;
                }
                "VERTICES" => {
                    section = Section::Vertices;
                    continue;
                }
                "EDGES" => {
                    section = Section::Edges;
                    continue;
                }
                "FACES" => {
                    section = Section::Faces;
                    continue;
                }
                _ => {}
            }
        }

        match section {
            Section::Id => {
                m.id = parse_i64(fields[0], line_no)?;
            }
            Section::Vertices => {
                if fields.len() < 7 {
                    return Err(HullError::Parse {
                        line: line_no,
                        reason: format!("vertex row needs 7+ fields, found {}", fields.len()),
                    });
                }
                let id = parse_i64(fields[0], line_no)?;
                let p = Point3::new(
                    parse_f64(fields[1], line_no)?,
                    parse_f64(fields[2], line_no)?,
                    parse_f64(fields[3], line_no)?,
                );
                let n = Vector3::new(
                    parse_f64(fields[4], line_no)?,
                    parse_f64(fields[5], line_no)?,
                    parse_f64(fields[6], line_no)?,
                );
                let mut ids = Vec::new();
                for field in &fields[7..] {
                    ids.push(parse_i64(field, line_no)?);
                }
                m.points.insert(id, p);
                m.normals.insert(id, n);
                m.incident_vertices.insert(id, ids);
            }
            Section::Edges => {
                if fields.len() != 5 {
                    return Err(HullError::Parse {
                        line: line_no,
                        reason: format!("edge row needs 5 fields, found {}", fields.len()),
                    });
                }
                let id1 = parse_i64(fields[0], line_no)?;
                let id2 = parse_i64(fields[1], line_no)?;
                let n = Vector3::new(
                    parse_f64(fields[2], line_no)?,
                    parse_f64(fields[3], line_no)?,
                    parse_f64(fields[4], line_no)?,
                );
                m.edge_normals.insert((id1, id2), n);
            }
            Section::Faces => {
                if fields.len() < 4 {
                    return Err(HullError::Parse {
                        line: line_no,
                        reason: format!("face row needs 4+ fields, found {}", fields.len()),
                    });
                }
                let id = parse_i64(fields[0], line_no)?;
                let n = Vector3::new(
                    parse_f64(fields[1], line_no)?,
                    parse_f64(fields[2], line_no)?,
                    parse_f64(fields[3], line_no)?,
                );
                let mut ids = Vec::new();
                for field in &fields[4..] {
                    ids.push(parse_i64(field, line_no)?);
                }
                m.face_normals.insert(id, n);
                m.face_vertices.insert(id, ids);
            }
            Section::Init => {
                return Err(HullError::Parse {
                    line: line_no,
                    reason: "data before any section header".to_string(),
                });
            }
        }
    }
    Ok(m)
}
