use ahash::AHashMap;
use glam::{DVec2, DVec3};

use crate::{
    arena::Arena,
    element::{EH, Element, Handle, LH, Link, NH, Node},
    error::Error,
    math::{self, Side},
};

/**
 * Indexed storage of nodes, links and elements with geometric
 * deduplication.
 *
 * Nodes and links are deduplicated within the mesh tolerance: two
 * insertions whose geometry coincides resolve to the same index. Removed
 * entities are tombstoned, never compacted, so indices stay stable for the
 * lifetime of the mesh. The whole mesh, its pools and its dedup indices
 * are torn down together in one drop.
 */
pub struct Mesh {
    nodes: Arena<NH, Node>,
    links: Arena<LH, Link>,
    elements: Arena<EH, Element>,
    // Quantized coordinates to candidate nodes, unordered node pair to link.
    node_index: AHashMap<(i64, i64), Vec<NH>>,
    link_index: AHashMap<(u32, u32), LH>,
    tolerance: f64,
    n_nodes: usize,
    n_links: usize,
    n_elements: usize,
}

fn pair_key(a: NH, b: NH) -> (u32, u32) {
    let (a, b) = (a.index(), b.index());
    if a < b { (a, b) } else { (b, a) }
}

impl Mesh {
    /// Create an empty mesh that merges geometry within `tolerance`.
    pub fn new(tolerance: f64) -> Self {
        Self::with_capacity(tolerance, 0, 0, 0)
    }

    /// Create an empty mesh with pool capacity hints.
    pub fn with_capacity(tolerance: f64, nnodes: usize, nlinks: usize, nelements: usize) -> Self {
        Mesh {
            nodes: Arena::with_capacity(nnodes),
            links: Arena::with_capacity(nlinks),
            elements: Arena::with_capacity(nelements),
            node_index: AHashMap::with_capacity(nnodes),
            link_index: AHashMap::with_capacity(nlinks),
            tolerance: tolerance.max(f64::EPSILON),
            n_nodes: 0,
            n_links: 0,
            n_elements: 0,
        }
    }

    /// The geometric tolerance used for dedup and for the predicates.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn quantize(&self, uv: DVec2) -> (i64, i64) {
        (
            (uv.x / self.tolerance).round() as i64,
            (uv.y / self.tolerance).round() as i64,
        )
    }

    /// The live node within tolerance of `uv`, if one exists.
    ///
    /// Quantization can put two coincident points into adjacent cells, so
    /// the probe covers the 3x3 neighborhood and re-checks the true
    /// distance. The closest hit wins.
    pub fn find_node(&self, uv: DVec2) -> Option<NH> {
        let (qx, qy) = self.quantize(uv);
        let mut best: Option<(NH, f64)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(bucket) = self.node_index.get(&(qx + dx, qy + dy)) else {
                    continue;
                };
                for n in bucket {
                    let dist = self.nodes[*n].uv.distance(uv);
                    if dist <= self.tolerance && best.is_none_or(|(_, d)| dist < d) {
                        best = Some((*n, dist));
                    }
                }
            }
        }
        best.map(|(n, _)| n)
    }

    /// Add a node at `uv`, or return the existing node within tolerance.
    ///
    /// A dedup hit keeps its index; a `fixed` request upgrades the
    /// existing node, which never goes back to movable.
    pub fn add_node(&mut self, uv: DVec2, fixed: bool) -> NH {
        self.insert_node(uv, None, fixed)
    }

    /// Same as [`Mesh::add_node`], with an associated 3D position. A dedup
    /// hit that has no 3D position yet adopts the supplied one.
    pub fn add_node_at(&mut self, uv: DVec2, point: DVec3, fixed: bool) -> NH {
        self.insert_node(uv, Some(point), fixed)
    }

    fn insert_node(&mut self, uv: DVec2, point: Option<DVec3>, fixed: bool) -> NH {
        if let Some(n) = self.find_node(uv) {
            let node = &mut self.nodes[n];
            if node.point.is_none() {
                node.point = point;
            }
            if fixed {
                node.status.set_fixed(true);
            }
            return n;
        }
        let n = self.nodes.push(Node::new(uv, point, fixed));
        let key = self.quantize(uv);
        self.node_index.entry(key).or_default().push(n);
        self.n_nodes += 1;
        n
    }

    /// The live link joining `a` and `b`, if one exists.
    pub fn find_link(&self, a: NH, b: NH) -> Option<LH> {
        self.link_index.get(&pair_key(a, b)).copied()
    }

    /// Add a link between two nodes, or return the existing one for the
    /// same unordered pair. Self-links are degenerate.
    pub fn add_link(&mut self, a: NH, b: NH) -> Result<LH, Error> {
        self.node(a)?;
        self.node(b)?;
        if a == b {
            return Err(Error::DegenerateGeometry);
        }
        if let Some(l) = self.find_link(a, b) {
            return Ok(l);
        }
        let l = self.links.push(Link::new(a, b, false));
        self.link_index.insert(pair_key(a, b), l);
        self.nodes[a].links.push(l);
        self.nodes[b].links.push(l);
        self.n_links += 1;
        Ok(l)
    }

    /// Mark a link as constrained: it belongs to the input boundary and is
    /// excluded from legalization flips.
    pub(crate) fn constrain_link(&mut self, l: LH) -> Result<(), Error> {
        self.link_mut(l)?.status.set_constrained(true);
        Ok(())
    }

    /// Add the triangle bounded by three links.
    ///
    /// The links must chain through exactly three distinct nodes forming a
    /// triangle whose area exceeds the tolerance; the corner order is
    /// normalized to counter-clockwise. Each link registers the element as
    /// one of its at most two adjoining elements.
    pub fn add_element(&mut self, la: LH, lb: LH, lc: LH) -> Result<EH, Error> {
        let (ka, kb, kc) = (*self.link(la)?, *self.link(lb)?, *self.link(lc)?);
        if la == lb || lb == lc || lc == la {
            return Err(Error::DegenerateGeometry);
        }
        let (Some(s0), Some(s1), Some(s2)) = (
            shared_node(&kc, &ka),
            shared_node(&ka, &kb),
            shared_node(&kb, &kc),
        ) else {
            return Err(Error::DegenerateGeometry);
        };
        if s0 == s1 || s1 == s2 || s2 == s0 {
            return Err(Error::DegenerateGeometry);
        }
        let (uv0, uv1, uv2) = (self.nodes[s0].uv, self.nodes[s1].uv, self.nodes[s2].uv);
        let (nodes, links) = match math::line_side(uv0, uv1, uv2, self.tolerance) {
            Side::On => return Err(Error::DegenerateGeometry),
            Side::Left => ([s0, s1, s2], [la, lb, lc]),
            Side::Right => ([s0, s2, s1], [lc, lb, la]),
        };
        for l in links {
            if self.links[l].num_elements() >= 2 {
                return Err(Error::TopologyOverflow(l));
            }
        }
        let e = self.elements.push(Element::new(nodes, links));
        for l in links {
            self.links[l].attach(e);
        }
        self.n_elements += 1;
        Ok(e)
    }

    /// Detach an element from its three links and tombstone it. The index
    /// stays allocated and keeps signalling `IndexOutOfRange` on access.
    pub fn remove_element(&mut self, e: EH) -> Result<(), Error> {
        let links = self.element(e)?.links;
        for l in links {
            self.links[l].detach(e);
        }
        self.elements[e].status.set_deleted(true);
        self.n_elements -= 1;
        Ok(())
    }

    /// Remove a link that no element adjoins. Removing a link still in use
    /// would orphan its elements and is refused.
    pub fn remove_link(&mut self, l: LH) -> Result<(), Error> {
        let link = *self.link(l)?;
        if link.num_elements() > 0 {
            return Err(Error::InvariantViolation);
        }
        let [a, b] = link.nodes;
        self.nodes[a].links.retain(|other| *other != l);
        self.nodes[b].links.retain(|other| *other != l);
        self.link_index.remove(&pair_key(a, b));
        self.links[l].status.set_deleted(true);
        self.n_links -= 1;
        Ok(())
    }

    /// Remove a node that no link is incident on.
    pub fn remove_node(&mut self, n: NH) -> Result<(), Error> {
        let node = self.node(n)?;
        if !node.links.is_empty() {
            return Err(Error::InvariantViolation);
        }
        let key = self.quantize(node.uv);
        if let Some(bucket) = self.node_index.get_mut(&key) {
            bucket.retain(|other| *other != n);
        }
        self.nodes[n].status.set_deleted(true);
        self.n_nodes -= 1;
        Ok(())
    }

    /// Read access to a node.
    pub fn node(&self, n: NH) -> Result<&Node, Error> {
        match self.nodes.get(n) {
            Some(node) if !node.status.deleted() => Ok(node),
            _ => Err(Error::IndexOutOfRange),
        }
    }

    /// Read access to a link.
    pub fn link(&self, l: LH) -> Result<&Link, Error> {
        match self.links.get(l) {
            Some(link) if !link.status.deleted() => Ok(link),
            _ => Err(Error::IndexOutOfRange),
        }
    }

    /// Read access to an element.
    pub fn element(&self, e: EH) -> Result<&Element, Error> {
        match self.elements.get(e) {
            Some(element) if !element.status.deleted() => Ok(element),
            _ => Err(Error::IndexOutOfRange),
        }
    }

    pub(crate) fn link_mut(&mut self, l: LH) -> Result<&mut Link, Error> {
        match self.links.get_mut(l) {
            Some(link) if !link.status.deleted() => Ok(link),
            _ => Err(Error::IndexOutOfRange),
        }
    }

    /// Another live node within tolerance of `n`, if the dedup invariant
    /// is broken.
    pub(crate) fn coincident_node(&self, n: NH) -> Option<NH> {
        let uv = self.nodes[n].uv;
        let (qx, qy) = self.quantize(uv);
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(bucket) = self.node_index.get(&(qx + dx, qy + dy)) else {
                    continue;
                };
                for other in bucket {
                    if *other != n && self.nodes[*other].uv.distance(uv) <= self.tolerance {
                        return Some(*other);
                    }
                }
            }
        }
        None
    }

    // Unchecked O(1) accessors for handles already validated by the
    // caller.
    pub(crate) fn node_at(&self, n: NH) -> &Node {
        &self.nodes[n]
    }

    pub(crate) fn link_at(&self, l: LH) -> &Link {
        &self.links[l]
    }

    pub(crate) fn element_at(&self, e: EH) -> &Element {
        &self.elements[e]
    }

    /// The elements adjoining a link, at most two.
    pub fn elements_connected_to(&self, l: LH) -> Result<impl Iterator<Item = EH>, Error> {
        Ok(self.link(l)?.elements())
    }

    /// The links incident on a node.
    pub fn links_connected_to(&self, n: NH) -> Result<&[LH], Error> {
        Ok(self.node(n)?.links())
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.n_nodes
    }

    /// Number of live links.
    pub fn link_count(&self) -> usize {
        self.n_links
    }

    /// Number of live elements.
    pub fn element_count(&self) -> usize {
        self.n_elements
    }

    /// Live node handles.
    pub fn nodes(&self) -> impl Iterator<Item = NH> + '_ {
        self.nodes
            .handles()
            .filter(|n| !self.nodes[*n].status.deleted())
    }

    /// Live link handles.
    pub fn links(&self) -> impl Iterator<Item = LH> + '_ {
        self.links
            .handles()
            .filter(|l| !self.links[*l].status.deleted())
    }

    /// Live element handles.
    pub fn elements(&self) -> impl Iterator<Item = EH> + '_ {
        self.elements
            .handles()
            .filter(|e| !self.elements[*e].status.deleted())
    }

    /// Flat position table for the rendering consumer.
    pub fn positions(&self) -> impl Iterator<Item = (NH, DVec2)> + '_ {
        self.nodes().map(|n| (n, self.nodes[n].uv))
    }

    /// Flat triangle table: three node indices per live element, in
    /// counter-clockwise parametric order.
    pub fn triangles(&self) -> impl Iterator<Item = [NH; 3]> + '_ {
        self.elements().map(|e| self.elements[e].nodes)
    }
}

fn shared_node(x: &Link, y: &Link) -> Option<NH> {
    x.nodes.into_iter().find(|n| y.has_node(*n))
}
