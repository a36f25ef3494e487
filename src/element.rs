use glam::{DVec2, DVec3};
use std::fmt::{Debug, Display};

use crate::status::Status;

/**
 * All entities of the mesh implement this trait. They are identified by their
 * index, which remains stable for the lifetime of the mesh.
 */
pub trait Handle {
    /**
     * The index of the entity.
     */
    fn index(&self) -> u32;
}

/**
 * Node handle.
 */
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NH {
    idx: u32,
}

/**
 * Link handle.
 */
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LH {
    idx: u32,
}

/**
 * Element (triangle) handle.
 */
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EH {
    idx: u32,
}

impl Handle for NH {
    fn index(&self) -> u32 {
        self.idx
    }
}

impl From<u32> for NH {
    fn from(idx: u32) -> Self {
        NH { idx }
    }
}

impl From<&u32> for NH {
    fn from(idx: &u32) -> Self {
        NH { idx: *idx }
    }
}

impl Handle for LH {
    fn index(&self) -> u32 {
        self.idx
    }
}

impl From<u32> for LH {
    fn from(idx: u32) -> Self {
        LH { idx }
    }
}

impl From<&u32> for LH {
    fn from(idx: &u32) -> Self {
        LH { idx: *idx }
    }
}

impl Handle for EH {
    fn index(&self) -> u32 {
        self.idx
    }
}

impl From<u32> for EH {
    fn from(idx: u32) -> Self {
        EH { idx }
    }
}

impl From<&u32> for EH {
    fn from(idx: &u32) -> Self {
        EH { idx: *idx }
    }
}

impl Display for NH {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NH({})", self.index())
    }
}

impl Display for LH {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LH({})", self.index())
    }
}

impl Display for EH {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EH({})", self.index())
    }
}

impl Debug for NH {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NH({})", self.index())
    }
}

impl Debug for LH {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LH({})", self.index())
    }
}

impl Debug for EH {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EH({})", self.index())
    }
}

/**
 * Classification of a link by the number of elements adjoining it.
 *
 * A `Free` link adjoins no element, a `Frontier` link adjoins exactly one
 * (mesh boundary), an `Internal` link adjoins two.
 */
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Movability {
    Free,
    Frontier,
    Internal,
}

/**
 * A mesh node: a 2D parametric position, an optional 3D position, the
 * incident link list and status flags.
 *
 * Fixed nodes come from the input boundary polygon and are never moved or
 * removed by legalization.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) uv: DVec2,
    pub(crate) point: Option<DVec3>,
    pub(crate) links: Vec<LH>,
    pub(crate) status: Status,
}

impl Node {
    pub(crate) fn new(uv: DVec2, point: Option<DVec3>, fixed: bool) -> Self {
        let mut status = Status::default();
        status.set_fixed(fixed);
        Node {
            uv,
            point,
            links: Vec::new(),
            status,
        }
    }

    /// The parametric position of this node.
    pub fn uv(&self) -> DVec2 {
        self.uv
    }

    /// The 3D position of this node, if one was supplied.
    pub fn point(&self) -> Option<DVec3> {
        self.point
    }

    /// Fixed nodes belong to the input boundary and cannot be removed.
    pub fn is_fixed(&self) -> bool {
        self.status.fixed()
    }

    /// The links incident on this node, in insertion order.
    pub fn links(&self) -> &[LH] {
        &self.links
    }
}

/**
 * A mesh link: an unordered pair of nodes and the up to two elements
 * adjoining it.
 *
 * Constrained links come from the input boundary polygon and are excluded
 * from legalization flips.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub(crate) nodes: [NH; 2],
    pub(crate) elements: [Option<EH>; 2],
    pub(crate) status: Status,
}

impl Link {
    pub(crate) fn new(a: NH, b: NH, constrained: bool) -> Self {
        let mut status = Status::default();
        status.set_constrained(constrained);
        Link {
            nodes: [a, b],
            elements: [None, None],
            status,
        }
    }

    /// The two endpoint nodes.
    pub fn nodes(&self) -> [NH; 2] {
        self.nodes
    }

    /// Whether `n` is one of the two endpoints.
    pub fn has_node(&self, n: NH) -> bool {
        self.nodes[0] == n || self.nodes[1] == n
    }

    /// The endpoint other than `n`, if `n` is an endpoint at all.
    pub fn opposite_node(&self, n: NH) -> Option<NH> {
        if self.nodes[0] == n {
            Some(self.nodes[1])
        } else if self.nodes[1] == n {
            Some(self.nodes[0])
        } else {
            None
        }
    }

    /// The elements adjoining this link.
    pub fn elements(&self) -> impl Iterator<Item = EH> {
        self.elements.into_iter().flatten()
    }

    /// The number of elements adjoining this link.
    pub fn num_elements(&self) -> usize {
        self.elements.iter().flatten().count()
    }

    /// The element adjoining this link other than `e`, if any.
    pub fn opposite_element(&self, e: EH) -> Option<EH> {
        self.elements().find(|other| *other != e)
    }

    /// Constrained links come from the input boundary and are never flipped.
    pub fn is_constrained(&self) -> bool {
        self.status.constrained()
    }

    /// Classification by adjoining element count.
    pub fn movability(&self) -> Movability {
        match self.num_elements() {
            0 => Movability::Free,
            1 => Movability::Frontier,
            _ => Movability::Internal,
        }
    }

    pub(crate) fn attach(&mut self, e: EH) -> bool {
        for slot in self.elements.iter_mut() {
            if slot.is_none() {
                *slot = Some(e);
                return true;
            }
        }
        false
    }

    pub(crate) fn detach(&mut self, e: EH) {
        for slot in self.elements.iter_mut() {
            if *slot == Some(e) {
                *slot = None;
            }
        }
    }
}

/**
 * A mesh element: a triangle given by three nodes in counter-clockwise
 * parametric order and its three bounding links.
 *
 * `links[i]` joins `nodes[i]` and `nodes[(i + 1) % 3]`.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub(crate) nodes: [NH; 3],
    pub(crate) links: [LH; 3],
    pub(crate) status: Status,
}

impl Element {
    pub(crate) fn new(nodes: [NH; 3], links: [LH; 3]) -> Self {
        Element {
            nodes,
            links,
            status: Status::default(),
        }
    }

    /// The three corner nodes in counter-clockwise parametric order.
    pub fn nodes(&self) -> [NH; 3] {
        self.nodes
    }

    /// The three bounding links; `links()[i]` joins `nodes()[i]` and
    /// `nodes()[(i + 1) % 3]`.
    pub fn links(&self) -> [LH; 3] {
        self.links
    }

    /// Whether `n` is one of the three corners.
    pub fn has_node(&self, n: NH) -> bool {
        self.nodes.contains(&n)
    }

    /// Whether `l` is one of the three bounding links.
    pub fn has_link(&self, l: LH) -> bool {
        self.links.contains(&l)
    }

    /// The corner node not on the given bounding link.
    pub fn node_opposite(&self, l: LH) -> Option<NH> {
        let i = self.links.iter().position(|other| *other == l)?;
        Some(self.nodes[(i + 2) % 3])
    }

    /// The bounding link not touching the given corner node.
    pub fn link_opposite(&self, n: NH) -> Option<LH> {
        let i = self.nodes.iter().position(|other| *other == n)?;
        Some(self.links[(i + 1) % 3])
    }
}
