use ahash::AHashSet;

use crate::{
    element::{EH, LH, Movability, NH},
    error::Error,
    mesh::Mesh,
};

/**
 * Breadth-first adjacency queries over a mesh.
 *
 * A selector accumulates: consecutive `neighbours_of_*` calls union their
 * results into the same node/link/element sets until [`Selector::reset`],
 * so a selection can be grown from several seeds before reading it back.
 * Every query expands exactly one ring around its seed, never the whole
 * connected component.
 *
 * The selector only reads the mesh; it borrows it for its whole lifetime
 * and must be dropped before the mesh can be mutated again.
 */
pub struct Selector<'m> {
    mesh: &'m Mesh,
    nodes: AHashSet<NH>,
    links: AHashSet<LH>,
    elements: AHashSet<EH>,
}

impl<'m> Selector<'m> {
    pub fn new(mesh: &'m Mesh) -> Self {
        Selector {
            mesh,
            nodes: AHashSet::new(),
            links: AHashSet::new(),
            elements: AHashSet::new(),
        }
    }

    /// Clear the accumulated sets, keeping the mesh reference.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.elements.clear();
    }

    // Expand a link to the elements bordering it. All entry points reduce
    // to this.
    fn elements_of_link(&mut self, l: LH, skip: Option<EH>) {
        for e in self.mesh.link_at(l).elements() {
            if Some(e) != skip {
                self.elements.insert(e);
            }
        }
    }

    /// Select the first ring around a node: its incident links, the far
    /// endpoints of those links, and the elements bordering them. The seed
    /// itself is not selected.
    pub fn neighbours_of_node(&mut self, n: NH) -> Result<(), Error> {
        let mesh = self.mesh;
        for l in mesh.links_connected_to(n)? {
            self.links.insert(*l);
            if let Some(far) = mesh.link_at(*l).opposite_node(n) {
                self.nodes.insert(far);
            }
            self.elements_of_link(*l, None);
        }
        Ok(())
    }

    /// Select the first ring around a link: the rings of both endpoint
    /// nodes plus the elements bordering the link itself.
    pub fn neighbours_of_link(&mut self, l: LH) -> Result<(), Error> {
        let [a, b] = self.mesh.link(l)?.nodes();
        self.neighbours_of_node(a)?;
        self.neighbours_of_node(b)?;
        self.elements_of_link(l, None);
        Ok(())
    }

    /// Select the first ring around an element by node adjacency: the
    /// union of the rings of its three corner nodes. This reaches every
    /// element sharing at least one node with the seed, the seed included.
    pub fn neighbours_of_element(&mut self, e: EH) -> Result<(), Error> {
        let nodes = self.mesh.element(e)?.nodes();
        for n in nodes {
            self.neighbours_of_node(n)?;
        }
        Ok(())
    }

    /// Select the neighbours of an element by edge adjacency: its three
    /// bounding links and the elements on their far sides. Unlike
    /// [`Selector::neighbours_of_element`] this yields only elements that
    /// share a full edge with the seed, and it does not traverse nodes.
    pub fn neighbours_by_edge_of(&mut self, e: EH) -> Result<(), Error> {
        let links = self.mesh.element(e)?.links();
        for l in links {
            self.links.insert(l);
            self.elements_of_link(l, Some(e));
        }
        Ok(())
    }

    /// The accumulated nodes, unordered.
    pub fn nodes(&self) -> impl Iterator<Item = NH> + '_ {
        self.nodes.iter().copied()
    }

    /// The accumulated links, unordered.
    pub fn links(&self) -> impl Iterator<Item = LH> + '_ {
        self.links.iter().copied()
    }

    /// The accumulated elements, unordered.
    pub fn elements(&self) -> impl Iterator<Item = EH> + '_ {
        self.elements.iter().copied()
    }

    /// The subset of the accumulated links bordering exactly one element,
    /// i.e. lying on the mesh boundary.
    pub fn frontier_links(&self) -> impl Iterator<Item = LH> + '_ {
        self.links
            .iter()
            .copied()
            .filter(|l| self.mesh.link_at(*l).movability() == Movability::Frontier)
    }
}
