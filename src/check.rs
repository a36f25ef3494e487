use crate::{
    element::Movability,
    error::Error,
    math::{self, Side},
    mesh::Mesh,
};

fn check_nodes(mesh: &Mesh) -> Result<(), Error> {
    for n in mesh.nodes() {
        for l in mesh.node_at(n).links() {
            // Incident links must be live and point back at the node.
            if !mesh.link(*l)?.has_node(n) {
                return Err(Error::InvariantViolation);
            }
        }
        if let Some(other) = mesh.coincident_node(n) {
            return Err(Error::CoincidentNodes(n, other));
        }
    }
    Ok(())
}

fn check_links(mesh: &Mesh) -> Result<(), Error> {
    for l in mesh.links() {
        let link = mesh.link_at(l);
        if link.movability() == Movability::Free {
            return Err(Error::OrphanedLink(l));
        }
        for e in link.elements() {
            if !mesh.element(e)?.has_link(l) {
                return Err(Error::AsymmetricAdjacency(e, l));
            }
        }
        let [a, b] = link.nodes();
        if !mesh.node_at(a).links().contains(&l) || !mesh.node_at(b).links().contains(&l) {
            return Err(Error::InvariantViolation);
        }
    }
    Ok(())
}

fn check_elements(mesh: &Mesh) -> Result<(), Error> {
    for e in mesh.elements() {
        let element = *mesh.element_at(e);
        let nodes = element.nodes();
        for (i, l) in element.links().into_iter().enumerate() {
            let link = mesh.link(l).map_err(|_| Error::AsymmetricAdjacency(e, l))?;
            if !link.elements().any(|other| other == e) {
                return Err(Error::AsymmetricAdjacency(e, l));
            }
            // The i-th link joins the i-th and (i+1)-th corners.
            if !link.has_node(nodes[i]) || !link.has_node(nodes[(i + 1) % 3]) {
                return Err(Error::AsymmetricAdjacency(e, l));
            }
        }
        let [a, b, c] = nodes.map(|n| mesh.node_at(n).uv());
        if math::line_side(a, b, c, mesh.tolerance()) != Side::Left {
            return Err(Error::DegenerateGeometry);
        }
    }
    Ok(())
}

impl Mesh {
    /// Validate the structural invariants of the mesh: element and link
    /// adjacency agree both ways, every live link adjoins one or two
    /// elements, every element is counter-clockwise with positive area,
    /// and no two live nodes coincide within tolerance.
    ///
    /// Returns the first violation found.
    pub fn check(&self) -> Result<(), Error> {
        check_nodes(self)?;
        check_links(self)?;
        check_elements(self)?;
        Ok(())
    }

    /// Validate the Delaunay property: no live node lies strictly inside
    /// the circumcircle of a live element, except nodes hidden from the
    /// element behind a constrained link.
    pub fn check_delaunay(&self) -> Result<(), Error> {
        let tol = self.tolerance();
        let constrained: Vec<[glam::DVec2; 2]> = self
            .links()
            .filter(|l| self.link_at(*l).is_constrained())
            .map(|l| self.link_at(l).nodes().map(|n| self.node_at(n).uv()))
            .collect();
        for e in self.elements() {
            let element = *self.element_at(e);
            let [a, b, c] = element.nodes().map(|n| self.node_at(n).uv());
            let Some(circle) = math::circumcircle(a, b, c, tol) else {
                return Err(Error::DegenerateGeometry);
            };
            let centroid = (a + b + c) / 3.0;
            for n in self.nodes() {
                if element.has_node(n) {
                    continue;
                }
                let uv = self.node_at(n).uv();
                if uv.distance(circle.center) >= circle.radius - tol {
                    continue;
                }
                // Inside the circumcircle; tolerated only when a
                // constrained link blocks the line of sight.
                let hidden = constrained
                    .iter()
                    .any(|[p, q]| math::segments_cross(centroid, uv, *p, *q, tol));
                if !hidden {
                    return Err(Error::DelaunayViolation(e, n));
                }
            }
        }
        Ok(())
    }
}
