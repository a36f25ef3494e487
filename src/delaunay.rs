use glam::{DVec2, DVec3};
use log::{debug, trace};

use crate::{
    element::{EH, LH, Movability, NH},
    error::Error,
    math::{self, Side},
    mesh::Mesh,
};

/**
 * A vertex of the input boundary polygon: the parametric position on the
 * surface and the 3D position it maps to.
 */
#[derive(Debug, Clone, Copy)]
pub struct BoundaryPoint {
    pub uv: DVec2,
    pub point: DVec3,
}

impl BoundaryPoint {
    pub fn new(uv: DVec2, point: DVec3) -> Self {
        BoundaryPoint { uv, point }
    }
}

/**
 * Builder phases. `Seeded` means the boundary polygon has been loaded and
 * coarsely triangulated; every completed insertion or removal leaves the
 * builder in `Legalized`, with `Building` only held while an operation is
 * mutating the mesh.
 */
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Seeded,
    Building,
    Legalized,
}

// Where a point landed during location.
enum Location {
    Inside(EH),
    OnLink(LH),
    OnNode(NH),
    Outside,
}

// Per-element classification used by the walk.
enum Classified {
    Found(Location),
    // Index of the directed edge whose far side is closer to the target.
    Beyond(usize),
}

/**
 * Incremental constrained Delaunay triangulation builder.
 *
 * The mesher owns its mesh. It is seeded with a closed boundary polygon
 * whose edges become constrained links, then grown one interior point at a
 * time; every insertion and removal re-establishes the empty-circumcircle
 * property by flipping non-constrained links.
 */
pub struct Mesher {
    mesh: Mesh,
    phase: Phase,
    // Walk start for point location, the last element touched.
    hint: Option<EH>,
}

impl Mesher {
    /// Create an empty mesher that merges geometry within `tolerance`.
    pub fn new(tolerance: f64) -> Self {
        Mesher {
            mesh: Mesh::new(tolerance),
            phase: Phase::Empty,
            hint: None,
        }
    }

    /// Create an empty mesher sized for roughly `nnodes` nodes.
    pub fn with_capacity(tolerance: f64, nnodes: usize) -> Self {
        // A triangulated polygon has fewer than 3n links and 2n elements.
        Mesher {
            mesh: Mesh::with_capacity(tolerance, nnodes, 3 * nnodes, 2 * nnodes),
            phase: Phase::Empty,
            hint: None,
        }
    }

    /// The triangulated mesh.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Consume the mesher and keep the mesh.
    pub fn into_mesh(self) -> Mesh {
        self.mesh
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Load a closed boundary polygon and build the initial triangulation.
    ///
    /// The polygon vertices become fixed nodes and its edges constrained
    /// links, accepted in either winding. The interior is triangulated by
    /// ear clipping and the seed diagonals are legalized, so the frontier
    /// of the seeded mesh is exactly the input polygon.
    pub fn initialize(&mut self, boundary: &[BoundaryPoint]) -> Result<(), Error> {
        if self.phase != Phase::Empty {
            return Err(Error::InvariantViolation);
        }
        let tol = self.mesh.tolerance();
        // Collapse coincident consecutive input points and an explicitly
        // closed polygon before touching the mesh.
        let mut ring: Vec<BoundaryPoint> = Vec::with_capacity(boundary.len());
        for bp in boundary {
            if ring.last().is_some_and(|prev| prev.uv.distance(bp.uv) <= tol) {
                continue;
            }
            ring.push(*bp);
        }
        while ring.len() > 1
            && ring[0].uv.distance(ring[ring.len() - 1].uv) <= tol
        {
            ring.pop();
        }
        if ring.len() < 3 {
            return Err(Error::DegenerateGeometry);
        }
        for i in 0..ring.len() {
            for j in (i + 1)..ring.len() {
                if ring[i].uv.distance(ring[j].uv) <= tol {
                    // A self-touching polygon cannot be meshed.
                    return Err(Error::DegenerateGeometry);
                }
            }
        }
        let uvs: Vec<DVec2> = ring.iter().map(|bp| bp.uv).collect();
        if math::polygon_area(&uvs) < 0.0 {
            ring.reverse();
        }
        let nodes: Vec<NH> = ring
            .iter()
            .map(|bp| self.mesh.add_node_at(bp.uv, bp.point, true))
            .collect();
        for i in 0..nodes.len() {
            let l = self.mesh.add_link(nodes[i], nodes[(i + 1) % nodes.len()])?;
            self.mesh.constrain_link(l)?;
        }
        let mut pending = Vec::new();
        self.triangulate_loop(&nodes, &mut pending)?;
        self.legalize(&mut pending)?;
        self.phase = Phase::Seeded;
        debug!(
            "seeded mesh: {} boundary nodes, {} elements",
            self.mesh.node_count(),
            self.mesh.element_count()
        );
        Ok(())
    }

    /// Insert an interior point into the triangulation.
    ///
    /// A point within tolerance of an existing node resolves to that node
    /// without touching the topology. A point strictly inside an element
    /// splits it in three; a point on a non-constrained interior link
    /// splits the two adjoining elements in four. Either split is followed
    /// by legalization. A point on a constrained or frontier link is
    /// rejected as degenerate, a point outside every live element as
    /// outside the domain; both leave the mesh untouched.
    pub fn insert_node(&mut self, uv: DVec2) -> Result<NH, Error> {
        self.insert(uv, None)
    }

    /// Same as [`Mesher::insert_node`], with an associated 3D position.
    pub fn insert_node_at(&mut self, uv: DVec2, point: DVec3) -> Result<NH, Error> {
        self.insert(uv, Some(point))
    }

    fn insert(&mut self, uv: DVec2, point: Option<DVec3>) -> Result<NH, Error> {
        if self.phase == Phase::Empty {
            return Err(Error::InvariantViolation);
        }
        if let Some(existing) = self.mesh.find_node(uv) {
            trace!("insertion at {uv:?} absorbed by node {existing}");
            return Ok(existing);
        }
        let mut pending = Vec::new();
        let n = match self.locate(uv) {
            Location::Outside => {
                debug!("insertion at {uv:?} lies outside the domain");
                return Err(Error::PointOutsideDomain);
            }
            Location::OnNode(n) => return Ok(n),
            Location::OnLink(l) => {
                let link = *self.mesh.link_at(l);
                if link.is_constrained() || link.movability() != Movability::Internal {
                    return Err(Error::DegenerateGeometry);
                }
                self.phase = Phase::Building;
                self.split_link(l, uv, point, &mut pending)?
            }
            Location::Inside(e) => {
                self.phase = Phase::Building;
                self.split_element(e, uv, point, &mut pending)?
            }
        };
        self.legalize(&mut pending)?;
        self.phase = Phase::Legalized;
        Ok(n)
    }

    /// Remove a previously inserted interior node and re-triangulate the
    /// polygonal hole it leaves. Fixed boundary nodes cannot be removed.
    pub fn remove_node(&mut self, n: NH) -> Result<(), Error> {
        if self.phase == Phase::Empty {
            return Err(Error::InvariantViolation);
        }
        let node = self.mesh.node(n)?;
        if node.is_fixed() {
            return Err(Error::InvariantViolation);
        }
        let star_links: Vec<LH> = node.links().to_vec();
        // The hole rim: each incident element contributes the arc between
        // its two corners other than `n`, counter-clockwise around `n`.
        let mut arcs: ahash::AHashMap<NH, (NH, LH)> = ahash::AHashMap::new();
        let mut star_elements: Vec<EH> = Vec::with_capacity(star_links.len());
        for l in &star_links {
            if self.mesh.link_at(*l).movability() != Movability::Internal {
                // A non-fixed node on the frontier has no closed rim.
                return Err(Error::InvariantViolation);
            }
            for e in self.mesh.link_at(*l).elements() {
                if star_elements.contains(&e) {
                    continue;
                }
                star_elements.push(e);
                let element = self.mesh.element_at(e);
                let nodes = element.nodes();
                let i = nodes
                    .iter()
                    .position(|other| *other == n)
                    .ok_or(Error::InvariantViolation)?;
                let from = nodes[(i + 1) % 3];
                let to = nodes[(i + 2) % 3];
                let rim = element.link_opposite(n).ok_or(Error::InvariantViolation)?;
                arcs.insert(from, (to, rim));
            }
        }
        let mut ring: Vec<NH> = Vec::with_capacity(arcs.len());
        let mut pending: Vec<LH> = Vec::with_capacity(arcs.len() * 2);
        let Some(start) = star_elements
            .first()
            .and_then(|e| self.mesh.element_at(*e).nodes().into_iter().find(|m| *m != n))
        else {
            return Err(Error::InvariantViolation);
        };
        let mut current = start;
        loop {
            ring.push(current);
            let (next, rim) = *arcs.get(&current).ok_or(Error::InvariantViolation)?;
            // Rim links border the re-triangulated hole and must be
            // re-tested by legalization.
            pending.push(rim);
            current = next;
            if current == start {
                break;
            }
            if ring.len() > arcs.len() {
                return Err(Error::InvariantViolation);
            }
        }
        if ring.len() != arcs.len() {
            // The star pinches; the hole is not a simple polygon.
            return Err(Error::InvariantViolation);
        }
        self.phase = Phase::Building;
        self.hint = None;
        for e in &star_elements {
            self.mesh.remove_element(*e)?;
        }
        for l in &star_links {
            self.mesh.remove_link(*l)?;
        }
        self.mesh.remove_node(n)?;
        self.triangulate_loop(&ring, &mut pending)?;
        self.legalize(&mut pending)?;
        self.phase = Phase::Legalized;
        trace!("removed node {n}, re-triangulated {} rim nodes", ring.len());
        Ok(())
    }

    /// Validate the Delaunay property of the current mesh.
    pub fn check_delaunay(&self) -> Result<(), Error> {
        self.mesh.check_delaunay()
    }

    // Triangulate the simple counter-clockwise polygon `ring` by ear
    // clipping. The links between consecutive ring nodes must already
    // exist; the diagonals are created and queued for legalization.
    fn triangulate_loop(&mut self, ring: &[NH], pending: &mut Vec<LH>) -> Result<(), Error> {
        let tol = self.mesh.tolerance();
        let mut ring: Vec<NH> = ring.to_vec();
        while ring.len() > 3 {
            let len = ring.len();
            let mut clipped = false;
            for i in 0..len {
                let prev = ring[(i + len - 1) % len];
                let cur = ring[i];
                let next = ring[(i + 1) % len];
                let (pa, pb, pc) = (
                    self.mesh.node_at(prev).uv(),
                    self.mesh.node_at(cur).uv(),
                    self.mesh.node_at(next).uv(),
                );
                // An ear is a strictly convex corner with no other ring
                // node inside or on its triangle.
                if math::line_side(pa, pb, pc, tol) != Side::Left {
                    continue;
                }
                if ring.iter().any(|m| {
                    *m != prev
                        && *m != cur
                        && *m != next
                        && math::point_in_triangle(pa, pb, pc, self.mesh.node_at(*m).uv(), tol)
                }) {
                    continue;
                }
                let first = self
                    .mesh
                    .find_link(prev, cur)
                    .ok_or(Error::InvariantViolation)?;
                let second = self
                    .mesh
                    .find_link(cur, next)
                    .ok_or(Error::InvariantViolation)?;
                let diagonal = self.mesh.add_link(prev, next)?;
                let e = self.mesh.add_element(first, second, diagonal)?;
                self.hint = Some(e);
                pending.push(diagonal);
                ring.remove(i);
                clipped = true;
                break;
            }
            if !clipped {
                return Err(Error::DegenerateGeometry);
            }
        }
        let la = self
            .mesh
            .find_link(ring[0], ring[1])
            .ok_or(Error::InvariantViolation)?;
        let lb = self
            .mesh
            .find_link(ring[1], ring[2])
            .ok_or(Error::InvariantViolation)?;
        let lc = self
            .mesh
            .find_link(ring[2], ring[0])
            .ok_or(Error::InvariantViolation)?;
        let e = self.mesh.add_element(la, lb, lc)?;
        self.hint = Some(e);
        Ok(())
    }

    // Classify `uv` against one element, or name the edge to walk across.
    fn classify(&self, e: EH, uv: DVec2) -> Classified {
        let tol = self.mesh.tolerance();
        let element = self.mesh.element_at(e);
        let nodes = element.nodes();
        let mut worst: Option<(usize, f64)> = None;
        let mut on = [false; 3];
        for i in 0..3 {
            let a = self.mesh.node_at(nodes[i]).uv();
            let b = self.mesh.node_at(nodes[(i + 1) % 3]).uv();
            let dir = b - a;
            let len = dir.length();
            let dist = if len <= tol {
                0.0
            } else {
                dir.perp_dot(uv - a) / len
            };
            if dist < -tol {
                if worst.is_none_or(|(_, d)| dist < d) {
                    worst = Some((i, dist));
                }
            } else if dist <= tol {
                on[i] = true;
            }
        }
        if let Some((i, _)) = worst {
            return Classified::Beyond(i);
        }
        match on {
            [false, false, false] => Classified::Found(Location::Inside(e)),
            [true, false, false] => Classified::Found(Location::OnLink(element.links()[0])),
            [false, true, false] => Classified::Found(Location::OnLink(element.links()[1])),
            [false, false, true] => Classified::Found(Location::OnLink(element.links()[2])),
            // Within tolerance of two edges: their shared corner.
            // `links[i]` joins `nodes[i]` and `nodes[i + 1]`, so edges i
            // and i + 1 meet at `nodes[i + 1]`.
            [true, true, _] => Classified::Found(Location::OnNode(nodes[1])),
            [_, true, true] => Classified::Found(Location::OnNode(nodes[2])),
            _ => Classified::Found(Location::OnNode(nodes[0])),
        }
    }

    // Walk towards `uv` from the last touched element, following the edge
    // whose far side is closer. Falls back to a linear scan when the walk
    // cycles or the domain is not convex.
    fn locate(&self, uv: DVec2) -> Location {
        let start = self
            .hint
            .filter(|e| self.mesh.element(*e).is_ok())
            .or_else(|| self.mesh.elements().next());
        let Some(mut current) = start else {
            return Location::Outside;
        };
        let mut previous: Option<EH> = None;
        let mut steps = self.mesh.element_count();
        loop {
            match self.classify(current, uv) {
                Classified::Found(location) => return location,
                Classified::Beyond(i) => {
                    let l = self.mesh.element_at(current).links()[i];
                    let neighbour = self.mesh.link_at(l).opposite_element(current);
                    match neighbour {
                        Some(next) if Some(next) != previous && steps > 0 => {
                            steps -= 1;
                            previous = Some(current);
                            current = next;
                        }
                        // Walked off the frontier, bounced back, or ran
                        // out of budget; the straight walk is unreliable
                        // on non-convex domains, so scan before giving up.
                        _ => return self.locate_linear(uv),
                    }
                }
            }
        }
    }

    fn locate_linear(&self, uv: DVec2) -> Location {
        for e in self.mesh.elements() {
            if let Classified::Found(location) = self.classify(e, uv) {
                return location;
            }
        }
        Location::Outside
    }

    // Split an element into three around an interior point.
    fn split_element(
        &mut self,
        e: EH,
        uv: DVec2,
        point: Option<DVec3>,
        pending: &mut Vec<LH>,
    ) -> Result<NH, Error> {
        let element = *self.mesh.element_at(e);
        let [n0, n1, n2] = element.nodes();
        let [l01, l12, l20] = element.links();
        let n = match point {
            Some(p) => self.mesh.add_node_at(uv, p, false),
            None => self.mesh.add_node(uv, false),
        };
        self.mesh.remove_element(e)?;
        let s0 = self.mesh.add_link(n, n0)?;
        let s1 = self.mesh.add_link(n, n1)?;
        let s2 = self.mesh.add_link(n, n2)?;
        self.mesh.add_element(l01, s1, s0)?;
        self.mesh.add_element(l12, s2, s1)?;
        let last = self.mesh.add_element(l20, s0, s2)?;
        self.hint = Some(last);
        pending.extend([l01, l12, l20]);
        Ok(n)
    }

    // Split an internal link and its two adjoining elements in four
    // around a point on the link.
    fn split_link(
        &mut self,
        l: LH,
        uv: DVec2,
        point: Option<DVec3>,
        pending: &mut Vec<LH>,
    ) -> Result<NH, Error> {
        let link = *self.mesh.link_at(l);
        let [a, b] = link.nodes();
        let sides: Vec<(NH, LH, LH)> = link
            .elements()
            .map(|e| {
                let element = self.mesh.element_at(e);
                let apex = element.node_opposite(l).ok_or(Error::InvariantViolation)?;
                let la = element.link_opposite(b).ok_or(Error::InvariantViolation)?;
                let lb = element.link_opposite(a).ok_or(Error::InvariantViolation)?;
                Ok((apex, la, lb))
            })
            .collect::<Result<_, Error>>()?;
        for e in link.elements() {
            self.mesh.remove_element(e)?;
        }
        self.mesh.remove_link(l)?;
        let n = match point {
            Some(p) => self.mesh.add_node_at(uv, p, false),
            None => self.mesh.add_node(uv, false),
        };
        let na = self.mesh.add_link(n, a)?;
        let nb = self.mesh.add_link(n, b)?;
        for (apex, la, lb) in sides {
            let np = self.mesh.add_link(n, apex)?;
            self.mesh.add_element(na, np, la)?;
            let e = self.mesh.add_element(nb, lb, np)?;
            self.hint = Some(e);
            pending.extend([la, lb]);
        }
        Ok(n)
    }

    // Restore the empty-circumcircle property by flipping every
    // non-constrained internal link on the worklist whose far apex falls
    // inside the circumcircle of its near element. Each flip re-queues
    // the four rim links of the flipped quadrilateral; constrained links
    // are never queued into a flip.
    fn legalize(&mut self, pending: &mut Vec<LH>) -> Result<(), Error> {
        let tol = self.mesh.tolerance();
        let mut flips = 0usize;
        while let Some(l) = pending.pop() {
            let Ok(link) = self.mesh.link(l) else {
                // Deleted by an earlier flip.
                continue;
            };
            if link.is_constrained() || link.movability() != Movability::Internal {
                continue;
            }
            let [a, b] = link.nodes();
            let elements: Vec<EH> = link.elements().collect();
            let [e1, e2] = elements[..] else {
                continue;
            };
            let (Some(p), Some(q)) = (
                self.mesh.element_at(e1).node_opposite(l),
                self.mesh.element_at(e2).node_opposite(l),
            ) else {
                continue;
            };
            let (ua, ub) = (self.mesh.node_at(a).uv(), self.mesh.node_at(b).uv());
            let (up, uq) = (self.mesh.node_at(p).uv(), self.mesh.node_at(q).uv());
            if !math::in_circle(ua, ub, up, uq, tol) {
                continue;
            }
            // The flip is only well-formed when the quadrilateral is
            // strictly convex.
            match (
                math::line_side(up, uq, ua, tol),
                math::line_side(up, uq, ub, tol),
            ) {
                (Side::Left, Side::Right) | (Side::Right, Side::Left) => {}
                _ => continue,
            }
            let lap = match self.mesh.element_at(e1).link_opposite(b) {
                Some(l) => l,
                None => continue,
            };
            let lbp = match self.mesh.element_at(e1).link_opposite(a) {
                Some(l) => l,
                None => continue,
            };
            let laq = match self.mesh.element_at(e2).link_opposite(b) {
                Some(l) => l,
                None => continue,
            };
            let lbq = match self.mesh.element_at(e2).link_opposite(a) {
                Some(l) => l,
                None => continue,
            };
            self.mesh.remove_element(e1)?;
            self.mesh.remove_element(e2)?;
            self.mesh.remove_link(l)?;
            let lpq = self.mesh.add_link(p, q)?;
            self.mesh.add_element(lap, lpq, laq)?;
            let e = self.mesh.add_element(lbp, lpq, lbq)?;
            self.hint = Some(e);
            pending.extend([lap, lbp, laq, lbq]);
            flips += 1;
        }
        if flips > 0 {
            trace!("legalization flipped {flips} links");
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{BoundaryPoint, Mesher, Phase};
    use crate::{element::Movability, error::Error};
    use glam::{DVec2, DVec3};

    const TOL: f64 = 1e-9;

    fn square(size: f64) -> Vec<BoundaryPoint> {
        [(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)]
            .iter()
            .map(|(x, y)| BoundaryPoint::new(DVec2::new(*x, *y), DVec3::new(*x, *y, 0.0)))
            .collect()
    }

    #[test]
    fn t_initialize_square() {
        let mut mesher = Mesher::with_capacity(TOL, 4);
        mesher.initialize(&square(1.0)).expect("Unable to seed");
        assert_eq!(mesher.phase(), Phase::Seeded);
        let mesh = mesher.mesh();
        assert_eq!(mesh.node_count(), 4);
        assert_eq!(mesh.link_count(), 5);
        assert_eq!(mesh.element_count(), 2);
        mesh.check().expect("Seeded mesh must be valid");
        mesh.check_delaunay().expect("Seeded mesh must be Delaunay");
        // The frontier is exactly the constrained input polygon.
        let frontier: Vec<_> = mesh
            .links()
            .filter(|l| mesh.link(*l).unwrap().movability() == Movability::Frontier)
            .collect();
        assert_eq!(frontier.len(), 4);
        assert!(
            frontier
                .iter()
                .all(|l| mesh.link(*l).unwrap().is_constrained())
        );
    }

    #[test]
    fn t_initialize_clockwise_polygon() {
        let mut reversed = square(1.0);
        reversed.reverse();
        let mut mesher = Mesher::new(TOL);
        mesher.initialize(&reversed).expect("Unable to seed");
        assert_eq!(mesher.mesh().element_count(), 2);
        mesher.mesh().check().expect("Mesh must be valid");
    }

    #[test]
    fn t_initialize_rejects_degenerate() {
        let mut mesher = Mesher::new(TOL);
        let collinear: Vec<_> = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]
            .iter()
            .map(|(x, y)| BoundaryPoint::new(DVec2::new(*x, *y), DVec3::ZERO))
            .collect();
        assert_eq!(
            mesher.initialize(&collinear),
            Err(Error::DegenerateGeometry)
        );
        let mut mesher = Mesher::new(TOL);
        assert_eq!(
            mesher.initialize(&square(1.0)[..2]),
            Err(Error::DegenerateGeometry)
        );
        assert_eq!(mesher.phase(), Phase::Empty);
    }

    #[test]
    fn t_initialize_twice_rejected() {
        let mut mesher = Mesher::new(TOL);
        mesher.initialize(&square(1.0)).unwrap();
        assert_eq!(
            mesher.initialize(&square(2.0)),
            Err(Error::InvariantViolation)
        );
    }

    #[test]
    fn t_square_centroid_round_trip() {
        let mut mesher = Mesher::new(TOL);
        mesher.initialize(&square(1.0)).unwrap();
        let n = mesher
            .insert_node(DVec2::new(0.5, 0.5))
            .expect("Unable to insert the centroid");
        assert_eq!(mesher.phase(), Phase::Legalized);
        let mesh = mesher.mesh();
        assert_eq!(mesh.node_count(), 5);
        assert_eq!(mesh.element_count(), 4);
        // Each element uses one boundary link and two spokes to the
        // centroid.
        for e in mesh.elements() {
            let element = mesh.element(e).unwrap();
            assert!(element.has_node(n));
            let constrained = element
                .links()
                .into_iter()
                .filter(|l| mesh.link(*l).unwrap().is_constrained())
                .count();
            assert_eq!(constrained, 1);
        }
        // The frontier is still exactly the input square.
        let frontier: Vec<_> = mesh
            .links()
            .filter(|l| mesh.link(*l).unwrap().movability() == Movability::Frontier)
            .collect();
        assert_eq!(frontier.len(), 4);
        assert!(
            frontier
                .iter()
                .all(|l| mesh.link(*l).unwrap().is_constrained())
        );
        mesh.check().expect("Mesh must be valid");
        mesh.check_delaunay().expect("Mesh must be Delaunay");
    }

    #[test]
    fn t_insert_duplicate_absorbed() {
        let mut mesher = Mesher::new(1e-6);
        mesher.initialize(&square(1.0)).unwrap();
        let a = mesher.insert_node(DVec2::new(0.25, 0.5)).unwrap();
        let b = mesher.insert_node(DVec2::new(0.25, 0.5)).unwrap();
        let c = mesher.insert_node(DVec2::new(0.25 + 1e-7, 0.5)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(mesher.mesh().node_count(), 5);
        assert_eq!(mesher.mesh().element_count(), 4);
    }

    #[test]
    fn t_insert_outside_domain() {
        let mut mesher = Mesher::new(TOL);
        mesher.initialize(&square(1.0)).unwrap();
        let elements = mesher.mesh().element_count();
        assert_eq!(
            mesher.insert_node(DVec2::new(5.0, 5.0)),
            Err(Error::PointOutsideDomain)
        );
        assert_eq!(
            mesher.insert_node(DVec2::new(-0.5, 0.5)),
            Err(Error::PointOutsideDomain)
        );
        assert_eq!(mesher.mesh().element_count(), elements);
        mesher.mesh().check().expect("Mesh must stay valid");
    }

    #[test]
    fn t_insert_on_constrained_link_rejected() {
        let mut mesher = Mesher::new(TOL);
        mesher.initialize(&square(1.0)).unwrap();
        assert_eq!(
            mesher.insert_node(DVec2::new(0.5, 0.0)),
            Err(Error::DegenerateGeometry)
        );
        assert_eq!(mesher.mesh().node_count(), 4);
    }

    #[test]
    fn t_insert_before_initialize_rejected() {
        let mut mesher = Mesher::new(TOL);
        assert_eq!(
            mesher.insert_node(DVec2::new(0.5, 0.5)),
            Err(Error::InvariantViolation)
        );
    }

    #[test]
    fn t_remove_fixed_node_rejected() {
        let mut mesher = Mesher::new(TOL);
        mesher.initialize(&square(1.0)).unwrap();
        let corner = mesher.mesh().nodes().next().unwrap();
        assert_eq!(mesher.remove_node(corner), Err(Error::InvariantViolation));
        assert_eq!(mesher.mesh().node_count(), 4);
    }

    #[test]
    fn t_insert_then_remove_node() {
        let mut mesher = Mesher::new(TOL);
        mesher.initialize(&square(1.0)).unwrap();
        let n = mesher.insert_node(DVec2::new(0.3, 0.6)).unwrap();
        assert_eq!(mesher.mesh().element_count(), 4);
        mesher.mesh().check().expect("Mesh must be valid");
        mesher.remove_node(n).expect("Unable to remove the node");
        let mesh = mesher.mesh();
        assert_eq!(mesh.node_count(), 4);
        assert_eq!(mesh.element_count(), 2);
        assert_eq!(mesh.node(n), Err(Error::IndexOutOfRange));
        mesh.check().expect("Mesh must be valid after removal");
        mesh.check_delaunay()
            .expect("Mesh must be Delaunay after removal");
    }

    #[test]
    fn t_removed_node_rejected_again() {
        let mut mesher = Mesher::new(TOL);
        mesher.initialize(&square(1.0)).unwrap();
        let n = mesher.insert_node(DVec2::new(0.4, 0.4)).unwrap();
        mesher.remove_node(n).unwrap();
        assert_eq!(mesher.remove_node(n), Err(Error::IndexOutOfRange));
    }

    #[test]
    fn t_random_insertions_stay_delaunay() {
        let mut mesher = Mesher::with_capacity(TOL, 64);
        mesher.initialize(&square(10.0)).unwrap();
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..50 {
            let uv = DVec2::new(0.5 + 9.0 * rng.f64(), 0.5 + 9.0 * rng.f64());
            mesher.insert_node(uv).expect("Interior point must insert");
        }
        let mesh = mesher.mesh();
        // Euler count for a triangulated simple polygon with interior
        // points: E = 2N - 2 - B.
        let n = mesh.node_count();
        assert_eq!(mesh.element_count(), 2 * n - 2 - 4);
        mesh.check().expect("Mesh must be structurally valid");
        mesh.check_delaunay().expect("Mesh must be Delaunay");
        assert_eq!(mesher.phase(), Phase::Legalized);
    }

    #[test]
    fn t_insert_and_remove_many() {
        let mut mesher = Mesher::new(TOL);
        mesher.initialize(&square(10.0)).unwrap();
        let mut rng = fastrand::Rng::with_seed(31);
        let mut inserted = Vec::new();
        for _ in 0..20 {
            let uv = DVec2::new(1.0 + 8.0 * rng.f64(), 1.0 + 8.0 * rng.f64());
            inserted.push(mesher.insert_node(uv).unwrap());
        }
        inserted.sort_unstable();
        inserted.dedup();
        // Remove every other inserted node.
        for n in inserted.iter().step_by(2) {
            mesher.remove_node(*n).expect("Unable to remove");
        }
        let mesh = mesher.mesh();
        let n = mesh.node_count();
        assert_eq!(mesh.element_count(), 2 * n - 2 - 4);
        mesh.check().expect("Mesh must be structurally valid");
        mesh.check_delaunay().expect("Mesh must be Delaunay");
    }

    /**
     * An L-shaped, non-convex domain.
     * ```text
     *   2-----3
     *   |     |
     *   |     4-----5
     *   |           |
     *   0-----------1
     * ```
     */
    #[test]
    fn t_nonconvex_domain() {
        let outline = [
            (0.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 2.0),
            (0.0, 2.0),
        ];
        let boundary: Vec<_> = outline
            .iter()
            .map(|(x, y)| BoundaryPoint::new(DVec2::new(*x, *y), DVec3::new(*x, *y, 0.0)))
            .collect();
        let mut mesher = Mesher::new(TOL);
        mesher.initialize(&boundary).expect("Unable to seed");
        let mesh = mesher.mesh();
        assert_eq!(mesh.element_count(), 4);
        mesh.check().expect("Mesh must be valid");
        mesh.check_delaunay()
            .expect("Constrained mesh must be Delaunay up to visibility");
        // Inside the lower arm.
        mesher.insert_node(DVec2::new(1.5, 0.5)).expect("Inside");
        // Inside the notch, outside the domain.
        assert_eq!(
            mesher.insert_node(DVec2::new(1.5, 1.5)),
            Err(Error::PointOutsideDomain)
        );
        mesher.mesh().check().expect("Mesh must be valid");
        mesher
            .mesh()
            .check_delaunay()
            .expect("Mesh must stay Delaunay");
    }

    #[test]
    fn t_flat_tables_after_build() {
        let mut mesher = Mesher::new(TOL);
        mesher.initialize(&square(1.0)).unwrap();
        mesher
            .insert_node_at(DVec2::new(0.5, 0.5), DVec3::new(0.5, 0.5, 1.0))
            .unwrap();
        let mesh = mesher.into_mesh();
        assert_eq!(mesh.positions().count(), 5);
        assert_eq!(mesh.triangles().count(), 4);
        let centre = mesh.find_node(DVec2::new(0.5, 0.5)).unwrap();
        assert_eq!(
            mesh.node(centre).unwrap().point(),
            Some(DVec3::new(0.5, 0.5, 1.0))
        );
        // Every triangle references live nodes.
        for triangle in mesh.triangles() {
            for n in triangle {
                assert!(mesh.node(n).is_ok());
            }
        }
    }
}
