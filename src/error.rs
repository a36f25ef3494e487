use thiserror::Error;

use crate::element::{EH, LH, NH};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Zero-area triangle, self-link, or an insertion that would create
    /// degenerate geometry. Recoverable; the caller may retry with an
    /// adjusted tolerance.
    #[error("operation would create degenerate geometry")]
    DegenerateGeometry,
    /// A link would gain a third adjoining element.
    #[error("link {0} would adjoin more than two elements")]
    TopologyOverflow(LH),
    /// Access to a tombstoned or never-allocated index.
    #[error("index out of range")]
    IndexOutOfRange,
    /// Insertion point not located inside any live element.
    #[error("point lies outside the triangulated domain")]
    PointOutsideDomain,
    /// Attempted removal of a fixed node, a flip of a constrained link, or
    /// an operation issued in the wrong builder phase. The mesh remains in
    /// its last known good state.
    #[error("operation violates a mesh invariant")]
    InvariantViolation,
    // Structural check failures.
    /// An element references a link that does not reference it back.
    #[error("element {0} and link {1} disagree about their adjacency")]
    AsymmetricAdjacency(EH, LH),
    /// A live link adjoins no element.
    #[error("link {0} adjoins no element")]
    OrphanedLink(LH),
    /// A node lies strictly inside the circumcircle of an element.
    #[error("node {1} lies inside the circumcircle of element {0}")]
    DelaunayViolation(EH, NH),
    /// Two live nodes lie within tolerance of each other.
    #[error("nodes {0} and {1} are geometrically coincident")]
    CoincidentNodes(NH, NH),
}
