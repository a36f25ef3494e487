/*!
An incremental constrained Delaunay mesh engine for tessellating parametric
surfaces into discrete triangles.

# Overview

+ A compact indexed mesh datastructure ([`Mesh`]) stores nodes, links (edges)
  and elements (triangles). Entities are identified by typed integer handles
  ([`NH`], [`LH`], [`EH`]) that stay stable for the lifetime of the mesh:
  removed entities are tombstoned, never compacted. Nodes and links are
  geometrically deduplicated within a caller supplied tolerance, so two
  insertions of coincident geometry resolve to the same handle.

+ The [`Mesher`] grows a constrained Delaunay triangulation over that
  datastructure. It is seeded with a closed boundary polygon of
  [`BoundaryPoint`]s whose edges become constrained links, then interior
  points are inserted one at a time. Each insertion locates its element by
  walking the triangulation, splits it, and restores the empty-circumcircle
  property by flipping non-constrained links off an explicit worklist.
  Interior nodes can be removed again; the polygonal hole is re-triangulated
  and legalized the same way.

+ The [`Selector`] answers "what touches this entity" queries over a finished
  (or intermediate) mesh: first-ring neighbourhoods of a node, link or
  element, and the frontier links bordering exactly one element. Consecutive
  queries accumulate into the same selection until it is reset, so a
  selection can be grown from several seeds. The selector borrows the mesh
  immutably and never changes it.

+ The same tolerance drives node/link dedup and the geometric predicates
  (orientation, in-circle), so degeneracies at matching scale are rejected
  consistently across the engine.

One mesh per surface patch: a [`Mesh`] and everything built over it is plain
owned data with no interior mutability, so independent patches can be
triangulated on separate threads with zero shared state.
*/

mod arena;
mod check;
mod delaunay;
mod element;
mod error;
mod math;
mod mesh;
mod selector;
mod status;

pub use delaunay::{BoundaryPoint, Mesher, Phase};
pub use element::{EH, Element, Handle, LH, Link, Movability, NH, Node};
pub use error::Error;
pub use mesh::Mesh;
pub use selector::Selector;
pub use status::Status;
