//! A generic worklist fixpoint engine for dataflow analysis.
//!
//! Hosts supply a lattice (`analysis::Domain`), a graph (`graph::FlowGraph`)
//! and a transfer function (`analysis::TransferFunction`). The
//! `analysis::WorkListFixpointIterator` computes, for every node, a value
//! stable under the transfer function, switching from join to widening as
//! nodes are revisited so that runs terminate.
//!
//! ```
//! use fixpoint::analysis::{fixed_point, Domain, Environment};
//! use fixpoint::graph::ControlFlowGraph;
//! # use fixpoint::Error;
//! #
//! # #[derive(Clone, Debug, PartialEq)]
//! # enum Sign { Top, Pos, Neg, Bottom }
//! # impl Domain for Sign {
//! #     type Kind = ();
//! #     fn top(_: &()) -> Sign { Sign::Top }
//! #     fn bottom(_: &()) -> Sign { Sign::Bottom }
//! #     fn is_bottom(&self) -> bool { *self == Sign::Bottom }
//! #     fn join(&self, other: &Sign) -> Sign {
//! #         match (self, other) {
//! #             (Sign::Bottom, _) => other.clone(),
//! #             (_, Sign::Bottom) => self.clone(),
//! #             (a, b) if a == b => a.clone(),
//! #             _ => Sign::Top,
//! #         }
//! #     }
//! #     fn widen(&self, other: &Sign) -> Sign { self.join(other) }
//! # }
//!
//! # fn main() -> Result<(), Error> {
//! let mut cfg = ControlFlowGraph::new();
//! let nodes = cfg.new_nodes(3)?;
//! cfg.edge(nodes[0], nodes[1])?;
//! cfg.edge(nodes[0], nodes[2])?;
//!
//! let transfer = |node: usize, _: &Environment<Sign>| -> Result<Sign, Error> {
//!     Ok(if node == 0 { Sign::Pos } else { Sign::Neg })
//! };
//!
//! let environment = fixed_point(&cfg, &transfer, ())?;
//! assert_eq!(environment.get(nodes[2]), Some(Sign::Pos));
//! # Ok(())
//! # }
//! ```

pub mod analysis;
mod error;
pub mod graph;

pub use crate::error::Error;
