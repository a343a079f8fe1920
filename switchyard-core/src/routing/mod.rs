//! Rule resolution and gateway selection.

pub mod resolver;
pub mod selector;

pub use resolver::{resolve, RouteInput};
pub use selector::{select, select_with_rng};

/// One candidate target produced by resolution: a gateway reference tagged
/// with the specificity of the rule that matched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Index of the gateway in the snapshot's registry.
    pub gateway: usize,
    /// Length of the matching rule's prefix; longer is more specific.
    pub prefix_len: usize,
    /// Priority tier of the matching target; lower is preferred.
    pub priority: u8,
    /// Configured weight of the matching target.
    pub weight: u16,
}
