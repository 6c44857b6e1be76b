use crate::core::target::ComputationTargetSpecification;
use crate::core::value::ValueRequirement;
use thiserror::Error;

/// Errors surfaced by graph building.
#[derive(Debug, Clone, Error)]
pub enum DependencyGraphError {
    /// Neither live data nor any candidate function could produce the
    /// requirement. The graph is left as it was before the failing call.
    #[error("unsatisfiable dependency: {requirement} for target {target}: {cause}")]
    UnsatisfiableDependency {
        requirement: ValueRequirement,
        target: ComputationTargetSpecification,
        cause: ResolutionFailure,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Adding an edge would make a node (transitively) depend on itself.
    #[error("cyclic graph: {0}")]
    CyclicGraph(String),
}

impl DependencyGraphError {
    /// The failure trace behind an unsatisfiable dependency.
    pub fn resolution_failure(&self) -> Option<&ResolutionFailure> {
        match self {
            Self::UnsatisfiableDependency { cause, .. } => Some(cause),
            Self::InvalidArgument(_) | Self::CyclicGraph(_) => None,
        }
    }
}

/// Why a single requirement (or a single candidate for it) could not be
/// resolved. Failures nest: a candidate is rejected because one of its
/// inputs failed, and so on down to a leaf reason.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionFailure {
    #[error("no function or live data source produces {requirement}")]
    NoCandidates { requirement: ValueRequirement },
    /// The requirement is already being resolved further up the current
    /// path.
    #[error("cyclic dependency on {requirement}")]
    CyclicDependency { requirement: ValueRequirement },
    #[error("target {target} could not be resolved")]
    TargetNotFound {
        target: ComputationTargetSpecification,
    },
    #[error("resolution depth {depth} exceeded at {requirement}")]
    DepthExceeded {
        requirement: ValueRequirement,
        depth: usize,
    },
    #[error("function {function} declined to produce {requirement}")]
    RequirementsDeclined {
        function: String,
        requirement: ValueRequirement,
    },
    #[error("function {function} could not resolve input: {cause}")]
    InputUnresolved {
        function: String,
        cause: Box<ResolutionFailure>,
    },
    #[error("function {function} produced no result satisfying {requirement} from its inputs")]
    ResultsRejected {
        function: String,
        requirement: ValueRequirement,
    },
    #[error("all {} candidate(s) for {requirement} failed", .attempts.len())]
    CandidatesExhausted {
        requirement: ValueRequirement,
        attempts: Vec<ResolutionFailure>,
    },
}

impl ResolutionFailure {
    /// True if a cycle rejection appears anywhere in this trace.
    pub fn involves_cycle(&self) -> bool {
        match self {
            Self::CyclicDependency { .. } => true,
            Self::InputUnresolved { cause, .. } => cause.involves_cycle(),
            Self::CandidatesExhausted { attempts, .. } => {
                attempts.iter().any(ResolutionFailure::involves_cycle)
            }
            _ => false,
        }
    }

    /// Number of leaf reasons in the trace.
    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    /// The leaf reasons of the trace, depth first.
    pub fn leaves(&self) -> Vec<&ResolutionFailure> {
        match self {
            Self::InputUnresolved { cause, .. } => cause.leaves(),
            Self::CandidatesExhausted { attempts, .. } if !attempts.is_empty() => {
                attempts.iter().flat_map(ResolutionFailure::leaves).collect()
            }
            _ => vec![self],
        }
    }
}
