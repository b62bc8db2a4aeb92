pub mod candidate;
pub mod config;
pub mod error;
pub mod issue;
pub mod normalize;
pub mod record;
pub mod recovery;
pub mod resolve;
pub mod summary;
pub mod validate;

pub use candidate::{Candidate, CandidateMeta, CandidatePool, ExtractedDocument, Field, Method, WeightRole};
pub use config::{Policy, ResolverPolicy, ValidationPolicy};
pub use error::{CandidateError, PolicyError};
pub use issue::{ValidationError, Warning};
pub use record::{ParseOutput, ParseResult, Parser};
pub use resolve::{Evidence, ResolvedFields, resolve_candidates};
pub use summary::{CandidateSummary, format_weight_kg, summarize_candidates, weight_relation_summary};
pub use validate::{ValidationInput, ValidationOutcome, WeightTriple, validate_and_recover};
