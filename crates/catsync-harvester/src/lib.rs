pub mod batch;
pub mod breaker;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod outcome;
pub mod request;
pub mod retry;
pub mod session;
pub mod sync;
pub mod transport;
pub mod types;

pub use batch::{BatchController, BatchSignal};
pub use breaker::{BreakerStats, CircuitBreaker};
pub use error::{HarvestError, SyncError, TransportError};
pub use normalize::normalize_product;
pub use orchestrator::{
    AbortCause, CategoryHarvest, CategoryReport, CategoryStatus, EndOfResults, HarvestRun,
    Harvester,
};
pub use outcome::{AttemptTimeouts, OutcomeKind, RequestOutcome};
pub use request::PageRequest;
pub use retry::{ExhaustionReason, PageExhausted, RetryingExecutor};
pub use session::HarvestSession;
pub use sync::{Advisory, SyncReport, SyncService, SyncStatus};
pub use transport::{PageTransport, SearchTransport};
pub use types::{RawProduct, SearchPayload};
