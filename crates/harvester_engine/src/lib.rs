//! Harvester engine: browsing contexts, page probing and the harvest loop.
mod block;
mod chromium;
mod config;
mod context;
mod decode;
mod detail;
mod diagnostics;
mod export;
mod filename;
mod governor;
mod http;
mod links;
mod locate;
mod persist;
mod poll;
mod session;
mod text;
mod types;

pub use block::{BlockDetector, BlockVerdict};
pub use chromium::{ChromiumContext, ChromiumSessionProvider, ChromiumSettings};
pub use config::{
    millis, BlockMarkers, ConfigError, Css, DetailSelectors, EngineConfig, HeuristicWeights,
    MarkupProfile, PollPolicy,
};
pub use context::BrowsingContext;
pub use decode::decode_body;
pub use detail::DetailExtractor;
pub use diagnostics::capture as capture_diagnostics;
pub use export::{
    ExportError, ExportOptions, ExportSummary, FailureEnvelope, ListingSink, SuccessEnvelope,
};
pub use filename::artifact_filename;
pub use governor::HarvestGovernor;
pub use http::{HttpContext, HttpSessionProvider, HttpSettings};
pub use links::LinkCollector;
pub use locate::{HeuristicLocator, HintLocator, ListLocator, LocatorStrategy};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use poll::{navigate_within, poll_until_or_deadline};
pub use session::{
    open_session, verify_authenticated, AuthProbe, SessionArtifact, SessionCookie, SessionError,
    SessionProvider,
};
pub use types::{
    BlockCause, BlockPhase, ErrorClass, HarvestError, HarvestReport, PageError, PageSnapshot,
    RegionHandle, RegionProbe,
};
