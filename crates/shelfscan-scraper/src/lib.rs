pub mod error;
pub mod extract;
pub mod image;
pub mod location;
pub mod page;
pub mod price;
pub mod retry;
mod scripts;
pub mod scroll;
pub mod session;
pub mod sink;
pub mod webdriver;

pub use error::ScraperError;
pub use extract::{count_by_strategy, FieldExtractor, StateShape};
pub use location::{setup_location, LocationSessionResult, LocationState};
pub use page::{ListingPage, PageOpener};
pub use retry::backoff_delay;
pub use scripts::STATE_PROBE;
pub use scroll::{load_more, ScrollExit, ScrollOutcome, ScrollPhase, ScrollPolicy, ScrollState};
pub use session::{ListingOutcome, ListingSession, ListingStatus, SessionConfig, SessionState};
pub use sink::{ArtifactStore, RecordSink};
pub use webdriver::{BrowserOptions, WebDriverBrowser};
