pub mod app_config;
pub mod config;
pub mod context;
pub mod error;
pub mod input;
pub mod products;
pub mod site;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use context::{LandingContext, Target};
pub use error::ConfigError;
pub use input::{
    load_run_input, resolve_targets, search_url, validate_run_input, RunInput, MAX_CONCURRENCY,
};
pub use products::{ExtractionStrategy, ProductRecord};
pub use site::{
    FieldSelectors, ImageRules, ImageUpgrade, LocationSelectors, SiteProfile, StockSignals,
};
