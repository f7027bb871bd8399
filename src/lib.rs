//! Cached weather lookups for a named location.
//!
//! A [`LookupBroker`] sits in front of a [`WeatherProvider`] and a
//! time-to-live [`ResultCache`](services::cache::ResultCache). Callers use
//! either the blocking [`LookupBroker::lookup_sync`] or the callback-based
//! [`LookupBroker::lookup_async`]; both resolve through the same cache and
//! yield a [`LookupResult`]: a record, an empty result, or an error.
//!
//! ```no_run
//! use weather_broker::{user_message, BrokerConfig, LookupBroker};
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let config = BrokerConfig::from_env().unwrap();
//! let broker = LookupBroker::from_config(&config, runtime.handle().clone()).unwrap();
//!
//! let result = broker.lookup_sync("Nashville");
//! println!("{}", user_message(&result, "Nashville"));
//!
//! broker.lookup_async("Memphis", |result| {
//!     println!("{}", user_message(&result, "Memphis"));
//! });
//! ```

pub mod config;
pub mod errors;
pub mod helpers;
pub mod models;
pub mod services;
pub mod telemetry;

pub use config::BrokerConfig;
pub use errors::{BrokerError, ConfigError, FetchError, LookupError, ParseError};
pub use helpers::{Clock, ManualClock, SystemClock};
pub use models::{user_message, LookupOutcome, LookupResult, WeatherRecord};
pub use services::broker::LookupBroker;
pub use services::parser::parse_weather;
pub use services::provider::{encode_location, HttpWeatherProvider, WeatherProvider};
pub use telemetry::init_tracing;
