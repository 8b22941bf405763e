//! # Grok Engine
//!
//! A Rust library for extracting structured fields from unstructured text with
//! composable, named regular-expression patterns (`%{SYNTAX:SEMANTIC:TYPE}`),
//! with a hard wall-clock budget on every match attempt.
//!
//! ## Quick Start
//!
//! ### Basic Usage
//!
//! ```rust
//! use grok_engine::{Event, GrokConfig, GrokEngine};
//! use serde_json::json;
//!
//! let config = GrokConfig::new()
//!     .with_match("message", ["%{IP:client} %{WORD:method} %{NUMBER:bytes:int}"]);
//! let engine = GrokEngine::new(config)?;
//!
//! let mut event = Event::with_message("55.3.244.1 GET 15824");
//! engine.filter(&mut event);
//!
//! assert_eq!(event.get("bytes"), Some(&json!(15824)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### YAML Configuration
//!
//! ```rust
//! use grok_engine::{Event, GrokEngine};
//!
//! let engine = GrokEngine::from_yaml(r#"
//! match:
//!   message: "%{SYSLOGLINE}"
//! overwrite: [message]
//! timeout_millis: 1000
//! "#)?;
//!
//! let mut event = Event::with_message(
//!     "Mar 16 00:01:25 evita postfix/smtpd[1713]: connect from camomile.cloud9.net[168.100.1.3]",
//! );
//! let outcome = engine.filter(&mut event);
//!
//! assert!(outcome.is_matched());
//! assert_eq!(event.get("program").and_then(|v| v.as_str()), Some("postfix/smtpd"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Batch Processing
//!
//! ```rust
//! use grok_engine::{Event, GrokConfig, GrokEngine};
//!
//! let engine = GrokEngine::new(GrokConfig::new().with_match("message", ["%{INT:n:int}"]))?;
//! let mut events: Vec<Event> = (0..100).map(|i| Event::with_message(format!("n={i}"))).collect();
//!
//! let outcomes = engine.filter_batch(&mut events);
//! assert!(outcomes.iter().all(|o| o.is_matched()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`patterns`] - Built-in pattern library and the layered [`PatternRegistry`]
//! - [`compiler`] - Recursive `%{...}` expansion into a [`CompiledMatcher`]
//! - [`timeout`] - Ledger, monitor thread and per-thread match executors
//! - [`engine`] - Field / pattern / value loop, capture merge and tagging
//! - [`event`] - JSON record model
//!
//! ## Timeouts
//!
//! Every match attempt runs under a [`Deadline`]. The scope of the deadline is
//! configurable ([`TimeoutScope`]): per pattern attempt, pooled per field, or
//! pooled per record. A timed-out record is tagged `_groktimeout` instead of
//! `_grokparsefailure`.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and installs no subscriber.

pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod matcher;
pub mod patterns;
pub mod timeout;

// Engine interface
pub use engine::{FieldMatchers, FieldOutcome, FilterOutcome, GrokEngine};

// Compiler, patterns and configuration
pub use compiler::{compile, CaptureField, Coercion, PatternCompiler};
pub use config::GrokConfig;
pub use patterns::{PatternRegistry, PatternSource};

// Core types and errors
pub use error::{GrokError, Result};
pub use event::{Event, FieldValue};
pub use matcher::{Capture, CompiledMatcher, MatchOutcome};

// Timeout enforcement
pub use timeout::{Deadline, TimeoutEnforcer, TimeoutScope};
