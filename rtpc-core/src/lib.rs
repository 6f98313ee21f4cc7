//! # rtpc-core
//!
//! Scoped real-time parameter engine. Drivers set parameter values at any
//! scope (global, one game object, one playing instance, one MIDI note...);
//! subscribers convert them through curves and push the result to their
//! registered targets, while narrower values are never clobbered by broader
//! updates.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rtpc_core::{Config, RtpcContext};
//! use rtpc_types::*;
//!
//! // 1. Build the context from the built-in config plus the user's file
//! let mut rtpc = RtpcContext::new(Config::load());
//!
//! // 2. A sound node whose volume follows game parameter 100
//! let node = rtpc.add_subscriber(SubscriberKind::Node)?;
//! rtpc.subscribe(node, ParamId::VOLUME, CurveId::new(1), Accumulation::Additive,
//!     RtpcKey::any(), ParamId::new(100), SourceKind::GameParameter,
//!     Curve::linear(0.0, -96.0, 1.0, 0.0))?;
//!
//! // 3. A voice registers to hear volume changes for its game object
//! let key = RtpcKey::for_object(GameObjectId::new(1));
//! let wanted = ParamBits::from_params([ParamId::VOLUME]);
//! let handle = rtpc.register_parameter_target(Box::new(voice), key, wanted, node, true)?;
//!
//! // 4. The game sets the driver; the voice receives -48 dB
//! rtpc.set_value(ParamId::new(100), 0.5, &key, TransitionParams::immediate())?;
//!
//! // 5. Once per audio block: advance ramps
//! rtpc.tick(block_duration)?;
//!
//! // 6. Unregister before dropping the voice
//! let voice = rtpc.unregister_parameter_target(handle)?;
//! ```
//!
//! ## Module Overview
//!
//! - [`context`] — `RtpcContext`, the facade owning everything below
//! - [`store`] — `ScopedValueStore`, the best-match tree behind every parameter
//! - [`registry`] — subscriptions and their curve bindings
//! - [`directory`] — per-subscriber sorted target directory and fan-out scan
//! - [`dispatch`] — exception checking and priority ordering of a push pass
//! - [`transition`] — ramps advanced by `tick`
//! - [`telemetry`] — observer hooks (`NullObserver`, `LogObserver`, `ChannelObserver`)
//! - [`config`] — TOML configuration and the default value table

pub mod config;
pub mod context;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod store;
pub mod targets;
pub mod telemetry;
pub mod transition;
pub mod values;

pub use config::{Config, DefaultValues, ParamDefault};
pub use context::RtpcContext;
pub use directory::{ExceptionChecker, TargetDirectory};
pub use error::{RtpcError, RtpcResult};
pub use store::{ExactMatch, ScopedValueStore, Visit};
pub use targets::{ChannelTarget, ParameterTarget, TargetHandle, TargetUpdate};
pub use telemetry::{ChannelObserver, LogObserver, NullObserver, RtpcObserver, TelemetryEvent};
pub use values::{AutomatedParams, RtpcValue};
