//! Player core service.
//!
//! This crate composes the playback controller and the metadata scan engine
//! into one [`PlayerCore`] that a host application constructs once, runs on
//! its tokio runtime and talks to through cloneable [`CoreHandle`]s.
//!
//! ```no_run
//! # async fn example(factory: &dyn bridge_traits::EngineFactory) -> core_service::Result<()> {
//! use core_runtime::config::CoreConfig;
//! use core_service::PlayerCore;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = CoreConfig::default();
//! core_runtime::logging::init_logging(config.logging.clone())?;
//!
//! let (core, handle) = PlayerCore::new(config, factory)?;
//! let shutdown = CancellationToken::new();
//! let task = core.spawn(shutdown.clone())?;
//!
//! handle.load(Some("file:///music/track1.ogg")).await?;
//! handle.set_playing(true).await?;
//!
//! shutdown.cancel();
//! let _ = task.await;
//! # Ok(())
//! # }
//! ```

mod command;
pub mod error;
mod handle;
mod player;

pub use crate::command::PlayerStatus;
pub use crate::error::{CoreError, Result};
pub use crate::handle::CoreHandle;
pub use crate::player::PlayerCore;
