// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Error types for the few fallible entry points.
//!
//! Ordinary misuse of the scheduler (stale handles, nonsensical intervals,
//! scheduling on a dead owner through the plain API) never produces an error;
//! these types only surface through the explicit `try_*` forms and config
//! loading.

use crate::scheduler::OwnerId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("owner `{name}` ({id}) has been destroyed")]
    OwnerDestroyed { id: OwnerId, name: String },

    #[error("scheduler instance for this thread is already initialized")]
    InstanceAlreadyInitialized,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;
