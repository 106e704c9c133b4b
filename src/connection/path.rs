// Copyright (c) 2023 The TQUIC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rustc_hash::FxHashMap;

use crate::congestion_control::SendAlgorithm;
use crate::Error;
use crate::Result;

/// Path identifier of a multipath connection.
pub type PathId = u64;

/// Congestion controllers of a connection, one per path.
///
/// The table is owned by the path manager of a connection and handed to the
/// packet pipeline by reference. Each controller keeps its own history, the
/// only state shared between paths is what the RTT sources expose.
#[derive(Debug, Default)]
pub struct PathRegistry {
    /// Controllers indexed by path identifier.
    paths: FxHashMap<PathId, Box<dyn SendAlgorithm>>,

    /// The maximum number of paths allowed.
    max_paths: usize,
}

impl PathRegistry {
    pub fn new(max_paths: usize) -> Self {
        Self {
            paths: FxHashMap::default(),
            max_paths,
        }
    }

    /// Register the controller of a new path.
    pub fn insert(&mut self, path_id: PathId, cc: Box<dyn SendAlgorithm>) -> Result<()> {
        if self.paths.contains_key(&path_id) {
            return Err(Error::InvalidOperation(format!(
                "path {} exists",
                path_id
            )));
        }
        if self.paths.len() >= self.max_paths {
            return Err(Error::Done);
        }

        self.paths.insert(path_id, cc);
        Ok(())
    }

    /// Get an immutable reference to the controller of `path_id`.
    pub fn get(&self, path_id: PathId) -> Result<&dyn SendAlgorithm> {
        self.paths
            .get(&path_id)
            .map(|cc| cc.as_ref())
            .ok_or(Error::InternalError)
    }

    /// Get a mutable reference to the controller of `path_id`.
    pub fn get_mut(&mut self, path_id: PathId) -> Result<&mut Box<dyn SendAlgorithm>> {
        self.paths.get_mut(&path_id).ok_or(Error::InternalError)
    }

    /// Remove the controller of an abandoned path.
    pub fn remove(&mut self, path_id: PathId) -> Option<Box<dyn SendAlgorithm>> {
        self.paths.remove(&path_id)
    }

    /// Return an immutable iterator over all controllers.
    pub fn iter(&self) -> impl Iterator<Item = (&PathId, &Box<dyn SendAlgorithm>)> {
        self.paths.iter()
    }

    /// Return a mutable iterator over all controllers.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&PathId, &mut Box<dyn SendAlgorithm>)> {
        self.paths.iter_mut()
    }

    /// Return the number of paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
