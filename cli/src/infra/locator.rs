//! Infrastructure implementation of the `ToolLocator` port.

use std::path::PathBuf;

use crate::application::ports::ToolLocator;

/// Looks executables up on the process `PATH` with `which`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathLocator;

impl ToolLocator for PathLocator {
    fn find(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}
