//! Runtime abstraction for process environment and file access.
//!
//! This module provides a trait-based abstraction over the system operations
//! configuration loading needs, enabling dependency injection and testability.
//!
//! # Structure
//!
//! - `env` - Environment variables and working directory
//! - `fs` - File system reads

mod env;
mod fs;

use anyhow::Result;
use std::env as std_env;
use std::path::{Path, PathBuf};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    /// All environment variables of the process. Entries that are not valid
    /// unicode are skipped.
    fn env_vars(&self) -> Vec<(String, String)>;

    fn current_dir(&self) -> Result<PathBuf>;

    // File System
    fn exists(&self, path: &Path) -> bool;
    fn read_to_string(&self, path: &Path) -> Result<String>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn env_vars(&self) -> Vec<(String, String)> {
        self.env_vars_impl()
    }

    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }
}
