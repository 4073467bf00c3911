//! Compiled programs and the program store
//!
//! A [`Program`] is immutable once built and shared by every task that runs
//! it through an `Arc`. The [`ProgramStore`] is the cache that keeps programs
//! alive between task lifetimes; a program is dropped once the store and the
//! last task referencing it let go.

pub mod loader;

pub use loader::{parse_program, LoadError};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::vm::Instr;

/// File extension of script assembly sources.
pub const SCRIPT_EXTENSION: &str = "scr";

/// An immutable, named, compiled script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    name: Arc<str>,
    code: Vec<Instr>,
}

impl Program {
    pub fn new(
        name: impl AsRef<str>,
        code: Vec<Instr>,
    ) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            code,
        }
    }

    /// A program with no body, as left behind by a failed compile.
    pub fn empty(name: impl AsRef<str>) -> Self {
        Self::new(name, Vec::new())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn code(&self) -> &[Instr] {
        &self.code
    }

    #[inline]
    pub fn has_body(&self) -> bool {
        !self.code.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// How a caller names a script.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScriptDescriptor {
    /// A file path, used as given
    Exact(PathBuf),
    /// A logical name relative to the store root, extension optional
    Logical(String),
}

impl ScriptDescriptor {
    pub fn exact(path: impl Into<PathBuf>) -> Self {
        ScriptDescriptor::Exact(path.into())
    }

    pub fn logical(name: impl Into<String>) -> Self {
        ScriptDescriptor::Logical(name.into())
    }

    /// Name used for the cache and for diagnostics.
    pub fn name(&self) -> String {
        match self {
            ScriptDescriptor::Exact(path) => path.display().to_string(),
            ScriptDescriptor::Logical(name) => logical_key(name),
        }
    }
}

impl std::fmt::Display for ScriptDescriptor {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

fn logical_key(name: &str) -> String {
    let trimmed = name
        .strip_suffix(SCRIPT_EXTENSION)
        .and_then(|n| n.strip_suffix('.'))
        .unwrap_or(name);
    trimmed.replace('\\', "/")
}

/// Program lookup.
pub trait ProgramResolver {
    /// Get a shared program by descriptor, or nothing if it cannot be read.
    fn resolve(
        &mut self,
        descriptor: &ScriptDescriptor,
    ) -> Option<Arc<Program>>;
}

/// Program cache backed by the filesystem.
#[derive(Debug, Default)]
pub struct ProgramStore {
    root: Option<PathBuf>,
    cache: IndexMap<String, Arc<Program>>,
}

impl ProgramStore {
    /// Store with no search root; logical names resolve against the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store resolving logical names under `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            cache: IndexMap::new(),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Add an in-memory program, replacing any cached one with the same name.
    pub fn insert(
        &mut self,
        program: Program,
    ) -> Arc<Program> {
        let program = Arc::new(program);
        self.cache
            .insert(program.name().to_string(), Arc::clone(&program));
        program
    }

    /// Parse a file and cache it under `name`.
    pub fn load_file(
        &mut self,
        path: &Path,
        name: &str,
    ) -> Result<Arc<Program>, LoadError> {
        let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let program = Arc::new(parse_program(name, &source)?);
        debug!(script = name, instructions = program.len(), "program loaded");
        self.cache.insert(name.to_string(), Arc::clone(&program));
        Ok(program)
    }

    /// Load every `.scr` file under `dir`, named by their path relative to it.
    pub fn load_dir(
        &mut self,
        dir: &Path,
    ) -> Result<Vec<Arc<Program>>, LoadError> {
        let mut loaded = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(SCRIPT_EXTENSION)
            {
                continue;
            }
            let relative = path.strip_prefix(dir).unwrap_or(path);
            let name = logical_key(&relative.to_string_lossy());
            loaded.push(self.load_file(path, &name)?);
        }
        Ok(loaded)
    }

    /// Look up a cached program without touching the filesystem.
    pub fn get(
        &self,
        name: &str,
    ) -> Option<Arc<Program>> {
        self.cache.get(name).cloned()
    }

    /// Drop the cache's reference to a program. Tasks still running it keep it alive.
    pub fn unload(
        &mut self,
        name: &str,
    ) -> Option<Arc<Program>> {
        self.cache.shift_remove(name)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Cached program names, in load order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cache.keys().map(String::as_str)
    }

    fn path_for(
        &self,
        descriptor: &ScriptDescriptor,
    ) -> PathBuf {
        match descriptor {
            ScriptDescriptor::Exact(path) => path.clone(),
            ScriptDescriptor::Logical(name) => {
                let file = format!("{}.{}", logical_key(name), SCRIPT_EXTENSION);
                match &self.root {
                    Some(root) => root.join(file),
                    None => PathBuf::from(file),
                }
            }
        }
    }
}

impl ProgramResolver for ProgramStore {
    fn resolve(
        &mut self,
        descriptor: &ScriptDescriptor,
    ) -> Option<Arc<Program>> {
        let name = descriptor.name();
        if let Some(program) = self.cache.get(&name) {
            return Some(Arc::clone(program));
        }
        let path = self.path_for(descriptor);
        match self.load_file(&path, &name) {
            Ok(program) => Some(program),
            Err(e) => {
                error!("Error reading script {}: {}", name, e);
                None
            }
        }
    }
}
