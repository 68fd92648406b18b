#![warn(missing_docs)]
//! Backend trait and plugin architecture for Tessel.
//!
//! A lowered kernel is an IR [`Module`] plus the launch grid it must run on.
//! Turning that into something a GPU can execute is the job of an external
//! kernel compiler; the [`Backend`] trait is the seam it plugs into. The
//! [`BackendRegistry`] dispatches on the CLI `--target`, and the built-in
//! [`IrDumpBackend`] renders the IR as text.

use std::fmt::{self, Debug};

use tessel_ir::{Module, dump_module};

/// A backend that compiles Tessel kernel IR to target-specific output.
pub trait Backend: Debug + Send + Sync {
    /// Human-readable name (e.g. "ptx").
    fn name(&self) -> &str;

    /// Target identifiers this backend handles (for `--target` dispatch).
    fn targets(&self) -> &[&str];

    /// Compiles a lowered kernel module for launch over `grid`.
    fn compile(
        &self,
        module: &Module,
        grid: &[usize],
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError>;
}

/// Options passed to a backend during compilation.
#[derive(Clone, Debug, Default)]
pub struct BackendOptions {
    /// The target identifier the backend was selected with.
    pub target: String,
    /// Optimization level forwarded to the kernel compiler (0 = none, 3 = aggressive).
    pub opt_level: u8,
}

impl fmt::Display for BackendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BackendOptions {{ target: {}, opt_level: {} }}",
            self.target, self.opt_level
        )
    }
}

/// Launch metadata of a compiled kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledKernel {
    /// Entry point name.
    pub name: String,
    /// Launch grid, at most three axes.
    pub grid: Vec<usize>,
    /// Number of kernel arguments the launcher must bind.
    pub num_arguments: usize,
}

impl CompiledKernel {
    /// Reads the launch metadata of the module's first entry point.
    pub fn describe(module: &Module, grid: &[usize]) -> Result<Self, BackendError> {
        let entry = module
            .entry_points
            .first()
            .ok_or_else(|| BackendError::Other("module has no entry point".into()))?;
        Ok(Self {
            name: entry.name.clone(),
            grid: grid.to_vec(),
            num_arguments: entry.function.arguments.len(),
        })
    }
}

impl fmt::Display for CompiledKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} argument(s), grid {:?})",
            self.name, self.num_arguments, self.grid
        )
    }
}

/// The output produced by a backend.
#[derive(Clone, Debug)]
pub struct BackendOutput {
    /// The kernel the files implement.
    pub kernel: CompiledKernel,
    /// One or more output files.
    pub files: Vec<OutputFile>,
    /// Non-fatal diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for BackendOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} file(s), {} diagnostic(s)",
            self.kernel.name,
            self.files.len(),
            self.diagnostics.len()
        )
    }
}

/// A single output file.
#[derive(Clone, Debug)]
pub struct OutputFile {
    /// Suggested filename (e.g. "kernel.ptx", "module.ir").
    pub name: String,
    /// The file content.
    pub content: OutputContent,
}

impl fmt::Display for OutputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Content of an output file.
#[derive(Clone, Debug)]
pub enum OutputContent {
    /// UTF-8 text.
    Text(String),
    /// Raw binary data.
    Binary(Vec<u8>),
}

impl fmt::Display for OutputContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "Text({} chars)", s.len()),
            Self::Binary(b) => write!(f, "Binary({} bytes)", b.len()),
        }
    }
}

/// A non-fatal diagnostic message from a backend.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Severity level.
    pub level: DiagnosticLevel,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Severity level for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// A warning that does not prevent compilation.
    Warning,
    /// An informational note.
    Info,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "Warning",
            Self::Info => "Info",
        })
    }
}

/// Errors that can occur during backend compilation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The module uses an IR feature not supported by this backend.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// The launch grid cannot be mapped onto the device.
    #[error("invalid launch grid {0:?}")]
    InvalidGrid(Vec<usize>),
    /// A general backend error.
    #[error("{0}")]
    Other(String),
}

/// Registry of available backends, used for CLI `--target` dispatch.
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Creates a registry pre-populated with built-in backends.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(IrDumpBackend));
        reg
    }

    /// Registers a backend.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        log::debug!("registering backend '{}'", backend.name());
        self.backends.push(backend);
    }

    /// Finds a backend that handles the given target identifier.
    pub fn find(&self, target: &str) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.targets().contains(&target))
            .map(|b| &**b)
    }

    /// Lists all supported target identifiers.
    pub fn list_targets(&self) -> Vec<&str> {
        self.backends
            .iter()
            .flat_map(|b| b.targets().iter().copied())
            .collect()
    }
}

/// Built-in backend that dumps the IR as text using [`tessel_ir::dump_module`].
#[derive(Debug)]
pub struct IrDumpBackend;

impl Backend for IrDumpBackend {
    fn name(&self) -> &str {
        "IR Dump"
    }

    fn targets(&self) -> &[&str] {
        &["ir-dump", "ir"]
    }

    fn compile(
        &self,
        module: &Module,
        grid: &[usize],
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        if !opts.target.is_empty() && !self.targets().contains(&opts.target.as_str()) {
            return Err(BackendError::Unsupported(format!("target '{}'", opts.target)));
        }
        if grid.len() > 3 || grid.contains(&0) {
            return Err(BackendError::InvalidGrid(grid.to_vec()));
        }
        let kernel = CompiledKernel::describe(module, grid)?;
        let text = dump_module(module);
        let mut diagnostics = vec![Diagnostic {
            level: DiagnosticLevel::Info,
            message: format!("launch grid {grid:?}"),
        }];
        if opts.opt_level > 0 {
            diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Warning,
                message: format!("opt_level {} has no effect on an IR dump", opts.opt_level),
            });
        }
        Ok(BackendOutput {
            diagnostics,
            kernel,
            files: vec![OutputFile {
                name: "module.ir".into(),
                content: OutputContent::Text(text),
            }],
        })
    }
}
