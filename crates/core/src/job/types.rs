//! Job descriptor types.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use super::error::JobError;

/// Identity of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random job id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Shape of the packaged output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// A single self-extracting executable.
    #[default]
    SingleFile,
    /// A directory containing the executable and its dependencies.
    SingleDirectory,
}

impl OutputMode {
    /// Packager flag selecting this mode.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::SingleFile => "--onefile",
            Self::SingleDirectory => "--onedir",
        }
    }
}

/// Whether the produced executable opens a console window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleMode {
    #[default]
    Windowed,
    Console,
}

impl ConsoleMode {
    /// Packager flag selecting this mode.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Windowed => "--windowed",
            Self::Console => "--console",
        }
    }
}

/// A four-part numeric file version (`X.X.X.X`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileVersion([u16; 4]);

impl FileVersion {
    /// Version used when only copyright metadata is supplied.
    pub const DEFAULT: FileVersion = FileVersion([1, 0, 0, 0]);

    /// Parses a version string. Each part must be a decimal number that fits
    /// a Windows version field.
    pub fn parse(input: &str) -> Result<Self, JobError> {
        let trimmed = input.trim();
        let pattern = Regex::new(r"^(\d+)\.(\d+)\.(\d+)\.(\d+)$")
            .map_err(|e| JobError::invalid(format!("version pattern: {}", e)))?;

        let caps = pattern.captures(trimmed).ok_or_else(|| {
            JobError::invalid(format!(
                "file version '{}' must have the form X.X.X.X with numeric parts",
                input
            ))
        })?;

        let mut parts = [0u16; 4];
        for (slot, idx) in parts.iter_mut().zip(1..=4) {
            let raw = caps.get(idx).map(|m| m.as_str()).unwrap_or_default();
            *slot = raw.parse::<u16>().map_err(|_| {
                JobError::invalid(format!(
                    "file version '{}' has a part out of range (0-65535)",
                    input
                ))
            })?;
        }

        Ok(Self(parts))
    }

    /// The four numeric components.
    pub fn parts(&self) -> [u16; 4] {
        self.0
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

/// Ordered, de-duplicated set of hidden-import module names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct HiddenImports(Vec<String>);

impl HiddenImports {
    /// Parses a comma-separated list, dropping blanks and repeated names.
    pub fn parse(input: &str) -> Self {
        Self::from_iter(input.split(','))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for HiddenImports {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut names: Vec<String> = Vec::new();
        for raw in iter {
            let name = raw.as_ref().trim();
            if name.is_empty() || names.iter().any(|n| n == name) {
                continue;
            }
            names.push(name.to_string());
        }
        Self(names)
    }
}

impl From<Vec<String>> for HiddenImports {
    fn from(names: Vec<String>) -> Self {
        names.into_iter().collect()
    }
}

impl From<HiddenImports> for Vec<String> {
    fn from(imports: HiddenImports) -> Self {
        imports.0
    }
}

/// Splits a raw extra-arguments string on whitespace.
///
/// Quoting is not interpreted; tokens are passed to the packager verbatim.
pub fn split_extra_args(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_string).collect()
}

/// An auxiliary directory bundled next to the packaged program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuxDir {
    /// Directory on disk. Relative paths resolve against the script's directory.
    pub source: PathBuf,
    /// Destination name inside the bundle.
    pub destination: String,
}

impl AuxDir {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// Parameters of one conversion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Absolute path of the `.py` script to package.
    pub source: PathBuf,
    #[serde(default)]
    pub output_mode: OutputMode,
    #[serde(default)]
    pub console_mode: ConsoleMode,
    /// Output directory; defaults to the script's directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Output base name; defaults to the script's file stem.
    #[serde(default)]
    pub output_name: Option<String>,
    /// `.png` or `.ico` icon.
    #[serde(default)]
    pub icon: Option<PathBuf>,
    /// `.ico` produced from a `.png` icon by the pre-processing step.
    #[serde(default)]
    pub converted_icon: Option<PathBuf>,
    #[serde(default)]
    pub file_version: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default)]
    pub hidden_imports: HiddenImports,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub aux_dirs: Vec<AuxDir>,
}

impl JobDescriptor {
    /// Creates a descriptor with default options for the given script.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output_mode: OutputMode::default(),
            console_mode: ConsoleMode::default(),
            output_dir: None,
            output_name: None,
            icon: None,
            converted_icon: None,
            file_version: None,
            copyright: None,
            hidden_imports: HiddenImports::default(),
            extra_args: Vec::new(),
            aux_dirs: Vec::new(),
        }
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_console_mode(mut self, mode: ConsoleMode) -> Self {
        self.console_mode = mode;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<PathBuf>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_file_version(mut self, version: impl Into<String>) -> Self {
        self.file_version = Some(version.into());
        self
    }

    pub fn with_copyright(mut self, copyright: impl Into<String>) -> Self {
        self.copyright = Some(copyright.into());
        self
    }

    pub fn with_hidden_imports(mut self, imports: HiddenImports) -> Self {
        self.hidden_imports = imports;
        self
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_aux_dir(mut self, aux: AuxDir) -> Self {
        self.aux_dirs.push(aux);
        self
    }

    /// Directory containing the source script; also the packager's working directory.
    pub fn source_dir(&self) -> PathBuf {
        match self.source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// File stem of the source script.
    pub fn source_stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Output directory after applying the default.
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.source_dir())
    }

    /// Output base name after applying the default.
    pub fn resolved_output_name(&self) -> String {
        self.output_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.source_stem())
    }

    /// Paths a packager run writes under: the output location, and the working
    /// location next to the script that holds the generated spec file, the
    /// build directory and the temporary version and icon files. Two jobs
    /// sharing either must not run together.
    pub fn write_locations(&self) -> [PathBuf; 2] {
        let name = self.resolved_output_name();
        [
            self.resolved_output_dir().join(&name),
            self.source_dir().join(&name),
        ]
    }

    /// Expected path of the produced executable.
    pub fn expected_executable(&self) -> PathBuf {
        let name = self.resolved_output_name();
        let exe = format!("{}{}", name, std::env::consts::EXE_SUFFIX);
        match self.output_mode {
            OutputMode::SingleFile => self.resolved_output_dir().join(exe),
            OutputMode::SingleDirectory => self.resolved_output_dir().join(&name).join(exe),
        }
    }

    /// Whether a version resource must be generated for this job.
    pub fn needs_version_file(&self) -> bool {
        self.file_version
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
            || self
                .copyright
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty())
    }

    /// The parsed file version, falling back to the default when only a
    /// copyright is set.
    pub fn effective_version(&self) -> Result<FileVersion, JobError> {
        match self.file_version.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => FileVersion::parse(v),
            _ => Ok(FileVersion::DEFAULT),
        }
    }

    /// Where the generated version resource is written before launch.
    pub fn version_file_path(&self) -> PathBuf {
        self.source_dir()
            .join(format!("{}.version_info.txt", self.resolved_output_name()))
    }

    /// Where a converted `.ico` is written by the icon pre-processing step.
    pub fn converted_icon_path(&self) -> PathBuf {
        self.source_dir()
            .join(format!("{}.icon_converted.ico", self.resolved_output_name()))
    }

    /// Whether the supplied icon still needs conversion to `.ico`.
    pub fn icon_needs_conversion(&self) -> bool {
        self.converted_icon.is_none()
            && self
                .icon
                .as_deref()
                .is_some_and(|icon| has_extension(icon, "png"))
    }

    /// Resolves an auxiliary directory source against the script's directory.
    pub fn resolve_aux_source(&self, aux: &AuxDir) -> PathBuf {
        if aux.source.is_absolute() {
            aux.source.clone()
        } else {
            self.source_dir().join(&aux.source)
        }
    }

    /// Checks the parameters that can be judged without touching the filesystem.
    ///
    /// All issues are collected and reported together.
    pub fn check(&self) -> Result<(), JobError> {
        let issues = self.format_issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(JobError::InvalidConfiguration { issues })
        }
    }

    /// Full pre-flight validation, including existence of referenced paths.
    pub fn validate(&self) -> Result<(), JobError> {
        let mut issues = self.format_issues();

        if self.source.is_absolute() && !self.source.is_file() {
            issues.push(format!(
                "source script does not exist: {}",
                self.source.display()
            ));
        }

        if let Some(icon) = &self.icon {
            if !icon.is_file() {
                issues.push(format!("icon file does not exist: {}", icon.display()));
            }
        }

        for aux in &self.aux_dirs {
            if aux.source.as_os_str().is_empty() {
                continue;
            }
            let resolved = self.resolve_aux_source(aux);
            if !resolved.is_dir() {
                issues.push(format!(
                    "auxiliary directory does not exist: {}",
                    resolved.display()
                ));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(JobError::InvalidConfiguration { issues })
        }
    }

    fn format_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.source.is_absolute() {
            issues.push(format!(
                "source path must be absolute: {}",
                self.source.display()
            ));
        }
        if !has_extension(&self.source, "py") {
            issues.push(format!(
                "source must be a .py script: {}",
                self.source.display()
            ));
        }

        if let Some(name) = &self.output_name {
            if name.contains(|c| c == '/' || c == '\\') {
                issues.push(format!(
                    "output name must not contain path separators: {}",
                    name
                ));
            }
        }

        if let Some(icon) = &self.icon {
            if !has_extension(icon, "png") && !has_extension(icon, "ico") {
                issues.push(format!(
                    "icon must be a .png or .ico file: {}",
                    icon.display()
                ));
            }
        }
        if let Some(converted) = &self.converted_icon {
            if !has_extension(converted, "ico") {
                issues.push(format!(
                    "converted icon must be an .ico file: {}",
                    converted.display()
                ));
            }
        }

        if let Some(version) = self.file_version.as_deref() {
            if !version.trim().is_empty() {
                if let Err(e) = FileVersion::parse(version) {
                    issues.extend(e.issues());
                }
            }
        }

        for aux in &self.aux_dirs {
            if aux.source.as_os_str().is_empty() {
                issues.push("auxiliary directory source must not be empty".to_string());
            }
            if aux.destination.trim().is_empty() {
                issues.push(format!(
                    "auxiliary directory {} needs a destination name",
                    aux.source.display()
                ));
            }
        }

        issues
    }
}

/// Case-insensitive extension check.
pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
