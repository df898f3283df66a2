//! Version resource file consumed by the packager's `--version-file` flag.

use std::path::Path;

use crate::job::{FileVersion, JobDescriptor, JobError};

/// Windows version metadata for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionResource {
    pub name: String,
    pub version: FileVersion,
    pub copyright: String,
}

impl VersionResource {
    /// Derives the version resource for a job, if it needs one.
    pub fn from_job(job: &JobDescriptor) -> Result<Option<Self>, JobError> {
        if !job.needs_version_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            name: job.resolved_output_name(),
            version: job.effective_version()?,
            copyright: job
                .copyright
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
        }))
    }

    /// Renders the resource in the packager's VSVersionInfo text format.
    pub fn render(&self) -> String {
        let [a, b, c, d] = self.version.parts();
        let tuple = format!("({}, {}, {}, {})", a, b, c, d);
        let version = self.version.to_string();
        let exe_name = format!("{}.exe", self.name);

        let strings = [
            ("CompanyName", ""),
            ("FileDescription", self.name.as_str()),
            ("FileVersion", version.as_str()),
            ("InternalName", exe_name.as_str()),
            ("LegalCopyright", self.copyright.as_str()),
            ("OriginalFilename", exe_name.as_str()),
            ("ProductName", self.name.as_str()),
            ("ProductVersion", version.as_str()),
        ]
        .iter()
        .map(|(key, value)| {
            format!(
                "          StringStruct({}, {})",
                python_str(key),
                python_str(value)
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");

        format!(
            "# UTF-8\n\
VSVersionInfo(\n\
  ffi=FixedFileInfo(\n\
    filevers={tuple},\n\
    prodvers={tuple},\n\
    mask=0x3f,\n\
    flags=0x0,\n\
    OS=0x40004,\n\
    fileType=0x1,\n\
    subtype=0x0,\n\
    date=(0, 0)\n\
  ),\n\
  kids=[\n\
    StringFileInfo(\n\
      [\n\
        StringTable(\n\
          '040904E4',\n\
          [\n\
{strings}\n\
          ]\n\
        )\n\
      ]\n\
    ),\n\
    VarFileInfo([VarStruct('Translation', [1033, 1200])])\n\
  ]\n\
)\n",
            tuple = tuple,
            strings = strings,
        )
    }

    /// Writes the rendered resource to `path`.
    pub async fn write_to(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, self.render()).await
    }
}

/// Quotes a value as a Python string literal.
fn python_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}
