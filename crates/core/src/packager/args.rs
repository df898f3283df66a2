//! Argument builder: maps a job descriptor to packager command-line tokens.

use std::path::PathBuf;

use crate::job::{JobDescriptor, JobError};

use super::config::PackagerConfig;

/// Separator between source and destination in `--add-data` values.
const ADD_DATA_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Directory the packager writes to when no `--distpath` is given,
/// relative to its working directory.
const DEFAULT_DIST_DIR: &str = "dist";

/// Builds packager arguments for job descriptors.
///
/// Building is deterministic and free of I/O: the same descriptor always
/// yields the same tokens.
#[derive(Debug, Clone)]
pub struct ArgumentBuilder {
    clean: bool,
    noconfirm: bool,
}

impl Default for ArgumentBuilder {
    fn default() -> Self {
        Self::new(&PackagerConfig::default())
    }
}

/// Builds packager arguments using the default packager options.
pub fn build_arguments(job: &JobDescriptor) -> Result<Vec<String>, JobError> {
    ArgumentBuilder::default().build(job)
}

impl ArgumentBuilder {
    /// Creates a builder honoring the packager config's global flags.
    pub fn new(config: &PackagerConfig) -> Self {
        Self {
            clean: config.clean,
            noconfirm: config.noconfirm,
        }
    }

    /// Builds the token list for one job.
    ///
    /// Fails with `InvalidConfiguration` listing every problem found, including
    /// a `.png` icon that has not been converted to `.ico` yet.
    pub fn build(&self, job: &JobDescriptor) -> Result<Vec<String>, JobError> {
        let mut issues = match job.check() {
            Ok(()) => Vec::new(),
            Err(e) => e.issues(),
        };

        let icon = match self.icon_argument(job) {
            Ok(icon) => icon,
            Err(issue) => {
                issues.push(issue);
                None
            }
        };

        if !issues.is_empty() {
            return Err(JobError::InvalidConfiguration { issues });
        }

        let mut args = vec![
            job.output_mode.flag().to_string(),
            job.console_mode.flag().to_string(),
        ];

        if self.clean {
            args.push("--clean".to_string());
        }
        if self.noconfirm {
            args.push("--noconfirm".to_string());
        }

        // Output location, only when it differs from the packager's defaults
        let output_dir = job.resolved_output_dir();
        if output_dir != job.source_dir().join(DEFAULT_DIST_DIR) {
            args.extend([
                "--distpath".to_string(),
                output_dir.to_string_lossy().to_string(),
            ]);
        }

        let output_name = job.resolved_output_name();
        if output_name != job.source_stem() {
            args.extend(["--name".to_string(), output_name]);
        }

        if let Some(icon) = icon {
            args.push(format!("--icon={}", icon.to_string_lossy()));
        }

        if job.needs_version_file() {
            args.push(format!(
                "--version-file={}",
                job.version_file_path().to_string_lossy()
            ));
        }

        args.extend(
            job.hidden_imports
                .iter()
                .map(|name| format!("--hidden-import={}", name)),
        );

        // Extra args go through untouched apart from trimming
        args.extend(
            job.extra_args
                .iter()
                .map(|a| a.trim())
                .filter(|a| !a.is_empty())
                .map(str::to_string),
        );

        for aux in &job.aux_dirs {
            args.extend([
                "--add-data".to_string(),
                format!(
                    "{}{}{}",
                    aux.source.to_string_lossy(),
                    ADD_DATA_SEPARATOR,
                    aux.destination.trim()
                ),
            ]);
        }

        args.push(job.source.to_string_lossy().to_string());

        Ok(args)
    }

    /// Picks the `.ico` to hand to the packager.
    fn icon_argument(&self, job: &JobDescriptor) -> Result<Option<PathBuf>, String> {
        if let Some(converted) = &job.converted_icon {
            return Ok(Some(converted.clone()));
        }

        match &job.icon {
            None => Ok(None),
            Some(icon) if job.icon_needs_conversion() => Err(format!(
                "icon {} is a .png and has not been converted to .ico",
                icon.display()
            )),
            // Unsupported extensions are reported by the descriptor check
            Some(icon) => Ok(Some(icon.clone())),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::job::{AuxDir, ConsoleMode, HiddenImports, OutputMode};

    fn job() -> JobDescriptor {
        JobDescriptor::new("/work/app/main.py")
    }

    fn count(args: &[String], flag: &str) -> usize {
        args.iter().filter(|a| a.as_str() == flag).count()
    }

    #[test]
    fn test_minimal_job() {
        let args = build_arguments(&job()).unwrap();
        assert_eq!(
            args,
            vec![
                "--onefile",
                "--windowed",
                "--clean",
                "--noconfirm",
                "--distpath",
                "/work/app",
                "/work/app/main.py",
            ]
        );
    }

    #[test]
    fn test_mode_flags_are_mutually_exclusive() {
        for output in [OutputMode::SingleFile, OutputMode::SingleDirectory] {
            for console in [ConsoleMode::Windowed, ConsoleMode::Console] {
                let args =
                    build_arguments(&job().with_output_mode(output).with_console_mode(console))
                        .unwrap();
                assert_eq!(count(&args, "--onefile") + count(&args, "--onedir"), 1);
                assert_eq!(count(&args, "--console") + count(&args, "--windowed"), 1);
                assert!(args.contains(&output.flag().to_string()));
                assert!(args.contains(&console.flag().to_string()));
            }
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let descriptor = job()
            .with_output_name("tool")
            .with_file_version("1.0.0.0")
            .with_hidden_imports(HiddenImports::parse("a,b"))
            .with_aux_dir(AuxDir::new("assets", "assets"));
        let first = build_arguments(&descriptor).unwrap();
        let second = build_arguments(&descriptor.clone()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_default_dist_dir_and_name_are_omitted() {
        let descriptor = job()
            .with_output_dir("/work/app/dist")
            .with_output_name("main");
        let args = build_arguments(&descriptor).unwrap();
        assert!(!args.contains(&"--distpath".to_string()));
        assert!(!args.contains(&"--name".to_string()));
    }

    #[test]
    fn test_custom_output_location() {
        let descriptor = job().with_output_dir("/out").with_output_name("tool");
        let args = build_arguments(&descriptor).unwrap();
        let pos = args.iter().position(|a| a == "--distpath").unwrap();
        assert_eq!(args[pos + 1], "/out");
        let pos = args.iter().position(|a| a == "--name").unwrap();
        assert_eq!(args[pos + 1], "tool");
    }

    #[test]
    fn test_raw_png_icon_is_rejected() {
        let err = build_arguments(&job().with_icon("/icons/app.png")).unwrap_err();
        assert!(matches!(err, JobError::InvalidConfiguration { .. }));
        assert!(err.to_string().contains("not been converted"));
    }

    #[test]
    fn test_converted_png_icon_is_used() {
        let mut descriptor = job().with_icon("/icons/app.png");
        descriptor.converted_icon = Some(PathBuf::from("/work/app/main.icon_converted.ico"));
        let args = build_arguments(&descriptor).unwrap();
        assert!(args.contains(&"--icon=/work/app/main.icon_converted.ico".to_string()));
    }

    #[test]
    fn test_ico_icon_passes_through() {
        let args = build_arguments(&job().with_icon("/icons/app.ico")).unwrap();
        assert!(args.contains(&"--icon=/icons/app.ico".to_string()));
    }

    #[test]
    fn test_invalid_versions_are_rejected() {
        for bad in ["1.2", "1.2.3.4.5", "a.b.c.d"] {
            let err = build_arguments(&job().with_file_version(bad)).unwrap_err();
            assert!(matches!(err, JobError::InvalidConfiguration { .. }));
        }
    }

    #[test]
    fn test_version_and_copyright_emit_version_file() {
        let args = build_arguments(&job().with_file_version("1.0.0.0")).unwrap();
        assert!(args.contains(&"--version-file=/work/app/main.version_info.txt".to_string()));

        let args = build_arguments(&job().with_copyright("(c) ACME")).unwrap();
        assert!(args.iter().any(|a| a.starts_with("--version-file=")));
    }

    #[test]
    fn test_all_issues_reported_together() {
        let descriptor = job().with_icon("/icons/app.png").with_file_version("1.2");
        match build_arguments(&descriptor).unwrap_err() {
            JobError::InvalidConfiguration { issues } => assert_eq!(issues.len(), 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_hidden_imports_are_repeated_and_deduplicated() {
        let descriptor = job().with_hidden_imports(HiddenImports::from(vec![
            "numpy".to_string(),
            " ".to_string(),
            "pandas".to_string(),
            "numpy".to_string(),
        ]));
        let args = build_arguments(&descriptor).unwrap();
        let imports: Vec<&String> = args
            .iter()
            .filter(|a| a.starts_with("--hidden-import="))
            .collect();
        assert_eq!(
            imports,
            vec!["--hidden-import=numpy", "--hidden-import=pandas"]
        );
    }

    #[test]
    fn test_ordering_of_trailing_tokens() {
        let descriptor = job()
            .with_extra_args(["  --log-level ", "", "DEBUG"])
            .with_aux_dir(AuxDir::new("assets", "data"))
            .with_aux_dir(AuxDir::new("/shared/icons", "icons"));
        let args = build_arguments(&descriptor).unwrap();
        let n = args.len();

        assert_eq!(args[n - 1], "/work/app/main.py");
        assert_eq!(args[n - 2], format!("/shared/icons{}icons", ADD_DATA_SEPARATOR));
        assert_eq!(args[n - 3], "--add-data");
        assert_eq!(args[n - 4], format!("assets{}data", ADD_DATA_SEPARATOR));
        assert_eq!(args[n - 5], "--add-data");
        assert_eq!(args[n - 6], "DEBUG");
        assert_eq!(args[n - 7], "--log-level");
    }

    #[test]
    fn test_global_flags_follow_config() {
        let config = PackagerConfig {
            clean: false,
            noconfirm: false,
            ..Default::default()
        };
        let args = ArgumentBuilder::new(&config).build(&job()).unwrap();
        assert!(!args.contains(&"--clean".to_string()));
        assert!(!args.contains(&"--noconfirm".to_string()));
    }
}
