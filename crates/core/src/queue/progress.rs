//! Coarse progress estimate derived from packager output.

/// Markers the packager prints as it moves through its phases.
const PHASES: &[(&str, u8)] = &[("Analyzing", 30), ("Collecting", 50), ("Building", 70)];

const COMPLETION_MARKER: &str = "completed successfully";

/// Maps one output line to a progress percentage, if it marks a phase.
///
/// Phase markers win over the completion marker, so a line like
/// `Building EXE ... completed successfully` only counts as 70.
pub fn estimate(line: &str) -> Option<u8> {
    PHASES
        .iter()
        .find(|(marker, _)| line.contains(marker))
        .map(|(_, percent)| *percent)
        .or_else(|| line.to_lowercase().contains(COMPLETION_MARKER).then_some(100))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_markers() {
        assert_eq!(estimate("1024 INFO: Analyzing /work/app/main.py"), Some(30));
        assert_eq!(estimate("2048 INFO: Collecting submodules"), Some(50));
        assert_eq!(estimate("4096 INFO: Building EXE from EXE-00.toc"), Some(70));
        assert_eq!(
            estimate("5000 INFO: Building EXE from EXE-00.toc completed successfully."),
            Some(70)
        );
        assert_eq!(estimate("5100 INFO: Build completed successfully."), Some(100));
        assert_eq!(estimate("Build COMPLETED SUCCESSFULLY"), Some(100));
    }

    #[test]
    fn test_unrelated_lines() {
        assert_eq!(estimate("INFO: PyInstaller: 6.3.0"), None);
        assert_eq!(estimate(""), None);
        assert_eq!(estimate("building lowercase is not a marker"), None);
    }
}
