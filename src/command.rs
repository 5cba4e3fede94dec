use crate::config::ScriptConfig;
use std::fmt;
use std::path::{Path, PathBuf};

/// Everything needed to start one scraper run. Building it has no side
/// effects; `launch` or the user's own terminal consume it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub program: String,
    pub script: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub preset_file: Option<PathBuf>,
}

/// `start_category` and `start_item` are zero-based here; the panel shows
/// them one-based.
pub fn build_invocation(
    config: &ScriptConfig,
    start_category: u32,
    start_item: u32,
    preset_file: Option<&Path>,
) -> ScriptInvocation {
    let mut args = vec![
        "--start_category".to_string(),
        start_category.to_string(),
        "--start_item".to_string(),
        start_item.to_string(),
    ];
    if let Some(path) = preset_file {
        args.push("--preset".to_string());
        args.push(path.display().to_string());
    }

    let working_dir = std::path::absolute(&config.working_dir)
        .unwrap_or_else(|_| config.working_dir.clone());

    ScriptInvocation {
        program: config.program.clone(),
        script: config.script.clone(),
        args,
        working_dir,
        preset_file: preset_file.map(Path::to_path_buf),
    }
}

impl ScriptInvocation {
    /// Arguments after the program name.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.script.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// The one-liner shown for copying into a terminal. Paths are wrapped in
/// double quotes and nothing else is escaped.
impl fmt::Display for ScriptInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cd \"{}\" && {} {}",
            self.working_dir.display(),
            self.program,
            self.script
        )?;
        let mut args = self.args.iter();
        while let Some(arg) = args.next() {
            if arg == "--preset" {
                if let Some(path) = args.next() {
                    write!(f, " --preset \"{path}\"")?;
                }
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> ScriptConfig {
        ScriptConfig {
            program: "py".to_string(),
            script: "ModernWarshipMarket.py".to_string(),
            working_dir: PathBuf::from("/srv/market"),
        }
    }

    #[test]
    fn without_preset() {
        let inv = build_invocation(&config(), 0, 3, None);
        assert_eq!(
            inv.argv(),
            vec!["ModernWarshipMarket.py", "--start_category", "0", "--start_item", "3"]
        );
        assert_eq!(
            inv.to_string(),
            "cd \"/srv/market\" && py ModernWarshipMarket.py --start_category 0 --start_item 3"
        );
        assert_eq!(inv.preset_file, None);
    }

    #[test]
    fn with_preset() {
        let preset = PathBuf::from("/srv/market/presets/temp_preset_1.json");
        let inv = build_invocation(&config(), 2, 0, Some(&preset));
        assert_eq!(
            inv.to_string(),
            "cd \"/srv/market\" && py ModernWarshipMarket.py --start_category 2 --start_item 0 \
             --preset \"/srv/market/presets/temp_preset_1.json\""
        );
        assert_eq!(inv.preset_file, Some(preset));
        assert_eq!(inv.working_dir, PathBuf::from("/srv/market"));
    }

    #[test]
    fn relative_working_dir_is_made_absolute() {
        let mut cfg = config();
        cfg.working_dir = PathBuf::from(".");
        let inv = build_invocation(&cfg, 0, 0, None);
        assert!(inv.working_dir.is_absolute());
    }
}
