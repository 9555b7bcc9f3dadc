use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "docsqueeze")]
#[command(
    author,
    version,
    about = "Recompress raster images inside PDF and DOCX documents at three quality levels"
)]
pub struct Args {
    /// Input PDF or DOCX file path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output directory (defaults to the input file's directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Get the output directory, defaulting to the input's parent directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            self.input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_defaults_to_input_parent() {
        let args = Args {
            input: PathBuf::from("/data/docs/report.pdf"),
            output: None,
            verbose: 0,
        };
        assert_eq!(args.output_dir(), PathBuf::from("/data/docs"));
    }

    #[test]
    fn test_output_dir_falls_back_to_cwd() {
        let args = Args {
            input: PathBuf::from("report.pdf"),
            output: None,
            verbose: 0,
        };
        assert_eq!(args.output_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_output_dir_override() {
        let args = Args {
            input: PathBuf::from("report.pdf"),
            output: Some(PathBuf::from("/tmp/out")),
            verbose: 0,
        };
        assert_eq!(args.output_dir(), PathBuf::from("/tmp/out"));
    }
}
