//! Command-line interface

use crate::driver::RunRequest;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "essay-agents")]
#[command(version, about = "Write a cited long-form essay from a topic, criteria and a folder of literature", long_about = None)]
pub struct Cli {
    /// Essay topic
    #[arg(short, long)]
    pub topic: String,

    /// File holding the evaluation criteria
    #[arg(short, long, value_name = "FILE")]
    pub criteria: PathBuf,

    /// Directory of literature files (.pdf, .txt, .md)
    #[arg(short, long, value_name = "DIR")]
    pub literature: PathBuf,

    /// Markdown file to write the essay to
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// YAML configuration file (defaults to ./config.yaml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn run_request(&self) -> RunRequest {
        RunRequest {
            topic: self.topic.clone(),
            criteria_path: self.criteria.clone(),
            literature_dir: self.literature.clone(),
            output_path: self.output.clone(),
        }
    }
}
