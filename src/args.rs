use std::path::PathBuf;

use clap::Parser;

/// Auditor and cleaner of OpenStreetMap data from osm XML to a JSON record array
#[derive(Debug, Parser)]
#[clap(about, version, author)]
pub struct Args {
    /// Verbose mode (-v, -vv, -vvv, etc.)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Input OSM XML file
    pub input: PathBuf,

    /// Output JSON file
    pub output: PathBuf,

    /// Whether to check that all nd and member refs resolve (slow on large inputs)
    #[arg(long = "check-refs")]
    pub check_refs: bool,

    /// Print tag and attribute frequencies and the document structure
    #[arg(long)]
    pub audit: bool,

    /// Keep the records in memory and print a summary of them
    #[arg(long)]
    pub summary: bool,
}
