mod args;

use osmclean::aggregate::Summary;
use osmclean::flatten::{JsonArrayWriter, Record, RecordSink};
use osmclean::pipeline::{self, Options};
use osmclean::{loader, LogReporter, RecordStore};

use clap::Parser;
use colored::*;
use log::info;
use memmap2::Mmap;
use pbr::ProgressBar;

use std::fs::File;
use std::io::{self, BufWriter, Stdout};

type Error = Box<dyn std::error::Error>;

/// Number of top users and amenities in the summary.
const SUMMARY_TOP: usize = 10;

/// Advances a progress bar for every record written into the inner sink.
struct Progress<'a, S> {
    sink: S,
    pb: &'a mut ProgressBar<Stdout>,
}

impl<S: RecordSink> RecordSink for Progress<'_, S> {
    fn write(&mut self, record: Record) -> io::Result<()> {
        self.sink.write(record)?;
        self.pb.inc();
        Ok(())
    }
}

fn run(args: args::Args) -> Result<(), Error> {
    let input_file = File::open(&args.input)?;
    let input_data = unsafe { Mmap::map(&input_file)? };

    info!("Loading {}...", args.input.display());
    let root = loader::load_slice(&input_data)?;
    let num_records = root.children.len() as u64 + 1;

    let options = Options {
        check_references: args.check_refs,
        ..Default::default()
    };
    let mut reporter = LogReporter::new();

    let audit = pipeline::audit(&root, &options, &mut reporter);
    if args.audit {
        println!("{audit}");
    }

    let output = BufWriter::new(File::create(&args.output)?);
    let mut writer = JsonArrayWriter::new(output);
    let mut store = RecordStore::new();

    let mut pb = ProgressBar::new(num_records);
    pb.message("Writing records...");
    let stats = if args.summary {
        let mut sink = Progress {
            sink: (&mut writer, &mut store),
            pb: &mut pb,
        };
        pipeline::convert(root, &audit, &options, &mut sink, &mut reporter)?
    } else {
        let mut sink = Progress {
            sink: &mut writer,
            pb: &mut pb,
        };
        pipeline::convert(root, &audit, &options, &mut sink, &mut reporter)?
    };
    pb.finish();

    let num_written = writer.num_records();
    writer.finish()?;
    info!(
        "{} records written to: {}",
        num_written,
        args.output.display()
    );

    println!("{stats}");
    println!("{reporter}");
    if args.summary {
        println!("{}", Summary::new(&store, SUMMARY_TOP));
    }
    Ok(())
}

fn main() {
    let args = args::Args::parse();
    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_module_path(false)
        .format_timestamp_nanos()
        .init();

    if let Err(e) = run(args) {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }
}
