use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use axml::{write_document, AxmlDocument, Event};

/// Decode an Android binary XML file (e.g. a compiled AndroidManifest.xml)
/// into readable XML.
#[derive(Parser)]
#[command(name = "axml_dump", version, about)]
struct Args {
    /// The binary XML file to decode.
    input: PathBuf,

    /// Write the XML to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Parse and walk the document without producing any XML.
    #[arg(long)]
    validate_only: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let doc = AxmlDocument::from_path(&args.input)?;
    let tree = doc.tree().with_context(|| {
        format!(
            "{} is not a well-formed binary XML document",
            args.input.display()
        )
    })?;

    if args.validate_only {
        let mut cursor = tree.cursor();
        let mut elements = 0usize;
        loop {
            match cursor.next() {
                Event::StartTag => elements += 1,
                Event::EndDocument => break,
                Event::BadDocument => {
                    anyhow::bail!("node stream is corrupt after {elements} start tags")
                }
                _ => {}
            }
        }
        println!(
            "{}: ok, {} elements, {} strings",
            args.input.display(),
            elements,
            tree.strings().len()
        );
        return Ok(());
    }

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = write_document(&tree, BufWriter::new(file))?;
            out.write_all(b"\n")?;
            out.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = write_document(&tree, BufWriter::new(stdout.lock()))?;
            out.write_all(b"\n")?;
            out.flush()?;
        }
    }

    Ok(())
}
