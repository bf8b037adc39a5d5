use clap::Parser;
use std::io;

use osm2rdf_rust::config::Config;
use osm2rdf_rust::handler::DumpHandler;
use osm2rdf_rust::osmpbf::OsmPbfReader;
use osm2rdf_rust::osmxml::OsmXmlReader;
use osm2rdf_rust::output::{MergeMode, Output};
use osm2rdf_rust::ttl::{Format, Writer};
use osm2rdf_rust::Error;

macro_rules! eprintlnt {
    ($($arg:tt)*) => {
        eprintln!("{} {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"), format_args!($($arg)*));
    };
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, help = "Input OSM file (.osm, .osm.gz or .pbf)")]
    pub input: String,
    #[arg(long, default_value = "", help = "Output file, stdout when empty")]
    pub output: String,
    #[arg(long, default_value = "ttl", help = "Output format: nt, ttl or qlever")]
    pub format: String,
    #[arg(long, help = "Compress output with gzip")]
    pub output_compress: bool,
    #[arg(
        long,
        default_value = "none",
        help = "How per-section output files are combined: none, concatenate or merge"
    )]
    pub merge_output: String,
}

fn run(config: &Config) -> Result<(), Error> {
    let output = Output::new(&config.output, config.output_compress, config.merge_output);
    let mut writer = Writer::new(config.format, output);
    writer.open()?;
    writer.write_header()?;
    let mut handler = DumpHandler::new(writer, io::stderr());
    if config.input.ends_with(".pbf") {
        OsmPbfReader::new(&config.input)?.read(&mut handler)?;
    } else if config.input.ends_with(".osm") || config.input.ends_with(".osm.gz") {
        OsmXmlReader::new(&config.input)?.read(&mut handler)?;
    } else {
        return Err(Error::Input(format!(
            "file {} is not supported",
            config.input
        )));
    }
    handler.finish()?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    let red = anstyle::Style::new().fg_color(Some(anstyle::AnsiColor::Red.into()));
    eprintlnt!("osm2rdf :: BEGIN");

    let format: Format = match args.format.parse() {
        Ok(f) => f,
        Err(unknown) => {
            eprintlnt!("osm2rdf :: ERROR");
            eprintln!("{red}Unknown output format: {unknown}{red:#}");
            std::process::exit(1);
        }
    };
    let merge_output = match args.merge_output.as_str() {
        "none" => MergeMode::None,
        "concatenate" => MergeMode::Concatenate,
        "merge" => MergeMode::Merge,
        other => {
            eprintlnt!("osm2rdf :: ERROR");
            eprintln!("{red}Unknown merge mode: {other}{red:#}");
            std::process::exit(1);
        }
    };
    let config = Config {
        input: args.input,
        output: args.output,
        format,
        output_compress: args.output_compress,
        merge_output,
    };

    if let Err(e) = run(&config) {
        eprintlnt!("osm2rdf :: ERROR");
        eprintln!("{red}{e}{red:#}");
        std::process::exit(1);
    }
    eprintlnt!("osm2rdf :: FINISHED");
}
