use std::path::Path;
use std::process;

use clap::ArgEnum;
use env_logger;
use log;

use ext_line_sort::{LimitedBufferBuilder, LineSorter, LineSorterBuilder};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let max_lines: usize = arg_parser.value_of_t_or_exit("max_lines");
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");
    let input = arg_parser.value_of("input").expect("value is required");
    let output = arg_parser.value_of("output").expect("value is required");

    let mut sorter_builder =
        LineSorterBuilder::new().with_buffer(LimitedBufferBuilder::new(max_lines, false));

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(Path::new(tmp_dir));
    }

    let sorter: LineSorter = sorter_builder.build();

    if let Err(err) = sorter.sort(Path::new(input), Path::new(output)) {
        log::error!("sorting failed: {}", err);
        process::exit(1);
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("ext-line-sort")
        .about("external merge sort for line-oriented text files")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("max_lines")
                .short('m')
                .long("max-lines")
                .help("maximum number of lines held in memory at once")
                .takes_value(true)
                .default_value("1000000")
                .validator(|v| match v.parse::<usize>() {
                    Ok(n) if n >= 1 => Ok(()),
                    Ok(_) => Err("max lines must be at least 1".to_string()),
                    Err(err) => Err(format!("max lines format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
