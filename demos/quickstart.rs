use std::path::Path;

use env_logger;
use log;

use ext_line_sort::{LimitedBufferBuilder, LineSorter, LineSorterBuilder};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let sorter: LineSorter = LineSorterBuilder::new()
        .with_tmp_dir(Path::new("./"))
        .with_buffer(LimitedBufferBuilder::new(1_000_000, true))
        .build();

    sorter.sort(Path::new("input.txt"), Path::new("output.txt")).unwrap();
}
