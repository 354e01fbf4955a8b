use clap::Parser;

/// This is the scoring and reporting program for retail mystery-shopper audits.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON run configuration describing the wave exports, the master
    /// site directory and the section weight table. For more information about the file
    /// format, read the documentation.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, storeaudit will
    /// check that the produced summary matches the reference and fail on any difference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the run will be
    /// written in JSON format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// If passed as an argument, the recomputed section and composite scores are
    /// compared against the percentages embedded in each wave export and a per-wave
    /// reconciliation report is printed.
    #[clap(long, takes_value = false)]
    pub check_embedded: bool,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
