use clap::Parser;

/// This is a vote log auditing program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON description of the audit: log file location, exempt
    /// candidates, name matching policy and selection sizes. All entries are optional.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The vote log to audit. Overrides the log file that may be specified
    /// with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the audit will be written
    /// in JSON format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the outcome of an audit in JSON format. If
    /// provided, vaudit will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
