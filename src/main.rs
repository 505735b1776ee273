use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use taxlink::cli::commands::execute_command;
use taxlink::cli::output;
use taxlink::cli::Cli;

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.debug);

    if let Err(e) = execute_command(&cli) {
        output::error(&e);
        std::process::exit(e.exit_code());
    }
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        3 => LevelFilter::TRACE,
        _ => {
            eprintln!("-d given more than three times, using trace");
            LevelFilter::TRACE
        }
    };

    // config-rs logs every source it probes at debug
    let noisy_modules = ["config"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    let filtered_layer = fmt_layer.with_filter(filter).with_filter(module_filter);

    tracing_subscriber::registry().with(filtered_layer).init();

    match filter {
        LevelFilter::WARN => {}
        level => tracing::info!(%level, "taxlink {}", env!("CARGO_PKG_VERSION")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxlink::util::testing;

    // https://docs.rs/clap/latest/clap/_derive/_tutorial/index.html#testing
    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        testing::init_test_setup();
        Cli::command().debug_assert();
    }

    #[test]
    fn given_repeated_debug_flag_when_parsing_then_counts() {
        let cli = Cli::parse_from(["taxlink", "-dd", "tree"]);
        assert_eq!(cli.debug, 2);
    }

    #[test]
    fn given_add_without_taxon_when_parsing_then_rejected() {
        assert!(Cli::try_parse_from(["taxlink", "add", "-f", "seq.fa"]).is_err());
    }

    #[test]
    fn given_add_with_id_and_name_when_parsing_then_rejected() {
        assert!(Cli::try_parse_from([
            "taxlink", "add", "-f", "seq.fa", "-i", "562", "-n", "Escherichia coli"
        ])
        .is_err());
    }
}
