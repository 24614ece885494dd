//! fryer - load an image, run crust/fry passes, save the result

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use fryer_core::{FryerConfig, ImageResource, Locality, Services};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("fryer")
        .version(fryer_core::VERSION)
        .about("Degrade and over-sharpen an image through an ordered pipeline")
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .required(true)
                .help("Key or path of the image to load"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT")
                .help("Where to save the result (default: <stem>-fried.jpg next to the input)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .env("FRYER_CONFIG")
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("crust")
                .long("crust")
                .value_name("N")
                .default_value("1")
                .value_parser(value_parser!(u32))
                .help("Number of degrade passes (0 to skip)"),
        )
        .arg(
            Arg::new("fry")
                .long("fry")
                .value_name("N")
                .default_value("1")
                .value_parser(value_parser!(u32))
                .help("Number of sharpen passes (0 to skip)"),
        )
        .arg(
            Arg::new("quality")
                .long("quality")
                .value_name("Q")
                .value_parser(value_parser!(u8).range(1..=100))
                .help("Base quality for degrade passes"),
        )
        .arg(
            Arg::new("remote")
                .long("remote")
                .action(ArgAction::SetTrue)
                .help("Load and save through the remote object store"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECS")
                .value_parser(value_parser!(u64))
                .help("Fail a step that runs longer than this"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
}

/// `<dir>/<stem>-fried.jpg` for `<dir>/<stem>.<ext>`
fn default_output(input: &str) -> String {
    let path = Path::new(input);
    let stem = path
        .file_stem()
        .map_or_else(|| input.to_string(), |s| s.to_string_lossy().into_owned());
    let name = format!("{stem}-fried.jpg");
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name).to_string_lossy().into_owned(),
        _ => name,
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: &ArgMatches) -> Result<()> {
    let input = args
        .get_one::<String>("input")
        .context("missing INPUT")?
        .clone();
    let output = args
        .get_one::<String>("output")
        .cloned()
        .unwrap_or_else(|| default_output(&input));

    let mut config = FryerConfig::load(args.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("failed to load configuration")?;
    if let Some(secs) = args.get_one::<u64>("timeout") {
        config.pipeline.step_timeout_secs = Some(*secs);
    }
    if args.get_flag("remote") {
        config.resource.locality = Locality::Remote;
    }

    let crust = args.get_one::<u32>("crust").copied().unwrap_or(0);
    let fry = args.get_one::<u32>("fry").copied().unwrap_or(0);
    let quality = args.get_one::<u8>("quality").copied();

    let image = ImageResource::new(input.as_str(), Services::from_config(&config))
        .context("failed to create image resource")?;
    tracing::info!(%input, %output, crust, fry, locality = %config.resource.locality, "starting");

    image.load()?;
    if crust > 0 {
        image.crust(crust, quality)?;
    }
    if fry > 0 {
        image.fry(fry, 1.0)?;
    }
    image.save(output.as_str())?;

    let buffer = image
        .finish()
        .await
        .with_context(|| format!("failed to process {input}"))?;
    println!(
        "{output}: {} bytes",
        buffer.as_ref().map_or(0, |b| b.len())
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli().get_matches();
    init_logging(args.get_flag("json-logs"));
    run(&args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn defaults_run_one_pass_each() {
        let args = cli().try_get_matches_from(["fryer", "cat.jpg"]).unwrap();
        assert_eq!(args.get_one::<u32>("crust"), Some(&1));
        assert_eq!(args.get_one::<u32>("fry"), Some(&1));
        assert!(!args.get_flag("remote"));
        assert!(args.get_one::<u8>("quality").is_none());
    }

    #[test]
    fn quality_out_of_range_rejected() {
        assert!(cli()
            .try_get_matches_from(["fryer", "cat.jpg", "--quality", "0"])
            .is_err());
        assert!(cli()
            .try_get_matches_from(["fryer", "cat.jpg", "--quality", "101"])
            .is_err());
    }

    #[test]
    fn default_output_sits_next_to_input() {
        assert_eq!(default_output("cat.png"), "cat-fried.jpg");
        assert_eq!(default_output("photos/cat.jpg"), "photos/cat-fried.jpg");
        assert_eq!(default_output("noext"), "noext-fried.jpg");
    }
}
