//! ERA5-Land Downloader.
//!
//! Downloads monthly mean ERA5-Land fields from the Climate Data Store, one GRIB file per
//! variable.
use clap::{crate_version, App, Arg, ArgMatches};
use era5dn::{download_variables, parse_year, select_variables, CdsClient, VARIABLES};
use std::{error::Error, path::PathBuf};

const DEFAULT_OUTPUT_DIR: &str = "../../preprocessing/ERA5_land_data/data";

fn main() {
    if let Err(e) = run() {
        println!("error: {}", e);

        let mut err = &*e;

        while let Some(cause) = err.source() {
            println!("caused by: {}", cause);
            err = cause;
        }

        ::std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let matches = parse_args();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let start_year = parse_year(matches.value_of("start_year").unwrap_or_default())?;
    let end_year = parse_year(matches.value_of("end_year").unwrap_or_default())?;

    let variables = match matches.values_of("variables") {
        Some(names) => {
            let names: Vec<&str> = names.collect();
            select_variables(names.as_slice())?
        }
        None => VARIABLES.to_vec(),
    };

    let output_dir = matches
        .value_of("output-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let client = CdsClient::from_env()?;

    download_variables(&client, &variables, start_year, end_year, &output_dir)?;

    Ok(())
}

fn parse_args() -> ArgMatches<'static> {
    App::new("era5dn")
        .version(crate_version!())
        .about("Download ERA5-Land monthly means from the Climate Data Store.")
        .arg(
            Arg::with_name("start_year")
                .index(1)
                .required(true)
                .help("First year to download, e.g. 2000."),
        )
        .arg(
            Arg::with_name("end_year")
                .index(2)
                .required(true)
                .help("Last year to download (inclusive), e.g. 2020."),
        )
        .arg(
            Arg::with_name("output-dir")
                .short("o")
                .long("output-dir")
                .takes_value(true)
                .help("Directory to save the GRIB files in.")
                .long_help(concat!(
                    "Directory to save the GRIB files in. It is created if it does not exist. ",
                    "Defaults to ../../preprocessing/ERA5_land_data/data relative to the ",
                    "current directory."
                )),
        )
        .arg(
            Arg::with_name("variables")
                .multiple(true)
                .short("v")
                .long("variables")
                .takes_value(true)
                .number_of_values(1)
                .help("Only download this variable. Repeat for more than one.")
                .long_help(concat!(
                    "Only download this variable, e.g. '-v t2m -v tdew'. One of t2mhourly, t2m, ",
                    "tdew, precipitation, solar_radiation. Repeat the option for more than one. ",
                    "They are still downloaded in the usual order. If not specified, all ",
                    "variables are downloaded."
                )),
        )
        .after_help(concat!(
            "Credentials are read from ~/.cdsapirc (or the file named by CDSAPI_RC), or from ",
            "the CDSAPI_URL and CDSAPI_KEY environment variables."
        ))
        .get_matches()
}
