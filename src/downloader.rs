//! Loop over the variables and write one file for each.

use crate::{
    errors::Era5Err,
    variables::{CompletedRequest, VariableRequest, VARIABLES},
};
use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
};

/// Something that can fetch a completed request from a dataset and write it to `target`.
pub trait Retrieve {
    fn retrieve(
        &self,
        dataset: &str,
        request: &CompletedRequest,
        target: &Path,
    ) -> Result<(), Era5Err>;
}

/// Download every variable in `VARIABLES` for `start_year..=end_year` into `output_dir`.
///
/// The first failed retrieval stops the run. Files written before it are left in place.
pub fn download<R: Retrieve + ?Sized>(
    client: &R,
    start_year: u32,
    end_year: u32,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, Era5Err> {
    download_variables(client, &VARIABLES, start_year, end_year, output_dir)
}

/// Same as `download`, but only for `variables`.
pub fn download_variables<R: Retrieve + ?Sized>(
    client: &R,
    variables: &[VariableRequest],
    start_year: u32,
    end_year: u32,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, Era5Err> {
    create_dir_all(output_dir)?;

    let mut written = Vec::with_capacity(variables.len());
    for var in variables {
        let target = output_dir.join(var.file_name(start_year, end_year));
        println!(
            "Downloading {} for {}-{}...",
            var.name, start_year, end_year
        );

        let request = var.complete(start_year, end_year);
        client.retrieve(var.dataset, &request, &target)?;

        println!(
            "Downloaded {} for {}-{}: {}",
            var.name,
            start_year,
            end_year,
            target.display()
        );
        written.push(target);
    }

    Ok(written)
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
